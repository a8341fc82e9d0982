//! Node identity: loaded from its persisted hex form or freshly generated.

use std::str::FromStr;

use tracing::{debug, info};

use crate::common::Id;
use crate::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Identity {
    pub id: Id,
    /// `true` if the Id was generated and should be persisted.
    pub generated: bool,
}

/// Decode the persisted Id, or generate a new one if it is absent or isn't
/// exactly 40 hexadecimal characters.
///
/// Fails only when the random source is unavailable, there is no safe fallback Id.
pub fn obtain_identity(persisted: Option<&str>) -> Result<Identity> {
    if let Some(id) = persisted.and_then(|s| Id::from_str(s).ok()) {
        debug!(%id, "Using persisted Id");
        return Ok(Identity {
            id,
            generated: false,
        });
    }

    let id = Id::random()?;
    info!(%id, "Generated new Id");

    Ok(Identity {
        id,
        generated: true,
    })
}
