//! Main Crate Error

use crate::engine::{AddressFamily, EngineError};

#[derive(thiserror::Error, Debug)]
/// dht-explorer crate error enum.
pub enum Error {
    #[error(transparent)]
    /// Transparent [std::io::Error]
    IO(#[from] std::io::Error),

    /// Creating the datagram socket for an address family failed.
    #[error("Creation of {family} socket failed: {source}")]
    SocketCreate {
        family: AddressFamily,
        source: std::io::Error,
    },

    /// Binding (or configuring) the datagram socket for an address family failed.
    #[error("Binding of {family} socket failed: {source}")]
    Bind {
        family: AddressFamily,
        source: std::io::Error,
    },

    /// No address family was enabled in the [crate::Config].
    #[error("At least one of IPv4 or IPv6 must be enabled")]
    NoAddressFamily,

    /// The operating system random source is unavailable, so no node Id can be generated.
    #[error("Random source unavailable: {0}")]
    RandomSource(#[from] rand::Error),

    /// [crate::RoutingEngine::initialize] returned an error.
    #[error("Routing engine initialization failed: {0}")]
    EngineInit(EngineError),

    /// Expected 40 hexadecimal characters.
    #[error("Invalid Id: {0:?}")]
    InvalidId(String),

    /// Expected exactly 20 bytes.
    #[error("Invalid Id size, expected 20, got {0}")]
    InvalidIdSize(usize),

    /// Reading or writing the configuration file failed.
    #[error("Invalid configuration: {0}")]
    Config(#[from] serde_json::Error),
}

/// Alias for `Result<T, Error>`.
pub type Result<T, E = Error> = core::result::Result<T, E>;
