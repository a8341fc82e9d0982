//! Node Id or lookup target (info-hash)
use std::{
    fmt::{self, Debug, Display, Formatter},
    str::FromStr,
};

use crate::{utils, Error, Result};

/// The size of node IDs and info-hashes in bytes.
pub const ID_SIZE: usize = 20;

#[derive(Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd)]
/// 160 bit node Id or lookup target.
pub struct Id(pub [u8; ID_SIZE]);

/// The key under which a lookup is performed and a [crate::SearchSession] is indexed.
pub type InfoHash = Id;

impl Id {
    /// Generates a random Id from the operating system random source.
    pub fn random() -> Result<Id> {
        let mut bytes = [0; ID_SIZE];
        utils::random_bytes(&mut bytes)?;

        Ok(Id(bytes))
    }

    /// Create a new Id from some bytes. Returns Err if `bytes` is not of length
    /// [ID_SIZE].
    pub fn from_bytes<T: AsRef<[u8]>>(bytes: T) -> Result<Id> {
        let bytes = bytes.as_ref();
        if bytes.len() != ID_SIZE {
            return Err(Error::InvalidIdSize(bytes.len()));
        }

        let mut tmp: [u8; ID_SIZE] = [0; ID_SIZE];
        tmp.copy_from_slice(bytes);

        Ok(Id(tmp))
    }

    /// Returns true if `s` is exactly 40 hexadecimal characters.
    pub fn is_valid_hex(s: &str) -> bool {
        s.len() == ID_SIZE * 2 && s.bytes().all(|b| b.is_ascii_hexdigit())
    }

    pub fn as_bytes(&self) -> &[u8; ID_SIZE] {
        &self.0
    }

    /// Lowercase hex encoding, the persisted form of a node Id.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl FromStr for Id {
    type Err = Error;

    fn from_str(s: &str) -> Result<Id> {
        if !Id::is_valid_hex(s) {
            return Err(Error::InvalidId(s.to_string()));
        }

        let mut bytes = [0; ID_SIZE];
        hex::decode_to_slice(s, &mut bytes).map_err(|_| Error::InvalidId(s.to_string()))?;

        Ok(Id(bytes))
    }
}

impl Display for Id {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl Debug for Id {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "Id({})", self.to_hex())
    }
}

impl From<[u8; ID_SIZE]> for Id {
    fn from(bytes: [u8; ID_SIZE]) -> Self {
        Id(bytes)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn from_str() {
        let str = "aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";
        let id = Id::from_str(str).unwrap();

        assert_eq!(id, Id([0xaa; ID_SIZE]));
        assert_eq!(id.to_string(), str);
    }

    #[test]
    fn from_str_is_case_insensitive() {
        let upper = Id::from_str("4238AF8AFF56CF6E0007D9D2003BF23D33EEA7C3").unwrap();
        let lower = Id::from_str("4238af8aff56cf6e0007d9d2003bf23d33eea7c3").unwrap();

        assert_eq!(upper, lower);
    }

    #[test]
    fn reject_wrong_length_or_non_hex() {
        assert!(Id::from_str("").is_err());
        assert!(Id::from_str("aaaa").is_err());
        assert!(Id::from_str("aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa").is_err());
        assert!(Id::from_str("gaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa").is_err());
    }

    #[test]
    fn from_bytes_size() {
        assert!(Id::from_bytes([0; 20]).is_ok());
        assert!(matches!(
            Id::from_bytes([0; 19]),
            Err(Error::InvalidIdSize(19))
        ));
    }

    #[test]
    fn random_ids_differ() {
        assert_ne!(Id::random().unwrap(), Id::random().unwrap());
    }
}
