//! Symbolic device addresses.
//!
//! An [`Address`] names a parameter on a device without holding a handle to
//! it: `device:/path/to/param`, optionally qualified with an element index
//! (`device:/rgb@1`). Addresses are what the authoring layer stores on ports;
//! resolution to a live [`Parameter`](crate::device::Parameter) happens
//! against the registered device set and can fail without error, leaving the
//! port unbound.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// A symbolic reference to a device parameter.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "String", into = "String"))]
pub struct Address {
    device: String,
    path: String,
    index: Option<usize>,
}

impl Address {
    /// Creates an address from a device name and a parameter path.
    ///
    /// The path is normalized to start with `/`.
    pub fn new(device: impl Into<String>, path: impl Into<String>) -> Self {
        let path = path.into();
        let path = if path.starts_with('/') {
            path
        } else {
            format!("/{path}")
        };
        Self {
            device: device.into(),
            path,
            index: None,
        }
    }

    /// Adds an element index qualifier (`@n`).
    pub fn with_index(mut self, index: usize) -> Self {
        self.index = Some(index);
        self
    }

    /// The device name component.
    pub fn device(&self) -> &str {
        &self.device
    }

    /// The parameter path component, with leading `/`.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// The optional element index qualifier.
    pub fn index(&self) -> Option<usize> {
        self.index
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.device, self.path)?;
        if let Some(i) = self.index {
            write!(f, "@{i}")?;
        }
        Ok(())
    }
}

/// Errors produced when parsing an address string.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressParseError {
    /// The string has no `:` separating device from path.
    #[error("address '{0}' is missing the 'device:' prefix")]
    MissingDevice(String),
    /// The path component is empty.
    #[error("address '{0}' has an empty parameter path")]
    EmptyPath(String),
    /// The `@index` qualifier is not an unsigned integer.
    #[error("address '{0}' has a malformed index qualifier")]
    BadIndex(String),
}

impl FromStr for Address {
    type Err = AddressParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let Some((device, rest)) = s.split_once(':') else {
            return Err(AddressParseError::MissingDevice(s.to_string()));
        };
        if device.is_empty() {
            return Err(AddressParseError::MissingDevice(s.to_string()));
        }

        let (path, index) = match rest.rsplit_once('@') {
            Some((path, idx)) => {
                let idx = idx
                    .parse::<usize>()
                    .map_err(|_| AddressParseError::BadIndex(s.to_string()))?;
                (path, Some(idx))
            }
            None => (rest, None),
        };

        if path.is_empty() || path == "/" {
            return Err(AddressParseError::EmptyPath(s.to_string()));
        }

        let mut addr = Address::new(device, path);
        addr.index = index;
        Ok(addr)
    }
}

impl TryFrom<String> for Address {
    type Error = AddressParseError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Address> for String {
    fn from(a: Address) -> Self {
        a.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_plain() {
        let a: Address = "lights:/dimmer/1".parse().unwrap();
        assert_eq!(a.device(), "lights");
        assert_eq!(a.path(), "/dimmer/1");
        assert_eq!(a.index(), None);
    }

    #[test]
    fn parse_with_index() {
        let a: Address = "synth:/filter/cutoff@2".parse().unwrap();
        assert_eq!(a.device(), "synth");
        assert_eq!(a.path(), "/filter/cutoff");
        assert_eq!(a.index(), Some(2));
    }

    #[test]
    fn parse_errors() {
        assert!(matches!(
            "/no/device".parse::<Address>(),
            Err(AddressParseError::MissingDevice(_))
        ));
        assert!(matches!(
            "dev:".parse::<Address>(),
            Err(AddressParseError::EmptyPath(_))
        ));
        assert!(matches!(
            "dev:/x@nope".parse::<Address>(),
            Err(AddressParseError::BadIndex(_))
        ));
    }

    #[test]
    fn display_round_trip() {
        for s in ["lights:/dimmer/1", "synth:/filter/cutoff@2"] {
            let a: Address = s.parse().unwrap();
            assert_eq!(a.to_string(), s);
            let back: Address = a.to_string().parse().unwrap();
            assert_eq!(back, a);
        }
    }

    #[test]
    fn normalizes_missing_slash() {
        let a = Address::new("dev", "x/y");
        assert_eq!(a.path(), "/x/y");
    }
}
