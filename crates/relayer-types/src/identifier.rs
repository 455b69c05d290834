//! Validated identifiers for the objects a relay path references.
//!
//! Validation follows the ICS-24 host requirements: a restricted character
//! set plus per-kind length bounds.

use core::fmt::{Display, Error as FmtError, Formatter};
use core::str::FromStr;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::ValidationError;

/// Characters allowed in an identifier besides alphanumerics.
const VALID_SPECIAL_CHARS: &str = "._+-#[]<>";

fn validate_identifier(id: &str, min: usize, max: usize) -> Result<(), ValidationError> {
    if id.len() < min || id.len() > max {
        return Err(ValidationError::invalid_length(
            id.to_string(),
            id.len(),
            min,
            max,
        ));
    }

    if !id
        .chars()
        .all(|c| c.is_alphanumeric() || VALID_SPECIAL_CHARS.contains(c))
    {
        return Err(ValidationError::invalid_character(id.to_string()));
    }

    Ok(())
}

macro_rules! identifier {
    ($(#[$doc:meta])* $name:ident, $min:expr, $max:expr) => {
        $(#[$doc])*
        #[derive(
            Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl FromStr for $name {
            type Err = ValidationError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                validate_identifier(s, $min, $max)?;
                Ok(Self(s.to_string()))
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), FmtError> {
                write!(f, "{}", self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

identifier!(
    /// Identifier of an on-chain light client, e.g. `07-tendermint-4`.
    ClientId,
    9,
    64
);

identifier!(
    /// Identifier of a connection end, e.g. `connection-1`.
    ConnectionId,
    10,
    64
);

identifier!(
    /// Identifier of a channel end, e.g. `channel-0`.
    ChannelId,
    8,
    64
);

identifier!(
    /// Identifier of a port bound by an application module, e.g. `transfer`.
    PortId,
    2,
    128
);

/// The identifier of a chain, carrying the revision number encoded in its
/// trailing `-<n>` suffix (`ibc-2` is revision 2). Identifiers without a
/// numeric suffix are revision 0.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ChainId {
    id: String,
    version: u64,
}

impl ChainId {
    pub fn new(name: &str, version: u64) -> Self {
        Self {
            id: format!("{name}-{version}"),
            version,
        }
    }

    pub fn from_string(id: &str) -> Self {
        Self {
            id: id.to_string(),
            version: Self::chain_version(id),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.id
    }

    /// The revision number all heights of this chain belong to.
    pub fn version(&self) -> u64 {
        self.version
    }

    fn chain_version(id: &str) -> u64 {
        match id.rsplit_once('-') {
            Some((_, suffix)) => suffix.parse().unwrap_or(0),
            None => 0,
        }
    }
}

impl FromStr for ChainId {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from_string(s))
    }
}

impl Display for ChainId {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), FmtError> {
        write!(f, "{}", self.id)
    }
}

impl Serialize for ChainId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.id.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for ChainId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let id = String::deserialize(deserializer)?;
        ChainId::from_str(&id).map_err(D::Error::custom)
    }
}
