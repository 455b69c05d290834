//! Relayer configuration.
//!
//! Implements defaults, as well as serializing and deserializing with
//! upper-bound verification for the transaction caps.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::path::PathEnd;

pub use max_msg_count::MaxMsgCount;

pub mod max_msg_count {
    flex_error::define_error! {
        Error {
            TooBig
                { value: usize }
                |e| {
                    format!("`max_msg_count` must be less than or equal to {}, found {}",
                        MaxMsgCount::MAX_BOUND, e.value)
                },
        }
    }

    /// Cap on the number of payload messages bundled into one
    /// transaction. A configured value of `0` means "use the default".
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct MaxMsgCount(usize);

    impl MaxMsgCount {
        const DEFAULT: usize = 400;
        const MAX_BOUND: usize = 10_000;

        pub fn new(value: usize) -> Result<Self, Error> {
            if value == 0 {
                return Ok(Self(Self::DEFAULT));
            }

            if value > Self::MAX_BOUND {
                return Err(Error::too_big(value));
            }

            Ok(Self(value))
        }

        pub fn to_usize(self) -> usize {
            self.0
        }
    }

    impl Default for MaxMsgCount {
        fn default() -> Self {
            Self(Self::DEFAULT)
        }
    }

    use serde::de::Unexpected;
    use serde::{de::Error as _, Deserialize, Deserializer, Serialize, Serializer};

    impl<'de> Deserialize<'de> for MaxMsgCount {
        fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
        where
            D: Deserializer<'de>,
        {
            let value = usize::deserialize(deserializer)?;

            MaxMsgCount::new(value).map_err(|e| match e.detail() {
                ErrorDetail::TooBig(_) => D::Error::invalid_value(
                    Unexpected::Unsigned(value as u64),
                    &format!("a usize less than or equal to {}", Self::MAX_BOUND).as_str(),
                ),
            })
        }
    }

    impl Serialize for MaxMsgCount {
        fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
        where
            S: Serializer,
        {
            self.0.serialize(serializer)
        }
    }

    impl From<MaxMsgCount> for usize {
        fn from(m: MaxMsgCount) -> Self {
            m.0
        }
    }
}

pub use max_tx_size::MaxTxSize;

pub mod max_tx_size {
    flex_error::define_error! {
        Error {
            TooBig
                { value: usize }
                |e| {
                    format!("`max_tx_size` must be less than or equal to {}, found {}",
                        MaxTxSize::MAX_BOUND, e.value)
                },
        }
    }

    /// Cap on the serialized size, in bytes, of the messages bundled
    /// into one transaction. `0` means unbounded.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct MaxTxSize(usize);

    impl MaxTxSize {
        const MAX_BOUND: usize = 8 * 1048576; // 8 MBytes

        pub fn new(value: usize) -> Result<Self, Error> {
            if value > Self::MAX_BOUND {
                return Err(Error::too_big(value));
            }

            Ok(Self(value))
        }

        pub fn unbounded() -> Self {
            Self(0)
        }

        pub fn is_unbounded(self) -> bool {
            self.0 == 0
        }

        pub fn to_usize(self) -> usize {
            self.0
        }
    }

    impl Default for MaxTxSize {
        fn default() -> Self {
            Self::unbounded()
        }
    }

    use serde::de::Unexpected;
    use serde::{de::Error as _, Deserialize, Deserializer, Serialize, Serializer};

    impl<'de> Deserialize<'de> for MaxTxSize {
        fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
        where
            D: Deserializer<'de>,
        {
            let value = usize::deserialize(deserializer)?;

            MaxTxSize::new(value).map_err(|e| match e.detail() {
                ErrorDetail::TooBig(_) => D::Error::invalid_value(
                    Unexpected::Unsigned(value as u64),
                    &format!("a usize less than or equal to {}", Self::MAX_BOUND).as_str(),
                ),
            })
        }
    }

    impl Serialize for MaxTxSize {
        fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
        where
            S: Serializer,
        {
            self.0.serialize(serializer)
        }
    }

    impl From<MaxTxSize> for usize {
        fn from(m: MaxTxSize) -> Self {
            m.0
        }
    }
}

/// Tunables of the relay strategy.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StrategyConfig {
    /// Whether the relayed channel is ordered.
    pub ordered: bool,
    pub max_tx_size: MaxTxSize,
    pub max_msg_count: MaxMsgCount,
}

/// Top-level relayer configuration: the two path ends plus strategy
/// tunables.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub strategy: StrategyConfig,
    pub src: PathEnd,
    pub dst: PathEnd,
}

/// Attempt to load and parse the TOML config file as a `Config`.
pub fn load(path: impl AsRef<Path>) -> Result<Config, Error> {
    let config_toml = fs::read_to_string(&path).map_err(Error::config_io)?;
    toml::from_str::<Config>(&config_toml).map_err(Error::config_decode)
}
