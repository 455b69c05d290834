use core::fmt::{Display, Error as FmtError, Formatter};
use core::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Delivery discipline of a channel end.
///
/// On an ordered channel packets must be received in the exact sequence
/// they were sent; on an unordered channel any delivery order is valid.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Ordering {
    #[default]
    Unordered,
    Ordered,
}

impl Ordering {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unordered => "UNORDERED",
            Self::Ordered => "ORDERED",
        }
    }

    pub fn is_ordered(&self) -> bool {
        matches!(self, Self::Ordered)
    }
}

impl Display for Ordering {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), FmtError> {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Ordering {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "UNORDERED" | "ORDER_UNORDERED" => Ok(Self::Unordered),
            "ORDERED" | "ORDER_ORDERED" => Ok(Self::Ordered),
            _ => Err(ValidationError::unknown_ordering(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_both_spellings() {
        assert_eq!("ordered".parse::<Ordering>().unwrap(), Ordering::Ordered);
        assert_eq!(
            "ORDER_UNORDERED".parse::<Ordering>().unwrap(),
            Ordering::Unordered
        );
        assert!("sorted".parse::<Ordering>().is_err());
    }
}
