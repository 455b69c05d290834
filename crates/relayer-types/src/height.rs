use core::fmt::{Display, Error as FmtError, Formatter};

use ibc_proto::ibc::core::client::v1::Height as RawHeight;
use serde::{Deserialize, Serialize};

/// A revision-aware block height.
///
/// Heights are totally ordered lexicographically over
/// `(revision_number, revision_height)`, which is how chains compare
/// heights across revision bumps (chain upgrades reset the height counter
/// but increment the revision number).
#[derive(
    Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Height {
    // field order matters: the derived `Ord` is lexicographic
    revision_number: u64,
    revision_height: u64,
}

impl Height {
    pub fn new(revision_number: u64, revision_height: u64) -> Self {
        Self {
            revision_number,
            revision_height,
        }
    }

    pub fn revision_number(&self) -> u64 {
        self.revision_number
    }

    pub fn revision_height(&self) -> u64 {
        self.revision_height
    }

    /// The next height within the same revision.
    pub fn increment(&self) -> Height {
        Height {
            revision_number: self.revision_number,
            revision_height: self.revision_height + 1,
        }
    }
}

impl Display for Height {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), FmtError> {
        write!(f, "{}-{}", self.revision_number, self.revision_height)
    }
}

impl From<RawHeight> for Height {
    fn from(raw: RawHeight) -> Self {
        Height {
            revision_number: raw.revision_number,
            revision_height: raw.revision_height,
        }
    }
}

impl From<Height> for RawHeight {
    fn from(height: Height) -> Self {
        RawHeight {
            revision_number: height.revision_number,
            revision_height: height.revision_height,
        }
    }
}
