//! Packet and acknowledgement commitments, plus the opaque proof bytes
//! that accompany them across chains.

use core::fmt::{Debug, Error as FmtError, Formatter};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::ValidationError;
use crate::height::Height;

/// A Merkle proof produced by a prover; verified by the destination
/// chain, never inspected by the relayer.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitmentProofBytes {
    bytes: Vec<u8>,
}

impl CommitmentProofBytes {
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

impl TryFrom<Vec<u8>> for CommitmentProofBytes {
    type Error = ValidationError;

    fn try_from(bytes: Vec<u8>) -> Result<Self, Self::Error> {
        if bytes.is_empty() {
            return Err(ValidationError::empty_proof());
        }
        Ok(Self { bytes })
    }
}

impl From<CommitmentProofBytes> for Vec<u8> {
    fn from(proof: CommitmentProofBytes) -> Self {
        proof.bytes
    }
}

impl Debug for CommitmentProofBytes {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), FmtError> {
        write!(f, "CommitmentProofBytes({} bytes)", self.bytes.len())
    }
}

/// The value stored under a packet commitment path on the origin chain.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PacketCommitment(Vec<u8>);

impl PacketCommitment {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.0
    }
}

impl From<Vec<u8>> for PacketCommitment {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

/// The value stored under an acknowledgement path on the receiving chain.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AcknowledgementCommitment(Vec<u8>);

impl AcknowledgementCommitment {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.0
    }
}

impl From<Vec<u8>> for AcknowledgementCommitment {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

/// ICS-04 packet commitment:
/// `sha256(timeout_timestamp ‖ timeout_revision_number ‖ timeout_revision_height ‖ sha256(data))`
/// with all integers big-endian. An absent timeout height hashes as zero.
pub fn compute_packet_commitment(
    data: &[u8],
    timeout_height: Option<Height>,
    timeout_timestamp: u64,
) -> PacketCommitment {
    let (revision_number, revision_height) = match timeout_height {
        Some(h) => (h.revision_number(), h.revision_height()),
        None => (0, 0),
    };

    let mut buf = Vec::with_capacity(8 * 3 + 32);
    buf.extend_from_slice(&timeout_timestamp.to_be_bytes());
    buf.extend_from_slice(&revision_number.to_be_bytes());
    buf.extend_from_slice(&revision_height.to_be_bytes());
    buf.extend_from_slice(&Sha256::digest(data));

    PacketCommitment(Sha256::digest(&buf).to_vec())
}

/// ICS-04 acknowledgement commitment: `sha256(ack)`.
pub fn compute_ack_commitment(ack: &[u8]) -> AcknowledgementCommitment {
    AcknowledgementCommitment(Sha256::digest(ack).to_vec())
}
