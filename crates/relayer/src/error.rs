//! This module defines the various errors that can be raised by the
//! relay engine.

use flex_error::{define_error, DisplayOnly};

use ibc_relay_types::error::ValidationError;
use ibc_relay_types::identifier::ChainId;
use ibc_relay_types::packet::Sequence;

define_error! {
    Error {
        Types
            [ ValidationError ]
            |_| { "invalid domain value" },

        Rpc
            {
                chain_id: ChainId,
                reason: String,
            }
            |e| { format!("RPC error on chain {}: {}", e.chain_id, e.reason) },

        QueryTimeout
            {
                chain_id: ChainId,
                description: String,
            }
            |e| { format!("query timed out on chain {}: {}", e.chain_id, e.description) },

        Cancelled
            |_| { "operation cancelled" },

        EmptyResponse
            {
                chain_id: ChainId,
                query: String,
            }
            |e| { format!("chain {} returned an empty response for {}", e.chain_id, e.query) },

        Submit
            {
                chain_id: ChainId,
                reason: String,
            }
            |e| { format!("transaction submission to chain {} failed: {}", e.chain_id, e.reason) },

        MaxRetriesExceeded
            {
                task: String,
                attempts: usize,
            }
            |e| { format!("task `{}` failed after {} attempts", e.task, e.attempts) },

        MissingPath
            { chain_id: ChainId }
            |e| { format!("no path configured for chain {}", e.chain_id) },

        UnknownChain
            { chain_id: ChainId }
            |e| { format!("chain {} is not part of this relay", e.chain_id) },

        MissingAcknowledgement
            { sequence: Sequence }
            |e| { format!("packet {} has no acknowledgement recorded", e.sequence) },

        ConfigIo
            [ DisplayOnly<std::io::Error> ]
            |_| { "config I/O error" },

        ConfigDecode
            [ DisplayOnly<toml::de::Error> ]
            |_| { "invalid configuration" },
    }
}

impl Error {
    /// True for the transient per-query timeouts that the strategy is
    /// allowed to skip over; the affected sequence is rediscovered on
    /// the next tick.
    pub fn is_query_timeout(&self) -> bool {
        matches!(self.detail(), ErrorDetail::QueryTimeout(_))
    }
}
