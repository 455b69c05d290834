#![forbid(unsafe_code)]
#![deny(trivial_casts, trivial_numeric_casts, unused_import_braces, rust_2018_idioms)]

//! Bidirectional IBC relay engine, as a library.
//!
//! The engine couples two chains through a pair of capability traits: a
//! [`chain::Chain`] (queryable, transactable) and a [`prover::Prover`]
//! (header and state-proof producer), composed into a
//! [`provable::ProvableChain`]. Each relay tick takes a
//! [`sync_headers::SyncHeaders`] snapshot of both finalized heights,
//! discovers unrelayed packets and acknowledgements, assembles
//! proof-carrying messages under bounded concurrency, and dispatches
//! them through [`relay_msgs::RelayMsgs`] with the required
//! update-client prefix.
//!
//! Chain adapters (RPC transports, signing, keyrings) and light-client
//! provers live outside this crate, behind the capability traits.

pub mod chain;
pub mod client;
pub mod config;
pub mod error;
pub mod packet;
pub mod path;
pub mod provable;
pub mod prover;
pub mod relay_msgs;
pub mod strategy;
pub mod sync_headers;
pub mod util;
