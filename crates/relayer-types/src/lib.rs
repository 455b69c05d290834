#![forbid(unsafe_code)]
#![deny(trivial_casts, trivial_numeric_casts, unused_import_braces, rust_2018_idioms)]

//! Chain-agnostic IBC domain types for the relay engine.
//!
//! The engine (`ibc-relay`) never inspects chain-specific structures such
//! as consensus headers or proof formats; everything it moves between two
//! chains is expressed with the types in this crate, packed into protobuf
//! `Any` values at the dispatch boundary.

pub mod channel;
pub mod commitment;
pub mod error;
pub mod header;
pub mod height;
pub mod identifier;
pub mod msgs;
pub mod packet;
pub mod path;
pub mod signer;

pub use height::Height;
