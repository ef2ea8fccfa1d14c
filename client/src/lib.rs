//! Mining side of the PoW write-gate: the nonce-search engine, the
//! single-session manager UI surfaces attach to, and the validator client.

pub mod engine;
pub mod manager;
pub mod validate;
