//! Domain vocabulary shared by the PTT services crates.
//!
//! Entity kinds, status vocabularies, status-history records and the query
//! parameter model live here, free of any HTTP or database dependency.

pub mod entity;
pub mod error;
pub mod history;
pub mod query;
pub mod status;
pub mod types;
