//! Core identifier types for StrataDB.

mod ids;

pub use ids::BlockId;
