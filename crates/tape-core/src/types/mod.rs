//! Core data types: instruments and the record shapes persisted to the logs.

pub mod market_data;
pub mod symbol;

pub use market_data::*;
pub use symbol::*;
