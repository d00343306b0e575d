//! Common types, protocol definitions, and errors shared across `keyguard-svc` crates.

pub mod error;
pub mod protocol;

pub use error::ServiceError;
pub use protocol::TransactionType;
