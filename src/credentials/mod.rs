//! Interchangeable API credentials and failover across them.

mod pool;

pub use pool::{rotate, ApiKey, CredentialPool, RotationError};
