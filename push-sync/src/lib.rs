//! Push Sync Library
//!
//! Differential push of a local directory tree to a remote sync agent.
//! The client digests every file, asks the agent which ones differ from
//! its copy, and ships only those in a single compressed bundle.
//!
//! Change detection compares MD5 digests only. Timestamps, permissions and
//! ownership are not part of the comparison, and a digest collision would
//! leave a changed file unsent. Use full mode when that is unacceptable.

pub mod config;
pub mod executor;
pub mod fs;
pub mod manifest;
pub mod negotiate;
pub mod protocol;
pub mod transfer;
pub mod utils;

// Re-export commonly used types
pub use config::SyncConfig;
pub use executor::{SyncMode, SyncOrchestrator, SyncReport};
pub use protocol::{HttpAgent, RemoteAgent};
pub use utils::errors::SyncError;
pub type Result<T> = std::result::Result<T, SyncError>;
