//! Local filesystem access: traversal and path admission.

pub mod filter;
pub mod walker;

pub use filter::PathFilter;
pub use walker::{DirectoryScanner, ScanError, ScannedFile};
