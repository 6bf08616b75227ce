pub mod dirty;
pub mod extract;
pub mod target;
