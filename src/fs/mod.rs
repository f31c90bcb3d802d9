//! Filesystem module

pub mod entry;
pub mod ops;
pub mod utils;

pub use entry::{Entry, EntryHandle, Stat};
pub use ops::read_directory;
