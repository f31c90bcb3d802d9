//! twinpane - dual-pane file manager core
//!
//! Panels browse a [`providers::FileSystemView`] (local disk, SFTP host or a
//! mounted archive); copy, move and delete run as batches on the
//! [`transfer`] engine and report back over channels.

pub mod commands;
pub mod config;
pub mod errors;
pub mod fs;
pub mod panel_manager;
pub mod providers;
pub mod state;
pub mod transfer;

pub use commands::{Command, CommandOutcome};
pub use errors::{AppError, AppResult, VfsError, VfsResult};
pub use panel_manager::{Notice, PanelManager};
