//! Package dependency resolution and operation planning.
//!
//! Given package sources, a local store of installed packages, and a
//! request (install, uninstall, update, reinstall), the planner works out
//! the ordered operations needed; the application layer carries them out.

pub mod application;
pub mod commands;
pub mod error;
pub mod package;
pub mod planner;
pub mod repository;
pub mod resolver;
pub mod runtime;
pub mod store;

pub use error::{Error, Result};
