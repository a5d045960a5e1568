//! Plume: declarative native UI.
//!
//! This crate runs a [`ViewTree`] on a worker thread and applies its commits to a [`Backend`]
//! through a [`Host`]. Everything else is re-exported from `plume-core`; see its documentation
//! for an overview.

mod config;
mod host;
mod worker;

pub use config::Config;
pub use host::{Host, HostError};
pub use plume_core::*;
