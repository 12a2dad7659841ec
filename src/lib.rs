//! Mail → table sync — copies payment notification emails into a remote table.

pub mod bootstrap;
pub mod config;
pub mod error;
pub mod mail;
pub mod record;
pub mod sync;
pub mod table;

pub use config::SyncConfig;
pub use sync::{SyncRunner, SyncSummary, run_once};
