//! The `d-msgraph` command-line interface
//!
//! Mail and calendar operations against Microsoft Graph, on top of
//! `msgraph-services`.

pub mod cli;
pub mod commands;
pub mod config;
pub mod context;
pub mod error;
pub mod secret;

pub use cli::Cli;
pub use context::AppContext;
pub use error::{ClientError, ClientResult};
