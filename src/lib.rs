// Library root
// -----------
// The binary (`main.rs`) only calls `run`; everything else lives here so
// it can be driven from tests.
//
// Module responsibilities:
// - `config`: the `~/.freck` file format and its on-disk location.
// - `api`: HTTP calls to the Freckle API and the project/tag caches.
// - `ui`: terminal prompts and the first-run setup.
// - `entries`: recording a new time entry.
// - `admin`: listings of projects, tags and recorded entries.
// - `cli`: argument parsing and dispatch between the operations above.
pub mod admin;
pub mod api;
pub mod cli;
pub mod config;
pub mod entries;
pub mod error;
pub mod ui;

use clap::Parser;

pub use error::{ApiError, FreckError, FreckResult};

/// Entry point used by the binary crate.
pub fn run() -> FreckResult<()> {
    let cli = cli::Cli::parse();
    cli::execute(cli)
}
