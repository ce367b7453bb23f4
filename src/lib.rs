//! `mapred` runs a four-stage MapReduce word-count pipeline over a
//! directory of text files, producing one word-frequency file per
//! input file.
//!
//! # How to use
//!
//! Build an [Orchestrator](orchestrator::Orchestrator) and point it at
//! an input directory:
//!
//! ```no_run
//!# fn mapred_doc() -> Result<(), Box<dyn std::error::Error>> {
//! use mapred::prelude::*;
//!
//! let orchestrator = OrchestratorBuilder::default().build()?;
//! let final_root = orchestrator.run("docs".as_ref())?;
//!# Ok(())
//!# }
//! ```
//!
//! ## Most relevant modules
//!
//! - [prelude] exports the most relevant types
//! - [orchestrator] drives the pipeline and lists the steps that are
//!   performed
//! - [traits] defines the stage contracts
//! - [plugin] covers stage registration and replacement
//!

/// Filesystem-observed stage barriers
pub mod barrier;
/// Thin directory-listing helpers
mod file;
/// Input stage: read one file into partitions
pub mod input;
/// Map stage: turn partition lines into word-count triples
pub mod mapper;
/// Pipeline orchestration
pub mod orchestrator;
/// Partition-file record encoding
pub mod parsing;
/// Plugin artifacts and typed factory resolution
pub mod plugin;
/// Most important exports
pub mod prelude;
/// Progress bar
pub mod progress_bar;
/// Data model shared by the stages
pub mod record;
/// Reduce stage: aggregate counts across partitions
pub mod reducer;
/// Shuffle stage: aggregate counts within each partition
pub mod shuffler;
/// Persistence sinks for the map, shuffle, and reduce stages
pub mod sink;
/// Stage contracts
pub mod traits;

use lazy_static::lazy_static;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
lazy_static! {
    pub static ref VERSION_MAJOR: u32 =
        env!("CARGO_PKG_VERSION_MAJOR").parse().unwrap();
    pub static ref VERSION_MINOR: u32 =
        env!("CARGO_PKG_VERSION_MINOR").parse().unwrap();
    pub static ref VERSION_PATCH: u32 =
        env!("CARGO_PKG_VERSION_PATCH").parse().unwrap();
}
