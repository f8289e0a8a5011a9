//! jellyreaper - stop idle media server sessions
//!
//! This library provides the pieces of a stateless enforcement agent for
//! Jellyfin-style media servers: it lists active sessions, decides which
//! have been idle for at least a configured timeout, stops them, and
//! reports what it did.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//!
//! - `config`: Configuration loading (file, environment, CLI) and validation
//! - `client`: The `MediaServer` seam and its Jellyfin HTTP implementation
//! - `session`: Session model and wire decoding
//! - `evaluator`: Pure idle-time decision over fetched sessions
//! - `terminator`: Concurrent stop requests with per-session outcomes
//! - `report`: End-of-run summary in text or JSON
//! - `reaper`: The run pipeline and the optional periodic loop
//! - `logging`: Tracing subscriber setup
//! - `error`: Error taxonomy and result alias
//! - `cli`: Command-line interface definition
//!
//! # Example
//!
//! ```no_run
//! use jellyreaper::{Config, JellyfinClient, Reaper};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load(&Default::default())?;
//!     let settings = config.validate()?;
//!     let client = JellyfinClient::new(&settings)?;
//!
//!     let summary = Reaper::new(settings, client).run_once().await?;
//!     println!("{}", summary);
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod client;
pub mod config;
pub mod error;
pub mod evaluator;
pub mod logging;
pub mod reaper;
pub mod report;
pub mod session;
pub mod terminator;

// Re-export commonly used types
pub use client::{JellyfinClient, MediaServer};
pub use config::{Config, Settings};
pub use error::{ReaperError, Result};
pub use reaper::Reaper;
pub use report::RunSummary;
pub use session::Session;
