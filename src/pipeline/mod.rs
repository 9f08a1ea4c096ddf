//! Pipeline entry points for crawler operations.
//!
//! - `run_crawler`: Crawl the catalog into the entity logs
//! - `run_export`: Write the entity logs out as Turtle

pub mod crawl;
pub mod export;

pub use crawl::{CrawlController, CrawlSettings, CrawlState, CrawlSummary, StopReason, run_crawler};
pub use export::{ExportSummary, TurtleWriter, run_export};
