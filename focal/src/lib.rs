//! # Focal
//!
//! Keyed record collections for personal-productivity data (web visits,
//! calendar segments, documents, contacts), with two questions answered on
//! top: "which records match this text" and "which records matter most right
//! now".
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use focal::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let focal = Focal::for_testing()?;
//!
//!     let site = Website::new("https://www.rust-lang.org/learn", "Learn Rust")
//!         .with_description("The Rust Programming Language book and guides");
//!     let id = site.id.clone();
//!     focal.websites().add(site).await?;
//!     focal.record_visit(&id, chrono::Utc::now()).await?;
//!
//!     let top = focal.top_websites(5, chrono::Utc::now()).await;
//!     let tags = focal.suggest_tags().await;
//!     println!("{top:?} {tags:?}");
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! - **storage**: the retry kernel and [`storage::CollectionStore`], a
//!   paginated, retrying, self-monitoring wrapper over one named collection
//! - **relevance**: a TF-IDF engine producing ranked terms and tag suggestions
//! - **ranking**: recency-decayed visit scores behind a snapshot cache
//! - **models**: the record types the stores hold

pub mod config;
pub mod logging;
pub mod models;
pub mod ranking;
pub mod relevance;
pub mod simple;
pub mod storage;

pub use simple::Focal;

/// The prelude re-exports commonly used types for convenience
pub mod prelude {
    pub use crate::simple::Focal;

    pub use crate::init;

    pub use crate::config::{ConfigBuilder, ConfigLoader, FocalConfig, LogFormat, LogLevel};

    pub use crate::models::{
        BlockKind, BlockRule, DriveDocument, Person, Segment, Visit, Website,
    };

    pub use crate::storage::{
        CollectionStore, ErrorCode, ListOptions, Page, RetryConfig, Severity, SortDirection,
        StoreError, StoreResult,
    };

    pub use crate::relevance::{Corpus, Document, Tfidf};

    pub use crate::ranking::{Blocklist, EntityScore, RankingCache};

    pub use crate::{FocalError, Result};
}

/// Current library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Error type for Focal operations
#[derive(Debug, thiserror::Error)]
pub enum FocalError {
    /// Error during storage operations
    #[error("Storage error: {0}")]
    Storage(#[from] storage::StoreError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(#[from] config::ConfigError),

    /// Logging error
    #[error("Logging error: {0}")]
    Logging(#[from] logging::LogError),
}

/// Result type for Focal operations
pub type Result<T> = std::result::Result<T, FocalError>;

/// Initialize process-wide state for `config`: validates it and installs
/// the logging subscriber.
pub fn init(config: &config::FocalConfig) -> Result<()> {
    config::validate_config(config)?;
    logging::init(&config.logging)?;
    tracing::info!(version = VERSION, "focal initialized");
    Ok(())
}
