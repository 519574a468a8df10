//! granary: batch ETL for a star-schema song-play warehouse.
//!
//! This library provides components for provisioning warehouse tables,
//! bulk-loading raw JSON event and song data from object storage into
//! staging tables, deriving fact/dimension tables from the staging
//! snapshot, and reporting verification counts and insights.
//!
//! # Example
//!
//! ```ignore
//! use granary::{Config, Pipeline, error::EtlError};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), EtlError> {
//!     let config = Config::from_file("granary.yaml")?;
//!     let report = Pipeline::new(config).run().await?;
//!     println!("{} songplays loaded", report.transform.songplays);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod pipeline;
pub mod report;
pub mod schema;
pub mod session;
pub mod staging;
pub mod transform;

// Re-export main types
pub use config::Config;
pub use pipeline::{Pipeline, RunReport};
pub use schema::Table;
