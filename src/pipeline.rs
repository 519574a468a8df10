//! Sequence orchestration.
//!
//! Two entry sequences over one warehouse session each:
//!
//! - **provision**: drop all tables, then recreate them.
//! - **run**: stage both raw datasets, derive fact/dimensions, then report
//!   counts and insights.
//!
//! Execution is strictly sequential; every statement commits on its own, so
//! an external reader can observe a partially-updated schema mid-run. That
//! is accepted for this batch design rather than fixed.

use snafu::prelude::*;
use tracing::info;

use crate::config::Config;
use crate::error::{
    EtlError, ProvisionSnafu, ReportSnafu, SessionSnafu, StagingLoadSnafu, TransformSnafu,
};
use crate::report::{Insights, TableCount};
use crate::session::{Session, Statement};
use crate::staging::StagingLoader;
use crate::transform::TransformStats;
use crate::{report, schema, transform};

/// Everything a completed run surfaces to the caller.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub staged_events: u64,
    pub staged_songs: u64,
    pub transform: TransformStats,
    pub counts: Vec<TableCount>,
    pub insights: Insights,
}

/// The batch ETL pipeline.
pub struct Pipeline {
    config: Config,
}

impl Pipeline {
    /// Create a pipeline from explicit configuration.
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Drop and recreate all seven tables.
    pub async fn provision(&self) -> Result<(), EtlError> {
        let mut session = Session::connect(&self.config.database)
            .await
            .context(SessionSnafu)?;

        schema::drop_all(&mut session).await.context(ProvisionSnafu)?;
        schema::create_all(&mut session)
            .await
            .context(ProvisionSnafu)?;

        session.close().await;
        info!("Provisioned warehouse schema");
        Ok(())
    }

    /// Load staging, derive the star schema, and report on the result.
    pub async fn run(&self) -> Result<RunReport, EtlError> {
        let mut session = Session::connect(&self.config.database)
            .await
            .context(SessionSnafu)?;

        let loader = StagingLoader::new(self.config.storage.clone());
        let staged_events = loader
            .load_events(&mut session)
            .await
            .context(StagingLoadSnafu)?;
        let staged_songs = loader
            .load_songs(&mut session)
            .await
            .context(StagingLoadSnafu)?;

        let transform = transform::run(&mut session).await.context(TransformSnafu)?;

        let counts = report::count_all(&mut session).await.context(ReportSnafu)?;
        let insights = report::insights(&mut session).await.context(ReportSnafu)?;

        session.close().await;
        info!("Run complete");

        Ok(RunReport {
            staged_events,
            staged_songs,
            transform,
            counts,
            insights,
        })
    }

    /// The statements `provision` would execute, in order.
    pub fn provision_plan(&self) -> Vec<Statement> {
        let mut plan = schema::drop_statements();
        plan.extend(schema::create_statements());
        plan
    }

    /// The statements `run` would execute, in order.
    pub fn run_plan(&self) -> Vec<Statement> {
        let loader = StagingLoader::new(self.config.storage.clone());
        let mut plan = Vec::new();
        plan.extend(loader.statements());
        plan.extend(transform::statements());
        plan.extend(report::statements());
        plan
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DatabaseConfig, StorageConfig};

    fn config() -> Config {
        Config {
            database: DatabaseConfig {
                host: "localhost".to_string(),
                port: 5439,
                dbname: "warehouse".to_string(),
                user: "loader".to_string(),
                password: String::new(),
            },
            storage: StorageConfig {
                log_data_uri: "s3://bucket/log_data".to_string(),
                song_data_uri: "s3://bucket/song_data".to_string(),
                log_jsonpath: None,
                iam_role: "arn:aws:iam::000000000000:role/loader".to_string(),
                region: "us-west-2".to_string(),
            },
        }
    }

    #[test]
    fn test_provision_plan_drops_then_creates() {
        let plan = Pipeline::new(config()).provision_plan();
        assert_eq!(plan.len(), 14);
        assert!(plan[..7].iter().all(|s| s.name.starts_with("drop:")));
        assert!(plan[7..].iter().all(|s| s.name.starts_with("create:")));
    }

    #[test]
    fn test_run_plan_order() {
        let plan = Pipeline::new(config()).run_plan();
        let names: Vec<&str> = plan.iter().map(|s| s.name).collect();

        // copies, then the five derivations, then counts, then insights
        assert_eq!(names[0], "copy:staging_events");
        assert_eq!(names[1], "copy:staging_songs");
        assert_eq!(names[2], "insert:songplays");
        assert_eq!(names[6], "insert:time");
        assert_eq!(names[7], "count:staging_events");
        assert_eq!(names[13], "count:time");
        assert_eq!(
            &names[14..],
            ["insight:top_songs", "insight:peak_hours", "insight:demographics"]
        );
        assert_eq!(names.len(), 17);
    }
}
