//! Staging bulk loads.
//!
//! The warehouse reads the raw JSON files from object storage itself via
//! `COPY`; this module renders those statements from a static template,
//! passing the storage URI, access role, region, and JSON format option as
//! explicit arguments at call time. Loads are full-table appends with no
//! dedup and no resumability — a load that fails partway requires a full
//! re-provision before retrying.

use tracing::info;

use crate::config::StorageConfig;
use crate::error::StepError;
use crate::schema::Table;
use crate::session::{Session, Statement, sql_literal};

/// How `COPY` maps JSON fields onto staging columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JsonFormat {
    /// Match each JSON object's keys to column names automatically.
    Auto,
    /// Use an explicit JSON-path mapping document at the given URI.
    /// Required when source keys do not survive the warehouse's lowercase
    /// identifier folding (the camelCase event-log keys).
    JsonPath(String),
}

/// The static `COPY` template. Placeholders are filled per call; nothing
/// configuration-derived is baked into the constant.
const COPY_TEMPLATE: &str = "COPY {table}
FROM {source}
CREDENTIALS {credentials}
REGION {region}
FORMAT AS JSON {format}";

/// Bulk-loads raw JSON into the staging tables.
#[derive(Debug, Clone)]
pub struct StagingLoader {
    storage: StorageConfig,
}

impl StagingLoader {
    pub fn new(storage: StorageConfig) -> Self {
        Self { storage }
    }

    /// Bulk-load the event-log files into `staging_events`.
    ///
    /// Uses the configured JSON-path mapping when present, automatic
    /// field matching otherwise.
    pub async fn load_events(&self, session: &mut Session) -> Result<u64, StepError> {
        let statement = self.events_statement();
        let rows = session.execute(&statement).await?;
        info!("Staged {rows} event rows");
        Ok(rows)
    }

    /// Bulk-load the song-catalog files into `staging_songs`.
    pub async fn load_songs(&self, session: &mut Session) -> Result<u64, StepError> {
        let statement = self.songs_statement();
        let rows = session.execute(&statement).await?;
        info!("Staged {rows} song rows");
        Ok(rows)
    }

    /// The two copy statements in load order, for dry-run output.
    pub fn statements(&self) -> [Statement; 2] {
        [self.events_statement(), self.songs_statement()]
    }

    fn events_statement(&self) -> Statement {
        let format = match &self.storage.log_jsonpath {
            Some(uri) => JsonFormat::JsonPath(uri.clone()),
            None => JsonFormat::Auto,
        };
        render_copy(
            "copy:staging_events",
            Table::StagingEvents,
            &self.storage.log_data_uri,
            &format,
            &self.storage,
        )
    }

    fn songs_statement(&self) -> Statement {
        render_copy(
            "copy:staging_songs",
            Table::StagingSongs,
            &self.storage.song_data_uri,
            &JsonFormat::Auto,
            &self.storage,
        )
    }
}

/// Render the `COPY` template for one staging table.
fn render_copy(
    name: &'static str,
    table: Table,
    source_uri: &str,
    format: &JsonFormat,
    storage: &StorageConfig,
) -> Statement {
    let credentials = format!("aws_iam_role={}", storage.iam_role);
    let format_option = match format {
        JsonFormat::Auto => sql_literal("auto"),
        JsonFormat::JsonPath(uri) => sql_literal(uri),
    };

    let sql = COPY_TEMPLATE
        .replace("{table}", table.name())
        .replace("{source}", &sql_literal(source_uri))
        .replace("{credentials}", &sql_literal(&credentials))
        .replace("{region}", &sql_literal(&storage.region))
        .replace("{format}", &format_option);

    Statement::new(name, sql)
}
