//! Schema management for the warehouse star schema.
//!
//! Owns the DDL for the two staging tables, the songplay fact table, and
//! the four dimension tables. All drops and creates are idempotent and
//! execute as independently committed statements; there are no enforced
//! foreign keys, so ordering is a convenience, not a correctness concern.

use crate::error::StepError;
use crate::session::{Session, Statement};

/// The seven warehouse tables, in declaration order.
///
/// This order is the one used everywhere a "for each table" iteration
/// happens: dropping, creating, and counting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Table {
    StagingEvents,
    StagingSongs,
    Songplays,
    Users,
    Songs,
    Artists,
    Time,
}

impl Table {
    /// All tables in declaration order: staging first, then fact, then
    /// dimensions.
    pub const ALL: [Table; 7] = [
        Table::StagingEvents,
        Table::StagingSongs,
        Table::Songplays,
        Table::Users,
        Table::Songs,
        Table::Artists,
        Table::Time,
    ];

    /// Table name as it appears in the warehouse.
    pub fn name(self) -> &'static str {
        match self {
            Table::StagingEvents => "staging_events",
            Table::StagingSongs => "staging_songs",
            Table::Songplays => "songplays",
            Table::Users => "users",
            Table::Songs => "songs",
            Table::Artists => "artists",
            Table::Time => "time",
        }
    }

    /// Idempotent CREATE DDL for this table.
    ///
    /// Staging event columns mirror the raw log JSON keys; the warehouse
    /// folds unquoted identifiers to lowercase, which is why the event-log
    /// bulk load needs an explicit JSON-path mapping (see `staging`).
    pub fn create_ddl(self) -> &'static str {
        match self {
            Table::StagingEvents => {
                "CREATE TABLE IF NOT EXISTS staging_events (
    artist          VARCHAR,
    auth            VARCHAR,
    firstName       VARCHAR,
    gender          VARCHAR,
    itemInSession   INTEGER,
    lastName        VARCHAR,
    length          FLOAT,
    level           VARCHAR,
    location        VARCHAR,
    method          VARCHAR,
    page            VARCHAR,
    registration    BIGINT,
    sessionId       INTEGER,
    song            VARCHAR,
    status          INTEGER,
    ts              BIGINT,
    userAgent       VARCHAR,
    userId          INTEGER
)"
            }
            Table::StagingSongs => {
                "CREATE TABLE IF NOT EXISTS staging_songs (
    song_id          VARCHAR,
    num_songs        INTEGER,
    title            VARCHAR,
    artist_name      VARCHAR,
    artist_latitude  FLOAT,
    year             INTEGER,
    duration         FLOAT,
    artist_id        VARCHAR,
    artist_longitude FLOAT,
    artist_location  VARCHAR
)"
            }
            Table::Songplays => {
                "CREATE TABLE IF NOT EXISTS songplays (
    songplay_id     INTEGER IDENTITY(0,1) PRIMARY KEY,
    start_time      TIMESTAMP NOT NULL,
    user_id         INTEGER NOT NULL,
    level           VARCHAR,
    song_id         VARCHAR,
    artist_id       VARCHAR,
    session_id      INTEGER,
    location        VARCHAR,
    user_agent      VARCHAR
)"
            }
            Table::Users => {
                "CREATE TABLE IF NOT EXISTS users (
    user_id         INTEGER PRIMARY KEY,
    first_name      VARCHAR,
    last_name       VARCHAR,
    gender          VARCHAR,
    level           VARCHAR
)"
            }
            Table::Songs => {
                "CREATE TABLE IF NOT EXISTS songs (
    song_id         VARCHAR PRIMARY KEY,
    title           VARCHAR,
    artist_id       VARCHAR,
    year            INTEGER,
    duration        FLOAT
)"
            }
            Table::Artists => {
                "CREATE TABLE IF NOT EXISTS artists (
    artist_id       VARCHAR PRIMARY KEY,
    name            VARCHAR,
    location        VARCHAR,
    latitude        FLOAT,
    longitude       FLOAT
)"
            }
            Table::Time => {
                "CREATE TABLE IF NOT EXISTS time (
    start_time      TIMESTAMP PRIMARY KEY,
    hour            INTEGER,
    day             INTEGER,
    week            INTEGER,
    month           INTEGER,
    year            INTEGER,
    weekday         INTEGER
)"
            }
        }
    }
}

/// Drop statements for every table, in declaration order.
pub fn drop_statements() -> Vec<Statement> {
    Table::ALL
        .iter()
        .map(|table| {
            Statement::new(
                drop_step_name(*table),
                format!("DROP TABLE IF EXISTS {}", table.name()),
            )
        })
        .collect()
}

/// Create statements for every table, in declaration order.
pub fn create_statements() -> Vec<Statement> {
    Table::ALL
        .iter()
        .map(|table| Statement::new(create_step_name(*table), table.create_ddl()))
        .collect()
}

fn drop_step_name(table: Table) -> &'static str {
    match table {
        Table::StagingEvents => "drop:staging_events",
        Table::StagingSongs => "drop:staging_songs",
        Table::Songplays => "drop:songplays",
        Table::Users => "drop:users",
        Table::Songs => "drop:songs",
        Table::Artists => "drop:artists",
        Table::Time => "drop:time",
    }
}

fn create_step_name(table: Table) -> &'static str {
    match table {
        Table::StagingEvents => "create:staging_events",
        Table::StagingSongs => "create:staging_songs",
        Table::Songplays => "create:songplays",
        Table::Users => "create:users",
        Table::Songs => "create:songs",
        Table::Artists => "create:artists",
        Table::Time => "create:time",
    }
}

/// Drop every table, each as its own committed statement.
pub async fn drop_all(session: &mut Session) -> Result<(), StepError> {
    for statement in drop_statements() {
        session.execute(&statement).await?;
    }
    Ok(())
}

/// Create every table, each as its own committed statement.
pub async fn create_all(session: &mut Session) -> Result<(), StepError> {
    for statement in create_statements() {
        session.execute(&statement).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_declaration_order() {
        let names: Vec<&str> = Table::ALL.iter().map(|t| t.name()).collect();
        assert_eq!(
            names,
            [
                "staging_events",
                "staging_songs",
                "songplays",
                "users",
                "songs",
                "artists",
                "time"
            ]
        );
    }

    #[test]
    fn test_ddl_is_idempotent() {
        for statement in create_statements() {
            assert!(
                statement.sql.starts_with("CREATE TABLE IF NOT EXISTS"),
                "not idempotent: {}",
                statement.name
            );
        }
        for statement in drop_statements() {
            assert!(
                statement.sql.starts_with("DROP TABLE IF EXISTS"),
                "not idempotent: {}",
                statement.name
            );
        }
    }

    #[test]
    fn test_fact_table_constraints() {
        let ddl = Table::Songplays.create_ddl();
        assert!(ddl.contains("songplay_id     INTEGER IDENTITY(0,1) PRIMARY KEY"));
        assert!(ddl.contains("start_time      TIMESTAMP NOT NULL"));
        assert!(ddl.contains("user_id         INTEGER NOT NULL"));
    }

    #[test]
    fn test_step_names_match_tables() {
        for (statement, table) in create_statements().iter().zip(Table::ALL) {
            assert_eq!(statement.name, format!("create:{}", table.name()));
            assert!(statement.sql.contains(table.name()));
        }
        for (statement, table) in drop_statements().iter().zip(Table::ALL) {
            assert_eq!(statement.name, format!("drop:{}", table.name()));
        }
    }
}
