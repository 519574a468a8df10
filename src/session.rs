//! Warehouse session management.
//!
//! One exclusively-owned connection per sequence: opened before the first
//! statement, used for every statement in order, closed explicitly on
//! success and abandoned on fatal error. Statements execute in autocommit
//! mode, so each one commits independently — a failure partway leaves
//! earlier statements durably applied.

use snafu::prelude::*;
use sqlx::postgres::{PgConnectOptions, PgRow};
use sqlx::{Connection, Executor, PgConnection};
use tracing::{debug, info, warn};

use crate::config::DatabaseConfig;
use crate::error::{ConnectSnafu, ExecuteSnafu, QuerySnafu, SessionError, StepError};

/// A named SQL statement.
///
/// Every statement granary runs is wrapped in one of these so failures and
/// dry-run output can name the step instead of an opaque SQL string.
#[derive(Debug, Clone)]
pub struct Statement {
    pub name: &'static str,
    pub sql: String,
}

impl Statement {
    pub fn new(name: &'static str, sql: impl Into<String>) -> Self {
        Self {
            name,
            sql: sql.into(),
        }
    }
}

/// An open warehouse connection.
pub struct Session {
    conn: PgConnection,
}

impl Session {
    /// Open a connection to the warehouse.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, SessionError> {
        let options = PgConnectOptions::new()
            .host(&config.host)
            .port(config.port)
            .database(&config.dbname)
            .username(&config.user)
            .password(&config.password);

        let conn = PgConnection::connect_with(&options)
            .await
            .context(ConnectSnafu {
                host: config.host.clone(),
                port: config.port,
            })?;

        info!(
            "Connected to warehouse {}:{}/{}",
            config.host, config.port, config.dbname
        );

        Ok(Self { conn })
    }

    /// Execute a DDL/DML statement, returning the number of affected rows.
    ///
    /// The statement text is logged before execution.
    pub async fn execute(&mut self, statement: &Statement) -> Result<u64, StepError> {
        info!("[{}]\n{}", statement.name, statement.sql.trim());
        let result = (&mut self.conn)
            .execute(statement.sql.as_str())
            .await
            .context(ExecuteSnafu {
                step: statement.name,
            })?;
        debug!("[{}] {} rows affected", statement.name, result.rows_affected());
        Ok(result.rows_affected())
    }

    /// Run a read-only query, returning all result rows.
    pub async fn fetch_all(&mut self, statement: &Statement) -> Result<Vec<PgRow>, StepError> {
        info!("[{}]\n{}", statement.name, statement.sql.trim());
        (&mut self.conn)
            .fetch_all(statement.sql.as_str())
            .await
            .context(QuerySnafu {
                step: statement.name,
            })
    }

    /// Close the connection gracefully.
    pub async fn close(self) {
        if let Err(e) = self.conn.close().await {
            warn!("Error closing warehouse connection: {e}");
        }
    }
}

/// Quote a string as a SQL literal.
///
/// Statement templates stay static; call-time values (storage URIs, role
/// ARNs, regions) pass through here on their way into rendered text.
pub fn sql_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}
