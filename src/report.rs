//! Verification counts and insight queries.
//!
//! Read-only: a failure here never invalidates loaded data, it only loses
//! the report. Counts come back in table-declaration order; the three
//! insight queries run in a fixed order with fixed sort rules. Ties within
//! an insight's sort key come back in engine order.

use snafu::prelude::*;
use sqlx::Row;
use sqlx::postgres::PgRow;

use crate::error::{DecodeSnafu, QuerySnafu, StepError};
use crate::schema::Table;
use crate::session::{Session, Statement};

/// Row count for one table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableCount {
    pub table: &'static str,
    pub rows: i64,
}

/// One of the top played songs.
#[derive(Debug, Clone, PartialEq)]
pub struct TopSong {
    pub title: String,
    pub artist: String,
    pub plays: i64,
}

/// Play volume for one hour of the day.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HourlyActivity {
    pub hour: i32,
    pub plays: i64,
}

/// Distinct listener count for one gender/subscription-level pairing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Demographic {
    pub gender: Option<String>,
    pub level: Option<String>,
    pub users: i64,
}

/// The three insight result sets, in reporting order.
#[derive(Debug, Clone, Default)]
pub struct Insights {
    pub top_songs: Vec<TopSong>,
    pub peak_hours: Vec<HourlyActivity>,
    pub demographics: Vec<Demographic>,
}

const TOP_SONGS_SQL: &str = "\
SELECT s.title, a.name, COUNT(*) AS play_count
FROM songplays sp
JOIN songs s ON sp.song_id = s.song_id
JOIN artists a ON sp.artist_id = a.artist_id
GROUP BY s.title, a.name
ORDER BY play_count DESC
LIMIT 10";

const PEAK_HOURS_SQL: &str = "\
SELECT t.hour, COUNT(*) AS play_count
FROM songplays sp
JOIN time t ON sp.start_time = t.start_time
GROUP BY t.hour
ORDER BY play_count DESC";

const DEMOGRAPHICS_SQL: &str = "\
SELECT u.gender, u.level, COUNT(DISTINCT u.user_id) AS user_count
FROM songplays sp
JOIN users u ON sp.user_id = u.user_id
GROUP BY u.gender, u.level
ORDER BY user_count DESC";

/// Count statement for one table.
fn count_statement(table: Table) -> Statement {
    let name = match table {
        Table::StagingEvents => "count:staging_events",
        Table::StagingSongs => "count:staging_songs",
        Table::Songplays => "count:songplays",
        Table::Users => "count:users",
        Table::Songs => "count:songs",
        Table::Artists => "count:artists",
        Table::Time => "count:time",
    };
    Statement::new(name, format!("SELECT COUNT(*) FROM {}", table.name()))
}

/// The three insight statements in reporting order.
fn insight_statements() -> [Statement; 3] {
    [
        Statement::new("insight:top_songs", TOP_SONGS_SQL),
        Statement::new("insight:peak_hours", PEAK_HOURS_SQL),
        Statement::new("insight:demographics", DEMOGRAPHICS_SQL),
    ]
}

/// Every report statement in execution order, for dry-run output.
pub fn statements() -> Vec<Statement> {
    Table::ALL
        .iter()
        .map(|t| count_statement(*t))
        .chain(insight_statements())
        .collect()
}

/// Row counts for all seven tables, in declaration order.
pub async fn count_all(session: &mut Session) -> Result<Vec<TableCount>, StepError> {
    let mut counts = Vec::with_capacity(Table::ALL.len());
    for table in Table::ALL {
        let statement = count_statement(table);
        let rows = session.fetch_all(&statement).await?;
        let row = rows
            .first()
            .ok_or(sqlx::Error::RowNotFound)
            .context(QuerySnafu {
                step: statement.name,
            })?;
        let count: i64 = decode(row, 0, statement.name)?;
        counts.push(TableCount {
            table: table.name(),
            rows: count,
        });
    }
    Ok(counts)
}

/// Run the three insight queries and decode their result sets.
pub async fn insights(session: &mut Session) -> Result<Insights, StepError> {
    let [top_songs, peak_hours, demographics] = insight_statements();

    let top_songs = session
        .fetch_all(&top_songs)
        .await?
        .iter()
        .map(|row| {
            Ok(TopSong {
                title: decode(row, 0, "insight:top_songs")?,
                artist: decode(row, 1, "insight:top_songs")?,
                plays: decode(row, 2, "insight:top_songs")?,
            })
        })
        .collect::<Result<_, StepError>>()?;

    let peak_hours = session
        .fetch_all(&peak_hours)
        .await?
        .iter()
        .map(|row| {
            Ok(HourlyActivity {
                hour: decode(row, 0, "insight:peak_hours")?,
                plays: decode(row, 1, "insight:peak_hours")?,
            })
        })
        .collect::<Result<_, StepError>>()?;

    let demographics = session
        .fetch_all(&demographics)
        .await?
        .iter()
        .map(|row| {
            Ok(Demographic {
                gender: decode(row, 0, "insight:demographics")?,
                level: decode(row, 1, "insight:demographics")?,
                users: decode(row, 2, "insight:demographics")?,
            })
        })
        .collect::<Result<_, StepError>>()?;

    Ok(Insights {
        top_songs,
        peak_hours,
        demographics,
    })
}

fn decode<'r, T>(row: &'r PgRow, index: usize, step: &'static str) -> Result<T, StepError>
where
    T: sqlx::Decode<'r, sqlx::Postgres> + sqlx::Type<sqlx::Postgres>,
{
    row.try_get(index).context(DecodeSnafu { step })
}
