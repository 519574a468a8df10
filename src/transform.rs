//! Fact and dimension derivation.
//!
//! Five set-based load steps against the staging snapshot, in fixed order
//! (the time dimension reads from songplays, so the fact load comes first).
//! Each step is a single statement: all-or-nothing, no per-row error
//! handling. A failure partway leaves downstream tables empty or
//! incomplete; retry the whole phase after re-provisioning.
//!
//! Dedup policies:
//! - songplays: none. Every qualifying event emits one fact row.
//! - users: last event wins — one row per user, taken from their most
//!   recent qualifying event, so a mid-log subscription change lands on
//!   the newest level.
//! - songs/artists: one row per natural key, deterministic pick.
//! - time: one row per distinct songplay start_time.

use tracing::info;

use crate::error::StepError;
use crate::schema::Table;
use crate::session::{Session, Statement};

/// One derivation step: a named statement with a declared target table.
#[derive(Debug, Clone, Copy)]
pub struct TransformStep {
    pub name: &'static str,
    pub target: Table,
    pub sql: &'static str,
}

/// Every staging event with `page = 'NextSong'` and a known user becomes a
/// fact row. The catalog join is LEFT so misses keep the play and leave
/// song_id/artist_id null — the catalog is a sample, most plays won't
/// resolve. Event time arrives as epoch milliseconds.
const SONGPLAYS_SQL: &str = "\
INSERT INTO songplays (start_time, user_id, level, song_id, artist_id, session_id, location, user_agent)
SELECT
    TIMESTAMP 'epoch' + (e.ts / 1000) * INTERVAL '1 second' AS start_time,
    e.userId AS user_id,
    e.level,
    s.song_id,
    s.artist_id,
    e.sessionId AS session_id,
    e.location,
    e.userAgent AS user_agent
FROM staging_events e
LEFT JOIN staging_songs s
    ON e.song = s.title AND e.artist = s.artist_name AND e.length = s.duration
WHERE e.page = 'NextSong' AND e.userId IS NOT NULL";

/// One row per user from their most recent qualifying event.
const USERS_SQL: &str = "\
INSERT INTO users (user_id, first_name, last_name, gender, level)
SELECT user_id, first_name, last_name, gender, level
FROM (
    SELECT
        e.userId AS user_id,
        e.firstName AS first_name,
        e.lastName AS last_name,
        e.gender,
        e.level,
        ROW_NUMBER() OVER (PARTITION BY e.userId ORDER BY e.ts DESC) AS recency
    FROM staging_events e
    WHERE e.userId IS NOT NULL AND e.page = 'NextSong'
) latest
WHERE recency = 1";

/// One row per song id. The catalog can repeat a song across files; the
/// pick among duplicates is arbitrary but deterministic.
const SONGS_SQL: &str = "\
INSERT INTO songs (song_id, title, artist_id, year, duration)
SELECT song_id, title, artist_id, year, duration
FROM (
    SELECT
        song_id,
        title,
        artist_id,
        year,
        duration,
        ROW_NUMBER() OVER (PARTITION BY song_id ORDER BY title) AS dupe
    FROM staging_songs
    WHERE song_id IS NOT NULL
) deduped
WHERE dupe = 1";

/// One row per artist id. Artists repeat once per catalog song, sometimes
/// with differing location fields; one representative row is kept.
const ARTISTS_SQL: &str = "\
INSERT INTO artists (artist_id, name, location, latitude, longitude)
SELECT artist_id, name, location, latitude, longitude
FROM (
    SELECT
        artist_id,
        artist_name AS name,
        artist_location AS location,
        artist_latitude AS latitude,
        artist_longitude AS longitude,
        ROW_NUMBER() OVER (PARTITION BY artist_id ORDER BY artist_name) AS dupe
    FROM staging_songs
    WHERE artist_id IS NOT NULL
) deduped
WHERE dupe = 1";

/// Calendar breakdown of every distinct fact timestamp.
/// Weekday convention: EXTRACT(DOW), 0 = Sunday through 6 = Saturday.
const TIME_SQL: &str = "\
INSERT INTO time (start_time, hour, day, week, month, year, weekday)
SELECT DISTINCT
    start_time,
    EXTRACT(HOUR FROM start_time) AS hour,
    EXTRACT(DAY FROM start_time) AS day,
    EXTRACT(WEEK FROM start_time) AS week,
    EXTRACT(MONTH FROM start_time) AS month,
    EXTRACT(YEAR FROM start_time) AS year,
    EXTRACT(DOW FROM start_time) AS weekday
FROM songplays";

/// The five derivation steps in execution order. The order is load-bearing:
/// time reads start_time values out of songplays.
pub const TRANSFORM_STEPS: [TransformStep; 5] = [
    TransformStep {
        name: "insert:songplays",
        target: Table::Songplays,
        sql: SONGPLAYS_SQL,
    },
    TransformStep {
        name: "insert:users",
        target: Table::Users,
        sql: USERS_SQL,
    },
    TransformStep {
        name: "insert:songs",
        target: Table::Songs,
        sql: SONGS_SQL,
    },
    TransformStep {
        name: "insert:artists",
        target: Table::Artists,
        sql: ARTISTS_SQL,
    },
    TransformStep {
        name: "insert:time",
        target: Table::Time,
        sql: TIME_SQL,
    },
];

/// Rows loaded by each derivation step.
#[derive(Debug, Clone, Default)]
pub struct TransformStats {
    pub songplays: u64,
    pub users: u64,
    pub songs: u64,
    pub artists: u64,
    pub time: u64,
}

/// Transform statements in execution order, for dry-run output.
pub fn statements() -> Vec<Statement> {
    TRANSFORM_STEPS
        .iter()
        .map(|step| Statement::new(step.name, step.sql))
        .collect()
}

/// Run all five derivation steps in order against the staging snapshot.
pub async fn run(session: &mut Session) -> Result<TransformStats, StepError> {
    let mut stats = TransformStats::default();

    for step in &TRANSFORM_STEPS {
        let statement = Statement::new(step.name, step.sql);
        let rows = session.execute(&statement).await?;
        info!("Loaded {} rows into {}", rows, step.target.name());

        match step.target {
            Table::Songplays => stats.songplays = rows,
            Table::Users => stats.users = rows,
            Table::Songs => stats.songs = rows,
            Table::Artists => stats.artists = rows,
            Table::Time => stats.time = rows,
            Table::StagingEvents | Table::StagingSongs => {}
        }
    }

    Ok(stats)
}
