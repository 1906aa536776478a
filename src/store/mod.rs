//! SQLite persistence for success stories.
//!
//! One connection guarded by a mutex; every handle returned by [`StoryStore::open`]
//! has migrations fully applied.

pub mod migrations;

use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};

pub type StoryId = i64;

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("database schema version {db_version} is newer than supported {latest_supported}")]
    UnsupportedSchemaVersion {
        db_version: u32,
        latest_supported: u32,
    },

    #[error("stored timestamp {0} is out of range")]
    InvalidTimestamp(i64),

    #[error("story store lock poisoned")]
    Poisoned,

    #[error("story store task failed: {0}")]
    Worker(String),
}

/// A story as submitted, before the store assigns an id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewStory {
    pub title: String,
    pub content: String,
    pub author: String,
    pub location: String,
    /// Creation time; the store uses the current time when absent.
    pub timestamp: Option<DateTime<Utc>>,
}

impl NewStory {
    pub fn new(
        title: impl Into<String>,
        content: impl Into<String>,
        author: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
            author: author.into(),
            location: String::new(),
            timestamp: None,
        }
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = location.into();
        self
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }
}

/// A persisted story row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Story {
    pub id: StoryId,
    pub title: String,
    pub content: String,
    pub author: String,
    pub location: Option<String>,
    pub timestamp: DateTime<Utc>,
}

pub struct StoryStore {
    conn: Mutex<Connection>,
}

impl StoryStore {
    /// Opens (creating when missing) the database file and applies migrations.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref();
        let started_at = Instant::now();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        let store = Self::bootstrap(conn)?;

        tracing::info!(
            "Opened story database {} in {}ms",
            path.display(),
            started_at.elapsed().as_millis()
        );
        Ok(store)
    }

    pub fn open_in_memory() -> StoreResult<Self> {
        Self::bootstrap(Connection::open_in_memory()?)
    }

    fn bootstrap(mut conn: Connection) -> StoreResult<Self> {
        conn.busy_timeout(Duration::from_secs(5))?;
        migrations::apply_migrations(&mut conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Persists a story and returns its assigned id.
    pub fn insert(&self, story: &NewStory) -> StoreResult<StoryId> {
        let timestamp = story.timestamp.unwrap_or_else(Utc::now);
        let conn = self.lock()?;

        conn.execute(
            "INSERT INTO success_story (title, content, author, location, timestamp)
             VALUES (?1, ?2, ?3, ?4, ?5);",
            params![
                story.title,
                story.content,
                story.author,
                story.location,
                timestamp.timestamp_micros(),
            ],
        )?;

        let id = conn.last_insert_rowid();
        tracing::debug!("Inserted story {} by {}", id, story.author);
        Ok(id)
    }

    /// All stories, newest first. Equal timestamps fall back to the later id first.
    pub fn list_all_ordered_by_time_desc(&self) -> StoreResult<Vec<Story>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id, title, content, author, location, timestamp
             FROM success_story
             ORDER BY timestamp DESC, id DESC;",
        )?;

        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, StoryId>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, Option<String>>(4)?,
                row.get::<_, i64>(5)?,
            ))
        })?;

        let mut stories = Vec::new();
        for row in rows {
            let (id, title, content, author, location, micros) = row?;
            let timestamp = DateTime::from_timestamp_micros(micros)
                .ok_or(StoreError::InvalidTimestamp(micros))?;
            stories.push(Story {
                id,
                title,
                content,
                author,
                location,
                timestamp,
            });
        }

        Ok(stories)
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }
}
