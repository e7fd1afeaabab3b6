use std::path::Path;

use anyhow::{anyhow, Context, Result};
use defect_trainer_core::{ProgressPersistence, TrainerError};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use time::OffsetDateTime;

const LATEST_SCHEMA_VERSION: i64 = 1;

/// Key of the single persisted progress entry.
pub const PROGRESS_STATE_KEY: &str = "found_defects.v1";

const CREATE_SCHEMA_MIGRATIONS_SQL: &str = r"
CREATE TABLE IF NOT EXISTS schema_migrations (
  version INTEGER PRIMARY KEY,
  applied_at TEXT NOT NULL
);
";

const MIGRATION_001_SQL: &str = r"
CREATE TABLE IF NOT EXISTS trainer_state (
  state_key TEXT PRIMARY KEY,
  payload TEXT NOT NULL,
  payload_sha256 TEXT NOT NULL CHECK (length(payload_sha256) = 64),
  updated_at TEXT NOT NULL
);
";

pub struct SqliteStore {
    conn: Connection,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SchemaStatus {
    pub current_version: i64,
    pub target_version: i64,
    pub pending_versions: Vec<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IntegrityReport {
    pub quick_check_ok: bool,
    pub quick_check_message: String,
    pub schema_status: SchemaStatus,
}

/// A stored entry whose digest no longer matches its payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DigestMismatch {
    pub state_key: String,
    pub expected: String,
    pub actual: String,
}

impl std::fmt::Display for DigestMismatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "state entry `{}` digest mismatch: stored {}, computed {}",
            self.state_key, self.expected, self.actual
        )
    }
}

impl std::error::Error for DigestMismatch {}

impl SqliteStore {
    /// Open a SQLite-backed state store and configure required runtime pragmas.
    ///
    /// # Errors
    /// Returns an error when the database cannot be opened or pragmas cannot be applied.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open sqlite database at {}", path.display()))?;

        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA foreign_keys = ON;
             PRAGMA busy_timeout = 5000;",
        )
        .context("failed to configure sqlite pragmas")?;

        Ok(Self { conn })
    }

    /// Report current and target schema versions plus pending migrations.
    ///
    /// # Errors
    /// Returns an error when schema metadata cannot be read or initialized.
    pub fn schema_status(&self) -> Result<SchemaStatus> {
        self.conn
            .execute_batch(CREATE_SCHEMA_MIGRATIONS_SQL)
            .context("failed to apply schema_migrations table")?;
        let current_version = current_schema_version(&self.conn)?;
        let pending_versions = if current_version < LATEST_SCHEMA_VERSION {
            ((current_version + 1)..=LATEST_SCHEMA_VERSION).collect::<Vec<_>>()
        } else {
            Vec::new()
        };

        Ok(SchemaStatus {
            current_version,
            target_version: LATEST_SCHEMA_VERSION,
            pending_versions,
        })
    }

    /// Apply all forward migrations up to the latest supported schema version.
    ///
    /// # Errors
    /// Returns an error when a migration step fails or the database is newer than this build.
    pub fn migrate(&mut self) -> Result<()> {
        self.conn
            .execute_batch(CREATE_SCHEMA_MIGRATIONS_SQL)
            .context("failed to apply schema_migrations table")?;

        let mut version = current_schema_version(&self.conn)?;

        if version < 1 {
            apply_migration_1(&self.conn)?;
            version = current_schema_version(&self.conn)?;
        }

        if version != LATEST_SCHEMA_VERSION {
            return Err(anyhow!(
                "unsupported schema version {version}; expected {LATEST_SCHEMA_VERSION}"
            ));
        }

        Ok(())
    }

    /// Read one state entry and verify its digest.
    ///
    /// # Errors
    /// Returns an error when the row cannot be read, or a [`DigestMismatch`] when the stored digest
    /// does not match the payload.
    pub fn read_entry(&self, state_key: &str) -> Result<Option<Vec<u8>>> {
        let row = self
            .conn
            .query_row(
                "SELECT payload, payload_sha256 FROM trainer_state WHERE state_key = ?1",
                params![state_key],
                |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)),
            )
            .optional()
            .with_context(|| format!("failed to read state entry {state_key}"))?;

        let Some((payload, expected)) = row else {
            return Ok(None);
        };

        let actual = sha256_hex(payload.as_bytes());
        if actual != expected {
            return Err(DigestMismatch { state_key: state_key.to_string(), expected, actual }.into());
        }
        Ok(Some(payload.into_bytes()))
    }

    /// Insert or replace one state entry.
    ///
    /// # Errors
    /// Returns an error when the payload is not UTF-8 text or the write fails.
    pub fn write_entry(&mut self, state_key: &str, payload: &[u8]) -> Result<()> {
        let payload = std::str::from_utf8(payload)
            .with_context(|| format!("state entry {state_key} payload must be UTF-8 text"))?;

        let tx = self.conn.transaction().context("failed to start transaction")?;
        tx.execute(
            "INSERT INTO trainer_state(state_key, payload, payload_sha256, updated_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(state_key) DO UPDATE SET
               payload = excluded.payload,
               payload_sha256 = excluded.payload_sha256,
               updated_at = excluded.updated_at",
            params![state_key, payload, sha256_hex(payload.as_bytes()), now_rfc3339()?],
        )
        .with_context(|| format!("failed to write state entry {state_key}"))?;
        tx.commit().context("failed to commit state entry transaction")?;
        Ok(())
    }

    /// Delete one state entry. Returns whether a row existed.
    ///
    /// # Errors
    /// Returns an error when the delete fails.
    pub fn delete_entry(&mut self, state_key: &str) -> Result<bool> {
        let deleted = self
            .conn
            .execute("DELETE FROM trainer_state WHERE state_key = ?1", params![state_key])
            .with_context(|| format!("failed to delete state entry {state_key}"))?;
        Ok(deleted > 0)
    }

    /// Run `PRAGMA quick_check` and report schema status.
    ///
    /// # Errors
    /// Returns an error when the check itself cannot run.
    pub fn integrity_check(&self) -> Result<IntegrityReport> {
        let mut stmt = self
            .conn
            .prepare("PRAGMA quick_check")
            .context("failed to prepare quick_check")?;
        let messages = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .context("failed to run quick_check")?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("failed to read quick_check results")?;
        let quick_check_message = messages.join("; ");

        Ok(IntegrityReport {
            quick_check_ok: quick_check_message == "ok",
            quick_check_message,
            schema_status: self.schema_status()?,
        })
    }
}

impl ProgressPersistence for SqliteStore {
    fn read_progress(&self) -> Result<Option<Vec<u8>>, TrainerError> {
        self.read_entry(PROGRESS_STATE_KEY).map_err(|err| {
            if err.downcast_ref::<DigestMismatch>().is_some() {
                TrainerError::PersistenceCorrupt(err.to_string())
            } else {
                TrainerError::Persistence(format!("{err:#}"))
            }
        })
    }

    fn write_progress(&mut self, bytes: &[u8]) -> Result<(), TrainerError> {
        self.write_entry(PROGRESS_STATE_KEY, bytes)
            .map_err(|err| TrainerError::Persistence(format!("{err:#}")))
    }

    fn erase_progress(&mut self) -> Result<(), TrainerError> {
        let existed = self
            .delete_entry(PROGRESS_STATE_KEY)
            .map_err(|err| TrainerError::Persistence(format!("{err:#}")))?;
        tracing::debug!(existed, "erased persisted progress");
        Ok(())
    }
}

fn apply_migration_1(conn: &Connection) -> Result<()> {
    conn.execute_batch(MIGRATION_001_SQL).context("failed to apply migration v1")?;
    record_schema_version(conn, 1)?;
    tracing::info!("applied trainer_state migration v1");
    Ok(())
}

fn current_schema_version(conn: &Connection) -> Result<i64> {
    let version = conn
        .query_row("SELECT COALESCE(MAX(version), 0) FROM schema_migrations", [], |row| {
            row.get::<_, i64>(0)
        })
        .context("failed to read current schema version")?;
    Ok(version)
}

fn record_schema_version(conn: &Connection, version: i64) -> Result<()> {
    let now = now_rfc3339()?;
    conn.execute(
        "INSERT OR IGNORE INTO schema_migrations(version, applied_at) VALUES (?1, ?2)",
        params![version, now],
    )
    .with_context(|| format!("failed to record migration version {version}"))?;
    Ok(())
}

fn sha256_hex(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

fn now_rfc3339() -> Result<String> {
    OffsetDateTime::now_utc()
        .format(&time::format_description::well_known::Rfc3339)
        .context("failed to format RFC3339 timestamp")
}
