//! Shared application state.
//!
//! `CoreState` is built once at startup and shared (via `Arc`) by every
//! request. It holds no connection: each unit of work opens its own
//! SQLite connection, so concurrent requests never serialize on a lock
//! inside the process.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, FixedOffset, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::catalog::{self, CatalogSeed, SeedSummary};
use crate::config::{InvalidUtcOffset, Settings};
use crate::db;
use crate::error::ServiceError;
use crate::inference::{HttpInferenceClient, InferenceEngine, UnconfiguredInference};

// ═══════════════════════════════════════════════════════════
// CoreState
// ═══════════════════════════════════════════════════════════

pub struct CoreState {
    settings: Settings,
    /// Identifies this server process in health output and logs.
    instance_id: Uuid,
    started_at: DateTime<Utc>,
    day_offset: FixedOffset,
    inference: Arc<dyn InferenceEngine>,
}

impl CoreState {
    /// Build state from settings, wiring the HTTP inference client when
    /// an endpoint is configured. Fails on settings that cannot be served.
    pub fn new(settings: Settings) -> Result<Self, CoreError> {
        let inference: Arc<dyn InferenceEngine> = match settings.inference_url.as_deref() {
            Some(url) if !url.trim().is_empty() => {
                Arc::new(HttpInferenceClient::new(url.trim(), settings.inference_timeout_secs))
            }
            _ => Arc::new(UnconfiguredInference),
        };
        Self::with_inference(settings, inference)
    }

    pub fn with_inference(
        settings: Settings,
        inference: Arc<dyn InferenceEngine>,
    ) -> Result<Self, CoreError> {
        let day_offset = settings.day_offset()?;
        Ok(Self {
            settings,
            instance_id: Uuid::new_v4(),
            started_at: Utc::now(),
            day_offset,
            inference,
        })
    }

    /// Create the database file if needed and bring the schema up to date.
    pub fn initialize(&self) -> Result<(), CoreError> {
        db::open_database(&self.settings.database)?;
        tracing::info!(path = %self.settings.database.display(), "Database ready");
        Ok(())
    }

    /// Open a connection for one unit of work.
    pub fn open_db(&self) -> Result<rusqlite::Connection, CoreError> {
        db::connect(&self.settings.database).map_err(CoreError::Database)
    }

    /// Apply the configured catalog seed file, if any, then make sure every
    /// configured inference label resolves to a disease.
    pub fn seed_catalog(&self) -> Result<Option<SeedSummary>, CoreError> {
        let mut conn = self.open_db()?;

        let summary = match self.settings.catalog_seed.as_ref() {
            Some(path) => Some(catalog::apply_seed(&mut conn, &read_seed(path)?)?),
            None => None,
        };

        if !self.settings.inference_labels.is_empty() {
            let labels: Vec<&str> =
                self.settings.inference_labels.iter().map(String::as_str).collect();
            catalog::ensure_diseases(&mut conn, &labels)?;
        }

        Ok(summary)
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn db_path(&self) -> &Path {
        &self.settings.database
    }

    pub fn reports_dir(&self) -> &Path {
        &self.settings.reports_dir
    }

    pub fn day_offset(&self) -> FixedOffset {
        self.day_offset
    }

    pub fn inference(&self) -> Arc<dyn InferenceEngine> {
        Arc::clone(&self.inference)
    }

    pub fn instance_id(&self) -> Uuid {
        self.instance_id
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }
}

fn read_seed(path: &Path) -> Result<CatalogSeed, CoreError> {
    let raw = std::fs::read_to_string(path).map_err(|source| CoreError::SeedRead {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&raw).map_err(|source| CoreError::SeedParse {
        path: path.to_path_buf(),
        source,
    })
}

// ═══════════════════════════════════════════════════════════
// Errors
// ═══════════════════════════════════════════════════════════

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] InvalidUtcOffset),
    #[error("Database error: {0}")]
    Database(#[from] db::DatabaseError),
    #[error("{0}")]
    Service(#[from] ServiceError),
    #[error("Cannot read catalog seed {path}: {source}")]
    SeedRead {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Invalid catalog seed {path}: {source}")]
    SeedParse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("Runtime error: {0}")]
    Runtime(#[from] std::io::Error),
    #[error("Server error: {0}")]
    Server(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::enums::Role;

    fn settings_in(dir: &tempfile::TempDir) -> Settings {
        Settings {
            database: dir.path().join("data").join("phytoscan.db"),
            reports_dir: dir.path().join("reports"),
            ..Settings::default()
        }
    }

    #[test]
    fn initialize_creates_database() {
        let dir = tempfile::tempdir().unwrap();
        let state = CoreState::new(settings_in(&dir)).unwrap();
        state.initialize().unwrap();
        assert!(state.db_path().exists());
        let conn = state.open_db().unwrap();
        assert_eq!(db::count_tables(&conn).unwrap(), 9);
    }

    #[test]
    fn missing_inference_url_uses_unconfigured_engine() {
        let dir = tempfile::tempdir().unwrap();
        let state = CoreState::new(settings_in(&dir)).unwrap();
        assert!(state.inference().predict("leaf.jpg", "vit").is_err());
    }

    #[test]
    fn seed_file_applied_once() {
        let dir = tempfile::tempdir().unwrap();
        let seed_path = dir.path().join("seed.json");
        std::fs::write(
            &seed_path,
            r#"{
                "diseases": [{"name": "Rust"}],
                "users": [{"username": "op", "full_name": "Op", "role": "operator"}]
            }"#,
        )
        .unwrap();
        let mut settings = settings_in(&dir);
        settings.catalog_seed = Some(seed_path);
        let state = CoreState::new(settings).unwrap();
        state.initialize().unwrap();

        let first = state.seed_catalog().unwrap().unwrap();
        assert_eq!(first.diseases_added, 1);
        let second = state.seed_catalog().unwrap().unwrap();
        assert_eq!(second.users_added, 0);

        let conn = state.open_db().unwrap();
        let ops = db::repository::list_users_by_role(&conn, Role::Operator).unwrap();
        assert_eq!(ops.len(), 1);
    }

    #[test]
    fn inference_labels_become_diseases() {
        let dir = tempfile::tempdir().unwrap();
        let mut settings = settings_in(&dir);
        settings.inference_labels = vec!["Leaf spot".into(), "Healthy".into()];
        let state = CoreState::new(settings).unwrap();
        state.initialize().unwrap();

        assert!(state.seed_catalog().unwrap().is_none());
        let conn = state.open_db().unwrap();
        assert!(catalog::find_disease_by_name(&conn, "Leaf spot").unwrap().is_some());
        assert_eq!(catalog::list_diseases(&conn).unwrap().len(), 2);
    }

    #[test]
    fn out_of_range_offset_refuses_to_build_state() {
        let dir = tempfile::tempdir().unwrap();
        let mut settings = settings_in(&dir);
        settings.utc_offset_hours = 1_000_000;
        assert!(matches!(
            CoreState::new(settings),
            Err(CoreError::Config(InvalidUtcOffset(1_000_000)))
        ));
    }

    #[test]
    fn day_offset_comes_from_settings() {
        let dir = tempfile::tempdir().unwrap();
        let mut settings = settings_in(&dir);
        settings.utc_offset_hours = -5;
        let state = CoreState::new(settings).unwrap();
        assert_eq!(state.day_offset().local_minus_utc(), -5 * 3600);
    }

    #[test]
    fn unreadable_seed_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let mut settings = settings_in(&dir);
        settings.catalog_seed = Some(dir.path().join("missing.json"));
        let state = CoreState::new(settings).unwrap();
        state.initialize().unwrap();
        assert!(matches!(state.seed_catalog(), Err(CoreError::SeedRead { .. })));
    }
}
