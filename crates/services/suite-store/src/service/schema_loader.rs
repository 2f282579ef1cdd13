//! Schema loader - Collects test-suite definitions at startup.
//!
//! Schema files in the schemas directory are the preferred source. Suites
//! that only exist as metatable rows are still picked up so older databases
//! keep working.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use common::{AppError, AppResult};
use domain::{check_schema_changes, TestSuite, SCHEMA_FILE_EXTENSION};

use crate::repository::SuiteRepository;

/// Where a suite definition came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SuiteOrigin {
    /// A schema file; the suite's tables are created or upgraded
    File(PathBuf),
    /// Metatable rows only; the suite's tables are expected to exist already
    Database,
}

impl std::fmt::Display for SuiteOrigin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SuiteOrigin::File(path) => write!(f, "{}", path.display()),
            SuiteOrigin::Database => write!(f, "database"),
        }
    }
}

/// A suite definition ready to be wrapped in a `TestSuiteDb`
#[derive(Debug, Clone)]
pub struct LoadedSuite {
    pub suite: TestSuite,
    pub origin: SuiteOrigin,
}

/// Loads schema files and stored suites through a [`SuiteRepository`].
pub struct SchemaLoader {
    repo: Arc<dyn SuiteRepository>,
    schemas_dir: PathBuf,
}

impl SchemaLoader {
    pub fn new(repo: Arc<dyn SuiteRepository>, schemas_dir: impl Into<PathBuf>) -> Self {
        Self {
            repo,
            schemas_dir: schemas_dir.into(),
        }
    }

    /// `*.yaml` files directly inside the schemas directory, sorted by name.
    ///
    /// A missing directory holds no schemas.
    pub async fn schema_files(&self) -> AppResult<Vec<PathBuf>> {
        let mut entries = match tokio::fs::read_dir(&self.schemas_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(dir = %self.schemas_dir.display(), "No schemas directory");
                return Ok(Vec::new());
            }
            Err(e) => return Err(e.into()),
        };

        let mut files = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let is_schema = path
                .extension()
                .is_some_and(|ext| ext == SCHEMA_FILE_EXTENSION);
            if is_schema && entry.file_type().await?.is_file() {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }

    /// Parse one schema file, check it against the stored document and sync it.
    pub async fn load_file(&self, path: &Path) -> AppResult<TestSuite> {
        let suite = Self::parse_file(path).await?;
        self.register(suite)
            .await
            .map_err(|e| AppError::schema_file(path.display().to_string(), e))
    }

    /// Load every schema file, then every stored suite not defined by a file.
    ///
    /// A file that cannot be loaded aborts the whole load. A second file
    /// defining an already loaded suite is reported and skipped.
    pub async fn load_all(&self) -> AppResult<Vec<LoadedSuite>> {
        let mut loaded = Vec::new();
        let mut names = HashSet::new();

        for path in self.schema_files().await? {
            let suite = Self::parse_file(&path).await?;
            if names.contains(&suite.name) {
                tracing::error!(
                    "Duplicate test-suite '{}' (while loading {})",
                    suite.name,
                    path.display()
                );
                continue;
            }

            let suite = self
                .register(suite)
                .await
                .map_err(|e| AppError::schema_file(path.display().to_string(), e))?;
            tracing::debug!(suite = %suite.name, file = %path.display(), "Loaded schema file");

            names.insert(suite.name.clone());
            loaded.push(LoadedSuite {
                suite,
                origin: SuiteOrigin::File(path),
            });
        }

        for suite in self.repo.list_suites().await? {
            if names.contains(&suite.name) {
                continue;
            }
            tracing::debug!(suite = %suite.name, "Loaded test-suite from database");
            names.insert(suite.name.clone());
            loaded.push(LoadedSuite {
                suite,
                origin: SuiteOrigin::Database,
            });
        }

        Ok(loaded)
    }

    async fn parse_file(path: &Path) -> AppResult<TestSuite> {
        let display = path.display().to_string();
        let text = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| AppError::schema_file(display.clone(), e))?;
        TestSuite::from_yaml_str(&text).map_err(|e| AppError::schema_file(display, e))
    }

    async fn register(&self, suite: TestSuite) -> AppResult<TestSuite> {
        if let Some(previous) = self.repo.find_json_schema(&suite.name).await? {
            check_schema_changes(&previous, &suite)?;
        }
        self.repo.sync_suite(&suite).await
    }
}
