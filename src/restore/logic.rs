// restoretool/src/restore/logic.rs
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::archive;
use super::db_restore::DatabaseApplier;
use super::file_restore;
use super::plan::{RestorePlan, RestoreScope};
use super::scratch::ScratchSpace;
use crate::config::RestoreProfile;
use crate::errors::{ApplyError, RestoreError, Result};
use crate::storage::{ArchiveStore, BackupArchiveRef};

/// Subdirectory of the scratch space the archive is unpacked into.
pub const EXTRACT_DIR: &str = "extract";
pub const NOT_VALIDATED_MESSAGE: &str = "Backup was not validated";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Created,
    Validated,
    Applied,
    Failed,
}

/// Drives one restore attempt: fetch, unpack, validate, then apply.
///
/// Nothing destructive happens in `validate()`. Faults never escape either
/// phase; they end up in `errors()` and the phase returns `false`. The scratch
/// space is released once the attempt reaches `Applied` or `Failed`, and on
/// drop otherwise.
pub struct RestoreEngine {
    store: Arc<dyn ArchiveStore>,
    databases: Arc<dyn DatabaseApplier>,
    archive: BackupArchiveRef,
    profile: RestoreProfile,
    scope: RestoreScope,
    scratch: ScratchSpace,
    plan: RestorePlan,
    errors: Vec<String>,
    state: EngineState,
}

impl RestoreEngine {
    pub fn new(
        store: Arc<dyn ArchiveStore>,
        databases: Arc<dyn DatabaseApplier>,
        archive: BackupArchiveRef,
        profile: RestoreProfile,
    ) -> Result<Self> {
        Ok(Self::with_scratch(
            store,
            databases,
            archive,
            profile,
            ScratchSpace::acquire()?,
        ))
    }

    pub fn with_scratch(
        store: Arc<dyn ArchiveStore>,
        databases: Arc<dyn DatabaseApplier>,
        archive: BackupArchiveRef,
        profile: RestoreProfile,
        scratch: ScratchSpace,
    ) -> Self {
        RestoreEngine {
            store,
            databases,
            archive,
            profile,
            scope: RestoreScope::default(),
            scratch,
            plan: RestorePlan::default(),
            errors: Vec::new(),
            state: EngineState::Created,
        }
    }

    pub fn with_files(mut self, restore_files: bool) -> Self {
        self.scope.files = restore_files;
        self
    }

    pub fn with_databases(mut self, restore_databases: bool) -> Self {
        self.scope.databases = restore_databases;
        self
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    pub fn plan(&self) -> &RestorePlan {
        &self.plan
    }

    pub fn scratch_path(&self) -> &Path {
        self.scratch.path()
    }

    fn extract_dir(&self) -> PathBuf {
        self.scratch.join(EXTRACT_DIR)
    }

    /// Copies the selected archive into the scratch space under its basename.
    pub async fn fetch(&mut self) -> Result<PathBuf> {
        let basename = match self.archive.basename() {
            name if name.is_empty() || name == "." || name == ".." => "backup-archive".to_string(),
            name => name,
        };
        let destination = self.scratch.join(basename);

        let bytes = self
            .store
            .fetch(&self.archive, &destination)
            .await
            .map_err(|e| RestoreError::Transfer {
                location: self.archive.location.clone(),
                reason: format!("{:#}", e),
            })?;

        tracing::info!(
            "Fetched {} ({} bytes) from {} store",
            self.archive.location,
            bytes,
            self.store.disk_name()
        );
        Ok(destination)
    }

    /// Fetches and unpacks the archive, then checks that every configured path
    /// and database dump is present. All missing items are reported at once.
    pub async fn validate(&mut self) -> bool {
        self.plan = RestorePlan::default();

        if let Err(e) = self.unpack().await {
            self.fail(e);
            return false;
        }

        self.plan = RestorePlan::build(&self.profile, &self.extract_dir(), self.scope);
        if !self.plan.is_complete() {
            self.errors
                .extend(self.plan.missing.iter().map(ToString::to_string));
            tracing::warn!(
                "Backup {} is missing {} configured item(s)",
                self.archive.location,
                self.plan.missing.len()
            );
            self.scratch.release();
            self.state = EngineState::Failed;
            return false;
        }

        tracing::info!(
            "Backup {} of '{}' validated: {} path(s), {} database(s)",
            self.archive.location,
            self.profile.backup_name(),
            self.plan.files.len(),
            self.plan.databases.len()
        );
        self.state = EngineState::Validated;
        true
    }

    async fn unpack(&mut self) -> Result<()> {
        let local_archive = self.fetch().await?;
        if !archive::extract(&local_archive, &self.extract_dir()) {
            return Err(RestoreError::Extraction(local_archive));
        }
        Ok(())
    }

    /// Overwrites the configured paths and reloads the configured databases.
    ///
    /// Stops at the first failing item; items applied before it stay applied.
    /// Without a successful `validate()` a warning is recorded and whatever
    /// the plan holds is still applied.
    pub async fn restore(&mut self) -> bool {
        if self.state != EngineState::Validated {
            tracing::warn!("Restoring backup {} without validation", self.archive.location);
            self.errors.push(NOT_VALIDATED_MESSAGE.to_string());
        }

        match self.apply_plan().await {
            Ok(()) => {
                self.scratch.release();
                self.state = EngineState::Applied;
                true
            }
            Err(e) => {
                self.fail(e.into());
                false
            }
        }
    }

    async fn apply_plan(&self) -> std::result::Result<(), ApplyError> {
        if self.scope.files {
            for item in &self.plan.files {
                file_restore::apply(&item.staged_path, &item.original_path)?;
            }
        }

        if self.scope.databases {
            for item in &self.plan.databases {
                self.databases.apply(item).await?;
            }
        }
        Ok(())
    }

    fn fail(&mut self, error: RestoreError) {
        tracing::error!("Restore of {} failed: {}", self.archive.location, error);
        self.errors.push(error.to_string());
        self.scratch.release();
        self.state = EngineState::Failed;
    }
}
