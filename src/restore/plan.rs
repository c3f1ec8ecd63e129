// restoretool/src/restore/plan.rs
use std::path::{Component, Path, PathBuf};

use crate::config::{DatabaseConnection, RestoreProfile};
use crate::errors::RestoreError;

/// Directory inside an extracted archive that holds one `<database>.sql` per connection.
pub const DB_DUMPS_DIR: &str = "db-dumps";

/// Which halves of a backup a restore attempt covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RestoreScope {
    pub files: bool,
    pub databases: bool,
}

impl Default for RestoreScope {
    fn default() -> Self {
        RestoreScope {
            files: true,
            databases: true,
        }
    }
}

/// A configured path that was found in the extracted archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRestoreItem {
    pub original_path: PathBuf,
    pub staged_path: PathBuf,
}

/// A configured database whose dump was found in the extracted archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseRestoreItem {
    pub connection: DatabaseConnection,
    pub dump_file: PathBuf,
}

/// Configured items diffed against an extracted archive.
#[derive(Debug, Default)]
pub struct RestorePlan {
    pub files: Vec<FileRestoreItem>,
    pub databases: Vec<DatabaseRestoreItem>,
    /// One entry per configured item that is absent, files before databases.
    pub missing: Vec<RestoreError>,
}

impl RestorePlan {
    /// Checks every configured item, never stopping at the first missing one.
    pub fn build(profile: &RestoreProfile, extract_dir: &Path, scope: RestoreScope) -> Self {
        let mut plan = RestorePlan::default();

        if scope.files {
            for include in &profile.include {
                match staged_path_for(extract_dir, include) {
                    Some(staged_path) if staged_path.exists() => {
                        plan.files.push(FileRestoreItem {
                            original_path: include.clone(),
                            staged_path,
                        });
                    }
                    _ => plan
                        .missing
                        .push(RestoreError::MissingDirectory(include.display().to_string())),
                }
            }
        }

        if scope.databases {
            for connection in &profile.databases {
                let dump_file = dump_path_for(extract_dir, connection);
                if dump_file.is_file() {
                    plan.databases.push(DatabaseRestoreItem {
                        connection: connection.clone(),
                        dump_file,
                    });
                } else {
                    plan.missing
                        .push(RestoreError::MissingDatabase(connection.name.clone()));
                }
            }
        }

        plan
    }

    pub fn is_complete(&self) -> bool {
        self.missing.is_empty()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty() && self.databases.is_empty()
    }
}

/// Location of a configured path inside the extracted tree. Absolute paths are
/// re-rooted at `extract_dir`; paths climbing out with `..` never resolve.
pub fn staged_path_for(extract_dir: &Path, include: &Path) -> Option<PathBuf> {
    let mut staged = extract_dir.to_path_buf();
    for component in include.components() {
        match component {
            Component::Normal(part) => staged.push(part),
            Component::RootDir | Component::Prefix(_) | Component::CurDir => {}
            Component::ParentDir => return None,
        }
    }
    (staged != extract_dir).then_some(staged)
}

pub fn dump_path_for(extract_dir: &Path, connection: &DatabaseConnection) -> PathBuf {
    extract_dir
        .join(DB_DUMPS_DIR)
        .join(format!("{}.sql", connection.database))
}
