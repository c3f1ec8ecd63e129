//! Fixture builders shared by the unit tests.

use anyhow::{Context, Result};
use flate2::Compression;
use flate2::write::GzEncoder;
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;

/// Writes `(relative path, contents)` pairs below `root`, creating directories.
pub fn write_tree(root: &Path, files: &[(&str, &str)]) -> Result<()> {
    fs::create_dir_all(root)?;
    for (relative, contents) in files {
        let path = root.join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, contents).with_context(|| format!("Failed to write {}", path.display()))?;
    }
    Ok(())
}

/// Packs the contents of `source_dir` into a `.tar.gz` at `archive_dest_path`.
pub fn write_tar_gz(source_dir: &Path, archive_dest_path: &Path) -> Result<()> {
    let archive_file = File::create(archive_dest_path)?;
    let enc = GzEncoder::new(archive_file, Compression::default());
    let mut tar_builder = tar::Builder::new(enc);
    tar_builder.append_dir_all(".", source_dir)?;
    tar_builder.into_inner()?.finish()?;
    Ok(())
}

/// Packs the contents of `source_dir` into a `.zip` at `archive_dest_path`.
pub fn write_zip(source_dir: &Path, archive_dest_path: &Path) -> Result<()> {
    let mut writer = zip::ZipWriter::new(File::create(archive_dest_path)?);
    let options = SimpleFileOptions::default();

    for entry in WalkDir::new(source_dir).sort_by_file_name() {
        let entry = entry?;
        let name = entry.path().strip_prefix(source_dir)?;
        if name.as_os_str().is_empty() {
            continue;
        }
        let name = name.to_string_lossy().replace('\\', "/");
        if entry.file_type().is_dir() {
            writer.add_directory(name, options)?;
        } else {
            writer.start_file(name, options)?;
            writer.write_all(&fs::read(entry.path())?)?;
        }
    }
    writer.finish()?;
    Ok(())
}
