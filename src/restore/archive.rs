// restoretool/src/restore/archive.rs
use anyhow::{Context, Result};
use std::fs::{self, File};
use std::io::{self, Read};
use std::path::Path;
use zip::ZipArchive;

/// Container formats a backup may arrive in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    Zip,
    TarGz,
}

impl ArchiveFormat {
    /// Sniffs the container format from the first bytes of the file.
    pub fn detect(archive_path: &Path) -> Result<Self> {
        let mut magic = [0u8; 4];
        let mut file = File::open(archive_path)
            .with_context(|| format!("Failed to open archive file: {}", archive_path.display()))?;
        let read = file
            .read(&mut magic)
            .with_context(|| format!("Failed to read archive header: {}", archive_path.display()))?;

        match &magic[..read] {
            [b'P', b'K', 0x03, 0x04] | [b'P', b'K', 0x05, 0x06] => Ok(ArchiveFormat::Zip),
            [0x1f, 0x8b, ..] => Ok(ArchiveFormat::TarGz),
            _ => Err(anyhow::anyhow!(
                "Unsupported archive format: {}",
                archive_path.display()
            )),
        }
    }
}

/// Extracts every entry of the archive into `extract_to_dir`.
///
/// Returns `false` when the archive cannot be opened or unpacked; the cause is
/// logged. Entries keep their relative directory structure.
pub fn extract(archive_path: &Path, extract_to_dir: &Path) -> bool {
    match extract_archive(archive_path, extract_to_dir) {
        Ok(()) => true,
        Err(e) => {
            tracing::error!("{:#}", e);
            false
        }
    }
}

pub fn extract_archive(archive_path: &Path, extract_to_dir: &Path) -> Result<()> {
    if !archive_path.is_file() {
        return Err(anyhow::anyhow!(
            "Archive for extraction is not a file: {}",
            archive_path.display()
        ));
    }

    if !extract_to_dir.exists() {
        fs::create_dir_all(extract_to_dir).with_context(|| {
            format!(
                "Failed to create extraction directory: {}",
                extract_to_dir.display()
            )
        })?;
    } else if !extract_to_dir.is_dir() {
        return Err(anyhow::anyhow!(
            "Extraction path exists but is not a directory: {}",
            extract_to_dir.display()
        ));
    }

    let format = ArchiveFormat::detect(archive_path)?;
    tracing::info!(
        "Extracting {:?} archive {} to {}",
        format,
        archive_path.display(),
        extract_to_dir.display()
    );

    match format {
        ArchiveFormat::TarGz => extract_tar_gz(archive_path, extract_to_dir),
        ArchiveFormat::Zip => extract_zip(archive_path, extract_to_dir),
    }
    .with_context(|| {
        format!(
            "Failed to unpack archive {} to {}",
            archive_path.display(),
            extract_to_dir.display()
        )
    })
}

fn extract_tar_gz(archive_path: &Path, extract_to_dir: &Path) -> Result<()> {
    let archive_file = File::open(archive_path)?;
    let gz_decoder = flate2::read::GzDecoder::new(archive_file);
    let mut archive = tar::Archive::new(gz_decoder);
    archive.unpack(extract_to_dir)?;
    Ok(())
}

fn extract_zip(archive_path: &Path, extract_to_dir: &Path) -> Result<()> {
    let archive_file = File::open(archive_path)?;
    let mut archive = ZipArchive::new(io::BufReader::new(archive_file))?;

    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;
        let outpath = match entry.enclosed_name() {
            Some(path) => extract_to_dir.join(path),
            None => {
                tracing::warn!("Skipping zip entry outside the archive root: {}", entry.name());
                continue;
            }
        };

        if entry.is_dir() {
            fs::create_dir_all(&outpath)?;
        } else {
            if let Some(parent) = outpath.parent() {
                fs::create_dir_all(parent)?;
            }
            let mut outfile = File::create(&outpath)?;
            io::copy(&mut entry, &mut outfile)?;
        }
    }
    Ok(())
}
