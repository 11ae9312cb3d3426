//! Builds the deployment artifact: compile the handler for the Lambda
//! target, then wrap the binary in a zip archive under the fixed entry name
//! Lambda's custom runtime expects.

use std::{
    io::Write,
    path::{Path, PathBuf},
};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::process::Command;
use tracing::info;

use crate::validate::{validate_handler, ValidationError};

/// Entry name inside the archive. Lambda's `provided.*` runtimes execute
/// `/var/task/bootstrap`.
pub const ARCHIVE_ENTRY_NAME: &str = "bootstrap";

/// File mode for the archived binary.
const ARCHIVE_ENTRY_MODE: u32 = 0o755;

#[derive(Debug, thiserror::Error)]
pub enum PackageError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("no Cargo.toml found at or above {0}")]
    NoManifest(String),

    #[error("io error while packaging: {0}")]
    Io(#[from] std::io::Error),

    #[error("cargo build failed:\n{0}")]
    Build(String),

    #[error("build produced no binary artifact under {0}")]
    NoArtifact(String),

    #[error("failed to write archive: {0}")]
    Archive(#[from] zip::result::ZipError),
}

#[async_trait]
pub trait Packager: Send + Sync {
    /// Produce the deployable archive for the handler at `source`.
    async fn package(&self, source: &Path) -> Result<Bytes, PackageError>;
}

/// Compiles the handler with cargo for a fixed Linux target.
pub struct CargoPackager {
    build_target: String,
}

impl CargoPackager {
    pub fn new(build_target: impl Into<String>) -> Self {
        Self {
            build_target: build_target.into(),
        }
    }
}

#[async_trait]
impl Packager for CargoPackager {
    async fn package(&self, source: &Path) -> Result<Bytes, PackageError> {
        validate_handler(source)?;
        let crate_dir = crate_root(source)?;
        let target_dir = tempfile::tempdir()?;

        info!(
            source = %crate_dir.display(),
            target = %self.build_target,
            "building handler"
        );
        let output = Command::new("cargo")
            .arg("build")
            .arg("--release")
            .arg("--target")
            .arg(&self.build_target)
            .arg("--manifest-path")
            .arg(crate_dir.join("Cargo.toml"))
            .arg("--target-dir")
            .arg(target_dir.path())
            .output()
            .await?;
        if !output.status.success() {
            let mut log = String::from_utf8_lossy(&output.stderr).into_owned();
            log.push_str(&String::from_utf8_lossy(&output.stdout));
            return Err(PackageError::Build(log));
        }

        let release_dir = target_dir.path().join(&self.build_target).join("release");
        let binary_path = find_binary(&release_dir)?;
        let binary = tokio::fs::read(&binary_path).await?;
        let archive = package_archive(&binary)?;
        Ok(Bytes::from(archive))
    }
}

/// Wrap an already-built binary in the archive format Lambda expects: a zip
/// with a single `bootstrap` entry, mode 0755, deflate compressed.
pub fn package_archive(binary: &[u8]) -> Result<Vec<u8>, PackageError> {
    let mut writer = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
    let options = zip::write::SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Deflated)
        .unix_permissions(ARCHIVE_ENTRY_MODE);
    writer.start_file(ARCHIVE_ENTRY_NAME, options)?;
    writer.write_all(binary)?;
    let cursor = writer.finish()?;
    Ok(cursor.into_inner())
}

fn crate_root(source: &Path) -> Result<PathBuf, PackageError> {
    let start = if source.is_file() {
        source.parent().unwrap_or(Path::new("."))
    } else {
        source
    };
    for dir in start.ancestors() {
        if dir.join("Cargo.toml").is_file() {
            return Ok(dir.to_path_buf());
        }
    }
    Err(PackageError::NoManifest(source.display().to_string()))
}

/// Locate the single executable cargo produced in the release directory.
fn find_binary(release_dir: &Path) -> Result<PathBuf, PackageError> {
    use std::os::unix::fs::PermissionsExt;

    for entry in std::fs::read_dir(release_dir)? {
        let entry = entry?;
        let path = entry.path();
        if !entry.file_type()?.is_file() || path.extension().is_some() {
            continue;
        }
        let mode = entry.metadata()?.permissions().mode();
        if mode & 0o111 != 0 {
            return Ok(path);
        }
    }
    Err(PackageError::NoArtifact(release_dir.display().to_string()))
}
