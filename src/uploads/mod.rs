//! Chunked upload staging and assembly.
//!
//! Clients slice a file into fixed-size chunks and PUT them one at a
//! time; each chunk is staged as its own file under
//! `<data_dir>/tmp/<upload_id>/`. Completing the session streams the
//! chunks in index order through a SHA-256 hasher into a final file,
//! verifies the declared size and digest, and renames the result into
//! `<data_dir>/files/`. Incomplete sessions are reaped after a TTL.

use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::io::AsyncWriteExt;

/// Upload engine errors.
#[derive(Debug, Error)]
pub enum UploadError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("chunk {0} was never received")]
    MissingChunk(u32),
    #[error("assembled size {actual} does not match declared size {expected}")]
    SizeMismatch { expected: u64, actual: u64 },
    #[error("assembled digest {actual} does not match declared digest {expected}")]
    DigestMismatch { expected: String, actual: String },
    #[error("upload is already being assembled")]
    AssemblyInProgress,
}

/// An assembled file, ready to be recorded as a study material.
#[derive(Debug, Clone)]
pub struct AssembledFile {
    /// Name of the file under `<data_dir>/files`.
    pub file_name: String,
    /// Total bytes written.
    pub size_bytes: u64,
    /// Lowercase hex SHA-256 of the content.
    pub sha256: String,
}

/// Filesystem half of the chunked upload pipeline.
///
/// Session metadata lives in the database
/// ([`crate::db::UploadRepository`]); this store owns the bytes.
#[derive(Debug)]
pub struct UploadStore {
    staging_root: PathBuf,
    files_root: PathBuf,
    /// Sessions currently inside [`Self::assemble`]. Guards against two
    /// concurrent complete calls interleaving on the same directory.
    assembling: Mutex<HashSet<String>>,
}

impl UploadStore {
    /// Create the store, ensuring both directory trees exist.
    pub fn new(data_dir: &Path) -> Result<Self, UploadError> {
        let staging_root = data_dir.join("tmp");
        let files_root = data_dir.join("files");
        std::fs::create_dir_all(&staging_root)?;
        std::fs::create_dir_all(&files_root)?;
        Ok(Self {
            staging_root,
            files_root,
            assembling: Mutex::new(HashSet::new()),
        })
    }

    /// Staging directory for one session.
    fn staging_dir(&self, upload_id: &str) -> PathBuf {
        self.staging_root.join(upload_id)
    }

    /// Path of an assembled file.
    pub fn file_path(&self, file_name: &str) -> PathBuf {
        self.files_root.join(file_name)
    }

    /// Stage one chunk. Re-writing an existing index overwrites it.
    pub async fn write_chunk(
        &self,
        upload_id: &str,
        chunk_index: u32,
        data: &[u8],
    ) -> Result<(), UploadError> {
        let dir = self.staging_dir(upload_id);
        tokio::fs::create_dir_all(&dir).await?;
        tokio::fs::write(dir.join(format!("{chunk_index:08}.part")), data).await?;
        Ok(())
    }

    /// Assemble a session's chunks into a final file.
    ///
    /// Chunks are read in index order and streamed through a SHA-256
    /// hasher; the output is fsynced before the rename so a crash never
    /// leaves a half-written file under `files/`.
    pub async fn assemble(
        &self,
        upload_id: &str,
        chunk_count: u32,
        expected_size: u64,
        expected_sha256: Option<&str>,
    ) -> Result<AssembledFile, UploadError> {
        {
            let mut assembling = self.assembling.lock();
            if !assembling.insert(upload_id.to_string()) {
                return Err(UploadError::AssemblyInProgress);
            }
        }
        let result = self
            .assemble_inner(upload_id, chunk_count, expected_size, expected_sha256)
            .await;
        self.assembling.lock().remove(upload_id);
        result
    }

    async fn assemble_inner(
        &self,
        upload_id: &str,
        chunk_count: u32,
        expected_size: u64,
        expected_sha256: Option<&str>,
    ) -> Result<AssembledFile, UploadError> {
        let dir = self.staging_dir(upload_id);
        let scratch = self.staging_root.join(format!("{upload_id}.out"));

        let mut out = tokio::fs::File::create(&scratch).await?;
        let mut hasher = Sha256::new();
        let mut total: u64 = 0;

        for index in 0..chunk_count {
            let chunk_path = dir.join(format!("{index:08}.part"));
            let data = match tokio::fs::read(&chunk_path).await {
                Ok(data) => data,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    drop(out);
                    let _ = tokio::fs::remove_file(&scratch).await;
                    return Err(UploadError::MissingChunk(index));
                }
                Err(e) => {
                    drop(out);
                    let _ = tokio::fs::remove_file(&scratch).await;
                    return Err(e.into());
                }
            };
            hasher.update(&data);
            total += data.len() as u64;
            out.write_all(&data).await?;
        }

        out.sync_all().await?;
        drop(out);

        let digest = hasher.finalize();
        let mut actual_sha256 = String::with_capacity(64);
        for byte in digest {
            actual_sha256.push_str(&format!("{byte:02x}"));
        }

        if total != expected_size {
            let _ = tokio::fs::remove_file(&scratch).await;
            return Err(UploadError::SizeMismatch {
                expected: expected_size,
                actual: total,
            });
        }
        if let Some(expected) = expected_sha256
            && !expected.eq_ignore_ascii_case(&actual_sha256)
        {
            let _ = tokio::fs::remove_file(&scratch).await;
            return Err(UploadError::DigestMismatch {
                expected: expected.to_string(),
                actual: actual_sha256,
            });
        }

        let file_name = upload_id.to_string();
        tokio::fs::rename(&scratch, self.file_path(&file_name)).await?;
        self.remove_staging(upload_id).await;

        Ok(AssembledFile {
            file_name,
            size_bytes: total,
            sha256: actual_sha256,
        })
    }

    /// Delete a session's staging directory, ignoring races with the
    /// reaper.
    pub async fn remove_staging(&self, upload_id: &str) {
        let dir = self.staging_dir(upload_id);
        if let Err(e) = tokio::fs::remove_dir_all(&dir).await
            && e.kind() != std::io::ErrorKind::NotFound
        {
            tracing::warn!(upload_id = %upload_id, error = %e, "Failed to remove upload staging dir");
        }
    }

    /// Delete an assembled file (when its material record is deleted).
    pub async fn remove_file(&self, file_name: &str) {
        let path = self.file_path(file_name);
        if let Err(e) = tokio::fs::remove_file(&path).await
            && e.kind() != std::io::ErrorKind::NotFound
        {
            tracing::warn!(file = %path.display(), error = %e, "Failed to remove stored file");
        }
    }
}
