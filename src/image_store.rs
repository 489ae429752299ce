//! Storage for uploaded receipt images.
//!
//! The store is behind a trait so that route handlers do not care where the
//! bytes end up, and so tests can substitute a store that fails on demand.
//! Implementations report upload progress and resolve to the durable URL
//! that gets persisted with the transaction.

use std::fmt::Debug;
use std::path::PathBuf;

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tokio::{fs, io::AsyncWriteExt};

use crate::{Error, endpoints};

/// How many bytes to write per chunk when saving an image. Each chunk
/// written advances the reported progress.
const WRITE_CHUNK_SIZE: usize = 64 * 1024;

/// A callback that receives upload progress as a whole percentage in
/// `0..=100`.
pub type ProgressFn<'a> = &'a (dyn Fn(u8) + Send + Sync);

/// A place to put uploaded receipt images.
#[async_trait]
pub trait ImageStore: Debug + Send + Sync {
    /// Store an image and resolve to a durable URL for downloading it.
    ///
    /// `extension` is the file extension for the image type (see
    /// [image_extension]). `report_progress` is called with whole
    /// percentages as bytes are written, ending at 100 on success.
    ///
    /// # Errors
    /// This function will return an [Error::UploadFailed] with a
    /// human-readable reason if the image could not be saved. Nothing should
    /// be persisted by the caller in that case.
    async fn store(
        &self,
        extension: &str,
        data: &[u8],
        report_progress: ProgressFn<'_>,
    ) -> Result<String, Error>;
}

/// Map a multipart content type to the file extension used for stored images.
///
/// # Errors
/// This function will return an [Error::NotAnImage] for anything that is not
/// a supported image content type.
pub fn image_extension(content_type: &str) -> Result<&'static str, Error> {
    match content_type {
        "image/png" => Ok("png"),
        "image/jpeg" => Ok("jpg"),
        "image/gif" => Ok("gif"),
        "image/webp" => Ok("webp"),
        other => Err(Error::NotAnImage(other.to_owned())),
    }
}

/// Stores images as files under a root directory, served by the router at
/// [endpoints::IMAGES].
///
/// Files are content-addressed: the file name is the hex SHA-256 digest of
/// the image bytes plus the extension, so re-uploading the same receipt
/// overwrites the identical file and returns the same URL.
#[derive(Debug, Clone)]
pub struct LocalImageStore {
    root: PathBuf,
}

impl LocalImageStore {
    /// Create a store that writes images under `root`.
    ///
    /// The directory is created on first write, not here.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl ImageStore for LocalImageStore {
    async fn store(
        &self,
        extension: &str,
        data: &[u8],
        report_progress: ProgressFn<'_>,
    ) -> Result<String, Error> {
        let file_name = format!("{:x}.{extension}", Sha256::digest(data));

        fs::create_dir_all(&self.root).await.map_err(upload_error)?;

        let path = self.root.join(&file_name);
        let mut file = fs::File::create(&path).await.map_err(upload_error)?;

        let mut bytes_written = 0;
        for chunk in data.chunks(WRITE_CHUNK_SIZE) {
            file.write_all(chunk).await.map_err(upload_error)?;
            bytes_written += chunk.len();
            report_progress((bytes_written * 100 / data.len()) as u8);
        }
        file.flush().await.map_err(upload_error)?;

        if data.is_empty() {
            report_progress(100);
        }

        Ok(format!("{}/{file_name}", endpoints::IMAGES))
    }
}

fn upload_error(error: std::io::Error) -> Error {
    Error::UploadFailed(error.to_string())
}
