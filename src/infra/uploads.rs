//! Avatar upload storage under the public `/uploads/` prefix.

use std::error::Error as StdError;
use std::path::{Component, Path, PathBuf};

use bytes::Bytes;
use futures::{StreamExt, pin_mut};
use thiserror::Error;
use time::OffsetDateTime;
use tokio::{fs, io::AsyncWriteExt};
use uuid::Uuid;

/// URL prefix stored avatars are served under.
pub const PUBLIC_PREFIX: &str = "/uploads/";

const AVATAR_DIR: &str = "avatars";
const ALLOWED_EXTENSIONS: [&str; 4] = ["jpeg", "jpg", "png", "gif"];

#[derive(Debug, Error)]
pub enum UploadStorageError {
    #[error("invalid stored path")]
    InvalidPath,
    #[error("only jpeg, jpg, png and gif images are allowed")]
    UnsupportedType,
    #[error("uploaded file exceeds {limit} bytes")]
    TooLarge { limit: u64 },
    #[error("uploaded file is empty")]
    EmptyPayload,
    #[error("uploaded file stream failed")]
    PayloadStream {
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredUpload {
    /// Path relative to the storage root, e.g. `avatars/avatar-1-2.png`.
    pub stored_path: String,
    pub size_bytes: u64,
}

impl StoredUpload {
    /// URL the stored file is served at.
    pub fn public_path(&self) -> String {
        format!("{PUBLIC_PREFIX}{}", self.stored_path)
    }
}

/// Filesystem-backed upload storage.
#[derive(Debug)]
pub struct UploadStorage {
    root: PathBuf,
    max_bytes: u64,
}

impl UploadStorage {
    /// Initialise storage rooted at the provided directory, creating it if necessary.
    pub fn new(root: PathBuf, max_bytes: u64) -> Result<Self, std::io::Error> {
        std::fs::create_dir_all(root.join(AVATAR_DIR))?;
        Ok(Self { root, max_bytes })
    }

    pub fn max_bytes(&self) -> u64 {
        self.max_bytes
    }

    /// Extension of an acceptable image, judged by both the file name and
    /// the declared content type.
    pub fn image_extension(
        file_name: &str,
        content_type: Option<&str>,
    ) -> Result<String, UploadStorageError> {
        let extension = Path::new(file_name)
            .extension()
            .and_then(|value| value.to_str())
            .map(str::to_ascii_lowercase)
            .filter(|ext| ALLOWED_EXTENSIONS.contains(&ext.as_str()))
            .ok_or(UploadStorageError::UnsupportedType)?;

        let subtype = content_type
            .and_then(|value| value.split(';').next())
            .and_then(|value| value.trim().strip_prefix("image/"))
            .map(str::to_ascii_lowercase)
            .ok_or(UploadStorageError::UnsupportedType)?;
        if !ALLOWED_EXTENSIONS.contains(&subtype.as_str()) {
            return Err(UploadStorageError::UnsupportedType);
        }

        Ok(extension)
    }

    /// Stream an avatar to disk, aborting once the size limit is crossed.
    pub async fn store_avatar<S>(
        &self,
        extension: &str,
        stream: S,
    ) -> Result<StoredUpload, UploadStorageError>
    where
        S: futures::Stream<Item = Result<Bytes, UploadStorageError>>,
    {
        let stored_path = Self::avatar_path(extension, OffsetDateTime::now_utc());
        let absolute = self.resolve(&stored_path)?;

        let mut file = fs::File::create(&absolute).await?;
        let mut total_bytes: u64 = 0;

        pin_mut!(stream);
        while let Some(chunk_result) = stream.next().await {
            let chunk = match chunk_result {
                Ok(chunk) => chunk,
                Err(err) => {
                    drop(file);
                    let _ = fs::remove_file(&absolute).await;
                    return Err(err);
                }
            };

            total_bytes = total_bytes.saturating_add(chunk.len() as u64);
            if total_bytes > self.max_bytes {
                drop(file);
                let _ = fs::remove_file(&absolute).await;
                return Err(UploadStorageError::TooLarge {
                    limit: self.max_bytes,
                });
            }
            file.write_all(&chunk).await?;
        }

        file.flush().await?;

        if total_bytes == 0 {
            drop(file);
            let _ = fs::remove_file(&absolute).await;
            return Err(UploadStorageError::EmptyPayload);
        }

        Ok(StoredUpload {
            stored_path,
            size_bytes: total_bytes,
        })
    }

    pub async fn read(&self, stored_path: &str) -> Result<Bytes, UploadStorageError> {
        let absolute = self.resolve(stored_path)?;
        let data = fs::read(absolute).await?;
        Ok(Bytes::from(data))
    }

    /// Remove a file referenced by its public URL. URLs outside
    /// `/uploads/` are left alone; missing files are treated as success.
    pub async fn delete_public(&self, public_path: &str) -> Result<bool, UploadStorageError> {
        let Some(stored_path) = public_path.strip_prefix(PUBLIC_PREFIX) else {
            return Ok(false);
        };
        let absolute = self.resolve(stored_path)?;
        match fs::remove_file(&absolute).await {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(err) => Err(UploadStorageError::Io(err)),
        }
    }

    fn resolve(&self, stored_path: &str) -> Result<PathBuf, UploadStorageError> {
        let relative = Path::new(stored_path);
        if stored_path.is_empty()
            || relative.is_absolute()
            || relative.components().any(|component| {
                matches!(
                    component,
                    Component::ParentDir | Component::Prefix(_) | Component::RootDir
                )
            })
        {
            return Err(UploadStorageError::InvalidPath);
        }

        Ok(self.root.join(relative))
    }

    fn avatar_path(extension: &str, now: OffsetDateTime) -> String {
        let millis = now.unix_timestamp_nanos() / 1_000_000;
        let suffix = Uuid::new_v4().as_u128() % 1_000_000_000;
        format!("{AVATAR_DIR}/avatar-{millis}-{suffix}.{extension}")
    }
}
