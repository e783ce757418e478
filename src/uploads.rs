use anyhow::Context;
use async_trait::async_trait;
use axum::body::Bytes;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use uuid::Uuid;

#[cfg(test)]
use mockall::automock;

/// URL prefix the upload directory is served under.
pub const PUBLIC_PREFIX: &str = "/uploads";

/// One file part of a multipart request, read fully into memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    /// The name the client sent, if any. Only its extension is kept.
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub data: Bytes,
}

impl UploadedFile {
    /// Trusts the declared content type, falling back to a guess from the file name.
    pub fn is_image(&self) -> bool {
        match self.content_type.as_deref() {
            Some(content_type) => content_type.starts_with("image/"),
            None => self
                .file_name
                .as_deref()
                .and_then(|name| mime_guess::from_path(name).first())
                .map_or(false, |mime| mime.type_() == mime_guess::mime::IMAGE),
        }
    }

    fn extension(&self) -> Option<String> {
        self.file_name
            .as_deref()
            .and_then(|name| Path::new(name).extension())
            .and_then(|ext| ext.to_str())
            .filter(|ext| {
                !ext.is_empty() && ext.len() <= 8 && ext.chars().all(|c| c.is_ascii_alphanumeric())
            })
            .map(str::to_ascii_lowercase)
            .or_else(|| {
                self.content_type
                    .as_deref()
                    .and_then(mime_guess::get_mime_extensions_str)
                    .and_then(|exts| exts.first())
                    .map(|ext| ext.to_string())
            })
    }

    /// A fresh name that can't collide with or escape from anything already on disk.
    fn generate_name(&self) -> String {
        match self.extension() {
            Some(ext) => format!("{}.{}", Uuid::new_v4(), ext),
            None => Uuid::new_v4().to_string(),
        }
    }
}

pub type DynFileStore = Arc<dyn FileStoreTrait + Send + Sync>;

#[cfg_attr(test, automock)]
#[async_trait]
pub trait FileStoreTrait {
    /// Writes the file and returns the public path it will be served from, e.g. `/uploads/<name>`.
    async fn save(&self, file: UploadedFile) -> anyhow::Result<String>;

    /// Deletes the file behind a public path returned by `save()`.
    ///
    /// A file that is already gone is not an error.
    async fn remove(&self, public_path: &str) -> anyhow::Result<()>;
}

/// Stores uploads as plain files in one directory.
#[derive(Clone, Debug)]
pub struct DiskFileStore {
    dir: PathBuf,
}

impl DiskFileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Creates the upload directory if it doesn't exist yet.
    pub async fn ensure_dir(&self) -> anyhow::Result<()> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .with_context(|| format!("could not create upload directory {:?}", self.dir))
    }

    /// Only the final path component is used, so a stored path can never point outside `dir`.
    fn disk_path(&self, public_path: &str) -> Option<PathBuf> {
        Path::new(public_path)
            .file_name()
            .map(|name| self.dir.join(name))
    }
}

#[async_trait]
impl FileStoreTrait for DiskFileStore {
    async fn save(&self, file: UploadedFile) -> anyhow::Result<String> {
        let name = file.generate_name();
        let path = self.dir.join(&name);

        tokio::fs::write(&path, &file.data)
            .await
            .with_context(|| format!("failed to write upload to {:?}", path))?;

        log::debug!("stored {} byte upload as {:?}", file.data.len(), path);

        Ok(format!("{PUBLIC_PREFIX}/{name}"))
    }

    async fn remove(&self, public_path: &str) -> anyhow::Result<()> {
        let Some(path) = self.disk_path(public_path) else {
            log::warn!("ignoring malformed upload path {:?}", public_path);
            return Ok(());
        };

        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                log::debug!("upload {:?} was already gone", path);
                Ok(())
            }
            Err(e) => Err(e).with_context(|| format!("failed to delete upload {:?}", path)),
        }
    }
}
