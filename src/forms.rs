//! Multipart form collection for the upload endpoints.
//!
//! The whole body is drained into an `UploadForm` first; handlers then pull the
//! required text fields and files out of it by name, so a missing part turns into
//! a 400 before anything touches the disk or the database.

use axum::extract::Multipart;
use std::collections::HashMap;
use uuid::Uuid;

use crate::{
    error::{AppError, Result},
    storage::{StorageState, UploadKind},
};

/// UploadedFile
///
/// One file part of a multipart body, fully buffered.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub filename: String,
    pub bytes: Vec<u8>,
}

/// UploadForm
///
/// Text parts keyed by field name, and file parts (a part carrying a filename)
/// grouped by field name in the order they arrived.
#[derive(Debug, Default)]
pub struct UploadForm {
    fields: HashMap<String, String>,
    files: HashMap<String, Vec<UploadedFile>>,
}

impl UploadForm {
    pub async fn from_multipart(mut multipart: Multipart) -> Result<Self> {
        let mut form = UploadForm::default();

        while let Some(field) = multipart.next_field().await? {
            let name = field.name().unwrap_or_default().to_string();
            if name.is_empty() {
                continue;
            }

            match field.file_name().map(str::to_string) {
                Some(filename) => {
                    let bytes = field.bytes().await?.to_vec();
                    // Browsers send an empty part for an untouched optional file input.
                    if filename.is_empty() && bytes.is_empty() {
                        continue;
                    }
                    form.files
                        .entry(name)
                        .or_default()
                        .push(UploadedFile { filename, bytes });
                }
                None => {
                    let text = field.text().await?;
                    form.fields.insert(name, text);
                }
            }
        }

        Ok(form)
    }

    /// A required, non-blank text field.
    pub fn text(&self, name: &str) -> Result<String> {
        self.fields
            .get(name)
            .map(|value| value.trim())
            .filter(|value| !value.is_empty())
            .map(str::to_string)
            .ok_or_else(|| AppError::Validation(format!("field '{name}' is required")))
    }

    /// A required text field, returned exactly as sent.
    pub fn raw_text(&self, name: &str) -> Result<String> {
        self.fields
            .get(name)
            .cloned()
            .ok_or_else(|| AppError::Validation(format!("field '{name}' is required")))
    }

    /// An optional UUID field; blank counts as absent.
    pub fn optional_uuid(&self, name: &str) -> Result<Option<Uuid>> {
        match self.fields.get(name).map(|value| value.trim()) {
            None | Some("") => Ok(None),
            Some(raw) => Uuid::parse_str(raw)
                .map(Some)
                .map_err(|_| AppError::Validation(format!("field '{name}' must be a UUID"))),
        }
    }

    /// Exactly one required file.
    pub fn file(&self, name: &str) -> Result<&UploadedFile> {
        self.files
            .get(name)
            .and_then(|files| files.first())
            .ok_or_else(|| AppError::Validation(format!("file '{name}' is required")))
    }

    /// Every file sent under `name`, possibly none.
    pub fn files(&self, name: &str) -> &[UploadedFile] {
        self.files.get(name).map(Vec::as_slice).unwrap_or_default()
    }
}

/// StoredUploads
///
/// Tracks the public paths written during one request so they can be removed again
/// if the database write that should reference them fails.
pub struct StoredUploads {
    storage: StorageState,
    paths: Vec<String>,
}

impl StoredUploads {
    pub fn new(storage: StorageState) -> Self {
        Self {
            storage,
            paths: Vec::new(),
        }
    }

    pub async fn store(&mut self, file: &UploadedFile, kind: UploadKind) -> Result<String> {
        let path = self.storage.store(&file.bytes, &file.filename, kind).await?;
        self.paths.push(path.clone());
        Ok(path)
    }

    pub async fn store_all(&mut self, files: &[UploadedFile], kind: UploadKind) -> Result<Vec<String>> {
        let mut paths = Vec::with_capacity(files.len());
        for file in files {
            paths.push(self.store(file, kind).await?);
        }
        Ok(paths)
    }

    /// Removes everything stored so far. Removal failures are logged, not returned:
    /// the caller is already on an error path.
    pub async fn discard(self) {
        for path in &self.paths {
            if let Err(e) = self.storage.remove(path).await {
                tracing::warn!(path = %path, error = %e, "Failed to remove orphaned upload");
            }
        }
    }

    /// Runs `write` and, if it fails, removes the uploads before returning the error.
    pub async fn commit_with<T, F>(self, write: F) -> Result<T>
    where
        F: std::future::Future<Output = Result<T>>,
    {
        match write.await {
            Ok(value) => Ok(value),
            Err(e) => {
                self.discard().await;
                Err(e)
            }
        }
    }
}
