use crate::http::{Error, Result};
use crate::uploads::UploadedFile;
use axum::extract::multipart::MultipartError;
use axum::extract::Multipart;
use std::collections::HashMap;

/// A `multipart/form-data` body read fully into memory and checked, before anything
/// touches the disk or the database.
#[derive(Debug, Default)]
pub struct Form {
    fields: HashMap<String, String>,
    pub files: Vec<UploadedFile>,
}

impl Form {
    /// Reads every part of `multipart`.
    ///
    /// File parts are only accepted under `file_field`, at most `max_files` of them,
    /// and only if they are images.
    pub async fn read(mut multipart: Multipart, file_field: &str, max_files: usize) -> Result<Self> {
        let mut form = Form::default();

        while let Some(field) = multipart.next_field().await.map_err(malformed)? {
            let name = field.name().unwrap_or_default().to_string();

            let Some(file_name) = field.file_name().map(str::to_string) else {
                let value = field.text().await.map_err(malformed)?;
                form.fields.insert(name, value);
                continue;
            };

            if name != file_field {
                return Err(Error::bad_request("Unexpected field"));
            }

            let content_type = field.content_type().map(str::to_string);
            let data = field.bytes().await.map_err(malformed)?;

            // Browsers submit an empty, nameless part for a file input that was left blank.
            if data.is_empty() && file_name.is_empty() {
                continue;
            }

            if form.files.len() == max_files {
                return Err(Error::bad_request("Too many files"));
            }

            let file = UploadedFile {
                file_name: Some(file_name),
                content_type,
                data,
            };

            if !file.is_image() {
                return Err(Error::bad_request("Only image files are allowed"));
            }

            form.files.push(file);
        }

        Ok(form)
    }

    /// Takes a text field out of the form. Blank values count as missing.
    pub fn take_text(&mut self, name: &str) -> Option<String> {
        self.fields
            .remove(name)
            .filter(|value| !value.trim().is_empty())
    }
}

fn malformed(e: MultipartError) -> Error {
    log::debug!("malformed multipart body: {}", e);
    Error::bad_request(format!("Invalid multipart body: {e}"))
}
