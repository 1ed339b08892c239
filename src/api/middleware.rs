/// Request helpers shared by the route modules
use crate::error::SurfResult;
use axum::{
    body::Bytes,
    extract::Multipart,
    http::{header, HeaderMap},
};
use std::collections::HashMap;

/// Extract bearer token from Authorization header
pub fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(String::from)
}

/// A multipart body split into text fields and one optional file
#[derive(Debug, Default)]
pub struct UploadForm {
    pub fields: HashMap<String, String>,
    pub file: Option<Bytes>,
}

/// Read a multipart body, keeping the file part named `file_field`
///
/// Empty file parts (a form submitted without choosing a file) count as no file.
pub async fn read_upload_form(mut multipart: Multipart, file_field: &str) -> SurfResult<UploadForm> {
    let mut form = UploadForm::default();

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();

        if name == file_field {
            let data = field.bytes().await?;
            if !data.is_empty() {
                form.file = Some(data);
            }
        } else if field.file_name().is_none() {
            let value = field.text().await?;
            form.fields.insert(name, value);
        }
    }

    Ok(form)
}
