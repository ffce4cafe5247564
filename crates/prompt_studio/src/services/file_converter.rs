use async_trait::async_trait;
use bytes::Bytes;

use crate::error::Result;

pub const PDF_MIME: &str = "application/pdf";
pub const TEXT_MIME: &str = "text/plain";

/// Content types accepted for upload and preview without a converter
pub const DEFAULT_ALLOWED_MIME: [&str; 2] = [PDF_MIME, TEXT_MIME];

/// Turns uploaded non-PDF documents into PDFs before they are stored.
///
/// Handed to the server at construction time; when none is configured uploads
/// are stored as-is and only [`DEFAULT_ALLOWED_MIME`] types are accepted.
#[async_trait]
pub trait FileConverter: Send + Sync {
    /// Content types this converter can handle, in addition to the defaults
    fn supported_mime_types(&self) -> Vec<String>;

    /// Returns the converted bytes and the new file name
    async fn process_file(&self, data: Bytes, file_name: &str) -> Result<(Bytes, String)>;
}

/// Every content type accepted when `converter` is in place
pub fn allowed_mime_types(converter: Option<&dyn FileConverter>) -> Vec<String> {
    let mut allowed: Vec<String> = DEFAULT_ALLOWED_MIME.iter().map(|m| m.to_string()).collect();
    if let Some(converter) = converter {
        for mime in converter.supported_mime_types() {
            if !allowed.contains(&mime) {
                allowed.push(mime);
            }
        }
    }
    allowed
}

/// Guess the content type from the file extension
pub fn mime_for_file_name(file_name: &str) -> &'static str {
    let extension = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match extension.as_str() {
        "pdf" => PDF_MIME,
        "txt" | "text" | "md" => TEXT_MIME,
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "xls" => "application/vnd.ms-excel",
        "xlsx" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        "ppt" => "application/vnd.ms-powerpoint",
        "pptx" => "application/vnd.openxmlformats-officedocument.presentationml.presentation",
        "odt" => "application/vnd.oasis.opendocument.text",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "tif" | "tiff" => "image/tiff",
        "csv" => "text/csv",
        "json" => "application/json",
        _ => "application/octet-stream",
    }
}
