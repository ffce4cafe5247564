use actix_multipart::Multipart;
use bytes::{Bytes, BytesMut};
use futures_util::TryStreamExt;

use crate::error::AppError;

/// One part of a multipart form, fully buffered
pub struct FormPart {
    pub name: String,
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub data: Bytes,
}

impl FormPart {
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.data).trim().to_string()
    }
}

/// Buffers every part, failing once the form grows past `max_bytes`
pub async fn read_parts(
    mut payload: Multipart,
    max_bytes: usize,
) -> Result<Vec<FormPart>, AppError> {
    let mut parts = Vec::new();
    let mut total = 0usize;
    while let Some(mut field) = payload
        .try_next()
        .await
        .map_err(|e| AppError::Validation(format!("Invalid multipart payload: {e}")))?
    {
        let disposition = field.content_disposition();
        let name = disposition
            .and_then(|cd| cd.get_name())
            .unwrap_or_default()
            .to_string();
        let file_name = disposition
            .and_then(|cd| cd.get_filename())
            .map(str::to_string);
        let content_type = field.content_type().map(|m| m.essence_str().to_string());

        let mut data = BytesMut::new();
        while let Some(chunk) = field
            .try_next()
            .await
            .map_err(|e| AppError::Validation(format!("Invalid multipart payload: {e}")))?
        {
            total += chunk.len();
            if total > max_bytes {
                return Err(AppError::PayloadTooLarge(max_bytes));
            }
            data.extend_from_slice(&chunk);
        }

        parts.push(FormPart {
            name,
            file_name,
            content_type,
            data: data.freeze(),
        });
    }
    Ok(parts)
}
