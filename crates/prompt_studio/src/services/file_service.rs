use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::path::{Path, PathBuf};
use tokio::fs;
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::services::file_converter::{mime_for_file_name, PDF_MIME, TEXT_MIME};

pub const EXTRACT_DIR: &str = "extract";
pub const SUMMARIZE_DIR: &str = "summarize";

/// Which rendition of a document to read
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FileViewType {
    Original,
    Extract,
    Summarize,
}

impl FileViewType {
    /// Relative path of the rendition: derived views are text files named
    /// after the document, inside their own sub directory.
    pub fn file_name_for(&self, document_name: &str) -> String {
        let stem = document_name
            .rsplit_once('.')
            .map(|(stem, _)| stem)
            .unwrap_or(document_name);
        match self {
            FileViewType::Original => document_name.to_string(),
            FileViewType::Extract => format!("{EXTRACT_DIR}/{stem}.txt"),
            FileViewType::Summarize => format!("{SUMMARIZE_DIR}/{stem}.txt"),
        }
    }
}

/// Stores uploaded documents under `<root>/<org>/<user>/<tool>/`
#[derive(Debug, Clone)]
pub struct PromptStudioFileService {
    root: PathBuf,
}

impl PromptStudioFileService {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn tool_dir(&self, organization_id: &str, user_id: &str, tool_id: Uuid) -> PathBuf {
        self.root
            .join(sanitize_segment(organization_id))
            .join(sanitize_segment(user_id))
            .join(tool_id.to_string())
    }

    pub fn file_path(
        &self,
        organization_id: &str,
        user_id: &str,
        tool_id: Uuid,
        file_name: &str,
    ) -> Result<PathBuf> {
        let relative = Path::new(file_name);
        let escapes = relative.components().any(|c| {
            !matches!(c, std::path::Component::Normal(_))
        });
        if file_name.is_empty() || escapes {
            return Err(AppError::Validation(format!("Invalid file name '{file_name}'")));
        }
        Ok(self.tool_dir(organization_id, user_id, tool_id).join(relative))
    }

    pub async fn upload(
        &self,
        organization_id: &str,
        user_id: &str,
        tool_id: Uuid,
        file_name: &str,
        data: &[u8],
    ) -> Result<PathBuf> {
        let path = self.file_path(organization_id, user_id, tool_id, file_name)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&path, data).await?;

        tracing::info!(
            tool_id = %tool_id,
            path = %path.display(),
            size = data.len(),
            "FileService: Stored upload"
        );
        Ok(path)
    }

    /// Read a stored file for display. PDFs and other binary types allowed by
    /// `allowed_content_types` come back base64 encoded, plain text as is.
    pub async fn fetch_contents(
        &self,
        organization_id: &str,
        user_id: &str,
        tool_id: Uuid,
        file_name: &str,
        allowed_content_types: &[String],
    ) -> Result<String> {
        let path = self.file_path(organization_id, user_id, tool_id, file_name)?;
        let data = match fs::read(&path).await {
            Ok(data) => data,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(AppError::FileNotFound)
            }
            Err(err) => return Err(err.into()),
        };

        let mime = mime_for_file_name(file_name);
        if mime == TEXT_MIME {
            return Ok(String::from_utf8_lossy(&data).into_owned());
        }
        if mime == PDF_MIME || allowed_content_types.iter().any(|m| m == mime) {
            return Ok(STANDARD.encode(&data));
        }
        Err(AppError::UnsupportedFileType(mime.to_string()))
    }

    /// Remove a document and its derived extract/summary text
    pub async fn delete(
        &self,
        organization_id: &str,
        user_id: &str,
        tool_id: Uuid,
        document_name: &str,
    ) -> Result<()> {
        for view in [
            FileViewType::Original,
            FileViewType::Extract,
            FileViewType::Summarize,
        ] {
            let path = self.file_path(
                organization_id,
                user_id,
                tool_id,
                &view.file_name_for(document_name),
            )?;
            match fs::remove_file(&path).await {
                Ok(()) => {
                    tracing::debug!(path = %path.display(), "FileService: Removed file");
                }
                // Derived files only exist once the document was processed
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                    if view == FileViewType::Original {
                        return Err(AppError::FileNotFound);
                    }
                }
                Err(err) => return Err(err.into()),
            }
        }
        Ok(())
    }

    pub async fn delete_tool_files(
        &self,
        organization_id: &str,
        user_id: &str,
        tool_id: Uuid,
    ) -> Result<()> {
        let dir = self.tool_dir(organization_id, user_id, tool_id);
        match fs::remove_dir_all(&dir).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

fn sanitize_segment(segment: &str) -> String {
    segment
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_view_type_paths() {
        assert_eq!(FileViewType::Original.file_name_for("a.b.pdf"), "a.b.pdf");
        assert_eq!(
            FileViewType::Extract.file_name_for("invoice.pdf"),
            "extract/invoice.txt"
        );
        assert_eq!(
            FileViewType::Summarize.file_name_for("invoice"),
            "summarize/invoice.txt"
        );
    }

    #[tokio::test]
    async fn test_upload_fetch_and_delete() {
        let temp_dir = TempDir::new().unwrap();
        let service = PromptStudioFileService::new(temp_dir.path());
        let tool_id = Uuid::new_v4();

        service
            .upload("org", "alice", tool_id, "doc.pdf", b"%PDF-1.4")
            .await
            .unwrap();
        service
            .upload("org", "alice", tool_id, "extract/doc.txt", b"hello")
            .await
            .unwrap();

        let pdf = service
            .fetch_contents("org", "alice", tool_id, "doc.pdf", &[])
            .await
            .unwrap();
        assert_eq!(pdf, STANDARD.encode(b"%PDF-1.4"));
        let text = service
            .fetch_contents("org", "alice", tool_id, "extract/doc.txt", &[])
            .await
            .unwrap();
        assert_eq!(text, "hello");

        service.delete("org", "alice", tool_id, "doc.pdf").await.unwrap();
        let err = service
            .fetch_contents("org", "alice", tool_id, "extract/doc.txt", &[])
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::FileNotFound));
    }

    #[tokio::test]
    async fn test_rejects_unknown_binary_and_traversal() {
        let temp_dir = TempDir::new().unwrap();
        let service = PromptStudioFileService::new(temp_dir.path());
        let tool_id = Uuid::new_v4();

        service
            .upload("org", "alice", tool_id, "sheet.xlsx", b"xx")
            .await
            .unwrap();
        let err = service
            .fetch_contents("org", "alice", tool_id, "sheet.xlsx", &[])
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::UnsupportedFileType(_)));

        let err = service
            .upload("org", "alice", tool_id, "../escape.pdf", b"x")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }
}
