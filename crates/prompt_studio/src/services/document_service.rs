use bytes::Bytes;
use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

use crate::dto::{
    DocumentDTO, FetchResponseRequest, FileInfoQuery, IndexDocumentRequest,
    SinglePassExtractionRequest,
};
use crate::error::{AppError, Result};
use crate::middleware::UserContext;
use crate::models::{
    CustomTool, DocumentManager, IndexManager, ProfileManager, PromptOutput, PromptType,
    ToolStudioPrompt,
};
use crate::services::file_converter::{
    allowed_mime_types, mime_for_file_name, FileConverter, PDF_MIME,
};
use crate::services::file_service::{FileViewType, PromptStudioFileService};
use crate::services::indexing_service::DocumentIndexingService;
use crate::services::prompt_engine::{
    AnswerRequest, IndexRequest, ProfileSettings, PromptEngine, PromptPayload,
};
use crate::services::tool_service::accessible_tool;
use crate::storage::EntityStore;

/// A file received from a multipart upload
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub file_name: String,
    pub content_type: Option<String>,
    pub data: Bytes,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexOutcome {
    Indexed(String),
    /// Same document and settings are being indexed by another request
    InProgress,
}

/// Documents of a tool: upload, preview, indexing, prompt runs and removal
pub struct DocumentService {
    store: Arc<dyn EntityStore>,
    files: PromptStudioFileService,
    indexing: Arc<DocumentIndexingService>,
    engine: Arc<dyn PromptEngine>,
    converter: Option<Arc<dyn FileConverter>>,
}

impl DocumentService {
    pub fn new(
        store: Arc<dyn EntityStore>,
        files: PromptStudioFileService,
        indexing: Arc<DocumentIndexingService>,
        engine: Arc<dyn PromptEngine>,
        converter: Option<Arc<dyn FileConverter>>,
    ) -> Self {
        Self {
            store,
            files,
            indexing,
            engine,
            converter,
        }
    }

    /// Tool and document, checking the document belongs to the tool
    pub async fn find_document(
        &self,
        ctx: &UserContext,
        tool_id: Uuid,
        document_id: Uuid,
    ) -> Result<(CustomTool, DocumentManager)> {
        let tool = accessible_tool(self.store.as_ref(), ctx, tool_id).await?;
        let document = self
            .store
            .get_document(document_id)
            .await?
            .filter(|d| d.tool_id == tool_id)
            .ok_or_else(|| AppError::NotFound(format!("Document '{document_id}'")))?;
        Ok((tool, document))
    }

    async fn default_profile(&self, tool_id: Uuid) -> Result<ProfileManager> {
        self.store
            .list_profiles(tool_id)
            .await?
            .into_iter()
            .find(|p| p.is_default)
            .ok_or_else(|| {
                AppError::Validation("No default profile configured for this tool".to_string())
            })
    }

    fn source_path(&self, tool: &CustomTool, file_name: &str) -> Result<String> {
        Ok(self
            .files
            .file_path(&tool.organization_id, &tool.created_by, tool.tool_id, file_name)?
            .to_string_lossy()
            .into_owned())
    }

    pub async fn list_documents(
        &self,
        ctx: &UserContext,
        tool_id: Uuid,
    ) -> Result<Vec<DocumentDTO>> {
        accessible_tool(self.store.as_ref(), ctx, tool_id).await?;
        Ok(self
            .store
            .list_documents(tool_id)
            .await?
            .into_iter()
            .map(DocumentDTO::from)
            .collect())
    }

    pub async fn index_document(
        &self,
        ctx: &UserContext,
        tool_id: Uuid,
        request: IndexDocumentRequest,
    ) -> Result<IndexOutcome> {
        let (tool, document) = self
            .find_document(ctx, tool_id, request.document_id)
            .await?;
        let profile = self.default_profile(tool_id).await?;
        let run_id = resolve_run_id(request.run_id);
        let org_id = tool.organization_id.as_str();
        let user_id = tool.created_by.as_str();
        let is_summary = tool.summarize_context;

        let existing = self
            .store
            .find_index_manager(document.document_id, profile.profile_id)
            .await?;
        if !profile.reindex {
            let previous = existing.as_ref().and_then(|im| {
                if is_summary {
                    im.summarize_index_id.clone()
                } else {
                    im.raw_index_id.clone()
                }
            });
            if let Some(previous) = previous {
                if let Some(doc_id) = self
                    .indexing
                    .get_indexed_document_id(org_id, user_id, &previous)
                    .await
                {
                    tracing::debug!(doc_id = %doc_id, "Document already indexed, skipping");
                    return Ok(IndexOutcome::Indexed(doc_id));
                }
            }
        }

        let view = if is_summary {
            FileViewType::Summarize
        } else {
            FileViewType::Original
        };
        let index_request = IndexRequest {
            tool_id,
            document_id: document.document_id,
            run_id: run_id.clone(),
            organization_id: org_id.to_string(),
            user_id: user_id.to_string(),
            file_path: self.source_path(&tool, &view.file_name_for(&document.document_name))?,
            is_summary,
            profile: ProfileSettings::from(&profile),
        };

        let index_key = index_key(&document, &profile, is_summary);
        if !self
            .indexing
            .try_set_document_indexing(org_id, user_id, &index_key)
            .await
        {
            return Ok(IndexOutcome::InProgress);
        }

        let doc_id = match self.engine.index(index_request).await {
            Ok(Some(doc_id)) => doc_id,
            Ok(None) => {
                self.indexing
                    .remove_document_indexing(org_id, user_id, &index_key)
                    .await;
                tracing::error!(
                    document_id = %document.document_id,
                    run_id = %run_id,
                    "Error occurred while indexing, unique id is not valid"
                );
                return Err(AppError::IndexingApi);
            }
            Err(err) => {
                self.indexing
                    .remove_document_indexing(org_id, user_id, &index_key)
                    .await;
                return Err(err);
            }
        };

        if doc_id != index_key {
            self.indexing
                .remove_document_indexing(org_id, user_id, &index_key)
                .await;
        }
        self.indexing
            .mark_document_indexed(org_id, user_id, &doc_id, &doc_id)
            .await;

        let now = Utc::now();
        let mut index_manager = existing.unwrap_or_else(|| IndexManager {
            index_manager_id: Uuid::new_v4(),
            document_id: document.document_id,
            profile_id: profile.profile_id,
            raw_index_id: None,
            summarize_index_id: None,
            index_ids_history: Vec::new(),
            created_at: now,
            modified_at: now,
        });
        if !index_manager.index_ids_history.contains(&doc_id) {
            index_manager.index_ids_history.push(doc_id.clone());
        }
        if is_summary {
            index_manager.summarize_index_id = Some(doc_id.clone());
        } else {
            index_manager.raw_index_id = Some(doc_id.clone());
        }
        index_manager.modified_at = now;
        self.store.upsert_index_manager(index_manager).await?;

        tracing::info!(
            document_id = %document.document_id,
            run_id = %run_id,
            doc_id = %doc_id,
            "Document indexed"
        );
        Ok(IndexOutcome::Indexed(doc_id))
    }

    /// Run one prompt against a document
    pub async fn fetch_response(
        &self,
        ctx: &UserContext,
        tool_id: Uuid,
        request: FetchResponseRequest,
    ) -> Result<Vec<PromptOutput>> {
        let (tool, document) = self
            .find_document(ctx, tool_id, request.document_id)
            .await?;
        let prompt = self
            .store
            .get_prompt(request.id)
            .await?
            .filter(|p| p.tool_id == tool_id)
            .ok_or_else(|| AppError::NotFound(format!("Prompt '{}'", request.id)))?;

        let profiles = self.store.list_profiles(tool_id).await?;
        let profile = match request.profile_manager.or(prompt.profile_manager) {
            Some(profile_id) => profiles
                .into_iter()
                .find(|p| p.profile_id == profile_id)
                .ok_or_else(|| AppError::NotFound(format!("Profile '{profile_id}'")))?,
            None => self.default_profile(tool_id).await?,
        };

        self.run_prompts(
            &tool,
            &document,
            vec![(prompt, profile)],
            resolve_run_id(request.run_id),
            false,
        )
        .await
    }

    /// Run every active prompt of the tool in one pass with the default profile
    pub async fn single_pass_extraction(
        &self,
        ctx: &UserContext,
        tool_id: Uuid,
        request: SinglePassExtractionRequest,
    ) -> Result<Vec<PromptOutput>> {
        let (tool, document) = self
            .find_document(ctx, tool_id, request.document_id)
            .await?;
        let profile = self.default_profile(tool_id).await?;
        let prompts: Vec<(ToolStudioPrompt, ProfileManager)> = self
            .store
            .list_prompts(tool_id)
            .await?
            .into_iter()
            .filter(|p| p.active && p.prompt_type == PromptType::Prompt)
            .map(|p| (p, profile.clone()))
            .collect();
        if prompts.is_empty() {
            return Err(AppError::Validation(
                "Tool has no active prompts to run".to_string(),
            ));
        }

        self.run_prompts(
            &tool,
            &document,
            prompts,
            resolve_run_id(request.run_id),
            true,
        )
        .await
    }

    async fn run_prompts(
        &self,
        tool: &CustomTool,
        document: &DocumentManager,
        prompts: Vec<(ToolStudioPrompt, ProfileManager)>,
        run_id: String,
        single_pass: bool,
    ) -> Result<Vec<PromptOutput>> {
        let view = if tool.summarize_as_source {
            FileViewType::Summarize
        } else {
            FileViewType::Original
        };
        let request = AnswerRequest {
            tool_id: tool.tool_id,
            document_id: document.document_id,
            run_id: run_id.clone(),
            organization_id: tool.organization_id.clone(),
            user_id: tool.created_by.clone(),
            file_path: self.source_path(tool, &view.file_name_for(&document.document_name))?,
            preamble: tool.preamble.clone(),
            postamble: tool.postamble.clone(),
            summarize_as_source: tool.summarize_as_source,
            enable_challenge: tool.enable_challenge,
            single_pass,
            prompts: prompts
                .iter()
                .map(|(prompt, profile)| PromptPayload::new(prompt, profile))
                .collect(),
        };

        let response = self.engine.answer(request).await?;

        let now = Utc::now();
        let mut outputs = Vec::with_capacity(prompts.len());
        for (prompt, profile) in prompts {
            let output = PromptOutput {
                prompt_output_id: Uuid::new_v4(),
                prompt_id: prompt.prompt_id,
                tool_id: tool.tool_id,
                document_id: document.document_id,
                profile_id: Some(profile.profile_id),
                run_id: run_id.clone(),
                output: response
                    .output
                    .get(&prompt.prompt_key)
                    .cloned()
                    .unwrap_or(serde_json::Value::Null),
                created_at: now,
            };
            self.store.record_prompt_output(output.clone()).await?;
            outputs.push(output);
        }
        Ok(outputs)
    }

    pub async fn fetch_contents(
        &self,
        ctx: &UserContext,
        tool_id: Uuid,
        query: FileInfoQuery,
    ) -> Result<String> {
        let (tool, document) = self.find_document(ctx, tool_id, query.document_id).await?;
        let file_name = query.view_type.file_name_for(&document.document_name);
        let allowed = allowed_mime_types(self.converter.as_deref());
        self.files
            .fetch_contents(
                &tool.organization_id,
                &tool.created_by,
                tool_id,
                &file_name,
                &allowed,
            )
            .await
    }

    /// Store uploads, converting non-PDF files when a converter is configured,
    /// and create a document record for each. Nothing is stored unless every
    /// file has an accepted content type.
    pub async fn upload_documents(
        &self,
        ctx: &UserContext,
        tool_id: Uuid,
        uploads: Vec<UploadedFile>,
    ) -> Result<Vec<DocumentDTO>> {
        let tool = accessible_tool(self.store.as_ref(), ctx, tool_id).await?;
        if uploads.is_empty() {
            return Err(AppError::Validation("No file was submitted".to_string()));
        }

        let allowed = allowed_mime_types(self.converter.as_deref());
        let mut checked = Vec::with_capacity(uploads.len());
        for upload in uploads {
            let content_type = upload
                .content_type
                .clone()
                .filter(|c| c != "application/octet-stream")
                .unwrap_or_else(|| mime_for_file_name(&upload.file_name).to_string());
            if !allowed.contains(&content_type) {
                return Err(AppError::UnsupportedFileType(content_type));
            }
            checked.push((upload, content_type));
        }

        let mut documents = Vec::with_capacity(checked.len());
        for (upload, content_type) in checked {
            let (data, file_name) = match &self.converter {
                Some(converter) if content_type != PDF_MIME => {
                    converter
                        .process_file(upload.data, &upload.file_name)
                        .await?
                }
                _ => (upload.data, upload.file_name),
            };

            tracing::info!(tool_id = %tool_id, file_name = %file_name, "Uploading file");
            self.files
                .upload(
                    &tool.organization_id,
                    &tool.created_by,
                    tool_id,
                    &file_name,
                    &data,
                )
                .await?;

            let document = self
                .store
                .insert_document(DocumentManager {
                    document_id: Uuid::new_v4(),
                    document_name: file_name,
                    tool_id,
                    created_by: ctx.user_id.clone(),
                    created_at: Utc::now(),
                })
                .await?;
            documents.push(DocumentDTO::from(document));
        }
        Ok(documents)
    }

    /// Clear indexing state, the record and the stored files of a document.
    /// Steps are not rolled back when a later one fails.
    pub async fn purge_document(
        &self,
        tool: &CustomTool,
        document: &DocumentManager,
    ) -> Result<()> {
        let org_id = tool.organization_id.as_str();
        let user_id = tool.created_by.as_str();

        for index_manager in self
            .store
            .list_index_managers(document.document_id)
            .await?
        {
            for doc_id_key in [index_manager.raw_index_id, index_manager.summarize_index_id]
                .into_iter()
                .flatten()
            {
                self.indexing
                    .remove_document_indexing(org_id, user_id, &doc_id_key)
                    .await;
            }
        }

        self.store.delete_document(document.document_id).await?;
        self.files
            .delete(org_id, user_id, tool.tool_id, &document.document_name)
            .await?;

        tracing::info!(
            document_id = %document.document_id,
            "Deleted document and its indexing state"
        );
        Ok(())
    }
}

fn resolve_run_id(run_id: Option<String>) -> String {
    run_id
        .filter(|id| !id.trim().is_empty())
        .unwrap_or_else(|| Uuid::new_v4().to_string())
}

fn index_key(document: &DocumentManager, profile: &ProfileManager, is_summary: bool) -> String {
    let adapter = |id: Option<Uuid>| id.map(|id| id.to_string()).unwrap_or_default();
    format!(
        "{}|{}|{}|{}|{}|{}|{}|{}",
        document.document_id,
        adapter(profile.vector_store),
        adapter(profile.embedding_model),
        adapter(profile.x2text),
        profile.chunk_size,
        profile.chunk_overlap,
        is_summary,
        document.document_name,
    )
}
