//! Request and response payloads of the prompt studio API
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::models::{CustomTool, DocumentManager, PromptType, RegistryExport};
use crate::services::file_service::FileViewType;

#[derive(Deserialize, Debug, Clone, Default)]
pub struct CreateToolRequest {
    pub tool_name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub icon: String,
    #[serde(default)]
    pub output: String,
    #[serde(default)]
    pub preamble: String,
    #[serde(default)]
    pub postamble: String,
    #[serde(default)]
    pub summarize_prompt: String,
    #[serde(default)]
    pub summarize_context: bool,
    #[serde(default)]
    pub summarize_as_source: bool,
    #[serde(default)]
    pub enable_challenge: bool,
    #[serde(default)]
    pub enable_highlight: bool,
    #[serde(default)]
    pub single_pass_extraction_mode: bool,
    #[serde(default)]
    pub prompt_grammer: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub shared_users: Vec<String>,
    #[serde(default)]
    pub shared_to_org: bool,
}

/// Partial update; absent fields are left untouched
#[derive(Deserialize, Debug, Clone, Default)]
pub struct UpdateToolRequest {
    pub tool_name: Option<String>,
    pub description: Option<String>,
    pub author: Option<String>,
    pub icon: Option<String>,
    pub output: Option<String>,
    pub preamble: Option<String>,
    pub postamble: Option<String>,
    pub summarize_prompt: Option<String>,
    pub summarize_context: Option<bool>,
    pub summarize_as_source: Option<bool>,
    pub enable_challenge: Option<bool>,
    pub enable_highlight: Option<bool>,
    pub single_pass_extraction_mode: Option<bool>,
    pub prompt_grammer: Option<BTreeMap<String, Vec<String>>>,
    pub shared_users: Option<Vec<String>>,
    pub shared_to_org: Option<bool>,
    /// Profile to become the tool's only summarize profile
    pub summarize_llm_profile: Option<Uuid>,
}

#[derive(Serialize, Debug, Clone)]
pub struct CustomToolDTO {
    #[serde(flatten)]
    pub tool: CustomTool,
    pub default_profile: Option<Uuid>,
    pub summarize_llm_profile: Option<Uuid>,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct MakeDefaultProfileRequest {
    pub default_profile: Uuid,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct CreateProfileRequest {
    pub profile_name: String,
    pub llm: Option<Uuid>,
    pub vector_store: Option<Uuid>,
    pub embedding_model: Option<Uuid>,
    pub x2text: Option<Uuid>,
    pub chunk_size: Option<u32>,
    pub chunk_overlap: Option<u32>,
    pub retrieval_strategy: Option<String>,
    pub similarity_top_k: Option<u32>,
    pub section: Option<String>,
    #[serde(default)]
    pub reindex: bool,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct CreatePromptRequest {
    pub prompt_key: String,
    #[serde(default)]
    pub prompt: String,
    pub profile_manager: Option<Uuid>,
    pub sequence_number: Option<u32>,
    #[serde(default)]
    pub prompt_type: PromptType,
    pub output_type: Option<String>,
    #[serde(default)]
    pub enforce_type: String,
    pub active: Option<bool>,
    #[serde(default)]
    pub required: bool,
    pub evaluate: Option<bool>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct IndexDocumentRequest {
    pub document_id: Uuid,
    pub run_id: Option<String>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct FetchResponseRequest {
    pub document_id: Uuid,
    /// Prompt to run
    pub id: Uuid,
    pub run_id: Option<String>,
    pub profile_manager: Option<Uuid>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct SinglePassExtractionRequest {
    pub document_id: Uuid,
    pub run_id: Option<String>,
}

#[derive(Serialize, Debug, Clone)]
pub struct SharedUsersResponse {
    pub tool_id: Uuid,
    pub created_by: String,
    pub shared_users: Vec<String>,
    pub shared_to_org: bool,
}

impl From<&CustomTool> for SharedUsersResponse {
    fn from(tool: &CustomTool) -> Self {
        Self {
            tool_id: tool.tool_id,
            created_by: tool.created_by.clone(),
            shared_users: tool.shared_users.clone(),
            shared_to_org: tool.shared_to_org,
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
pub struct FileInfoQuery {
    pub document_id: Uuid,
    #[serde(default = "default_view_type")]
    pub view_type: FileViewType,
}

fn default_view_type() -> FileViewType {
    FileViewType::Original
}

#[derive(Deserialize, Debug, Clone)]
pub struct DeleteFileRequest {
    pub document_id: Uuid,
}

#[derive(Serialize, Debug, Clone)]
pub struct DocumentDTO {
    pub document_id: Uuid,
    pub document_name: String,
    pub tool: Uuid,
}

impl From<DocumentManager> for DocumentDTO {
    fn from(document: DocumentManager) -> Self {
        Self {
            document_id: document.document_id,
            document_name: document.document_name,
            tool: document.tool_id,
        }
    }
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct ExportToolRequest {
    #[serde(default)]
    pub is_shared_with_org: bool,
    #[serde(default)]
    pub user_id: Vec<String>,
    #[serde(default)]
    pub force_export: bool,
}

#[derive(Serialize, Debug, Clone)]
pub struct RegistryInfoDTO {
    pub tool_id: Uuid,
    pub custom_tool_id: Uuid,
    pub name: String,
    pub description: String,
    pub shared_to_org: bool,
    pub shared_users: Vec<String>,
    pub exported_at: chrono::DateTime<chrono::Utc>,
}

impl From<RegistryExport> for RegistryInfoDTO {
    fn from(export: RegistryExport) -> Self {
        Self {
            tool_id: export.registry_id,
            custom_tool_id: export.custom_tool_id,
            name: export.name,
            description: export.description,
            shared_to_org: export.shared_to_org,
            shared_users: export.shared_users,
            exported_at: export.modified_at,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ImportProjectResponse {
    pub message: String,
    pub tool_id: Uuid,
    pub needs_adapter_config: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}
