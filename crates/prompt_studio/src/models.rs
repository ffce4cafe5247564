use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

/// A prompt studio project
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CustomTool {
    pub tool_id: Uuid,
    pub tool_name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub icon: String,
    #[serde(default)]
    pub output: String,
    pub organization_id: String,
    pub created_by: String,
    pub modified_by: String,
    #[serde(default)]
    pub shared_users: Vec<String>,
    #[serde(default)]
    pub shared_to_org: bool,
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
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
}

impl CustomTool {
    pub fn new(tool_name: impl Into<String>, organization_id: &str, user_id: &str) -> Self {
        let now = Utc::now();
        Self {
            tool_id: Uuid::new_v4(),
            tool_name: tool_name.into(),
            description: String::new(),
            author: String::new(),
            icon: String::new(),
            output: String::new(),
            organization_id: organization_id.to_string(),
            created_by: user_id.to_string(),
            modified_by: user_id.to_string(),
            shared_users: Vec::new(),
            shared_to_org: false,
            preamble: String::new(),
            postamble: String::new(),
            summarize_prompt: String::new(),
            summarize_context: false,
            summarize_as_source: false,
            enable_challenge: false,
            enable_highlight: false,
            single_pass_extraction_mode: false,
            prompt_grammer: BTreeMap::new(),
            created_at: now,
            modified_at: now,
        }
    }

    pub fn is_owner(&self, user_id: &str) -> bool {
        self.created_by == user_id
    }

    /// Owner, explicitly shared user, or anyone in the organization when the
    /// tool is shared with it.
    pub fn is_accessible_by(&self, user_id: &str, organization_id: &str) -> bool {
        if self.organization_id != organization_id {
            return false;
        }
        self.is_owner(user_id)
            || self.shared_users.iter().any(|u| u == user_id)
            || self.shared_to_org
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AdapterType {
    Llm,
    Embedding,
    VectorDb,
    X2text,
}

impl AdapterType {
    pub const ALL: [AdapterType; 4] = [
        AdapterType::Llm,
        AdapterType::VectorDb,
        AdapterType::Embedding,
        AdapterType::X2text,
    ];

    pub fn display_name(&self) -> &'static str {
        match self {
            AdapterType::Llm => "LLM",
            AdapterType::Embedding => "Embedding",
            AdapterType::VectorDb => "Vector DB",
            AdapterType::X2text => "Text Extractor",
        }
    }
}

impl fmt::Display for AdapterType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// An adapter configured for an organization (LLM, vector DB, ...)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Adapter {
    pub adapter_id: Uuid,
    pub adapter_name: String,
    pub adapter_type: AdapterType,
    pub organization_id: String,
    #[serde(default)]
    pub is_default: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProfileManager {
    pub profile_id: Uuid,
    pub profile_name: String,
    pub tool_id: Uuid,
    pub llm: Option<Uuid>,
    pub vector_store: Option<Uuid>,
    pub embedding_model: Option<Uuid>,
    pub x2text: Option<Uuid>,
    pub chunk_size: u32,
    pub chunk_overlap: u32,
    pub retrieval_strategy: String,
    pub similarity_top_k: u32,
    pub section: String,
    #[serde(default)]
    pub reindex: bool,
    #[serde(default)]
    pub is_default: bool,
    #[serde(default)]
    pub is_summarize_llm: bool,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
}

impl ProfileManager {
    pub fn new(tool_id: Uuid, profile_name: impl Into<String>, user_id: &str) -> Self {
        let now = Utc::now();
        Self {
            profile_id: Uuid::new_v4(),
            profile_name: profile_name.into(),
            tool_id,
            llm: None,
            vector_store: None,
            embedding_model: None,
            x2text: None,
            chunk_size: 1024,
            chunk_overlap: 128,
            retrieval_strategy: "simple".to_string(),
            similarity_top_k: 3,
            section: "Default".to_string(),
            reindex: false,
            is_default: false,
            is_summarize_llm: false,
            created_by: user_id.to_string(),
            created_at: now,
            modified_at: now,
        }
    }

    pub fn adapter(&self, adapter_type: AdapterType) -> Option<Uuid> {
        match adapter_type {
            AdapterType::Llm => self.llm,
            AdapterType::Embedding => self.embedding_model,
            AdapterType::VectorDb => self.vector_store,
            AdapterType::X2text => self.x2text,
        }
    }

    pub fn set_adapter(&mut self, adapter_type: AdapterType, adapter_id: Option<Uuid>) {
        match adapter_type {
            AdapterType::Llm => self.llm = adapter_id,
            AdapterType::Embedding => self.embedding_model = adapter_id,
            AdapterType::VectorDb => self.vector_store = adapter_id,
            AdapterType::X2text => self.x2text = adapter_id,
        }
    }

    pub fn missing_adapters(&self) -> Vec<AdapterType> {
        AdapterType::ALL
            .into_iter()
            .filter(|t| self.adapter(*t).is_none())
            .collect()
    }
}

/// Mutually exclusive per-tool profile flags
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileFlag {
    Default,
    SummarizeLlm,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PromptType {
    #[default]
    Prompt,
    Notes,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolStudioPrompt {
    pub prompt_id: Uuid,
    pub prompt_key: String,
    #[serde(default)]
    pub prompt: String,
    pub tool_id: Uuid,
    pub profile_manager: Option<Uuid>,
    #[serde(default)]
    pub sequence_number: u32,
    #[serde(default)]
    pub prompt_type: PromptType,
    #[serde(default = "default_output_type")]
    pub output_type: String,
    #[serde(default)]
    pub enforce_type: String,
    #[serde(default = "default_true")]
    pub active: bool,
    #[serde(default)]
    pub required: bool,
    #[serde(default = "default_true")]
    pub evaluate: bool,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
}

pub(crate) fn default_output_type() -> String {
    "text".to_string()
}

pub(crate) const fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DocumentManager {
    pub document_id: Uuid,
    pub document_name: String,
    pub tool_id: Uuid,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IndexManager {
    pub index_manager_id: Uuid,
    pub document_id: Uuid,
    pub profile_id: Uuid,
    pub raw_index_id: Option<String>,
    pub summarize_index_id: Option<String>,
    #[serde(default)]
    pub index_ids_history: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PromptOutput {
    pub prompt_output_id: Uuid,
    pub prompt_id: Uuid,
    pub tool_id: Uuid,
    pub document_id: Uuid,
    pub profile_id: Option<Uuid>,
    pub run_id: String,
    pub output: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// Published snapshot of a tool that workflows can run
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RegistryExport {
    pub registry_id: Uuid,
    pub custom_tool_id: Uuid,
    pub name: String,
    pub description: String,
    pub tool_metadata: serde_json::Value,
    pub organization_id: String,
    pub shared_to_org: bool,
    pub shared_users: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
}

/// A workflow step running an exported tool
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolInstance {
    pub instance_id: Uuid,
    pub workflow_id: Uuid,
    pub tool_id: Uuid,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_visibility() {
        let mut tool = CustomTool::new("invoices", "org-1", "alice");
        assert!(tool.is_accessible_by("alice", "org-1"));
        assert!(!tool.is_accessible_by("bob", "org-1"));
        assert!(!tool.is_accessible_by("alice", "org-2"));

        tool.shared_users.push("bob".to_string());
        assert!(tool.is_accessible_by("bob", "org-1"));

        tool.shared_to_org = true;
        assert!(tool.is_accessible_by("carol", "org-1"));
        assert!(!tool.is_accessible_by("carol", "org-2"));
    }

    #[test]
    fn test_missing_adapters() {
        let mut profile = ProfileManager::new(Uuid::new_v4(), "p", "alice");
        assert_eq!(profile.missing_adapters().len(), 4);

        profile.set_adapter(AdapterType::Llm, Some(Uuid::new_v4()));
        profile.set_adapter(AdapterType::X2text, Some(Uuid::new_v4()));
        assert_eq!(
            profile.missing_adapters(),
            vec![AdapterType::VectorDb, AdapterType::Embedding]
        );
    }

    #[test]
    fn test_adapter_type_wire_format() {
        let json = serde_json::to_string(&AdapterType::VectorDb).unwrap();
        assert_eq!(json, "\"VECTOR_DB\"");
        let parsed: AdapterType = serde_json::from_str("\"X2TEXT\"").unwrap();
        assert_eq!(parsed, AdapterType::X2text);
    }
}
