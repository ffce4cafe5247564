//! Project export to a portable JSON document and import back into a new
//! tool, remapping adapters to the importing organization.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use uuid::Uuid;

use crate::dto::ImportProjectResponse;
use crate::error::{AppError, Result};
use crate::middleware::UserContext;
use crate::models::{
    default_output_type, default_true, Adapter, AdapterType, CustomTool, ProfileFlag,
    ProfileManager, PromptType, ToolStudioPrompt,
};
use crate::services::tool_service::{accessible_tool, PromptStudioService};
use crate::storage::EntityStore;

pub const EXPORT_VERSION: &str = "1.0.0";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolMetadata {
    pub tool_name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub icon: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ToolSettings {
    pub preamble: String,
    pub postamble: String,
    pub summarize_prompt: String,
    pub summarize_context: bool,
    pub summarize_as_source: bool,
    pub enable_challenge: bool,
    pub enable_highlight: bool,
    pub single_pass_extraction_mode: bool,
    pub prompt_grammer: BTreeMap<String, Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AdapterRef {
    pub adapter_id: Uuid,
    pub adapter_name: String,
    pub adapter_type: AdapterType,
}

impl From<&Adapter> for AdapterRef {
    fn from(adapter: &Adapter) -> Self {
        Self {
            adapter_id: adapter.adapter_id,
            adapter_name: adapter.adapter_name.clone(),
            adapter_type: adapter.adapter_type,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExportedProfile {
    pub profile_name: String,
    #[serde(default)]
    pub llm: Option<AdapterRef>,
    #[serde(default)]
    pub vector_store: Option<AdapterRef>,
    #[serde(default)]
    pub embedding_model: Option<AdapterRef>,
    #[serde(default)]
    pub x2text: Option<AdapterRef>,
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
}

impl ExportedProfile {
    fn adapter_ref(&self, adapter_type: AdapterType) -> Option<&AdapterRef> {
        match adapter_type {
            AdapterType::Llm => self.llm.as_ref(),
            AdapterType::Embedding => self.embedding_model.as_ref(),
            AdapterType::VectorDb => self.vector_store.as_ref(),
            AdapterType::X2text => self.x2text.as_ref(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExportedPrompt {
    pub prompt_key: String,
    #[serde(default)]
    pub prompt: String,
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
    #[serde(default)]
    pub profile_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExportMetadata {
    pub exported_at: DateTime<Utc>,
    pub exported_by: String,
    pub source_tool_id: Uuid,
    pub version: String,
}

/// The downloadable project document
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProjectExport {
    pub tool_metadata: ToolMetadata,
    #[serde(default)]
    pub tool_settings: ToolSettings,
    #[serde(default)]
    pub default_profile_settings: Option<ExportedProfile>,
    #[serde(default)]
    pub profiles: Vec<ExportedProfile>,
    pub prompts: Vec<ExportedPrompt>,
    #[serde(default)]
    pub export_metadata: Option<ExportMetadata>,
}

impl ProjectExport {
    /// Parse an uploaded project file
    pub fn from_slice(data: &[u8]) -> Result<Self> {
        let export: ProjectExport = serde_json::from_slice(data)
            .map_err(|e| AppError::Validation(format!("Invalid project file: {e}")))?;
        if export.tool_metadata.tool_name.trim().is_empty() {
            return Err(AppError::Validation(
                "Invalid project file: tool_metadata.tool_name is empty".to_string(),
            ));
        }
        Ok(export)
    }
}

/// Adapters picked by the importing user, one optional id per kind
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AdapterSelection {
    pub llm: Option<Uuid>,
    pub vector_db: Option<Uuid>,
    pub embedding: Option<Uuid>,
    pub x2text: Option<Uuid>,
}

impl AdapterSelection {
    pub fn get(&self, adapter_type: AdapterType) -> Option<Uuid> {
        match adapter_type {
            AdapterType::Llm => self.llm,
            AdapterType::VectorDb => self.vector_db,
            AdapterType::Embedding => self.embedding,
            AdapterType::X2text => self.x2text,
        }
    }

    pub fn set(&mut self, adapter_type: AdapterType, adapter_id: Option<Uuid>) {
        match adapter_type {
            AdapterType::Llm => self.llm = adapter_id,
            AdapterType::VectorDb => self.vector_db = adapter_id,
            AdapterType::Embedding => self.embedding = adapter_id,
            AdapterType::X2text => self.x2text = adapter_id,
        }
    }
}

/// A project export together with its download file name
pub struct ExportedProject {
    pub file_name: String,
    pub document: ProjectExport,
}

pub struct ProjectTransferService {
    store: Arc<dyn EntityStore>,
    tools: Arc<PromptStudioService>,
}

impl ProjectTransferService {
    pub fn new(store: Arc<dyn EntityStore>, tools: Arc<PromptStudioService>) -> Self {
        Self { store, tools }
    }

    pub async fn export_project(
        &self,
        ctx: &UserContext,
        tool_id: Uuid,
    ) -> Result<ExportedProject> {
        let tool = accessible_tool(self.store.as_ref(), ctx, tool_id).await?;
        let profiles = self.store.list_profiles(tool_id).await?;
        let prompts = self.store.list_prompts(tool_id).await?;
        let adapters: HashMap<Uuid, Adapter> = self
            .store
            .list_adapters(&tool.organization_id)
            .await?
            .into_iter()
            .map(|a| (a.adapter_id, a))
            .collect();

        let export_profile = |profile: &ProfileManager| {
            let adapter = |t: AdapterType| {
                profile
                    .adapter(t)
                    .and_then(|id| adapters.get(&id))
                    .map(AdapterRef::from)
            };
            ExportedProfile {
                profile_name: profile.profile_name.clone(),
                llm: adapter(AdapterType::Llm),
                vector_store: adapter(AdapterType::VectorDb),
                embedding_model: adapter(AdapterType::Embedding),
                x2text: adapter(AdapterType::X2text),
                chunk_size: profile.chunk_size,
                chunk_overlap: profile.chunk_overlap,
                retrieval_strategy: profile.retrieval_strategy.clone(),
                similarity_top_k: profile.similarity_top_k,
                section: profile.section.clone(),
                reindex: profile.reindex,
                is_default: profile.is_default,
                is_summarize_llm: profile.is_summarize_llm,
            }
        };
        let profile_names: HashMap<Uuid, &str> = profiles
            .iter()
            .map(|p| (p.profile_id, p.profile_name.as_str()))
            .collect();

        let now = Utc::now();
        let document = ProjectExport {
            tool_metadata: ToolMetadata {
                tool_name: tool.tool_name.clone(),
                description: tool.description.clone(),
                author: tool.author.clone(),
                icon: tool.icon.clone(),
            },
            tool_settings: ToolSettings {
                preamble: tool.preamble.clone(),
                postamble: tool.postamble.clone(),
                summarize_prompt: tool.summarize_prompt.clone(),
                summarize_context: tool.summarize_context,
                summarize_as_source: tool.summarize_as_source,
                enable_challenge: tool.enable_challenge,
                enable_highlight: tool.enable_highlight,
                single_pass_extraction_mode: tool.single_pass_extraction_mode,
                prompt_grammer: tool.prompt_grammer.clone(),
            },
            default_profile_settings: profiles.iter().find(|p| p.is_default).map(export_profile),
            profiles: profiles.iter().map(export_profile).collect(),
            prompts: prompts
                .iter()
                .map(|p| ExportedPrompt {
                    prompt_key: p.prompt_key.clone(),
                    prompt: p.prompt.clone(),
                    sequence_number: p.sequence_number,
                    prompt_type: p.prompt_type,
                    output_type: p.output_type.clone(),
                    enforce_type: p.enforce_type.clone(),
                    active: p.active,
                    required: p.required,
                    evaluate: p.evaluate,
                    profile_name: p
                        .profile_manager
                        .and_then(|id| profile_names.get(&id))
                        .map(|name| name.to_string()),
                })
                .collect(),
            export_metadata: Some(ExportMetadata {
                exported_at: now,
                exported_by: ctx.user_id.clone(),
                source_tool_id: tool_id,
                version: EXPORT_VERSION.to_string(),
            }),
        };

        Ok(ExportedProject {
            file_name: format!("{}_{}.json", tool.tool_name, now.format("%Y%m%d_%H%M%S")),
            document,
        })
    }

    /// First of `name`, `name (1)`, `name (2)`, ... not taken in the organization
    pub async fn unique_tool_name(&self, organization_id: &str, name: &str) -> Result<String> {
        let name = name.trim();
        if !self.store.tool_name_exists(organization_id, name).await? {
            return Ok(name.to_string());
        }
        let mut counter = 1u32;
        loop {
            let candidate = format!("{name} ({counter})");
            if !self.store.tool_name_exists(organization_id, &candidate).await? {
                return Ok(candidate);
            }
            counter += 1;
        }
    }

    pub async fn import_project(
        &self,
        ctx: &UserContext,
        export: ProjectExport,
        selection: AdapterSelection,
    ) -> Result<ImportProjectResponse> {
        let adapters = self.store.list_adapters(&ctx.organization_id).await?;
        let selection = resolve_selection(&adapters, selection)?;

        let tool_name = self
            .unique_tool_name(&ctx.organization_id, &export.tool_metadata.tool_name)
            .await?;
        let tool = self
            .store
            .insert_tool(tool_from_export(ctx, &tool_name, &export))
            .await?;
        tracing::info!(
            tool_id = %tool.tool_id,
            tool_name = %tool_name,
            "Importing project into new tool"
        );

        let populated = self
            .populate_tool(ctx, &tool, &export, &adapters, &selection)
            .await;
        let default_profile = match populated {
            Ok(profile) => profile,
            Err(err) => {
                tracing::error!(
                    tool_id = %tool.tool_id,
                    error = %err,
                    "Project import failed, removing partially imported tool"
                );
                if let Err(cleanup) = self.store.delete_tool(tool.tool_id).await {
                    tracing::error!(
                        tool_id = %tool.tool_id,
                        error = %cleanup,
                        "Failed to remove partially imported tool"
                    );
                }
                return Err(err);
            }
        };

        let missing = default_profile.missing_adapters();
        let warning = (!missing.is_empty()).then(|| {
            let kinds: Vec<&str> = missing.iter().map(|t| t.display_name()).collect();
            format!(
                "Imported project is missing adapter configuration for: {}. \
                 Configure them in the default profile before running prompts.",
                kinds.join(", ")
            )
        });

        Ok(ImportProjectResponse {
            message: format!("Project imported successfully as '{tool_name}'"),
            tool_id: tool.tool_id,
            needs_adapter_config: warning.is_some(),
            warning,
        })
    }

    /// Profiles then prompts; returns the tool's default profile
    async fn populate_tool(
        &self,
        ctx: &UserContext,
        tool: &CustomTool,
        export: &ProjectExport,
        adapters: &[Adapter],
        selection: &AdapterSelection,
    ) -> Result<ProfileManager> {
        let mut exported_profiles = export.profiles.clone();
        if exported_profiles.is_empty() {
            if let Some(settings) = &export.default_profile_settings {
                exported_profiles.push(ExportedProfile {
                    is_default: true,
                    ..settings.clone()
                });
            }
        }

        let mut by_name: HashMap<String, Uuid> = HashMap::new();
        let mut first_id = None;
        let mut default_id = None;
        let mut summarize_id = None;
        for exported in &exported_profiles {
            let mut profile = ProfileManager::new(tool.tool_id, &exported.profile_name, &ctx.user_id);
            for adapter_type in AdapterType::ALL {
                let adapter_id = selection.get(adapter_type).or_else(|| {
                    exported
                        .adapter_ref(adapter_type)
                        .and_then(|r| match_adapter(adapters, r))
                });
                profile.set_adapter(adapter_type, adapter_id);
            }
            profile.chunk_size = exported.chunk_size;
            profile.chunk_overlap = exported.chunk_overlap;
            profile.retrieval_strategy = exported.retrieval_strategy.clone();
            profile.similarity_top_k = exported.similarity_top_k;
            profile.section = exported.section.clone();
            profile.reindex = exported.reindex;

            let profile = self.store.insert_profile(profile).await?;
            let is_exported_default = exported.is_default
                || export
                    .default_profile_settings
                    .as_ref()
                    .is_some_and(|d| d.profile_name == exported.profile_name);
            if is_exported_default && default_id.is_none() {
                default_id = Some(profile.profile_id);
            }
            if exported.is_summarize_llm && summarize_id.is_none() {
                summarize_id = Some(profile.profile_id);
            }
            first_id.get_or_insert(profile.profile_id);
            by_name.insert(profile.profile_name.clone(), profile.profile_id);
        }

        let default_profile = match default_id.or(first_id) {
            Some(profile_id) => {
                self.store
                    .set_exclusive_profile_flag(tool.tool_id, profile_id, ProfileFlag::Default)
                    .await?
            }
            None => {
                let mut profile = self.tools.create_default_profile(&ctx.user_id, tool).await?;
                for adapter_type in AdapterType::ALL {
                    if let Some(adapter_id) = selection.get(adapter_type) {
                        profile.set_adapter(adapter_type, Some(adapter_id));
                    }
                }
                self.store.update_profile(profile).await?
            }
        };
        if let Some(profile_id) = summarize_id {
            self.store
                .set_exclusive_profile_flag(tool.tool_id, profile_id, ProfileFlag::SummarizeLlm)
                .await?;
        }

        let now = Utc::now();
        for (index, exported) in export.prompts.iter().enumerate() {
            let profile_manager = exported
                .profile_name
                .as_ref()
                .and_then(|name| by_name.get(name).copied())
                .unwrap_or(default_profile.profile_id);
            let sequence_number = if exported.sequence_number == 0 {
                index as u32 + 1
            } else {
                exported.sequence_number
            };
            self.store
                .insert_prompt(ToolStudioPrompt {
                    prompt_id: Uuid::new_v4(),
                    prompt_key: exported.prompt_key.clone(),
                    prompt: exported.prompt.clone(),
                    tool_id: tool.tool_id,
                    profile_manager: Some(profile_manager),
                    sequence_number,
                    prompt_type: exported.prompt_type,
                    output_type: exported.output_type.clone(),
                    enforce_type: exported.enforce_type.clone(),
                    active: exported.active,
                    required: exported.required,
                    evaluate: exported.evaluate,
                    created_by: ctx.user_id.clone(),
                    created_at: now,
                    modified_at: now,
                })
                .await?;
        }

        Ok(default_profile)
    }
}

fn tool_from_export(ctx: &UserContext, tool_name: &str, export: &ProjectExport) -> CustomTool {
    let settings = &export.tool_settings;
    let mut tool = CustomTool::new(tool_name, &ctx.organization_id, &ctx.user_id);
    tool.description = export.tool_metadata.description.clone();
    tool.author = export.tool_metadata.author.clone();
    tool.icon = export.tool_metadata.icon.clone();
    tool.preamble = settings.preamble.clone();
    tool.postamble = settings.postamble.clone();
    tool.summarize_prompt = settings.summarize_prompt.clone();
    tool.summarize_context = settings.summarize_context;
    tool.summarize_as_source = settings.summarize_as_source;
    tool.enable_challenge = settings.enable_challenge;
    tool.enable_highlight = settings.enable_highlight;
    tool.single_pass_extraction_mode = settings.single_pass_extraction_mode;
    tool.prompt_grammer = settings.prompt_grammer.clone();
    tool
}

/// Selected ids must name an adapter of the right kind in the organization
fn resolve_selection(adapters: &[Adapter], selection: AdapterSelection) -> Result<AdapterSelection> {
    for adapter_type in AdapterType::ALL {
        let Some(adapter_id) = selection.get(adapter_type) else {
            continue;
        };
        match adapters.iter().find(|a| a.adapter_id == adapter_id) {
            Some(adapter) if adapter.adapter_type == adapter_type => {}
            Some(_) => {
                return Err(AppError::Validation(format!(
                    "Selected adapter '{adapter_id}' is not a {adapter_type} adapter"
                )))
            }
            None => {
                return Err(AppError::Validation(format!(
                    "Selected {adapter_type} adapter '{adapter_id}' not found"
                )))
            }
        }
    }
    Ok(selection)
}

/// Same adapter by id, else one with the same name and kind
fn match_adapter(adapters: &[Adapter], reference: &AdapterRef) -> Option<Uuid> {
    adapters
        .iter()
        .find(|a| a.adapter_id == reference.adapter_id && a.adapter_type == reference.adapter_type)
        .or_else(|| {
            adapters.iter().find(|a| {
                a.adapter_name == reference.adapter_name && a.adapter_type == reference.adapter_type
            })
        })
        .map(|a| a.adapter_id)
}
