use chrono::Utc;
use std::collections::BTreeSet;
use std::sync::Arc;
use uuid::Uuid;

use crate::dto::{
    CreateProfileRequest, CreatePromptRequest, CreateToolRequest, CustomToolDTO,
    SharedUsersResponse, UpdateToolRequest,
};
use crate::error::{AppError, Result};
use crate::middleware::UserContext;
use crate::models::{
    AdapterType, CustomTool, ProfileFlag, ProfileManager, ToolStudioPrompt,
};
use crate::services::file_service::PromptStudioFileService;
use crate::storage::EntityStore;

pub const DEFAULT_PROFILE_NAME: &str = "sample profile";

const SELECT_CHOICES: &str = include_str!("../static/select_choices.json");

/// Load a tool the caller may see. Tools outside the caller's visibility are
/// reported exactly like missing ones.
pub async fn accessible_tool(
    store: &dyn EntityStore,
    ctx: &UserContext,
    tool_id: Uuid,
) -> Result<CustomTool> {
    store
        .get_tool(tool_id)
        .await?
        .filter(|tool| tool.is_accessible_by(&ctx.user_id, &ctx.organization_id))
        .ok_or_else(|| AppError::NotFound(format!("Tool '{tool_id}'")))
}

/// Make sure every adapter referenced by a profile exists in the caller's
/// organization and has the expected kind.
pub async fn validate_profile_adapters(
    store: &dyn EntityStore,
    organization_id: &str,
    profile: &ProfileManager,
) -> Result<()> {
    for adapter_type in AdapterType::ALL {
        let Some(adapter_id) = profile.adapter(adapter_type) else {
            continue;
        };
        let adapter = store
            .get_adapter(adapter_id)
            .await?
            .filter(|a| a.organization_id == organization_id);
        match adapter {
            Some(adapter) if adapter.adapter_type == adapter_type => {}
            Some(adapter) => {
                return Err(AppError::Validation(format!(
                    "Adapter '{}' is not a {} adapter",
                    adapter.adapter_name, adapter_type
                )))
            }
            None => {
                return Err(AppError::Validation(format!(
                    "{adapter_type} adapter '{adapter_id}' does not exist"
                )))
            }
        }
    }
    Ok(())
}

/// Tool lifecycle, profiles and prompts
pub struct PromptStudioService {
    store: Arc<dyn EntityStore>,
    files: PromptStudioFileService,
    max_profile_count: usize,
}

impl PromptStudioService {
    pub fn new(
        store: Arc<dyn EntityStore>,
        files: PromptStudioFileService,
        max_profile_count: usize,
    ) -> Self {
        Self {
            store,
            files,
            max_profile_count,
        }
    }

    pub fn max_profile_count(&self) -> usize {
        self.max_profile_count
    }

    pub async fn tool_dto(&self, tool: CustomTool) -> Result<CustomToolDTO> {
        let profiles = self.store.list_profiles(tool.tool_id).await?;
        Ok(CustomToolDTO {
            default_profile: profiles.iter().find(|p| p.is_default).map(|p| p.profile_id),
            summarize_llm_profile: profiles
                .iter()
                .find(|p| p.is_summarize_llm)
                .map(|p| p.profile_id),
            tool,
        })
    }

    pub async fn list_tools(&self, ctx: &UserContext) -> Result<Vec<CustomToolDTO>> {
        let mut tools = self
            .store
            .list_tools_for_user(&ctx.user_id, &ctx.organization_id)
            .await?;
        tools.sort_by(|a, b| b.modified_at.cmp(&a.modified_at));

        let mut dtos = Vec::with_capacity(tools.len());
        for tool in tools {
            dtos.push(self.tool_dto(tool).await?);
        }
        Ok(dtos)
    }

    pub async fn get_tool(&self, ctx: &UserContext, tool_id: Uuid) -> Result<CustomToolDTO> {
        let tool = accessible_tool(self.store.as_ref(), ctx, tool_id).await?;
        self.tool_dto(tool).await
    }

    /// Create a tool and its default profile
    pub async fn create_tool(
        &self,
        ctx: &UserContext,
        request: CreateToolRequest,
    ) -> Result<CustomToolDTO> {
        let tool_name = request.tool_name.trim();
        if tool_name.is_empty() {
            return Err(AppError::Validation("tool_name may not be blank".to_string()));
        }

        let mut tool = CustomTool::new(tool_name, &ctx.organization_id, &ctx.user_id);
        tool.description = request.description;
        tool.author = request.author;
        tool.icon = request.icon;
        tool.output = request.output;
        tool.preamble = request.preamble;
        tool.postamble = request.postamble;
        tool.summarize_prompt = request.summarize_prompt;
        tool.summarize_context = request.summarize_context;
        tool.summarize_as_source = request.summarize_as_source;
        tool.enable_challenge = request.enable_challenge;
        tool.enable_highlight = request.enable_highlight;
        tool.single_pass_extraction_mode = request.single_pass_extraction_mode;
        tool.prompt_grammer = request.prompt_grammer;
        tool.shared_users = request.shared_users;
        tool.shared_to_org = request.shared_to_org;

        let tool = self.store.insert_tool(tool).await?;
        self.create_default_profile(&ctx.user_id, &tool).await?;

        tracing::info!(
            tool_id = %tool.tool_id,
            tool_name = %tool.tool_name,
            "Created prompt studio tool"
        );
        self.tool_dto(tool).await
    }

    /// Default profile wired to the organization's default adapters
    pub async fn create_default_profile(
        &self,
        user_id: &str,
        tool: &CustomTool,
    ) -> Result<ProfileManager> {
        let adapters = self.store.list_adapters(&tool.organization_id).await?;
        let mut profile = ProfileManager::new(tool.tool_id, DEFAULT_PROFILE_NAME, user_id);
        for adapter_type in AdapterType::ALL {
            let default = adapters
                .iter()
                .find(|a| a.adapter_type == adapter_type && a.is_default)
                .map(|a| a.adapter_id);
            profile.set_adapter(adapter_type, default);
        }
        profile.is_default = true;

        let profile = self.store.insert_profile(profile).await?;
        self.store
            .set_exclusive_profile_flag(tool.tool_id, profile.profile_id, ProfileFlag::Default)
            .await
    }

    pub async fn update_tool(
        &self,
        ctx: &UserContext,
        tool_id: Uuid,
        request: UpdateToolRequest,
    ) -> Result<CustomToolDTO> {
        let mut tool = accessible_tool(self.store.as_ref(), ctx, tool_id).await?;

        // Name checks run before the summarize switch is committed
        if let Some(name) = request.tool_name {
            let name = name.trim().to_string();
            if name.is_empty() {
                return Err(AppError::Validation("tool_name may not be blank".to_string()));
            }
            if name != tool.tool_name
                && self
                    .store
                    .tool_name_exists(&tool.organization_id, &name)
                    .await?
            {
                return Err(AppError::DuplicateData(format!(
                    "Tool with name '{name}' already exists, please use a different name"
                )));
            }
            tool.tool_name = name;
        }

        if let Some(profile_id) = request.summarize_llm_profile {
            self.store
                .set_exclusive_profile_flag(tool_id, profile_id, ProfileFlag::SummarizeLlm)
                .await?;
        }
        if let Some(v) = request.description {
            tool.description = v;
        }
        if let Some(v) = request.author {
            tool.author = v;
        }
        if let Some(v) = request.icon {
            tool.icon = v;
        }
        if let Some(v) = request.output {
            tool.output = v;
        }
        if let Some(v) = request.preamble {
            tool.preamble = v;
        }
        if let Some(v) = request.postamble {
            tool.postamble = v;
        }
        if let Some(v) = request.summarize_prompt {
            tool.summarize_prompt = v;
        }
        if let Some(v) = request.summarize_context {
            tool.summarize_context = v;
        }
        if let Some(v) = request.summarize_as_source {
            tool.summarize_as_source = v;
        }
        if let Some(v) = request.enable_challenge {
            tool.enable_challenge = v;
        }
        if let Some(v) = request.enable_highlight {
            tool.enable_highlight = v;
        }
        if let Some(v) = request.single_pass_extraction_mode {
            tool.single_pass_extraction_mode = v;
        }
        if let Some(v) = request.prompt_grammer {
            tool.prompt_grammer = v;
        }
        if let Some(v) = request.shared_users {
            tool.shared_users = v;
        }
        if let Some(v) = request.shared_to_org {
            tool.shared_to_org = v;
        }
        tool.modified_by = ctx.user_id.clone();
        tool.modified_at = Utc::now();

        let tool = self.store.update_tool(tool).await?;
        self.tool_dto(tool).await
    }

    /// Owner only; refused while a workflow runs the tool's registry export
    pub async fn delete_tool(&self, ctx: &UserContext, tool_id: Uuid) -> Result<()> {
        let tool = accessible_tool(self.store.as_ref(), ctx, tool_id).await?;
        if !tool.is_owner(&ctx.user_id) {
            return Err(AppError::PermissionDenied);
        }

        let dependent_workflows = self.dependent_workflows(tool_id).await?;
        if !dependent_workflows.is_empty() {
            tracing::info!(
                tool_id = %tool_id,
                workflows = ?dependent_workflows,
                "Cannot destroy custom tool, depended on by workflows"
            );
            return Err(AppError::ToolDeleteBlocked);
        }

        self.store.delete_tool(tool_id).await?;
        self.files
            .delete_tool_files(&tool.organization_id, &tool.created_by, tool_id)
            .await?;

        tracing::info!(tool_id = %tool_id, "Deleted prompt studio tool");
        Ok(())
    }

    /// Workflows running the exported registry tool, if the tool was exported
    pub async fn dependent_workflows(&self, tool_id: Uuid) -> Result<BTreeSet<Uuid>> {
        let Some(export) = self.store.registry_for_tool(tool_id).await? else {
            return Ok(BTreeSet::new());
        };
        let instances = self
            .store
            .tool_instances_for_registry(export.registry_id)
            .await?;
        Ok(instances.into_iter().map(|i| i.workflow_id).collect())
    }

    pub fn select_choices(&self) -> Result<serde_json::Value> {
        Ok(serde_json::from_str(SELECT_CHOICES)?)
    }

    pub async fn list_profiles(
        &self,
        ctx: &UserContext,
        tool_id: Uuid,
    ) -> Result<Vec<ProfileManager>> {
        accessible_tool(self.store.as_ref(), ctx, tool_id).await?;
        self.store.list_profiles(tool_id).await
    }

    pub async fn make_profile_default(
        &self,
        ctx: &UserContext,
        tool_id: Uuid,
        profile_id: Uuid,
    ) -> Result<ProfileManager> {
        accessible_tool(self.store.as_ref(), ctx, tool_id).await?;
        self.store
            .set_exclusive_profile_flag(tool_id, profile_id, ProfileFlag::Default)
            .await
    }

    pub async fn create_profile(
        &self,
        ctx: &UserContext,
        tool_id: Uuid,
        request: CreateProfileRequest,
    ) -> Result<ProfileManager> {
        let tool = accessible_tool(self.store.as_ref(), ctx, tool_id).await?;
        let profile_name = request.profile_name.trim();
        if profile_name.is_empty() {
            return Err(AppError::Validation(
                "profile_name may not be blank".to_string(),
            ));
        }

        let profile_count = self.store.count_profiles(tool_id).await?;
        if profile_count >= self.max_profile_count {
            return Err(AppError::MaxProfilesReached(self.max_profile_count));
        }

        let mut profile = ProfileManager::new(tool_id, profile_name, &ctx.user_id);
        profile.llm = request.llm;
        profile.vector_store = request.vector_store;
        profile.embedding_model = request.embedding_model;
        profile.x2text = request.x2text;
        if let Some(v) = request.chunk_size {
            profile.chunk_size = v;
        }
        if let Some(v) = request.chunk_overlap {
            profile.chunk_overlap = v;
        }
        if let Some(v) = request.retrieval_strategy {
            profile.retrieval_strategy = v;
        }
        if let Some(v) = request.similarity_top_k {
            profile.similarity_top_k = v;
        }
        if let Some(v) = request.section {
            profile.section = v;
        }
        profile.reindex = request.reindex;
        validate_profile_adapters(self.store.as_ref(), &tool.organization_id, &profile).await?;

        let mut profile = self.store.insert_profile(profile).await?;

        if profile_count == 0 {
            let reassigned = self
                .store
                .assign_prompts_to_profile(tool_id, profile.profile_id)
                .await?;
            profile = self
                .store
                .set_exclusive_profile_flag(tool_id, profile.profile_id, ProfileFlag::Default)
                .await?;
            tracing::info!(
                tool_id = %tool_id,
                profile_id = %profile.profile_id,
                reassigned,
                "First profile of tool assigned to existing prompts"
            );
        }

        Ok(profile)
    }

    pub async fn create_prompt(
        &self,
        ctx: &UserContext,
        tool_id: Uuid,
        request: CreatePromptRequest,
    ) -> Result<ToolStudioPrompt> {
        accessible_tool(self.store.as_ref(), ctx, tool_id).await?;
        let prompt_key = request.prompt_key.trim();
        if prompt_key.is_empty() {
            return Err(AppError::Validation("prompt_key may not be blank".to_string()));
        }

        let profiles = self.store.list_profiles(tool_id).await?;
        let profile_manager = match request.profile_manager {
            Some(profile_id) => {
                if !profiles.iter().any(|p| p.profile_id == profile_id) {
                    return Err(AppError::Validation(format!(
                        "Profile '{profile_id}' does not belong to this tool"
                    )));
                }
                Some(profile_id)
            }
            None => profiles.iter().find(|p| p.is_default).map(|p| p.profile_id),
        };

        let sequence_number = match request.sequence_number {
            Some(n) => n,
            None => self.store.list_prompts(tool_id).await?.len() as u32 + 1,
        };

        let now = Utc::now();
        let prompt = ToolStudioPrompt {
            prompt_id: Uuid::new_v4(),
            prompt_key: prompt_key.to_string(),
            prompt: request.prompt,
            tool_id,
            profile_manager,
            sequence_number,
            prompt_type: request.prompt_type,
            output_type: request
                .output_type
                .unwrap_or_else(crate::models::default_output_type),
            enforce_type: request.enforce_type,
            active: request.active.unwrap_or(true),
            required: request.required,
            evaluate: request.evaluate.unwrap_or(true),
            created_by: ctx.user_id.clone(),
            created_at: now,
            modified_at: now,
        };
        self.store.insert_prompt(prompt).await
    }

    pub async fn shared_users(
        &self,
        ctx: &UserContext,
        tool_id: Uuid,
    ) -> Result<SharedUsersResponse> {
        let tool = accessible_tool(self.store.as_ref(), ctx, tool_id).await?;
        Ok(SharedUsersResponse::from(&tool))
    }
}
