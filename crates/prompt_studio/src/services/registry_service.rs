use chrono::Utc;
use serde_json::json;
use std::collections::BTreeSet;
use std::sync::Arc;
use uuid::Uuid;

use crate::dto::{ExportToolRequest, RegistryInfoDTO};
use crate::error::{AppError, Result};
use crate::middleware::UserContext;
use crate::models::{CustomTool, PromptType, RegistryExport, ToolStudioPrompt};
use crate::services::prompt_engine::ProfileSettings;
use crate::services::tool_service::accessible_tool;
use crate::storage::EntityStore;

/// Publishes tools to the registry so workflows can run them
pub struct RegistryService {
    store: Arc<dyn EntityStore>,
}

impl RegistryService {
    pub fn new(store: Arc<dyn EntityStore>) -> Self {
        Self { store }
    }

    pub async fn export_tool(
        &self,
        ctx: &UserContext,
        tool_id: Uuid,
        request: ExportToolRequest,
    ) -> Result<RegistryExport> {
        let tool = accessible_tool(self.store.as_ref(), ctx, tool_id).await?;

        let prompts: Vec<ToolStudioPrompt> = self
            .store
            .list_prompts(tool_id)
            .await?
            .into_iter()
            .filter(|p| p.active && p.prompt_type == PromptType::Prompt)
            .collect();
        if prompts.is_empty() {
            return Err(AppError::ToolExport(
                "Cannot export tool. Prompt(s) are empty or inactive".to_string(),
            ));
        }

        if !request.force_export {
            let ran: BTreeSet<Uuid> = self
                .store
                .list_prompt_outputs(tool_id)
                .await?
                .into_iter()
                .map(|o| o.prompt_id)
                .collect();
            let never_run: Vec<&str> = prompts
                .iter()
                .filter(|p| !ran.contains(&p.prompt_id))
                .map(|p| p.prompt_key.as_str())
                .collect();
            if !never_run.is_empty() {
                return Err(AppError::ToolExport(format!(
                    "Prompt(s) {} have not been run. Run them or export with force_export",
                    never_run.join(", ")
                )));
            }
        }

        let tool_metadata = self.frozen_metadata(&tool, &prompts).await?;
        let mut shared_users: Vec<String> = request
            .user_id
            .into_iter()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        if !shared_users.contains(&tool.created_by) {
            shared_users.push(tool.created_by.clone());
        }

        let now = Utc::now();
        let export = match self.store.registry_for_tool(tool_id).await? {
            Some(existing) => RegistryExport {
                name: tool.tool_name.clone(),
                description: tool.description.clone(),
                tool_metadata,
                shared_to_org: request.is_shared_with_org,
                shared_users,
                modified_at: now,
                ..existing
            },
            None => RegistryExport {
                registry_id: Uuid::new_v4(),
                custom_tool_id: tool_id,
                name: tool.tool_name.clone(),
                description: tool.description.clone(),
                tool_metadata,
                organization_id: tool.organization_id.clone(),
                shared_to_org: request.is_shared_with_org,
                shared_users,
                created_at: now,
                modified_at: now,
            },
        };

        let export = self.store.upsert_registry(export).await?;
        tracing::info!(
            tool_id = %tool_id,
            registry_id = %export.registry_id,
            force_export = request.force_export,
            "Exported tool to registry"
        );
        Ok(export)
    }

    /// Registry summary, `None` when the tool was never exported
    pub async fn export_tool_info(
        &self,
        ctx: &UserContext,
        tool_id: Uuid,
    ) -> Result<Option<RegistryInfoDTO>> {
        accessible_tool(self.store.as_ref(), ctx, tool_id).await?;
        Ok(self
            .store
            .registry_for_tool(tool_id)
            .await?
            .map(RegistryInfoDTO::from))
    }

    async fn frozen_metadata(
        &self,
        tool: &CustomTool,
        prompts: &[ToolStudioPrompt],
    ) -> Result<serde_json::Value> {
        let profiles = self.store.list_profiles(tool.tool_id).await?;
        let default_profile = profiles.iter().find(|p| p.is_default);

        let outputs: Vec<serde_json::Value> = prompts
            .iter()
            .map(|prompt| {
                let profile = prompt
                    .profile_manager
                    .and_then(|id| profiles.iter().find(|p| p.profile_id == id))
                    .or(default_profile)
                    .map(ProfileSettings::from);
                json!({
                    "prompt_key": prompt.prompt_key,
                    "prompt": prompt.prompt,
                    "output_type": prompt.output_type,
                    "enforce_type": prompt.enforce_type,
                    "required": prompt.required,
                    "evaluate": prompt.evaluate,
                    "profile": profile,
                })
            })
            .collect();

        Ok(json!({
            "name": tool.tool_name,
            "description": tool.description,
            "author": tool.author,
            "icon": tool.icon,
            "tool_id": tool.tool_id,
            "tool_settings": {
                "preamble": tool.preamble,
                "postamble": tool.postamble,
                "summarize_prompt": tool.summarize_prompt,
                "summarize_context": tool.summarize_context,
                "summarize_as_source": tool.summarize_as_source,
                "enable_challenge": tool.enable_challenge,
                "enable_highlight": tool.enable_highlight,
                "single_pass_extraction_mode": tool.single_pass_extraction_mode,
                "prompt_grammer": tool.prompt_grammer,
            },
            "default_profile": default_profile.map(ProfileSettings::from),
            "outputs": outputs,
        }))
    }
}
