use crate::error::{AppError, Result};
use crate::models::{
    Adapter, CustomTool, DocumentManager, IndexManager, ProfileFlag, ProfileManager, PromptOutput,
    RegistryExport, ToolInstance, ToolStudioPrompt,
};
use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::file_provider::FileSnapshot;
use super::provider::EntityStore;

/// Every entity the store holds. Serialized as a whole into the snapshot file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreState {
    #[serde(default)]
    pub tools: Vec<CustomTool>,
    #[serde(default)]
    pub profiles: Vec<ProfileManager>,
    #[serde(default)]
    pub prompts: Vec<ToolStudioPrompt>,
    #[serde(default)]
    pub prompt_outputs: Vec<PromptOutput>,
    #[serde(default)]
    pub documents: Vec<DocumentManager>,
    #[serde(default)]
    pub index_managers: Vec<IndexManager>,
    #[serde(default)]
    pub registry: Vec<RegistryExport>,
    #[serde(default)]
    pub tool_instances: Vec<ToolInstance>,
    #[serde(default)]
    pub adapters: Vec<Adapter>,
}

impl StoreState {
    fn ensure_unique_tool_name(&self, tool: &CustomTool) -> Result<()> {
        let taken = self.tools.iter().any(|t| {
            t.tool_id != tool.tool_id
                && t.organization_id == tool.organization_id
                && t.tool_name == tool.tool_name
        });
        if taken {
            return Err(AppError::DuplicateData(format!(
                "Tool with name '{}' already exists, please use a different name",
                tool.tool_name
            )));
        }
        Ok(())
    }

    fn ensure_tool(&self, tool_id: Uuid) -> Result<()> {
        if self.tools.iter().any(|t| t.tool_id == tool_id) {
            Ok(())
        } else {
            Err(AppError::NotFound(format!("Tool '{tool_id}'")))
        }
    }

    fn set_exclusive_flag(
        &mut self,
        tool_id: Uuid,
        profile_id: Uuid,
        flag: ProfileFlag,
    ) -> Result<ProfileManager> {
        if !self
            .profiles
            .iter()
            .any(|p| p.profile_id == profile_id && p.tool_id == tool_id)
        {
            return Err(AppError::NotFound(format!("Profile '{profile_id}'")));
        }

        let now = Utc::now();
        let mut selected = None;
        for profile in self.profiles.iter_mut().filter(|p| p.tool_id == tool_id) {
            let on = profile.profile_id == profile_id;
            match flag {
                ProfileFlag::Default => profile.is_default = on,
                ProfileFlag::SummarizeLlm => profile.is_summarize_llm = on,
            }
            profile.modified_at = now;
            if on {
                selected = Some(profile.clone());
            }
        }
        selected.ok_or_else(|| AppError::NotFound(format!("Profile '{profile_id}'")))
    }

    fn remove_tool(&mut self, tool_id: Uuid) {
        let document_ids: Vec<Uuid> = self
            .documents
            .iter()
            .filter(|d| d.tool_id == tool_id)
            .map(|d| d.document_id)
            .collect();

        self.tools.retain(|t| t.tool_id != tool_id);
        self.profiles.retain(|p| p.tool_id != tool_id);
        self.prompts.retain(|p| p.tool_id != tool_id);
        self.prompt_outputs.retain(|o| o.tool_id != tool_id);
        self.documents.retain(|d| d.tool_id != tool_id);
        self.index_managers
            .retain(|i| !document_ids.contains(&i.document_id));
        self.registry.retain(|r| r.custom_tool_id != tool_id);
    }
}

/// In-memory entity store, optionally mirrored to a JSON snapshot on disk.
///
/// Every mutation runs under a single write lock, so multi-row updates such as
/// the exclusive profile flag switch are never observed half applied.
pub struct MemoryStore {
    state: RwLock<StoreState>,
    snapshot: Option<FileSnapshot>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(StoreState::default()),
            snapshot: None,
        }
    }

    /// Open a store backed by `path`, loading the existing snapshot if any
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let snapshot = FileSnapshot::new(path);
        let state = snapshot.load().await?.unwrap_or_default();
        Ok(Self {
            state: RwLock::new(state),
            snapshot: Some(snapshot),
        })
    }

    async fn read<T>(&self, f: impl FnOnce(&StoreState) -> T) -> T {
        let state = self.state.read().await;
        f(&state)
    }

    /// Applies `f` to a copy of the state and publishes it only once the
    /// snapshot, if any, has been written.
    async fn mutate<T>(&self, f: impl FnOnce(&mut StoreState) -> Result<T>) -> Result<T> {
        let mut state = self.state.write().await;
        let mut next = state.clone();
        let value = f(&mut next)?;
        if let Some(snapshot) = &self.snapshot {
            snapshot.save(&next).await?;
        }
        *state = next;
        Ok(value)
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EntityStore for MemoryStore {
    async fn insert_tool(&self, tool: CustomTool) -> Result<CustomTool> {
        self.mutate(|state| {
            state.ensure_unique_tool_name(&tool)?;
            state.tools.push(tool.clone());
            Ok(tool)
        })
        .await
    }

    async fn get_tool(&self, tool_id: Uuid) -> Result<Option<CustomTool>> {
        Ok(self
            .read(|state| state.tools.iter().find(|t| t.tool_id == tool_id).cloned())
            .await)
    }

    async fn update_tool(&self, tool: CustomTool) -> Result<CustomTool> {
        self.mutate(|state| {
            state.ensure_unique_tool_name(&tool)?;
            let slot = state
                .tools
                .iter_mut()
                .find(|t| t.tool_id == tool.tool_id)
                .ok_or_else(|| AppError::NotFound(format!("Tool '{}'", tool.tool_id)))?;
            *slot = tool.clone();
            Ok(tool)
        })
        .await
    }

    async fn delete_tool(&self, tool_id: Uuid) -> Result<()> {
        self.mutate(|state| {
            state.ensure_tool(tool_id)?;
            state.remove_tool(tool_id);
            Ok(())
        })
        .await
    }

    async fn list_tools_for_user(
        &self,
        user_id: &str,
        organization_id: &str,
    ) -> Result<Vec<CustomTool>> {
        Ok(self
            .read(|state| {
                state
                    .tools
                    .iter()
                    .filter(|t| t.is_accessible_by(user_id, organization_id))
                    .cloned()
                    .collect()
            })
            .await)
    }

    async fn tool_name_exists(&self, organization_id: &str, tool_name: &str) -> Result<bool> {
        Ok(self
            .read(|state| {
                state
                    .tools
                    .iter()
                    .any(|t| t.organization_id == organization_id && t.tool_name == tool_name)
            })
            .await)
    }

    async fn insert_profile(&self, profile: ProfileManager) -> Result<ProfileManager> {
        self.mutate(|state| {
            state.ensure_tool(profile.tool_id)?;
            if state
                .profiles
                .iter()
                .any(|p| p.tool_id == profile.tool_id && p.profile_name == profile.profile_name)
            {
                return Err(AppError::DuplicateData(format!(
                    "Profile with name '{}' already exists, please use a different name",
                    profile.profile_name
                )));
            }
            state.profiles.push(profile.clone());
            Ok(profile)
        })
        .await
    }

    async fn get_profile(&self, profile_id: Uuid) -> Result<Option<ProfileManager>> {
        Ok(self
            .read(|state| {
                state
                    .profiles
                    .iter()
                    .find(|p| p.profile_id == profile_id)
                    .cloned()
            })
            .await)
    }

    async fn update_profile(&self, profile: ProfileManager) -> Result<ProfileManager> {
        self.mutate(|state| {
            if state.profiles.iter().any(|p| {
                p.tool_id == profile.tool_id
                    && p.profile_name == profile.profile_name
                    && p.profile_id != profile.profile_id
            }) {
                return Err(AppError::DuplicateData(format!(
                    "Profile with name '{}' already exists, please use a different name",
                    profile.profile_name
                )));
            }
            let existing = state
                .profiles
                .iter_mut()
                .find(|p| p.profile_id == profile.profile_id)
                .ok_or_else(|| AppError::NotFound(format!("Profile '{}'", profile.profile_id)))?;
            let mut profile = profile;
            profile.modified_at = Utc::now();
            *existing = profile.clone();
            Ok(profile)
        })
        .await
    }

    async fn list_profiles(&self, tool_id: Uuid) -> Result<Vec<ProfileManager>> {
        Ok(self
            .read(|state| {
                state
                    .profiles
                    .iter()
                    .filter(|p| p.tool_id == tool_id)
                    .cloned()
                    .collect()
            })
            .await)
    }

    async fn count_profiles(&self, tool_id: Uuid) -> Result<usize> {
        Ok(self
            .read(|state| state.profiles.iter().filter(|p| p.tool_id == tool_id).count())
            .await)
    }

    async fn set_exclusive_profile_flag(
        &self,
        tool_id: Uuid,
        profile_id: Uuid,
        flag: ProfileFlag,
    ) -> Result<ProfileManager> {
        self.mutate(|state| state.set_exclusive_flag(tool_id, profile_id, flag))
            .await
    }

    async fn insert_prompt(&self, prompt: ToolStudioPrompt) -> Result<ToolStudioPrompt> {
        self.mutate(|state| {
            state.ensure_tool(prompt.tool_id)?;
            if state
                .prompts
                .iter()
                .any(|p| p.tool_id == prompt.tool_id && p.prompt_key == prompt.prompt_key)
            {
                return Err(AppError::DuplicateData(format!(
                    "Prompt with key '{}' already exists, please use a different key",
                    prompt.prompt_key
                )));
            }
            state.prompts.push(prompt.clone());
            Ok(prompt)
        })
        .await
    }

    async fn get_prompt(&self, prompt_id: Uuid) -> Result<Option<ToolStudioPrompt>> {
        Ok(self
            .read(|state| {
                state
                    .prompts
                    .iter()
                    .find(|p| p.prompt_id == prompt_id)
                    .cloned()
            })
            .await)
    }

    async fn list_prompts(&self, tool_id: Uuid) -> Result<Vec<ToolStudioPrompt>> {
        Ok(self
            .read(|state| {
                let mut prompts: Vec<ToolStudioPrompt> = state
                    .prompts
                    .iter()
                    .filter(|p| p.tool_id == tool_id)
                    .cloned()
                    .collect();
                prompts.sort_by_key(|p| p.sequence_number);
                prompts
            })
            .await)
    }

    async fn assign_prompts_to_profile(&self, tool_id: Uuid, profile_id: Uuid) -> Result<usize> {
        self.mutate(|state| {
            let now = Utc::now();
            let mut updated = 0;
            for prompt in state.prompts.iter_mut().filter(|p| p.tool_id == tool_id) {
                prompt.profile_manager = Some(profile_id);
                prompt.modified_at = now;
                updated += 1;
            }
            Ok(updated)
        })
        .await
    }

    async fn record_prompt_output(&self, output: PromptOutput) -> Result<()> {
        self.mutate(|state| {
            // One row per prompt/document/profile, latest run wins
            state.prompt_outputs.retain(|o| {
                !(o.prompt_id == output.prompt_id
                    && o.document_id == output.document_id
                    && o.profile_id == output.profile_id)
            });
            state.prompt_outputs.push(output);
            Ok(())
        })
        .await
    }

    async fn list_prompt_outputs(&self, tool_id: Uuid) -> Result<Vec<PromptOutput>> {
        Ok(self
            .read(|state| {
                state
                    .prompt_outputs
                    .iter()
                    .filter(|o| o.tool_id == tool_id)
                    .cloned()
                    .collect()
            })
            .await)
    }

    async fn insert_document(&self, document: DocumentManager) -> Result<DocumentManager> {
        self.mutate(|state| {
            state.ensure_tool(document.tool_id)?;
            state.documents.push(document.clone());
            Ok(document)
        })
        .await
    }

    async fn get_document(&self, document_id: Uuid) -> Result<Option<DocumentManager>> {
        Ok(self
            .read(|state| {
                state
                    .documents
                    .iter()
                    .find(|d| d.document_id == document_id)
                    .cloned()
            })
            .await)
    }

    async fn list_documents(&self, tool_id: Uuid) -> Result<Vec<DocumentManager>> {
        Ok(self
            .read(|state| {
                state
                    .documents
                    .iter()
                    .filter(|d| d.tool_id == tool_id)
                    .cloned()
                    .collect()
            })
            .await)
    }

    async fn delete_document(&self, document_id: Uuid) -> Result<()> {
        self.mutate(|state| {
            let before = state.documents.len();
            state.documents.retain(|d| d.document_id != document_id);
            if state.documents.len() == before {
                return Err(AppError::NotFound(format!("Document '{document_id}'")));
            }
            state.index_managers.retain(|i| i.document_id != document_id);
            state.prompt_outputs.retain(|o| o.document_id != document_id);
            Ok(())
        })
        .await
    }

    async fn upsert_index_manager(&self, index_manager: IndexManager) -> Result<IndexManager> {
        self.mutate(|state| {
            match state
                .index_managers
                .iter_mut()
                .find(|i| i.index_manager_id == index_manager.index_manager_id)
            {
                Some(slot) => *slot = index_manager.clone(),
                None => state.index_managers.push(index_manager.clone()),
            }
            Ok(index_manager)
        })
        .await
    }

    async fn find_index_manager(
        &self,
        document_id: Uuid,
        profile_id: Uuid,
    ) -> Result<Option<IndexManager>> {
        Ok(self
            .read(|state| {
                state
                    .index_managers
                    .iter()
                    .find(|i| i.document_id == document_id && i.profile_id == profile_id)
                    .cloned()
            })
            .await)
    }

    async fn list_index_managers(&self, document_id: Uuid) -> Result<Vec<IndexManager>> {
        Ok(self
            .read(|state| {
                state
                    .index_managers
                    .iter()
                    .filter(|i| i.document_id == document_id)
                    .cloned()
                    .collect()
            })
            .await)
    }

    async fn registry_for_tool(&self, tool_id: Uuid) -> Result<Option<RegistryExport>> {
        Ok(self
            .read(|state| {
                state
                    .registry
                    .iter()
                    .find(|r| r.custom_tool_id == tool_id)
                    .cloned()
            })
            .await)
    }

    async fn upsert_registry(&self, export: RegistryExport) -> Result<RegistryExport> {
        self.mutate(|state| {
            state.ensure_tool(export.custom_tool_id)?;
            state
                .registry
                .retain(|r| r.custom_tool_id != export.custom_tool_id);
            state.registry.push(export.clone());
            Ok(export)
        })
        .await
    }

    async fn insert_tool_instance(&self, instance: ToolInstance) -> Result<()> {
        self.mutate(|state| {
            state.tool_instances.push(instance);
            Ok(())
        })
        .await
    }

    async fn tool_instances_for_registry(&self, registry_id: Uuid) -> Result<Vec<ToolInstance>> {
        Ok(self
            .read(|state| {
                state
                    .tool_instances
                    .iter()
                    .filter(|i| i.tool_id == registry_id)
                    .cloned()
                    .collect()
            })
            .await)
    }

    async fn insert_adapter(&self, adapter: Adapter) -> Result<Adapter> {
        self.mutate(|state| {
            state.adapters.retain(|a| a.adapter_id != adapter.adapter_id);
            state.adapters.push(adapter.clone());
            Ok(adapter)
        })
        .await
    }

    async fn get_adapter(&self, adapter_id: Uuid) -> Result<Option<Adapter>> {
        Ok(self
            .read(|state| {
                state
                    .adapters
                    .iter()
                    .find(|a| a.adapter_id == adapter_id)
                    .cloned()
            })
            .await)
    }

    async fn list_adapters(&self, organization_id: &str) -> Result<Vec<Adapter>> {
        Ok(self
            .read(|state| {
                state
                    .adapters
                    .iter()
                    .filter(|a| a.organization_id == organization_id)
                    .cloned()
                    .collect()
            })
            .await)
    }
}
