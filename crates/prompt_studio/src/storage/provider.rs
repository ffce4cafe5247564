use crate::error::Result;
use crate::models::{
    Adapter, CustomTool, DocumentManager, IndexManager, ProfileFlag, ProfileManager, PromptOutput,
    RegistryExport, ToolInstance, ToolStudioPrompt,
};
use async_trait::async_trait;
use uuid::Uuid;

/// Persistence boundary for every prompt studio entity.
///
/// Uniqueness violations surface as `AppError::DuplicateData`, missing rows
/// referenced by an update as `AppError::NotFound`.
#[async_trait]
pub trait EntityStore: Send + Sync {
    // Tools
    async fn insert_tool(&self, tool: CustomTool) -> Result<CustomTool>;
    async fn get_tool(&self, tool_id: Uuid) -> Result<Option<CustomTool>>;
    async fn update_tool(&self, tool: CustomTool) -> Result<CustomTool>;
    /// Removes the tool and everything hanging off it
    async fn delete_tool(&self, tool_id: Uuid) -> Result<()>;
    async fn list_tools_for_user(
        &self,
        user_id: &str,
        organization_id: &str,
    ) -> Result<Vec<CustomTool>>;
    async fn tool_name_exists(&self, organization_id: &str, tool_name: &str) -> Result<bool>;

    // Profiles
    async fn insert_profile(&self, profile: ProfileManager) -> Result<ProfileManager>;
    async fn get_profile(&self, profile_id: Uuid) -> Result<Option<ProfileManager>>;
    async fn update_profile(&self, profile: ProfileManager) -> Result<ProfileManager>;
    async fn list_profiles(&self, tool_id: Uuid) -> Result<Vec<ProfileManager>>;
    async fn count_profiles(&self, tool_id: Uuid) -> Result<usize>;
    /// Clears `flag` on every profile of the tool and sets it on `profile_id`
    /// in one step.
    async fn set_exclusive_profile_flag(
        &self,
        tool_id: Uuid,
        profile_id: Uuid,
        flag: ProfileFlag,
    ) -> Result<ProfileManager>;

    // Prompts
    async fn insert_prompt(&self, prompt: ToolStudioPrompt) -> Result<ToolStudioPrompt>;
    async fn get_prompt(&self, prompt_id: Uuid) -> Result<Option<ToolStudioPrompt>>;
    async fn list_prompts(&self, tool_id: Uuid) -> Result<Vec<ToolStudioPrompt>>;
    /// Points every prompt of the tool at `profile_id`, returns the number updated
    async fn assign_prompts_to_profile(&self, tool_id: Uuid, profile_id: Uuid) -> Result<usize>;
    async fn record_prompt_output(&self, output: PromptOutput) -> Result<()>;
    async fn list_prompt_outputs(&self, tool_id: Uuid) -> Result<Vec<PromptOutput>>;

    // Documents
    async fn insert_document(&self, document: DocumentManager) -> Result<DocumentManager>;
    async fn get_document(&self, document_id: Uuid) -> Result<Option<DocumentManager>>;
    async fn list_documents(&self, tool_id: Uuid) -> Result<Vec<DocumentManager>>;
    /// Removes the document together with its index managers
    async fn delete_document(&self, document_id: Uuid) -> Result<()>;

    // Index managers
    async fn upsert_index_manager(&self, index_manager: IndexManager) -> Result<IndexManager>;
    async fn find_index_manager(
        &self,
        document_id: Uuid,
        profile_id: Uuid,
    ) -> Result<Option<IndexManager>>;
    async fn list_index_managers(&self, document_id: Uuid) -> Result<Vec<IndexManager>>;

    // Registry
    async fn registry_for_tool(&self, tool_id: Uuid) -> Result<Option<RegistryExport>>;
    async fn upsert_registry(&self, export: RegistryExport) -> Result<RegistryExport>;
    async fn insert_tool_instance(&self, instance: ToolInstance) -> Result<()>;
    async fn tool_instances_for_registry(&self, registry_id: Uuid) -> Result<Vec<ToolInstance>>;

    // Adapters
    async fn insert_adapter(&self, adapter: Adapter) -> Result<Adapter>;
    async fn get_adapter(&self, adapter_id: Uuid) -> Result<Option<Adapter>>;
    async fn list_adapters(&self, organization_id: &str) -> Result<Vec<Adapter>>;
}
