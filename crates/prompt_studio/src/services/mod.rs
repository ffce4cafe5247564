pub mod document_service;
pub mod file_converter;
pub mod file_service;
pub mod indexing_service;
pub mod project_transfer;
pub mod prompt_engine;
pub mod registry_service;
pub mod tool_service;

pub use document_service::{DocumentService, IndexOutcome, UploadedFile};
pub use file_converter::FileConverter;
pub use file_service::{FileViewType, PromptStudioFileService};
pub use indexing_service::DocumentIndexingService;
pub use project_transfer::{AdapterSelection, ProjectExport, ProjectTransferService};
pub use prompt_engine::{HttpPromptEngine, PromptEngine};
pub use registry_service::RegistryService;
pub use tool_service::PromptStudioService;
