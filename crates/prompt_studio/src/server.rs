use std::sync::Arc;

use actix_cors::Cors;
use actix_web::{web, App, HttpServer};
use log::{error, info};

use crate::config::AppConfig;
use crate::controllers::{
    document_controller, profile_controller, tool_controller, transfer_controller,
};
use crate::error::Result;
use crate::middleware::TracingMiddleware;
use crate::services::{
    DocumentIndexingService, DocumentService, FileConverter, HttpPromptEngine,
    ProjectTransferService, PromptEngine, PromptStudioFileService, PromptStudioService,
    RegistryService,
};
use crate::storage::{EntityStore, MemoryStore};

pub struct AppState {
    pub tools: Arc<PromptStudioService>,
    pub documents: DocumentService,
    pub registry: RegistryService,
    pub transfer: ProjectTransferService,
    pub max_upload_bytes: usize,
}

impl AppState {
    pub fn new(
        config: &AppConfig,
        store: Arc<dyn EntityStore>,
        engine: Arc<dyn PromptEngine>,
        converter: Option<Arc<dyn FileConverter>>,
    ) -> Self {
        let files = PromptStudioFileService::new(config.file_root());
        let indexing = Arc::new(DocumentIndexingService::new(config.index_cache_capacity));
        let tools = Arc::new(PromptStudioService::new(
            store.clone(),
            files.clone(),
            config.max_profile_count,
        ));

        Self {
            documents: DocumentService::new(store.clone(), files, indexing, engine, converter),
            registry: RegistryService::new(store.clone()),
            transfer: ProjectTransferService::new(store, tools.clone()),
            tools,
            max_upload_bytes: config.max_upload_bytes,
        }
    }

    /// Snapshot backed store and the HTTP prompt engine, no file converter
    pub async fn from_config(config: &AppConfig) -> Result<Self> {
        let store: Arc<dyn EntityStore> =
            Arc::new(MemoryStore::open(config.store_snapshot_path()).await?);
        let engine: Arc<dyn PromptEngine> = Arc::new(HttpPromptEngine::new(
            config.prompt_service_url.clone(),
            config.prompt_service_timeout,
        )?);
        Ok(Self::new(config, store, engine, None))
    }
}

const DEFAULT_WORKER_COUNT: usize = 10;

pub fn app_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/v1/prompt-studio")
            .configure(tool_controller::config_static)
            .configure(transfer_controller::config_static)
            .configure(tool_controller::config)
            .configure(profile_controller::config)
            .configure(document_controller::config)
            .configure(transfer_controller::config),
    );
}

pub async fn run(config: AppConfig, port: u16) -> Result<(), String> {
    info!("Starting web service...");

    let app_state = web::Data::new(
        AppState::from_config(&config)
            .await
            .map_err(|e| format!("Failed to initialize prompt studio: {e}"))?,
    );

    let server = HttpServer::new(move || {
        App::new()
            .app_data(app_state.clone())
            .wrap(TracingMiddleware)
            .wrap(Cors::permissive())
            .configure(app_config)
    })
    .workers(DEFAULT_WORKER_COUNT)
    .bind(format!("127.0.0.1:{port}"))
    .map_err(|e| format!("Failed to bind server: {e}"))?
    .run();

    info!("Starting web service on http://127.0.0.1:{port}");

    if let Err(e) = server.await {
        error!("Web server error: {}", e);
        return Err(format!("Web server error: {e}"));
    }

    Ok(())
}
