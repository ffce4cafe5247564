use actix_multipart::Multipart;
use actix_web::http::header::ContentDisposition;
use actix_web::{web, HttpResponse};
use log::{error, info, warn};
use serde_json::json;
use uuid::Uuid;

use crate::controllers::multipart::{read_parts, FormPart};
use crate::dto::{ExportToolRequest, ImportProjectResponse};
use crate::error::AppError;
use crate::middleware::UserContext;
use crate::models::AdapterType;
use crate::server::AppState;
use crate::services::{AdapterSelection, ProjectExport};

const ADAPTER_FIELDS: [(&str, AdapterType); 4] = [
    ("llm_adapter_id", AdapterType::Llm),
    ("vector_db_adapter_id", AdapterType::VectorDb),
    ("embedding_adapter_id", AdapterType::Embedding),
    ("x2text_adapter_id", AdapterType::X2text),
];

async fn export_tool(
    ctx: UserContext,
    app_state: web::Data<AppState>,
    path: web::Path<Uuid>,
    request: web::Json<ExportToolRequest>,
) -> Result<HttpResponse, AppError> {
    let tool_id = path.into_inner();
    app_state
        .registry
        .export_tool(&ctx, tool_id, request.into_inner())
        .await?;
    info!("Exported tool {} to the registry", tool_id);
    Ok(HttpResponse::Ok().json(json!({ "message": "Custom tool exported successfully." })))
}

async fn export_tool_info(
    ctx: UserContext,
    app_state: web::Data<AppState>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    match app_state
        .registry
        .export_tool_info(&ctx, path.into_inner())
        .await?
    {
        Some(info) => Ok(HttpResponse::Ok().json(info)),
        None => Ok(HttpResponse::NoContent().finish()),
    }
}

async fn export_project(
    ctx: UserContext,
    app_state: web::Data<AppState>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let exported = app_state
        .transfer
        .export_project(&ctx, path.into_inner())
        .await?;

    match serde_json::to_string_pretty(&exported.document) {
        Ok(body) => Ok(HttpResponse::Ok()
            .content_type("application/json")
            .insert_header(ContentDisposition::attachment(exported.file_name))
            .body(body)),
        Err(e) => {
            error!("Error exporting project: {}", e);
            Ok(HttpResponse::InternalServerError()
                .json(json!({ "error": "Failed to export project" })))
        }
    }
}

fn import_selection(parts: &[FormPart]) -> Result<AdapterSelection, AppError> {
    let mut selection = AdapterSelection::default();
    for (field, adapter_type) in ADAPTER_FIELDS {
        let Some(value) = parts
            .iter()
            .find(|p| p.name == field)
            .map(FormPart::text)
            .filter(|v| !v.is_empty())
        else {
            continue;
        };
        let adapter_id = Uuid::parse_str(&value)
            .map_err(|_| AppError::Validation(format!("Invalid {field}: '{value}'")))?;
        selection.set(adapter_type, Some(adapter_id));
    }
    Ok(selection)
}

async fn read_import(
    ctx: &UserContext,
    app_state: &AppState,
    payload: Multipart,
) -> Result<ImportProjectResponse, AppError> {
    let parts = read_parts(payload, app_state.max_upload_bytes).await?;
    let file = parts
        .iter()
        .find(|p| p.name == "file")
        .ok_or_else(|| AppError::Validation("No file provided".to_string()))?;
    let document = ProjectExport::from_slice(&file.data)?;
    let selection = import_selection(&parts)?;
    app_state
        .transfer
        .import_project(ctx, document, selection)
        .await
}

async fn import_project(
    ctx: UserContext,
    app_state: web::Data<AppState>,
    payload: Multipart,
) -> HttpResponse {
    let result = read_import(&ctx, &app_state, payload).await;

    match result {
        Ok(response) => {
            info!("Imported project as tool {}", response.tool_id);
            HttpResponse::Created().json(response)
        }
        Err(AppError::Validation(message)) => {
            warn!("Rejected project import: {}", message);
            HttpResponse::BadRequest().json(json!({ "error": message }))
        }
        Err(e @ AppError::PayloadTooLarge(_)) => {
            warn!("Rejected project import: {}", e);
            HttpResponse::PayloadTooLarge().json(json!({ "error": e.to_string() }))
        }
        Err(e) => {
            error!("Error importing project: {}", e);
            HttpResponse::InternalServerError().json(json!({ "error": "Failed to import project" }))
        }
    }
}

/// Must be registered before the `/{tool_id}` routes
pub fn config_static(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/project-transfer").route(web::post().to(import_project)));
}

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("/{tool_id}/export")
            .route(web::post().to(export_tool))
            .route(web::get().to(export_tool_info)),
    )
    .service(web::resource("/{tool_id}/project-export").route(web::get().to(export_project)));
}
