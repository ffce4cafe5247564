use actix_multipart::Multipart;
use actix_web::{web, HttpResponse};
use log::{error, info};
use serde_json::json;
use uuid::Uuid;

use crate::controllers::multipart::read_parts;
use crate::dto::{
    DeleteFileRequest, FetchResponseRequest, FileInfoQuery, IndexDocumentRequest,
    SinglePassExtractionRequest,
};
use crate::error::AppError;
use crate::middleware::UserContext;
use crate::server::AppState;
use crate::services::{IndexOutcome, UploadedFile};

async fn list_documents(
    ctx: UserContext,
    app_state: web::Data<AppState>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let documents = app_state
        .documents
        .list_documents(&ctx, path.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(documents))
}

async fn index_document(
    ctx: UserContext,
    app_state: web::Data<AppState>,
    path: web::Path<Uuid>,
    request: web::Json<IndexDocumentRequest>,
) -> Result<HttpResponse, AppError> {
    let tool_id = path.into_inner();
    let document_id = request.document_id;
    match app_state
        .documents
        .index_document(&ctx, tool_id, request.into_inner())
        .await?
    {
        IndexOutcome::Indexed(doc_id) => {
            info!("Indexed document {} of tool {}", document_id, tool_id);
            Ok(HttpResponse::Ok().json(json!({
                "message": "Document indexed successfully.",
                "doc_id": doc_id,
            })))
        }
        IndexOutcome::InProgress => Ok(HttpResponse::Ok().json(json!({
            "message": "Document is being indexed.",
        }))),
    }
}

async fn fetch_response(
    ctx: UserContext,
    app_state: web::Data<AppState>,
    path: web::Path<Uuid>,
    request: web::Json<FetchResponseRequest>,
) -> Result<HttpResponse, AppError> {
    let outputs = app_state
        .documents
        .fetch_response(&ctx, path.into_inner(), request.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(outputs))
}

async fn single_pass_extraction(
    ctx: UserContext,
    app_state: web::Data<AppState>,
    path: web::Path<Uuid>,
    request: web::Json<SinglePassExtractionRequest>,
) -> Result<HttpResponse, AppError> {
    let outputs = app_state
        .documents
        .single_pass_extraction(&ctx, path.into_inner(), request.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(outputs))
}

async fn fetch_contents(
    ctx: UserContext,
    app_state: web::Data<AppState>,
    path: web::Path<Uuid>,
    query: web::Query<FileInfoQuery>,
) -> Result<HttpResponse, AppError> {
    let contents = app_state
        .documents
        .fetch_contents(&ctx, path.into_inner(), query.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(json!({ "data": contents })))
}

async fn upload_for_ide(
    ctx: UserContext,
    app_state: web::Data<AppState>,
    path: web::Path<Uuid>,
    payload: Multipart,
) -> Result<HttpResponse, AppError> {
    let tool_id = path.into_inner();
    let uploads: Vec<UploadedFile> = read_parts(payload, app_state.max_upload_bytes)
        .await?
        .into_iter()
        .filter(|part| part.name == "file")
        .map(|part| UploadedFile {
            file_name: part.file_name.unwrap_or_else(|| "document".to_string()),
            content_type: part.content_type,
            data: part.data,
        })
        .collect();

    let documents = app_state
        .documents
        .upload_documents(&ctx, tool_id, uploads)
        .await?;
    info!("Uploaded {} file(s) to tool {}", documents.len(), tool_id);
    Ok(HttpResponse::Ok().json(documents))
}

/// Lookup failures are reported normally; once removal starts any failure is
/// a plain 400 and completed steps stay done.
async fn delete_for_ide(
    ctx: UserContext,
    app_state: web::Data<AppState>,
    path: web::Path<Uuid>,
    request: web::Json<DeleteFileRequest>,
) -> Result<HttpResponse, AppError> {
    let (tool, document) = app_state
        .documents
        .find_document(&ctx, path.into_inner(), request.document_id)
        .await?;

    match app_state.documents.purge_document(&tool, &document).await {
        Ok(()) => Ok(HttpResponse::Ok().json(json!({ "data": "File deleted successfully." }))),
        Err(e) => {
            error!("Exception thrown from file deletion, error {}", e);
            Ok(HttpResponse::BadRequest().json(json!({ "data": "File deletion failed." })))
        }
    }
}

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/{tool_id}/documents").route(web::get().to(list_documents)))
        .service(web::resource("/{tool_id}/index-document").route(web::post().to(index_document)))
        .service(web::resource("/{tool_id}/fetch-response").route(web::post().to(fetch_response)))
        .service(
            web::resource("/{tool_id}/single-pass-extraction")
                .route(web::post().to(single_pass_extraction)),
        )
        .service(
            web::resource("/{tool_id}/file")
                .route(web::get().to(fetch_contents))
                .route(web::post().to(upload_for_ide))
                .route(web::delete().to(delete_for_ide)),
        );
}
