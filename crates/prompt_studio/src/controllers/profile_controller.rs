use actix_web::{web, HttpResponse};
use log::info;
use serde_json::json;
use uuid::Uuid;

use crate::dto::{CreateProfileRequest, CreatePromptRequest, MakeDefaultProfileRequest};
use crate::error::AppError;
use crate::middleware::UserContext;
use crate::server::AppState;

async fn list_profiles(
    ctx: UserContext,
    app_state: web::Data<AppState>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let profiles = app_state
        .tools
        .list_profiles(&ctx, path.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(profiles))
}

async fn create_profile(
    ctx: UserContext,
    app_state: web::Data<AppState>,
    path: web::Path<Uuid>,
    request: web::Json<CreateProfileRequest>,
) -> Result<HttpResponse, AppError> {
    let tool_id = path.into_inner();
    let profile = app_state
        .tools
        .create_profile(&ctx, tool_id, request.into_inner())
        .await?;
    info!("Created profile {} for tool {}", profile.profile_id, tool_id);
    Ok(HttpResponse::Created().json(profile))
}

async fn make_profile_default(
    ctx: UserContext,
    app_state: web::Data<AppState>,
    path: web::Path<Uuid>,
    request: web::Json<MakeDefaultProfileRequest>,
) -> Result<HttpResponse, AppError> {
    let profile = app_state
        .tools
        .make_profile_default(&ctx, path.into_inner(), request.default_profile)
        .await?;
    Ok(HttpResponse::Ok().json(json!({ "default_profile": profile.profile_id })))
}

async fn create_prompt(
    ctx: UserContext,
    app_state: web::Data<AppState>,
    path: web::Path<Uuid>,
    request: web::Json<CreatePromptRequest>,
) -> Result<HttpResponse, AppError> {
    let prompt = app_state
        .tools
        .create_prompt(&ctx, path.into_inner(), request.into_inner())
        .await?;
    Ok(HttpResponse::Created().json(prompt))
}

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("/{tool_id}/profiles")
            .route(web::get().to(list_profiles))
            .route(web::post().to(create_profile)),
    )
    .service(
        web::resource("/{tool_id}/profiles/default").route(web::patch().to(make_profile_default)),
    )
    .service(web::resource("/{tool_id}/prompts").route(web::post().to(create_prompt)));
}
