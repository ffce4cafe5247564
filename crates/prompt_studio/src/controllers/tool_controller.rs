use actix_web::{web, HttpResponse};
use log::{error, info};
use uuid::Uuid;

use crate::dto::{CreateToolRequest, UpdateToolRequest};
use crate::error::AppError;
use crate::middleware::UserContext;
use crate::server::AppState;

async fn list_tools(
    ctx: UserContext,
    app_state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let tools = app_state.tools.list_tools(&ctx).await?;
    Ok(HttpResponse::Ok().json(tools))
}

async fn create_tool(
    ctx: UserContext,
    app_state: web::Data<AppState>,
    request: web::Json<CreateToolRequest>,
) -> Result<HttpResponse, AppError> {
    let tool = app_state.tools.create_tool(&ctx, request.into_inner()).await?;
    info!("Created tool {} for user {}", tool.tool.tool_id, ctx.user_id);
    Ok(HttpResponse::Created().json(tool))
}

async fn get_tool(
    ctx: UserContext,
    app_state: web::Data<AppState>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let tool = app_state.tools.get_tool(&ctx, path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(tool))
}

async fn update_tool(
    ctx: UserContext,
    app_state: web::Data<AppState>,
    path: web::Path<Uuid>,
    request: web::Json<UpdateToolRequest>,
) -> Result<HttpResponse, AppError> {
    let tool = app_state
        .tools
        .update_tool(&ctx, path.into_inner(), request.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(tool))
}

async fn delete_tool(
    ctx: UserContext,
    app_state: web::Data<AppState>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let tool_id = path.into_inner();
    app_state.tools.delete_tool(&ctx, tool_id).await?;
    info!("Deleted tool {}", tool_id);
    Ok(HttpResponse::NoContent().finish())
}

/// Dropdown values for the tool settings UI; 204 when they cannot be loaded
async fn get_select_choices(app_state: web::Data<AppState>) -> HttpResponse {
    match app_state.tools.select_choices() {
        Ok(choices) => HttpResponse::Ok().json(choices),
        Err(e) => {
            error!("Error occurred while fetching select choices: {}", e);
            HttpResponse::NoContent().finish()
        }
    }
}

async fn list_shared_users(
    ctx: UserContext,
    app_state: web::Data<AppState>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let shared = app_state
        .tools
        .shared_users(&ctx, path.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(shared))
}

/// Routes that must be registered before the `/{tool_id}` ones
pub fn config_static(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("")
            .route(web::get().to(list_tools))
            .route(web::post().to(create_tool)),
    )
    .service(web::resource("/select-choices").route(web::get().to(get_select_choices)));
}

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("/{tool_id}")
            .route(web::get().to(get_tool))
            .route(web::patch().to(update_tool))
            .route(web::delete().to(delete_tool)),
    )
    .service(web::resource("/{tool_id}/shared-users").route(web::get().to(list_shared_users)));
}
