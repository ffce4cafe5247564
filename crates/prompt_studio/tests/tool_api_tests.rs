use actix_http::Request;
use actix_web::dev::{Service, ServiceResponse};
use actix_web::http::StatusCode;
use actix_web::{test, web, App, Error};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;
use tempfile::TempDir;
use uuid::Uuid;

use prompt_studio::config::AppConfig;
use prompt_studio::middleware::user_context::{ORGANIZATION_ID_HEADER, USER_ID_HEADER};
use prompt_studio::models::{RegistryExport, ToolInstance};
use prompt_studio::server::{app_config, AppState};
use prompt_studio::services::prompt_engine::{
    AnswerRequest, AnswerResponse, IndexRequest, PromptEngine,
};
use prompt_studio::storage::{EntityStore, MemoryStore};
use prompt_studio::Result;

struct UnusedEngine;

#[async_trait]
impl PromptEngine for UnusedEngine {
    async fn index(&self, _request: IndexRequest) -> Result<Option<String>> {
        Ok(None)
    }

    async fn answer(&self, _request: AnswerRequest) -> Result<AnswerResponse> {
        Ok(AnswerResponse::default())
    }
}

async fn create_test_app(
    max_profile_count: usize,
) -> (
    impl Service<Request, Response = ServiceResponse, Error = Error>,
    Arc<MemoryStore>,
    TempDir,
) {
    let temp_dir = TempDir::new().unwrap();
    let mut config = AppConfig::default().with_data_dir(temp_dir.path().to_path_buf());
    config.max_profile_count = max_profile_count;

    let store = Arc::new(MemoryStore::new());
    let app_state = web::Data::new(AppState::new(
        &config,
        store.clone(),
        Arc::new(UnusedEngine),
        None,
    ));

    let app = test::init_service(App::new().app_data(app_state).configure(app_config)).await;
    (app, store, temp_dir)
}

fn as_user(req: test::TestRequest, user: &str) -> test::TestRequest {
    req.insert_header((USER_ID_HEADER, user))
        .insert_header((ORGANIZATION_ID_HEADER, "org-1"))
}

async fn create_tool<S>(app: &S, name: &str, body: Value) -> Value
where
    S: Service<Request, Response = ServiceResponse, Error = Error>,
{
    let mut body = body;
    body["tool_name"] = json!(name);
    let req = as_user(test::TestRequest::post().uri("/v1/prompt-studio"), "alice")
        .set_json(body)
        .to_request();
    let resp = test::call_service(app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    test::read_body_json(resp).await
}

#[actix_web::test]
async fn test_create_and_list_tools() {
    let (app, _store, _tmp) = create_test_app(4).await;

    let tool = create_tool(&app, "Invoices", json!({"description": "AP invoices"})).await;
    assert_eq!(tool["tool_name"], "Invoices");
    assert!(tool["default_profile"].is_string());

    let req = as_user(test::TestRequest::get().uri("/v1/prompt-studio"), "alice").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let tools: Vec<Value> = test::read_body_json(resp).await;
    assert_eq!(tools.len(), 1);
    assert_eq!(tools[0]["tool_id"], tool["tool_id"]);

    // Not shared with bob
    let req = as_user(test::TestRequest::get().uri("/v1/prompt-studio"), "bob").to_request();
    let tools: Vec<Value> = test::read_body_json(test::call_service(&app, req).await).await;
    assert!(tools.is_empty());
}

#[actix_web::test]
async fn test_duplicate_tool_name_is_rejected() {
    let (app, _store, _tmp) = create_test_app(4).await;
    create_tool(&app, "Invoices", json!({})).await;

    let req = as_user(test::TestRequest::post().uri("/v1/prompt-studio"), "alice")
        .set_json(json!({"tool_name": "Invoices"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"]["type"], "duplicate_data");
}

#[actix_web::test]
async fn test_requests_without_user_headers_are_unauthorized() {
    let (app, _store, _tmp) = create_test_app(4).await;
    let req = test::TestRequest::get().uri("/v1/prompt-studio").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn test_tool_hidden_from_other_users() {
    let (app, _store, _tmp) = create_test_app(4).await;
    let tool = create_tool(&app, "Invoices", json!({})).await;
    let uri = format!("/v1/prompt-studio/{}", tool["tool_id"].as_str().unwrap());

    let req = as_user(test::TestRequest::get().uri(&uri), "bob").to_request();
    assert_eq!(
        test::call_service(&app, req).await.status(),
        StatusCode::NOT_FOUND
    );

    let req = as_user(test::TestRequest::get().uri(&uri), "alice").to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);
}

#[actix_web::test]
async fn test_select_choices_is_not_a_tool_id() {
    let (app, _store, _tmp) = create_test_app(4).await;
    let req = as_user(
        test::TestRequest::get().uri("/v1/prompt-studio/select-choices"),
        "alice",
    )
    .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let choices: Value = test::read_body_json(resp).await;
    assert!(choices["output_type"].is_object());
}

#[actix_web::test]
async fn test_profile_limit_and_duplicates() {
    let (app, _store, _tmp) = create_test_app(2).await;
    let tool = create_tool(&app, "Invoices", json!({})).await;
    let uri = format!(
        "/v1/prompt-studio/{}/profiles",
        tool["tool_id"].as_str().unwrap()
    );

    let req = as_user(test::TestRequest::post().uri(&uri), "alice")
        .set_json(json!({"profile_name": "sample profile"}))
        .to_request();
    assert_eq!(
        test::call_service(&app, req).await.status(),
        StatusCode::BAD_REQUEST
    );

    let req = as_user(test::TestRequest::post().uri(&uri), "alice")
        .set_json(json!({"profile_name": "large chunks", "chunk_size": 4096}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let profile: Value = test::read_body_json(resp).await;
    assert_eq!(profile["chunk_size"], 4096);
    assert_eq!(profile["is_default"], false);

    let req = as_user(test::TestRequest::post().uri(&uri), "alice")
        .set_json(json!({"profile_name": "one too many"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"]["type"], "max_profiles_reached");

    let req = as_user(test::TestRequest::get().uri(&uri), "alice").to_request();
    let profiles: Vec<Value> = test::read_body_json(test::call_service(&app, req).await).await;
    assert_eq!(profiles.len(), 2);
}

#[actix_web::test]
async fn test_make_default_and_summarize_switch() {
    let (app, _store, _tmp) = create_test_app(4).await;
    let tool = create_tool(&app, "Invoices", json!({})).await;
    let tool_id = tool["tool_id"].as_str().unwrap().to_string();

    let req = as_user(
        test::TestRequest::post().uri(&format!("/v1/prompt-studio/{tool_id}/profiles")),
        "alice",
    )
    .set_json(json!({"profile_name": "second"}))
    .to_request();
    let second: Value = test::read_body_json(test::call_service(&app, req).await).await;

    let req = as_user(
        test::TestRequest::patch().uri(&format!("/v1/prompt-studio/{tool_id}/profiles/default")),
        "alice",
    )
    .set_json(json!({"default_profile": second["profile_id"]}))
    .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["default_profile"], second["profile_id"]);

    let req = as_user(
        test::TestRequest::patch().uri(&format!("/v1/prompt-studio/{tool_id}")),
        "alice",
    )
    .set_json(json!({
        "summarize_llm_profile": tool["default_profile"],
        "preamble": "Answer briefly."
    }))
    .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let updated: Value = test::read_body_json(resp).await;
    assert_eq!(updated["default_profile"], second["profile_id"]);
    assert_eq!(updated["summarize_llm_profile"], tool["default_profile"]);
    assert_eq!(updated["preamble"], "Answer briefly.");

    // A profile of another tool cannot be selected
    let req = as_user(
        test::TestRequest::patch().uri(&format!("/v1/prompt-studio/{tool_id}")),
        "alice",
    )
    .set_json(json!({"summarize_llm_profile": Uuid::new_v4()}))
    .to_request();
    assert_eq!(
        test::call_service(&app, req).await.status(),
        StatusCode::NOT_FOUND
    );
}

#[actix_web::test]
async fn test_prompts_and_shared_users() {
    let (app, _store, _tmp) = create_test_app(4).await;
    let tool = create_tool(
        &app,
        "Invoices",
        json!({"shared_users": ["bob"]}),
    )
    .await;
    let tool_id = tool["tool_id"].as_str().unwrap().to_string();

    let req = as_user(
        test::TestRequest::post().uri(&format!("/v1/prompt-studio/{tool_id}/prompts")),
        "bob",
    )
    .set_json(json!({"prompt_key": "total", "prompt": "Invoice total?"}))
    .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let prompt: Value = test::read_body_json(resp).await;
    assert_eq!(prompt["profile_manager"], tool["default_profile"]);
    assert_eq!(prompt["sequence_number"], 1);

    let req = as_user(
        test::TestRequest::post().uri(&format!("/v1/prompt-studio/{tool_id}/prompts")),
        "alice",
    )
    .set_json(json!({"prompt_key": "total"}))
    .to_request();
    assert_eq!(
        test::call_service(&app, req).await.status(),
        StatusCode::BAD_REQUEST
    );

    let req = as_user(
        test::TestRequest::get().uri(&format!("/v1/prompt-studio/{tool_id}/shared-users")),
        "bob",
    )
    .to_request();
    let shared: Value = test::read_body_json(test::call_service(&app, req).await).await;
    assert_eq!(shared["created_by"], "alice");
    assert_eq!(shared["shared_users"], json!(["bob"]));
    assert_eq!(shared["shared_to_org"], false);
}

#[actix_web::test]
async fn test_delete_rules() {
    let (app, store, _tmp) = create_test_app(4).await;
    let tool = create_tool(&app, "Invoices", json!({"shared_users": ["bob"]})).await;
    let tool_id: Uuid = tool["tool_id"].as_str().unwrap().parse().unwrap();
    let uri = format!("/v1/prompt-studio/{tool_id}");

    let req = as_user(test::TestRequest::delete().uri(&uri), "bob").to_request();
    assert_eq!(
        test::call_service(&app, req).await.status(),
        StatusCode::FORBIDDEN
    );

    let now = chrono::Utc::now();
    let export = store
        .upsert_registry(RegistryExport {
            registry_id: Uuid::new_v4(),
            custom_tool_id: tool_id,
            name: "Invoices".into(),
            description: String::new(),
            tool_metadata: json!({}),
            organization_id: "org-1".into(),
            shared_to_org: false,
            shared_users: vec![],
            created_at: now,
            modified_at: now,
        })
        .await
        .unwrap();
    store
        .insert_tool_instance(ToolInstance {
            instance_id: Uuid::new_v4(),
            workflow_id: Uuid::new_v4(),
            tool_id: export.registry_id,
        })
        .await
        .unwrap();

    let req = as_user(test::TestRequest::delete().uri(&uri), "alice").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"]["type"], "tool_delete_error");
    assert!(store.get_tool(tool_id).await.unwrap().is_some());
}

#[actix_web::test]
async fn test_owner_delete_removes_tool() {
    let (app, store, _tmp) = create_test_app(4).await;
    let tool = create_tool(&app, "Invoices", json!({})).await;
    let tool_id: Uuid = tool["tool_id"].as_str().unwrap().parse().unwrap();
    let uri = format!("/v1/prompt-studio/{tool_id}");

    let req = as_user(test::TestRequest::delete().uri(&uri), "alice").to_request();
    assert_eq!(
        test::call_service(&app, req).await.status(),
        StatusCode::NO_CONTENT
    );
    assert!(store.get_tool(tool_id).await.unwrap().is_none());
    assert!(store.list_profiles(tool_id).await.unwrap().is_empty());

    let req = as_user(test::TestRequest::get().uri(&uri), "alice").to_request();
    assert_eq!(
        test::call_service(&app, req).await.status(),
        StatusCode::NOT_FOUND
    );
}
