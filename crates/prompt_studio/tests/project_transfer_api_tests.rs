use actix_http::Request;
use actix_web::dev::{Service, ServiceResponse};
use actix_web::http::{header, StatusCode};
use actix_web::{test, web, App, Error};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;
use tempfile::TempDir;
use uuid::Uuid;

use prompt_studio::config::AppConfig;
use prompt_studio::middleware::user_context::{ORGANIZATION_ID_HEADER, USER_ID_HEADER};
use prompt_studio::models::{Adapter, AdapterType};
use prompt_studio::server::{app_config, AppState};
use prompt_studio::services::prompt_engine::{
    AnswerRequest, AnswerResponse, IndexRequest, PromptEngine,
};
use prompt_studio::storage::{EntityStore, MemoryStore};
use prompt_studio::Result;

const BOUNDARY: &str = "----projecttransferboundary";

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

async fn create_test_app() -> (
    impl Service<Request, Response = ServiceResponse, Error = Error>,
    Arc<MemoryStore>,
    TempDir,
) {
    let temp_dir = TempDir::new().unwrap();
    let config = AppConfig::default().with_data_dir(temp_dir.path().to_path_buf());
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

fn as_alice(req: test::TestRequest) -> test::TestRequest {
    req.insert_header((USER_ID_HEADER, "alice"))
        .insert_header((ORGANIZATION_ID_HEADER, "org-1"))
}

/// `(field name, optional file name, value)`
fn multipart_form(parts: &[(&str, Option<&str>, &str)]) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, file_name, value) in parts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        match file_name {
            Some(file_name) => body.extend_from_slice(
                format!(
                    "Content-Disposition: form-data; name=\"{name}\"; filename=\"{file_name}\"\r\n\
                     Content-Type: application/json\r\n\r\n"
                )
                .as_bytes(),
            ),
            None => body.extend_from_slice(
                format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n").as_bytes(),
            ),
        }
        body.extend_from_slice(value.as_bytes());
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

fn import_request(parts: &[(&str, Option<&str>, &str)]) -> Request {
    as_alice(test::TestRequest::post().uri("/v1/prompt-studio/project-transfer"))
        .insert_header((
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        ))
        .set_payload(multipart_form(parts))
        .to_request()
}

async fn setup_tool<S>(app: &S) -> String
where
    S: Service<Request, Response = ServiceResponse, Error = Error>,
{
    let req = as_alice(test::TestRequest::post().uri("/v1/prompt-studio"))
        .set_json(json!({"tool_name": "Invoices", "preamble": "Be precise."}))
        .to_request();
    let tool: Value = test::read_body_json(test::call_service(app, req).await).await;
    let tool_id = tool["tool_id"].as_str().unwrap().to_string();

    for key in ["total", "vendor"] {
        let req = as_alice(
            test::TestRequest::post().uri(&format!("/v1/prompt-studio/{tool_id}/prompts")),
        )
        .set_json(json!({"prompt_key": key, "prompt": format!("What is the {key}?")}))
        .to_request();
        assert_eq!(
            test::call_service(app, req).await.status(),
            StatusCode::CREATED
        );
    }
    tool_id
}

#[actix_web::test]
async fn test_export_project_then_import_it() {
    let (app, _store, _tmp) = create_test_app().await;
    let tool_id = setup_tool(&app).await;

    let req = as_alice(
        test::TestRequest::get().uri(&format!("/v1/prompt-studio/{tool_id}/project-export")),
    )
    .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let disposition = resp
        .headers()
        .get(header::CONTENT_DISPOSITION)
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(disposition.starts_with("attachment"));
    assert!(disposition.contains("Invoices_"));
    let exported = String::from_utf8(test::read_body(resp).await.to_vec()).unwrap();
    let document: Value = serde_json::from_str(&exported).unwrap();
    assert_eq!(document["tool_metadata"]["tool_name"], "Invoices");
    assert_eq!(document["tool_settings"]["preamble"], "Be precise.");
    assert_eq!(document["prompts"][1]["profile_name"], "sample profile");
    assert_eq!(document["export_metadata"]["source_tool_id"], tool_id.as_str());

    let resp = test::call_service(
        &app,
        import_request(&[("file", Some("invoices.json"), exported.as_str())]),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let imported: Value = test::read_body_json(resp).await;
    assert_eq!(
        imported["message"],
        "Project imported successfully as 'Invoices (1)'"
    );
    assert_eq!(imported["needs_adapter_config"], true);
    assert!(imported["warning"].is_string());

    let new_id = imported["tool_id"].as_str().unwrap();
    let req = as_alice(
        test::TestRequest::get().uri(&format!("/v1/prompt-studio/{new_id}/project-export")),
    )
    .to_request();
    let reexported: Value = test::read_body_json(test::call_service(&app, req).await).await;
    assert_eq!(reexported["prompts"], document["prompts"]);
    assert_eq!(reexported["tool_settings"], document["tool_settings"]);
}

#[actix_web::test]
async fn test_import_with_selected_adapters() {
    let (app, store, _tmp) = create_test_app().await;
    let mut ids = Vec::new();
    for (name, adapter_type) in [
        ("gpt", AdapterType::Llm),
        ("qdrant", AdapterType::VectorDb),
        ("ada", AdapterType::Embedding),
        ("whisperer", AdapterType::X2text),
    ] {
        let adapter = store
            .insert_adapter(Adapter {
                adapter_id: Uuid::new_v4(),
                adapter_name: name.into(),
                adapter_type,
                organization_id: "org-1".into(),
                is_default: false,
            })
            .await
            .unwrap();
        ids.push(adapter.adapter_id.to_string());
    }

    let document = json!({
        "tool_metadata": {"tool_name": "Contracts"},
        "prompts": [{"prompt_key": "party", "prompt": "Who signs?"}]
    })
    .to_string();
    let resp = test::call_service(
        &app,
        import_request(&[
            ("file", Some("contracts.json"), document.as_str()),
            ("llm_adapter_id", None, ids[0].as_str()),
            ("vector_db_adapter_id", None, ids[1].as_str()),
            ("embedding_adapter_id", None, ids[2].as_str()),
            ("x2text_adapter_id", None, ids[3].as_str()),
        ]),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let imported: Value = test::read_body_json(resp).await;
    assert_eq!(imported["needs_adapter_config"], false);
    assert!(imported.get("warning").is_none());

    let tool_id: Uuid = imported["tool_id"].as_str().unwrap().parse().unwrap();
    let profiles = store.list_profiles(tool_id).await.unwrap();
    assert_eq!(profiles.len(), 1);
    assert!(profiles[0].is_default);
    assert_eq!(profiles[0].llm.map(|id| id.to_string()), Some(ids[0].clone()));
}

#[actix_web::test]
async fn test_import_rejects_bad_input() {
    let (app, store, _tmp) = create_test_app().await;

    let resp = test::call_service(&app, import_request(&[("other", None, "x")])).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "No file provided");

    let resp = test::call_service(
        &app,
        import_request(&[("file", Some("broken.json"), "{not json")]),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = test::call_service(
        &app,
        import_request(&[(
            "file",
            Some("no-prompts.json"),
            r#"{"tool_metadata": {"tool_name": "x"}}"#,
        )]),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let embedding = store
        .insert_adapter(Adapter {
            adapter_id: Uuid::new_v4(),
            adapter_name: "ada".into(),
            adapter_type: AdapterType::Embedding,
            organization_id: "org-1".into(),
            is_default: false,
        })
        .await
        .unwrap();
    let document = r#"{"tool_metadata": {"tool_name": "Contracts"}, "prompts": []}"#;
    let wrong_kind = embedding.adapter_id.to_string();
    let resp = test::call_service(
        &app,
        import_request(&[
            ("file", Some("contracts.json"), document),
            ("llm_adapter_id", None, wrong_kind.as_str()),
        ]),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert!(!store.tool_name_exists("org-1", "Contracts").await.unwrap());
}

#[actix_web::test]
async fn test_import_failure_is_reported_generically() {
    let (app, store, _tmp) = create_test_app().await;
    let document = r#"{
        "tool_metadata": {"tool_name": "Dupes"},
        "prompts": [{"prompt_key": "same"}, {"prompt_key": "same"}]
    }"#;

    let resp = test::call_service(
        &app,
        import_request(&[("file", Some("dupes.json"), document)]),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "Failed to import project");
    assert!(!store.tool_name_exists("org-1", "Dupes").await.unwrap());
}

#[actix_web::test]
async fn test_registry_export_flow() {
    let (app, _store, _tmp) = create_test_app().await;
    let tool_id = setup_tool(&app).await;
    let uri = format!("/v1/prompt-studio/{tool_id}/export");

    let req = as_alice(test::TestRequest::get().uri(&uri)).to_request();
    assert_eq!(
        test::call_service(&app, req).await.status(),
        StatusCode::NO_CONTENT
    );

    // Prompts never ran
    let req = as_alice(test::TestRequest::post().uri(&uri))
        .set_json(json!({"is_shared_with_org": false, "user_id": []}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"]["type"], "tool_export_error");

    let req = as_alice(test::TestRequest::post().uri(&uri))
        .set_json(json!({"is_shared_with_org": true, "user_id": ["bob"], "force_export": true}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["message"], "Custom tool exported successfully.");

    let req = as_alice(test::TestRequest::get().uri(&uri)).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let info: Value = test::read_body_json(resp).await;
    assert_eq!(info["custom_tool_id"], tool_id.as_str());
    assert_eq!(info["shared_to_org"], true);
    assert_eq!(info["shared_users"], json!(["bob", "alice"]));
}
