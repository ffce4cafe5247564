//! Client side of the prompt service that performs indexing and LLM prompt
//! execution. The service itself lives outside this crate.

use anyhow::{anyhow, Context};
use async_trait::async_trait;
use log::{error, info};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

use crate::error::Result;
use crate::models::{ProfileManager, ToolStudioPrompt};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProfileSettings {
    pub profile_id: Uuid,
    pub llm: Option<Uuid>,
    pub vector_store: Option<Uuid>,
    pub embedding_model: Option<Uuid>,
    pub x2text: Option<Uuid>,
    pub chunk_size: u32,
    pub chunk_overlap: u32,
    pub retrieval_strategy: String,
    pub similarity_top_k: u32,
    pub section: String,
    pub reindex: bool,
}

impl From<&ProfileManager> for ProfileSettings {
    fn from(profile: &ProfileManager) -> Self {
        Self {
            profile_id: profile.profile_id,
            llm: profile.llm,
            vector_store: profile.vector_store,
            embedding_model: profile.embedding_model,
            x2text: profile.x2text,
            chunk_size: profile.chunk_size,
            chunk_overlap: profile.chunk_overlap,
            retrieval_strategy: profile.retrieval_strategy.clone(),
            similarity_top_k: profile.similarity_top_k,
            section: profile.section.clone(),
            reindex: profile.reindex,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexRequest {
    pub tool_id: Uuid,
    pub document_id: Uuid,
    pub run_id: String,
    pub organization_id: String,
    pub user_id: String,
    pub file_path: String,
    pub is_summary: bool,
    pub profile: ProfileSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptPayload {
    pub prompt_id: Uuid,
    pub prompt_key: String,
    pub prompt: String,
    pub output_type: String,
    pub enforce_type: String,
    pub profile: ProfileSettings,
}

impl PromptPayload {
    pub fn new(prompt: &ToolStudioPrompt, profile: &ProfileManager) -> Self {
        Self {
            prompt_id: prompt.prompt_id,
            prompt_key: prompt.prompt_key.clone(),
            prompt: prompt.prompt.clone(),
            output_type: prompt.output_type.clone(),
            enforce_type: prompt.enforce_type.clone(),
            profile: ProfileSettings::from(profile),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerRequest {
    pub tool_id: Uuid,
    pub document_id: Uuid,
    pub run_id: String,
    pub organization_id: String,
    pub user_id: String,
    pub file_path: String,
    pub preamble: String,
    pub postamble: String,
    pub summarize_as_source: bool,
    pub enable_challenge: bool,
    pub single_pass: bool,
    pub prompts: Vec<PromptPayload>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AnswerResponse {
    /// Output keyed by prompt key
    #[serde(default)]
    pub output: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

#[async_trait]
pub trait PromptEngine: Send + Sync {
    /// Index a document, returning the index id or `None` when the run
    /// produced nothing usable.
    async fn index(&self, request: IndexRequest) -> Result<Option<String>>;

    async fn answer(&self, request: AnswerRequest) -> Result<AnswerResponse>;
}

#[derive(Debug, Deserialize)]
struct IndexResponse {
    doc_id: Option<String>,
}

/// Talks to the prompt service over HTTP
pub struct HttpPromptEngine {
    client: reqwest::Client,
    base_url: String,
}

impl HttpPromptEngine {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build prompt service client")?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    async fn post<Req: Serialize + Sync, Res: for<'de> Deserialize<'de>>(
        &self,
        endpoint: &str,
        body: &Req,
    ) -> Result<Res> {
        let url = format!("{}/{}", self.base_url, endpoint);
        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| {
                error!("Failed to reach prompt service at {}: {}", url, e);
                anyhow!("Failed to reach prompt service: {}", e)
            })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            error!("Prompt service {} returned {}: {}", endpoint, status, text);
            return Err(anyhow!("Prompt service returned {}", status).into());
        }

        let parsed = response
            .json::<Res>()
            .await
            .with_context(|| format!("Invalid response from prompt service {endpoint}"))?;
        Ok(parsed)
    }
}

#[async_trait]
impl PromptEngine for HttpPromptEngine {
    async fn index(&self, request: IndexRequest) -> Result<Option<String>> {
        info!(
            "Indexing document {} for tool {} (run {})",
            request.document_id, request.tool_id, request.run_id
        );
        let response: IndexResponse = self.post("index", &request).await?;
        Ok(response.doc_id.filter(|id| !id.trim().is_empty()))
    }

    async fn answer(&self, request: AnswerRequest) -> Result<AnswerResponse> {
        info!(
            "Running {} prompt(s) for tool {} (run {})",
            request.prompts.len(),
            request.tool_id,
            request.run_id
        );
        self.post("answer-prompt", &request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn index_request() -> IndexRequest {
        let profile = ProfileManager::new(Uuid::new_v4(), "p", "alice");
        IndexRequest {
            tool_id: profile.tool_id,
            document_id: Uuid::new_v4(),
            run_id: "run-1".into(),
            organization_id: "org-1".into(),
            user_id: "alice".into(),
            file_path: "/tmp/a.pdf".into(),
            is_summary: false,
            profile: ProfileSettings::from(&profile),
        }
    }

    #[tokio::test]
    async fn test_index_returns_doc_id() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/index"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"doc_id": "abc"})),
            )
            .mount(&server)
            .await;

        let engine = HttpPromptEngine::new(server.uri(), Duration::from_secs(5)).unwrap();
        let id = engine.index(index_request()).await.unwrap();
        assert_eq!(id.as_deref(), Some("abc"));
    }

    #[tokio::test]
    async fn test_index_blank_doc_id_is_none() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/index"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"doc_id": ""})),
            )
            .mount(&server)
            .await;

        let engine = HttpPromptEngine::new(server.uri(), Duration::from_secs(5)).unwrap();
        assert!(engine.index(index_request()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_answer_propagates_server_errors() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/answer-prompt"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let engine = HttpPromptEngine::new(server.uri(), Duration::from_secs(5)).unwrap();
        let request = AnswerRequest {
            tool_id: Uuid::new_v4(),
            document_id: Uuid::new_v4(),
            run_id: "run-1".into(),
            organization_id: "org-1".into(),
            user_id: "alice".into(),
            file_path: "/tmp/a.pdf".into(),
            preamble: String::new(),
            postamble: String::new(),
            summarize_as_source: false,
            enable_challenge: false,
            single_pass: true,
            prompts: vec![],
        };
        assert!(engine.answer(request).await.is_err());
    }
}
