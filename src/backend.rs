// KB Smart Gateway - Backend Gateway Client
// Copyright 2026 Joseph Stone - All Rights Reserved
//
// HTTP translation layer to the knowledge-base backend: project CRUD,
// research ingestion, job polling, hybrid search. Every request carries
// the shared-secret X-API-Key header. No retries, no caching — every
// failure surfaces immediately to the caller.

use reqwest::blocking::{multipart, Client, Response};
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;

/// Credential header attached to every backend request
pub const API_KEY_HEADER: &str = "X-API-Key";

/// Backend call failures
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("backend HTTP {status}: {detail}")]
    Http { status: u16, detail: String },
    #[error("backend transport failure: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("project not found: {0}")]
    ProjectNotFound(String),
}

/// Project reference as reported by the backend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    #[serde(alias = "id")]
    pub project_id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub doc_count: Option<u64>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub search_mode: Option<String>,
}

/// Response to a project-creation call
#[derive(Debug, Clone, Deserialize)]
pub struct CreatedProject {
    #[serde(alias = "id")]
    pub project_id: String,
    pub name: String,
    #[serde(default)]
    pub status: Option<String>,
}

/// Ingestion job state — a fresh read on every poll, never cached
#[derive(Debug, Clone, Deserialize)]
pub struct IngestJob {
    pub job_id: String,
    /// queued / running / completed / failed as reported by the backend
    pub state: String,
    #[serde(default)]
    pub crawled_count: Option<u64>,
    #[serde(default)]
    pub failed_count: Option<u64>,
}

/// Ingestion submission parameters, validated upstream
#[derive(Debug, Clone)]
pub struct IngestRequest {
    pub project_id: String,
    pub research_summary: Option<String>,
    pub urls: Vec<String>,
    pub intent: Option<String>,
    pub depth: u64,
    pub generate_dsl: bool,
}

/// Backend acknowledgement of an ingestion submission
#[derive(Debug, Clone, Deserialize)]
pub struct IngestAccepted {
    pub job_id: String,
    #[serde(default)]
    pub status: Option<String>,
}

/// A single search hit. Score is in the 0-1 range; ordering of a
/// result set is backend-defined.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    pub score: f64,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub snippet: Option<String>,
    #[serde(default)]
    pub metadata: Option<serde_json::Map<String, serde_json::Value>>,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchResult>,
}

/// Blocking HTTP client for the knowledge-base backend
pub struct BackendClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl BackendClient {
    pub fn new(base_url: &str, api_key: &str) -> Result<Self, BackendError> {
        let client = Client::builder()
            .user_agent(concat!("KB-SmartGate/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Create a new project on the backend
    pub fn create_project(
        &self,
        name: &str,
        description: Option<&str>,
    ) -> Result<CreatedProject, BackendError> {
        let mut body = json!({ "name": name });
        if let Some(desc) = description {
            body["description"] = json!(desc);
        }
        let resp = self
            .client
            .post(self.url("/api/projects"))
            .header(API_KEY_HEADER, &self.api_key)
            .json(&body)
            .send()?;
        Ok(check(resp)?.json()?)
    }

    /// List all projects
    pub fn list_projects(&self) -> Result<Vec<Project>, BackendError> {
        let resp = self
            .client
            .get(self.url("/api/projects"))
            .header(API_KEY_HEADER, &self.api_key)
            .send()?;
        Ok(check(resp)?.json()?)
    }

    /// Stats for one project. The backend exposes no single-project
    /// endpoint, so this lists everything and scans for the identifier.
    /// Absence is a domain-level not-found, not a transport failure.
    pub fn project_stats(&self, project_id: &str) -> Result<Project, BackendError> {
        let projects = self.list_projects()?;
        projects
            .into_iter()
            .find(|p| p.project_id == project_id)
            .ok_or_else(|| BackendError::ProjectNotFound(project_id.to_string()))
    }

    /// Submit a research ingestion request. Multipart form because the
    /// payload carries repeated URL values plus free text.
    pub fn submit_research(&self, req: &IngestRequest) -> Result<IngestAccepted, BackendError> {
        let mut form = multipart::Form::new()
            .text("project_id", req.project_id.clone())
            .text("depth", req.depth.to_string())
            .text("generate_dsl", req.generate_dsl.to_string());
        if let Some(ref summary) = req.research_summary {
            form = form.text("research_summary", summary.clone());
        }
        if let Some(ref intent) = req.intent {
            form = form.text("intent", intent.clone());
        }
        for url in &req.urls {
            form = form.text("urls", url.clone());
        }

        let resp = self
            .client
            .post(self.url("/api/ingest"))
            .header(API_KEY_HEADER, &self.api_key)
            .multipart(form)
            .send()?;
        Ok(check(resp)?.json()?)
    }

    /// Poll the status of an ingestion job
    pub fn job_status(&self, job_id: &str) -> Result<IngestJob, BackendError> {
        let resp = self
            .client
            .get(self.url(&format!("/api/jobs/{}", job_id)))
            .header(API_KEY_HEADER, &self.api_key)
            .send()?;
        Ok(check(resp)?.json()?)
    }

    /// Hybrid search within one project
    pub fn search(
        &self,
        project_id: &str,
        query: &str,
        top_k: u64,
        snippet_length: u64,
    ) -> Result<Vec<SearchResult>, BackendError> {
        let body = json!({
            "project_id": project_id,
            "query": query,
            "top_k": top_k,
            "snippet_length": snippet_length,
        });
        let resp = self
            .client
            .post(self.url("/api/search"))
            .header(API_KEY_HEADER, &self.api_key)
            .json(&body)
            .send()?;
        let parsed: SearchResponse = check(resp)?.json()?;
        Ok(parsed.results)
    }
}

/// Turn a non-success response into a BackendError with the most
/// specific detail the body offers.
fn check(resp: Response) -> Result<Response, BackendError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().unwrap_or_default();
    Err(BackendError::Http {
        status: status.as_u16(),
        detail: extract_error_detail(&body),
    })
}

/// Extract error detail from a backend error body: prefer "detail",
/// then "errors", then "message", falling back to the raw body text.
fn extract_error_detail(body: &str) -> String {
    if let Ok(parsed) = serde_json::from_str::<serde_json::Value>(body) {
        for field in ["detail", "errors", "message"] {
            if let Some(value) = parsed.get(field) {
                return match value {
                    serde_json::Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
            }
        }
    }
    let trimmed = body.trim();
    if trimmed.is_empty() {
        "Unknown error".to_string()
    } else {
        trimmed.to_string()
    }
}

// ============================================================================
// TESTS
// ============================================================================
