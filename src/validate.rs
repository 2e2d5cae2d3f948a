// KB Smart Gateway - Input Validator
// Copyright 2026 Joseph Stone - All Rights Reserved
//
// Validates raw tool-call arguments against each tool's declared shape
// before anything touches the backend. A violation names the failed
// constraint; the dispatch layer turns it into an error envelope.

use crate::backend::IngestRequest;
use serde_json::Value;

// ============================================================================
// FIELD HELPERS
// ============================================================================

fn require_str(args: &Value, field: &str) -> Result<String, String> {
    match args.get(field) {
        Some(Value::String(s)) if !s.trim().is_empty() => Ok(s.clone()),
        Some(Value::String(_)) => Err(format!("field '{}' must be a non-empty string", field)),
        Some(_) => Err(format!("field '{}' must be a string", field)),
        None => Err(format!("missing required field '{}'", field)),
    }
}

fn optional_str(args: &Value, field: &str) -> Result<Option<String>, String> {
    match args.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(_) => Err(format!("field '{}' must be a string", field)),
    }
}

fn int_in_range(
    args: &Value,
    field: &str,
    default: u64,
    min: u64,
    max: u64,
) -> Result<u64, String> {
    let value = match args.get(field) {
        None | Some(Value::Null) => return Ok(default),
        Some(Value::Number(n)) => n
            .as_u64()
            .ok_or_else(|| format!("field '{}' must be a non-negative integer", field))?,
        Some(_) => return Err(format!("field '{}' must be an integer", field)),
    };
    if value < min || value > max {
        return Err(format!(
            "field '{}' must be between {} and {}, got {}",
            field, min, max, value
        ));
    }
    Ok(value)
}

fn bool_or_default(args: &Value, field: &str, default: bool) -> Result<bool, String> {
    match args.get(field) {
        None | Some(Value::Null) => Ok(default),
        Some(Value::Bool(b)) => Ok(*b),
        Some(_) => Err(format!("field '{}' must be a boolean", field)),
    }
}

fn optional_str_list(args: &Value, field: &str) -> Result<Option<Vec<String>>, String> {
    match args.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Array(items)) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                match item {
                    Value::String(s) => out.push(s.clone()),
                    _ => return Err(format!("field '{}' must be an array of strings", field)),
                }
            }
            Ok(Some(out))
        }
        Some(_) => Err(format!("field '{}' must be an array of strings", field)),
    }
}

fn optional_object(
    args: &Value,
    field: &str,
) -> Result<Option<serde_json::Map<String, Value>>, String> {
    match args.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Object(map)) => Ok(Some(map.clone())),
        Some(_) => Err(format!("field '{}' must be an object", field)),
    }
}

/// URL-shaped: http/https scheme with a non-empty remainder
fn is_url_shaped(s: &str) -> bool {
    s.strip_prefix("https://")
        .or_else(|| s.strip_prefix("http://"))
        .map(|rest| !rest.is_empty())
        .unwrap_or(false)
}

fn url_list(args: &Value, field: &str) -> Result<Vec<String>, String> {
    let urls = match args.get(field) {
        Some(Value::Array(items)) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                match item {
                    Value::String(s) => out.push(s.clone()),
                    _ => return Err(format!("field '{}' must be an array of URL strings", field)),
                }
            }
            out
        }
        Some(_) => return Err(format!("field '{}' must be an array of URL strings", field)),
        None => return Err(format!("missing required field '{}'", field)),
    };
    if urls.is_empty() {
        return Err(format!("field '{}' must contain at least one URL", field));
    }
    for url in &urls {
        if !is_url_shaped(url) {
            return Err(format!("field '{}': '{}' is not an http/https URL", field, url));
        }
    }
    Ok(urls)
}

// ============================================================================
// PER-TOOL SHAPES
// ============================================================================

#[derive(Debug, Clone)]
pub struct ProjectCreateArgs {
    pub name: String,
    pub description: Option<String>,
}

pub fn project_create(args: &Value) -> Result<ProjectCreateArgs, String> {
    Ok(ProjectCreateArgs {
        name: require_str(args, "name")?,
        description: optional_str(args, "description")?,
    })
}

#[derive(Debug, Clone)]
pub struct ProjectStatsArgs {
    pub project_id: String,
}

pub fn project_stats(args: &Value) -> Result<ProjectStatsArgs, String> {
    Ok(ProjectStatsArgs {
        project_id: require_str(args, "project_id")?,
    })
}

pub fn research_ingest(args: &Value) -> Result<IngestRequest, String> {
    Ok(IngestRequest {
        project_id: require_str(args, "project_id")?,
        research_summary: optional_str(args, "research_summary")?,
        urls: url_list(args, "urls")?,
        intent: optional_str(args, "intent")?,
        depth: int_in_range(args, "depth", 0, 0, 1)?,
        generate_dsl: bool_or_default(args, "generate_dsl", true)?,
    })
}

#[derive(Debug, Clone)]
pub struct JobStatusArgs {
    pub job_id: String,
}

pub fn job_status(args: &Value) -> Result<JobStatusArgs, String> {
    Ok(JobStatusArgs {
        job_id: require_str(args, "job_id")?,
    })
}

#[derive(Debug, Clone)]
pub struct SearchArgs {
    pub project_id: String,
    pub query: String,
    pub top_k: u64,
    pub snippet_length: u64,
}

pub fn search(args: &Value) -> Result<SearchArgs, String> {
    Ok(SearchArgs {
        project_id: require_str(args, "project_id")?,
        query: require_str(args, "query")?,
        top_k: int_in_range(args, "top_k", 10, 1, 50)?,
        snippet_length: int_in_range(args, "snippet_length", 200, 50, 1000)?,
    })
}

#[derive(Debug, Clone)]
pub struct QualityTestArgs {
    pub project_id: String,
    pub test_queries: Option<Vec<String>>,
    pub run_full_suite: bool,
}

pub fn quality_test(args: &Value) -> Result<QualityTestArgs, String> {
    Ok(QualityTestArgs {
        project_id: require_str(args, "project_id")?,
        test_queries: optional_str_list(args, "test_queries")?,
        run_full_suite: bool_or_default(args, "run_full_suite", false)?,
    })
}

#[derive(Debug, Clone)]
pub struct SessionNoteArgs {
    pub project_id: String,
    pub summary_text: String,
    pub job_id: Option<String>,
    pub ingestion_metrics: Option<serde_json::Map<String, Value>>,
    pub tags: Option<Vec<String>>,
}

pub fn session_note(args: &Value) -> Result<SessionNoteArgs, String> {
    Ok(SessionNoteArgs {
        project_id: require_str(args, "project_id")?,
        summary_text: require_str(args, "summary_text")?,
        job_id: optional_str(args, "job_id")?,
        ingestion_metrics: optional_object(args, "ingestion_metrics")?,
        tags: optional_str_list(args, "tags")?,
    })
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    // === REQUIRED FIELDS ===

    #[test]
    fn missing_name_rejected() {
        let err = project_create(&json!({})).unwrap_err();
        assert!(err.contains("name"), "error should name the field: {}", err);
    }

    #[test]
    fn blank_project_id_rejected() {
        let err = project_stats(&json!({"project_id": "   "})).unwrap_err();
        assert!(err.contains("non-empty"), "{}", err);
    }

    #[test]
    fn wrong_type_rejected() {
        let err = job_status(&json!({"job_id": 12})).unwrap_err();
        assert!(err.contains("must be a string"), "{}", err);
    }

    // === INGEST ===

    #[test]
    fn ingest_minimal_valid() {
        let req = research_ingest(&json!({
            "project_id": "proj_1",
            "urls": ["https://example.com/docs"],
        }))
        .unwrap();
        assert_eq!(req.depth, 0);
        assert!(req.generate_dsl);
        assert!(req.research_summary.is_none());
    }

    #[test]
    fn ingest_empty_urls_rejected() {
        let err = research_ingest(&json!({
            "project_id": "proj_1",
            "urls": [],
        }))
        .unwrap_err();
        assert!(err.contains("at least one URL"), "{}", err);
    }

    #[test]
    fn ingest_missing_urls_rejected() {
        let err = research_ingest(&json!({"project_id": "proj_1"})).unwrap_err();
        assert!(err.contains("urls"), "{}", err);
    }

    #[test]
    fn ingest_non_http_url_rejected() {
        let err = research_ingest(&json!({
            "project_id": "proj_1",
            "urls": ["ftp://example.com/file"],
        }))
        .unwrap_err();
        assert!(err.contains("http"), "{}", err);
    }

    #[test]
    fn ingest_depth_out_of_range_rejected() {
        let err = research_ingest(&json!({
            "project_id": "proj_1",
            "urls": ["https://example.com"],
            "depth": 3,
        }))
        .unwrap_err();
        assert!(err.contains("between 0 and 1"), "{}", err);
    }

    // === SEARCH ===

    #[test]
    fn search_defaults_applied() {
        let args = search(&json!({"project_id": "p", "query": "rust async"})).unwrap();
        assert_eq!(args.top_k, 10);
        assert_eq!(args.snippet_length, 200);
    }

    #[test]
    fn search_top_k_bounds() {
        let err = search(&json!({"project_id": "p", "query": "q", "top_k": 51})).unwrap_err();
        assert!(err.contains("between 1 and 50"), "{}", err);
        let err = search(&json!({"project_id": "p", "query": "q", "top_k": 0})).unwrap_err();
        assert!(err.contains("between 1 and 50"), "{}", err);
    }

    #[test]
    fn search_snippet_bounds() {
        let err =
            search(&json!({"project_id": "p", "query": "q", "snippet_length": 49})).unwrap_err();
        assert!(err.contains("between 50 and 1000"), "{}", err);
    }

    #[test]
    fn search_negative_top_k_rejected() {
        let err = search(&json!({"project_id": "p", "query": "q", "top_k": -1})).unwrap_err();
        assert!(err.contains("non-negative"), "{}", err);
    }

    // === QUALITY TEST ===

    #[test]
    fn quality_defaults() {
        let args = quality_test(&json!({"project_id": "p"})).unwrap();
        assert!(args.test_queries.is_none());
        assert!(!args.run_full_suite);
    }

    #[test]
    fn quality_rejects_mixed_query_types() {
        let err =
            quality_test(&json!({"project_id": "p", "test_queries": ["ok", 5]})).unwrap_err();
        assert!(err.contains("array of strings"), "{}", err);
    }

    // === SESSION NOTE ===

    #[test]
    fn note_requires_summary() {
        let err = session_note(&json!({"project_id": "p"})).unwrap_err();
        assert!(err.contains("summary_text"), "{}", err);
    }

    #[test]
    fn note_full_shape_valid() {
        let args = session_note(&json!({
            "project_id": "p",
            "summary_text": "ingested rust book",
            "job_id": "job_9",
            "ingestion_metrics": {"crawled": 12},
            "tags": ["rust", "async"],
        }))
        .unwrap();
        assert_eq!(args.job_id.as_deref(), Some("job_9"));
        assert_eq!(args.tags.as_ref().map(|t| t.len()), Some(2));
    }
}
