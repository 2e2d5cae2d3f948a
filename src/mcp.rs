// KB Smart Gateway - MCP Server (JSON-RPC 2.0 over stdio)
// Copyright 2026 Joseph Stone - All Rights Reserved
//
// ALL knowledge-base tool calls route through this gateway.
// Exposes: kb_project_create, kb_project_list, kb_project_stats,
//          kb_research_ingest, kb_job_status, kb_search,
//          kb_search_quality_test, kb_log_session_note
//
// Dispatch contract, every call: validate input shape -> guardrail
// scan (free-text tools only) -> backend invoke -> response envelope.
// Every call produces an envelope; nothing raises past this boundary.

use crate::backend::{BackendClient, BackendError};
use crate::config::GatewayConfig;
use crate::guard;
use crate::notes;
use crate::policy::GuardrailPolicy;
use crate::quality::{self, PROBE_SUITE};
use crate::validate;
use serde_json::{json, Value};
use std::io::{self, BufRead, Write};

const PROTOCOL_VERSION: &str = "2024-11-05";
const SERVER_NAME: &str = "kb-smart-gate";
const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Log to stderr (stdout is JSON-RPC)
fn log(msg: &str) {
    eprintln!("[kb-smart-gate] {}", msg);
}

/// Send JSON-RPC response
fn send_response(id: &Value, result: Value) {
    let response = json!({
        "jsonrpc": "2.0",
        "id": id,
        "result": result,
    });
    let msg = serde_json::to_string(&response).unwrap();
    let stdout = io::stdout();
    let mut out = stdout.lock();
    let _ = out.write_all(msg.as_bytes());
    let _ = out.write_all(b"\n");
    let _ = out.flush();
}

/// Send JSON-RPC error response
fn send_error(id: &Value, code: i64, message: &str) {
    let response = json!({
        "jsonrpc": "2.0",
        "id": id,
        "error": { "code": code, "message": message },
    });
    let msg = serde_json::to_string(&response).unwrap();
    let stdout = io::stdout();
    let mut out = stdout.lock();
    let _ = out.write_all(msg.as_bytes());
    let _ = out.write_all(b"\n");
    let _ = out.flush();
}

// ============================================================================
// TOOL CATALOG
// ============================================================================

/// MCP tool definition helper
fn tool_def(
    name: &str,
    title: &str,
    description: &str,
    properties: Value,
    required: Vec<&str>,
    output_properties: Value,
    output_required: Vec<&str>,
) -> Value {
    json!({
        "name": name,
        "title": title,
        "description": description,
        "inputSchema": {
            "type": "object",
            "properties": properties,
            "required": required,
        },
        "outputSchema": {
            "type": "object",
            "properties": output_properties,
            "required": output_required,
        }
    })
}

/// Return all tool definitions
pub fn tool_definitions() -> Vec<Value> {
    vec![
        // ====== PROJECTS ======
        tool_def(
            "kb_project_create",
            "Create Project",
            "Create a new knowledge-base project on the backend.",
            json!({
                "name": {"type": "string", "minLength": 1, "description": "Display name for the new project"},
                "description": {"type": "string", "description": "Optional project description"}
            }),
            vec!["name"],
            json!({
                "project_id": {"type": "string"},
                "name": {"type": "string"},
                "status": {"type": "string"}
            }),
            vec!["project_id", "name"],
        ),
        tool_def(
            "kb_project_list",
            "List Projects",
            "List all knowledge-base projects with document counts.",
            json!({}),
            vec![],
            json!({
                "count": {"type": "integer"},
                "projects": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "project_id": {"type": "string"},
                            "name": {"type": "string"},
                            "doc_count": {"type": "integer"}
                        },
                        "required": ["project_id"]
                    }
                }
            }),
            vec!["count", "projects"],
        ),
        tool_def(
            "kb_project_stats",
            "Project Stats",
            "Stats for one project: name, document count, creation time. Unknown identifiers are a not-found error.",
            json!({
                "project_id": {"type": "string", "description": "Project identifier"}
            }),
            vec!["project_id"],
            json!({
                "project_id": {"type": "string"},
                "name": {"type": "string"},
                "doc_count": {"type": "integer"},
                "created_at": {"type": "string"}
            }),
            vec!["project_id"],
        ),
        // ====== INGESTION ======
        tool_def(
            "kb_research_ingest",
            "Submit Research",
            "Submit URLs for crawling and ingestion into a project. Returns a job id to poll with kb_job_status.",
            json!({
                "project_id": {"type": "string", "description": "Target project"},
                "research_summary": {"type": "string", "description": "Free-text summary of the research goal"},
                "urls": {"type": "array", "items": {"type": "string", "format": "uri"}, "minItems": 1, "description": "Source URLs to crawl (http/https)"},
                "intent": {"type": "string", "description": "What the ingested material will be used for"},
                "depth": {"type": "integer", "minimum": 0, "maximum": 1, "default": 0, "description": "Crawl depth in hops from the submitted URLs"},
                "generate_dsl": {"type": "boolean", "default": true, "description": "Generate retrieval DSL hints during ingestion"}
            }),
            vec!["project_id", "urls"],
            json!({
                "job_id": {"type": "string"},
                "project_id": {"type": "string"},
                "status": {"type": "string"}
            }),
            vec!["job_id", "project_id", "status"],
        ),
        tool_def(
            "kb_job_status",
            "Job Status",
            "Poll the state of an ingestion job. Each check is a fresh read — nothing is cached.",
            json!({
                "job_id": {"type": "string", "description": "Job identifier from kb_research_ingest"}
            }),
            vec!["job_id"],
            json!({
                "job_id": {"type": "string"},
                "state": {"type": "string"},
                "crawled_count": {"type": "integer"},
                "failed_count": {"type": "integer"}
            }),
            vec!["job_id", "state"],
        ),
        // ====== SEARCH ======
        tool_def(
            "kb_search",
            "Search Project",
            "Hybrid search within one project. Read-only.",
            json!({
                "project_id": {"type": "string", "description": "Project to search"},
                "query": {"type": "string", "minLength": 1, "description": "Search query"},
                "top_k": {"type": "integer", "minimum": 1, "maximum": 50, "default": 10, "description": "Maximum results"},
                "snippet_length": {"type": "integer", "minimum": 50, "maximum": 1000, "default": 200, "description": "Snippet length in characters"}
            }),
            vec!["project_id", "query"],
            json!({
                "query": {"type": "string"},
                "result_count": {"type": "integer"},
                "results": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "score": {"type": "number"},
                            "title": {"type": "string"},
                            "snippet": {"type": "string"}
                        },
                        "required": ["score"]
                    }
                }
            }),
            vec!["query", "result_count", "results"],
        ),
        tool_def(
            "kb_search_quality_test",
            "Search Quality Test",
            "Run a batch of probe queries against a project and reduce them into relevance statistics. Uses the built-in five-query probe suite unless test_queries is given.",
            json!({
                "project_id": {"type": "string", "description": "Project to probe"},
                "test_queries": {"type": "array", "items": {"type": "string"}, "description": "Caller-supplied probe queries (deduplicated, order preserved)"},
                "run_full_suite": {"type": "boolean", "default": false, "description": "Force the built-in probe suite"}
            }),
            vec!["project_id"],
            json!({
                "queries_tested": {"type": "integer"},
                "average_top_score": {"type": "number"},
                "zero_result_queries": {"type": "array", "items": {"type": "string"}}
            }),
            vec!["queries_tested", "average_top_score", "zero_result_queries"],
        ),
        // ====== SESSION ======
        tool_def(
            "kb_log_session_note",
            "Log Session Note",
            "Record an ephemeral session note. Purely local — the gateway persists nothing; the note exists only in this response.",
            json!({
                "project_id": {"type": "string", "description": "Project the note refers to"},
                "summary_text": {"type": "string", "minLength": 1, "description": "Free-text session summary"},
                "job_id": {"type": "string", "description": "Related ingestion job, if any"},
                "ingestion_metrics": {"type": "object", "description": "Crawl metrics to attach"},
                "tags": {"type": "array", "items": {"type": "string"}, "description": "Freeform tags"}
            }),
            vec!["project_id", "summary_text"],
            json!({
                "note_id": {"type": "string"},
                "project_id": {"type": "string"},
                "timestamp": {"type": "string"}
            }),
            vec!["note_id", "project_id", "timestamp"],
        ),
    ]
}

// ============================================================================
// RESPONSE ENVELOPE
// ============================================================================

/// Per-operation outcome: (human-readable summary, structured payload)
type ToolOutcome = Result<(String, Value), String>;

/// Success envelope: structured payload + human-readable summary
fn success(text: String, structured: Value) -> Value {
    json!({
        "content": [{"type": "text", "text": text}],
        "structuredContent": structured,
        "isError": false,
    })
}

/// Error envelope — every failure funnels through here
fn failure(message: &str) -> Value {
    let msg = message.trim();
    let msg = if msg.is_empty() { "Unknown error" } else { msg };
    json!({
        "content": [{"type": "text", "text": format!("ERROR: {}", msg)}],
        "isError": true,
    })
}

fn backend_msg(err: BackendError) -> String {
    err.to_string()
}

// ============================================================================
// TOOL HANDLERS
// ============================================================================

fn project_create(args: &Value, client: &BackendClient) -> ToolOutcome {
    let parsed = validate::project_create(args)?;
    let created = client
        .create_project(&parsed.name, parsed.description.as_deref())
        .map_err(backend_msg)?;
    let status = created.status.as_deref().unwrap_or("created");
    let text = format!(
        "Project created: {}\nID: {}\nStatus: {}",
        created.name, created.project_id, status
    );
    let structured = json!({
        "project_id": created.project_id,
        "name": created.name,
        "status": status,
    });
    Ok((text, structured))
}

fn project_list(client: &BackendClient) -> ToolOutcome {
    let projects = client.list_projects().map_err(backend_msg)?;
    let mut text = format!("Projects: {}", projects.len());
    for p in &projects {
        text.push_str(&format!(
            "\n - {} | {} | {} docs",
            p.project_id,
            p.name.as_deref().unwrap_or("(unnamed)"),
            p.doc_count.map_or("-".to_string(), |c| c.to_string()),
        ));
    }
    let structured = json!({
        "count": projects.len(),
        "projects": projects.iter().map(|p| json!({
            "project_id": &p.project_id,
            "name": &p.name,
            "doc_count": p.doc_count,
        })).collect::<Vec<_>>(),
    });
    Ok((text, structured))
}

fn project_stats(args: &Value, client: &BackendClient) -> ToolOutcome {
    let parsed = validate::project_stats(args)?;
    let project = client
        .project_stats(&parsed.project_id)
        .map_err(backend_msg)?;
    let text = format!(
        "Project: {}\nName: {}\nDocuments: {}\nCreated: {}",
        project.project_id,
        project.name.as_deref().unwrap_or("-"),
        project.doc_count.map_or("-".to_string(), |c| c.to_string()),
        project.created_at.as_deref().unwrap_or("-"),
    );
    let structured = json!({
        "project_id": project.project_id,
        "name": project.name,
        "doc_count": project.doc_count,
        "created_at": project.created_at,
    });
    Ok((text, structured))
}

fn research_ingest(args: &Value, client: &BackendClient) -> ToolOutcome {
    let req = validate::research_ingest(args)?;

    // Guardrail scan on the free-text fields before anything leaves
    // this process
    let sensitive = json!({
        "research_summary": &req.research_summary,
        "intent": &req.intent,
    });
    if guard::contains_bypass(&sensitive) {
        return Err(guard::REJECTION_MESSAGE.to_string());
    }

    let accepted = client.submit_research(&req).map_err(backend_msg)?;
    let text = format!(
        "Research submitted: {}\nJob: {}\nSources: {} URL(s) | depth {} | dsl {}\nStatus: queued",
        req.project_id,
        accepted.job_id,
        req.urls.len(),
        req.depth,
        if req.generate_dsl { "on" } else { "off" },
    );
    let structured = json!({
        "job_id": accepted.job_id,
        "project_id": req.project_id,
        "status": "queued",
    });
    Ok((text, structured))
}

fn job_status(args: &Value, client: &BackendClient) -> ToolOutcome {
    let parsed = validate::job_status(args)?;
    let job = client.job_status(&parsed.job_id).map_err(backend_msg)?;
    let text = format!(
        "Job {}: {}\nCrawled: {} | Failed: {}",
        job.job_id,
        job.state,
        job.crawled_count.map_or("-".to_string(), |c| c.to_string()),
        job.failed_count.map_or("-".to_string(), |c| c.to_string()),
    );
    let structured = json!({
        "job_id": job.job_id,
        "state": job.state,
        "crawled_count": job.crawled_count,
        "failed_count": job.failed_count,
    });
    Ok((text, structured))
}

fn search(args: &Value, client: &BackendClient) -> ToolOutcome {
    let parsed = validate::search(args)?;
    let results = client
        .search(
            &parsed.project_id,
            &parsed.query,
            parsed.top_k,
            parsed.snippet_length,
        )
        .map_err(backend_msg)?;

    let mut text = format!(
        "Search: \"{}\" in {}\nResults: {}",
        parsed.query,
        parsed.project_id,
        results.len()
    );
    for (i, r) in results.iter().enumerate() {
        text.push_str(&format!(
            "\n{:>3}. [{:.2}] {}",
            i + 1,
            r.score,
            r.title.as_deref().unwrap_or("(untitled)"),
        ));
        if let Some(snippet) = r.snippet.as_deref() {
            text.push_str(&format!("\n     {}", snippet));
        }
    }
    let structured = json!({
        "query": parsed.query,
        "result_count": results.len(),
        "results": results.iter().map(|r| json!({
            "score": r.score,
            "title": &r.title,
            "snippet": &r.snippet,
        })).collect::<Vec<_>>(),
    });
    Ok((text, structured))
}

fn search_quality_test(args: &Value, client: &BackendClient) -> ToolOutcome {
    let parsed = validate::quality_test(args)?;

    // Caller queries when given; the built-in probe suite when forced
    // or when nothing was supplied
    let suite: Vec<String> = PROBE_SUITE.iter().map(|s| s.to_string()).collect();
    let queries = if parsed.run_full_suite {
        suite
    } else {
        parsed.test_queries.unwrap_or(suite)
    };

    let report = quality::run_quality_test(client, &parsed.project_id, &queries)
        .map_err(|e| e.to_string())?;

    let zero = if report.zero_result_queries.is_empty() {
        "none".to_string()
    } else {
        report.zero_result_queries.join(", ")
    };
    let mut text = format!(
        "Quality test: {}\nQueries tested: {}\nAverage top score: {:.4}\nZero-result queries: {}",
        parsed.project_id, report.queries_tested, report.average_top_score, zero,
    );
    for b in &report.breakdown {
        text.push_str(&format!(
            "\n - \"{}\" | top {:.2} | {} result(s)",
            b.query, b.top_score, b.result_count
        ));
    }
    let structured = json!({
        "queries_tested": report.queries_tested,
        "average_top_score": report.average_top_score,
        "zero_result_queries": report.zero_result_queries,
    });
    Ok((text, structured))
}

fn log_session_note(args: &Value) -> ToolOutcome {
    let parsed = validate::session_note(args)?;

    // Guardrail scan over every free-form part of the note
    let sensitive = json!({
        "summary_text": &parsed.summary_text,
        "tags": &parsed.tags,
        "ingestion_metrics": &parsed.ingestion_metrics,
    });
    if guard::contains_bypass(&sensitive) {
        return Err(guard::REJECTION_MESSAGE.to_string());
    }

    // Purely local: no backend call, no storage. The note lives only
    // in this response.
    let note = notes::create_note(parsed);
    let text = format!(
        "Session note logged (ephemeral — not persisted)\nID: {}\nProject: {}\nTime: {}",
        note.note_id, note.project_id, note.timestamp,
    );
    let structured = json!({
        "note_id": note.note_id,
        "project_id": note.project_id,
        "timestamp": note.timestamp,
    });
    Ok((text, structured))
}

/// Handle a tool call. Single choke point: every outcome — success,
/// validation failure, guardrail rejection, backend failure — becomes
/// an envelope here. Never panics, never propagates.
pub fn handle_tool_call(name: &str, args: &Value, client: &BackendClient) -> Value {
    let outcome = match name {
        "kb_project_create" => project_create(args, client),
        "kb_project_list" => project_list(client),
        "kb_project_stats" => project_stats(args, client),
        "kb_research_ingest" => research_ingest(args, client),
        "kb_job_status" => job_status(args, client),
        "kb_search" => search(args, client),
        "kb_search_quality_test" => search_quality_test(args, client),
        "kb_log_session_note" => log_session_note(args),
        _ => Err(format!("unknown tool '{}'", name)),
    };

    match outcome {
        Ok((text, structured)) => success(text, structured),
        Err(msg) => failure(&msg),
    }
}

// ============================================================================
// SERVER LOOP
// ============================================================================

/// Run the MCP stdio server. The policy has already been verified by
/// the caller — the rendered text is injected into every session via
/// the initialize result's instructions field.
pub fn run(config: &GatewayConfig, policy: &GuardrailPolicy) -> Result<(), BackendError> {
    log(&format!("Starting {} v{}", SERVER_NAME, SERVER_VERSION));
    log(&format!("Backend: {}", config.backend_url));
    log(&format!(
        "Guardrail policy v{} active (sha256 {})",
        policy.version,
        &policy.sha256[..16.min(policy.sha256.len())],
    ));

    let client = BackendClient::new(&config.backend_url, &config.api_key)?;

    let stdin = io::stdin();
    for line in stdin.lock().lines() {
        let line = match line {
            Ok(l) => l,
            Err(e) => {
                log(&format!("stdin read error: {}", e));
                continue;
            }
        };

        let line = line.trim().to_string();
        if line.is_empty() {
            continue;
        }

        let msg: Value = match serde_json::from_str(&line) {
            Ok(v) => v,
            Err(e) => {
                log(&format!("JSON parse error: {}", e));
                continue;
            }
        };

        let method = msg["method"].as_str().unwrap_or("");
        let id = &msg["id"];
        let params = &msg["params"];

        if config.verbose {
            log(&format!("Received: {}", method));
        }

        match method {
            "initialize" => {
                send_response(id, json!({
                    "protocolVersion": PROTOCOL_VERSION,
                    "capabilities": { "tools": {} },
                    "serverInfo": {
                        "name": SERVER_NAME,
                        "version": SERVER_VERSION,
                    },
                    "instructions": policy.rendered,
                }));
            }

            "notifications/initialized" => {
                // No response needed
            }

            "tools/list" => {
                send_response(id, json!({ "tools": tool_definitions() }));
            }

            "tools/call" => {
                let name = params["name"].as_str().unwrap_or("");
                let args = params.get("arguments").cloned().unwrap_or(json!({}));

                if config.verbose {
                    log(&format!("CALL {}", name));
                }

                let result = handle_tool_call(name, &args, &client);
                send_response(id, result);
            }

            "ping" => {
                send_response(id, json!({}));
            }

            _ => {
                if !id.is_null() {
                    send_error(id, -32601, &format!("Unknown method: {}", method));
                }
            }
        }
    }

    Ok(())
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    /// Client pointed at a closed local port — any request attempt
    /// fails immediately with a transport error. Tools that reject
    /// before the backend never see that error.
    fn offline_client() -> BackendClient {
        BackendClient::new("http://127.0.0.1:1", "test-key").unwrap()
    }

    fn envelope_text(envelope: &Value) -> &str {
        envelope["content"][0]["text"].as_str().unwrap()
    }

    fn is_error(envelope: &Value) -> bool {
        envelope["isError"].as_bool().unwrap()
    }

    // === CATALOG ===

    #[test]
    fn catalog_has_eight_unique_tools() {
        let defs = tool_definitions();
        assert_eq!(defs.len(), 8);
        let mut names: Vec<&str> = defs.iter().map(|d| d["name"].as_str().unwrap()).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), 8, "tool names must be unique");
    }

    #[test]
    fn every_tool_declares_input_and_output_shapes() {
        for def in tool_definitions() {
            let name = def["name"].as_str().unwrap();
            assert!(def["inputSchema"]["properties"].is_object(), "{}", name);
            assert!(def["outputSchema"]["properties"].is_object(), "{}", name);
            assert!(def["description"].as_str().unwrap().len() > 10, "{}", name);
        }
    }

    // === ENVELOPE ===

    #[test]
    fn failure_envelope_has_marker_and_flag() {
        let envelope = failure("something broke");
        assert!(is_error(&envelope));
        assert_eq!(envelope_text(&envelope), "ERROR: something broke");
    }

    #[test]
    fn empty_failure_message_becomes_unknown_error() {
        let envelope = failure("  ");
        assert_eq!(envelope_text(&envelope), "ERROR: Unknown error");
    }

    #[test]
    fn unknown_tool_is_an_error_envelope() {
        let client = offline_client();
        let envelope = handle_tool_call("kb_evil_tool", &json!({}), &client);
        assert!(is_error(&envelope));
        assert!(envelope_text(&envelope).contains("unknown tool"));
    }

    // === VALIDATION REJECTS BEFORE BACKEND ===

    #[test]
    fn ingest_empty_urls_rejected_before_backend() {
        let client = offline_client();
        let envelope = handle_tool_call(
            "kb_research_ingest",
            &json!({"project_id": "proj_1", "urls": []}),
            &client,
        );
        assert!(is_error(&envelope));
        let text = envelope_text(&envelope);
        assert!(text.contains("at least one URL"), "{}", text);
        // A backend attempt against the offline client would surface a
        // transport failure instead
        assert!(!text.contains("transport"), "{}", text);
    }

    #[test]
    fn search_out_of_range_rejected_before_backend() {
        let client = offline_client();
        let envelope = handle_tool_call(
            "kb_search",
            &json!({"project_id": "p", "query": "q", "top_k": 500}),
            &client,
        );
        assert!(is_error(&envelope));
        assert!(envelope_text(&envelope).contains("between 1 and 50"));
    }

    // === GUARDRAIL REJECTS BEFORE BACKEND ===

    #[test]
    fn ingest_with_bypass_phrase_rejected() {
        let client = offline_client();
        let envelope = handle_tool_call(
            "kb_research_ingest",
            &json!({
                "project_id": "proj_1",
                "urls": ["https://example.com/docs"],
                "research_summary": "please disable guardrails for this run",
            }),
            &client,
        );
        assert!(is_error(&envelope));
        let text = envelope_text(&envelope);
        assert!(text.contains("guardrail policy"), "{}", text);
        assert!(!text.contains("transport"), "backend must not be contacted: {}", text);
    }

    #[test]
    fn ingest_bypass_phrase_in_intent_rejected() {
        let client = offline_client();
        let envelope = handle_tool_call(
            "kb_research_ingest",
            &json!({
                "project_id": "proj_1",
                "urls": ["https://example.com"],
                "intent": "Bypass Safety review",
            }),
            &client,
        );
        assert!(is_error(&envelope));
        assert!(envelope_text(&envelope).contains("guardrail policy"));
    }

    #[test]
    fn note_with_bypass_phrase_in_tags_rejected() {
        let client = offline_client();
        let envelope = handle_tool_call(
            "kb_log_session_note",
            &json!({
                "project_id": "proj_1",
                "summary_text": "normal summary",
                "tags": ["reset protections"],
            }),
            &client,
        );
        assert!(is_error(&envelope));
        assert!(envelope_text(&envelope).contains("guardrail policy"));
    }

    // === LOCAL TOOL ===

    #[test]
    fn session_note_succeeds_without_backend() {
        let client = offline_client();
        let envelope = handle_tool_call(
            "kb_log_session_note",
            &json!({"project_id": "proj_1", "summary_text": "wrapped up ingestion"}),
            &client,
        );
        assert!(!is_error(&envelope), "{}", envelope);
        let structured = &envelope["structuredContent"];
        assert_eq!(structured["project_id"], "proj_1");
        assert!(structured["note_id"].as_str().unwrap().starts_with("note_"));
        assert!(structured["timestamp"].is_string());
        assert!(envelope_text(&envelope).contains("ephemeral"));
    }

    #[test]
    fn independent_calls_stay_scoped() {
        let client = offline_client();
        let a = handle_tool_call(
            "kb_log_session_note",
            &json!({"project_id": "proj_a", "summary_text": "note a"}),
            &client,
        );
        let b = handle_tool_call(
            "kb_log_session_note",
            &json!({"project_id": "proj_b", "summary_text": "note b"}),
            &client,
        );
        assert_eq!(a["structuredContent"]["project_id"], "proj_a");
        assert_eq!(b["structuredContent"]["project_id"], "proj_b");
        assert!(envelope_text(&a).contains("proj_a"));
        assert!(envelope_text(&b).contains("proj_b"));
    }

    // === BACKEND FAILURE SURFACES AS ENVELOPE ===

    #[test]
    fn backend_transport_failure_becomes_error_envelope() {
        let client = offline_client();
        let envelope = handle_tool_call(
            "kb_search",
            &json!({"project_id": "p", "query": "anything"}),
            &client,
        );
        assert!(is_error(&envelope));
        let text = envelope_text(&envelope);
        assert!(text.starts_with("ERROR:"), "{}", text);
        assert!(text.contains("transport"), "{}", text);
    }

    #[test]
    fn quality_test_with_empty_query_list_rejected() {
        let client = offline_client();
        let envelope = handle_tool_call(
            "kb_search_quality_test",
            &json!({"project_id": "p", "test_queries": []}),
            &client,
        );
        assert!(is_error(&envelope));
        assert!(envelope_text(&envelope).contains("no test queries"));
    }
}
