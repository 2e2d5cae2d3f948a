// KB Smart Gateway - Guardrail Policy Loader
// Copyright 2026 Joseph Stone - All Rights Reserved
//
// Loads POLICY/GUARDRAILS.yaml, verifies its SHA256 against the pinned
// value compiled in below, and renders it into the flat text block that
// is injected into every agent session at initialize time.
// Any failure here is startup-fatal — the server must not come up with
// a missing, malformed, or tampered policy document.

use serde_yaml::Value;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Pinned SHA256 of POLICY/GUARDRAILS.yaml. Update ONLY when the policy
/// document is deliberately revised — a mismatch at startup means the
/// document on disk is not the one that was reviewed and signed off.
pub const PINNED_POLICY_SHA256: &str =
    "f858b849e16e51fb16834452ea23a467db33f05cd95a9fb4132c28236ca15579";

/// Allow-listed sections, rendered in exactly this order.
/// Top-level keys outside this list are silently omitted from the
/// rendered text — a content filter, not an oversight.
const SECTION_ORDER: &[(&str, &str)] = &[
    ("identity", "IDENTITY"),
    ("privacy", "PRIVACY"),
    ("validation_rules", "VALIDATION RULES"),
    ("evaluation_standards", "EVALUATION STANDARDS"),
    ("promotion_policy", "PROMOTION POLICY"),
    ("workflow", "WORKFLOW"),
    ("communication_style", "COMMUNICATION STYLE"),
    ("tool_catalog", "TOOL CATALOG"),
    ("human_in_loop", "HUMAN IN LOOP"),
    ("error_handling", "ERROR HANDLING"),
    ("session_management", "SESSION MANAGEMENT"),
    ("workflow_templates", "WORKFLOW TEMPLATES"),
];

/// Policy loading failures — every variant is startup-fatal
#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("failed to read policy document {path:?}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("policy hash mismatch: expected {expected}, got {actual} — document tampered or out of date")]
    HashMismatch { expected: String, actual: String },
    #[error("failed to parse policy document: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("policy document root must be a non-empty mapping")]
    NotAMapping,
    #[error("policy document rendered to empty text")]
    EmptyRender,
}

/// The loaded, verified guardrail policy. Immutable for the process
/// lifetime; the rendered text is produced exactly once at load.
#[derive(Debug, Clone)]
pub struct GuardrailPolicy {
    pub version: String,
    pub last_updated: String,
    /// Hex SHA256 of the raw document bytes
    pub sha256: String,
    /// Flat text block bound into the agent session
    pub rendered: String,
}

impl GuardrailPolicy {
    /// Load and verify against the compiled-in pinned hash.
    pub fn load(path: &Path) -> Result<Self, PolicyError> {
        Self::load_verified(path, PINNED_POLICY_SHA256)
    }

    /// Load and verify against an explicit expected hash.
    pub fn load_verified(path: &Path, expected_sha256: &str) -> Result<Self, PolicyError> {
        let bytes = std::fs::read(path).map_err(|source| PolicyError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let actual = sha256_hex(&bytes);
        if actual != expected_sha256 {
            return Err(PolicyError::HashMismatch {
                expected: expected_sha256.to_string(),
                actual,
            });
        }

        let doc: Value = serde_yaml::from_slice(&bytes)?;
        let mapping = match &doc {
            Value::Mapping(m) if !m.is_empty() => m,
            _ => return Err(PolicyError::NotAMapping),
        };

        let version = top_level_str(mapping, "version").unwrap_or_else(|| "unknown".to_string());
        let last_updated =
            top_level_str(mapping, "last_updated").unwrap_or_else(|| "unknown".to_string());

        let rendered = render(mapping, &version, &last_updated);
        if rendered.trim().is_empty() {
            return Err(PolicyError::EmptyRender);
        }

        Ok(Self {
            version,
            last_updated,
            sha256: actual,
            rendered,
        })
    }
}

/// Hex SHA256 over raw bytes
pub fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

fn top_level_str(mapping: &serde_yaml::Mapping, key: &str) -> Option<String> {
    mapping
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
}

/// Deterministic render: header, owners, description, then the
/// allow-listed sections in fixed order.
fn render(mapping: &serde_yaml::Mapping, version: &str, last_updated: &str) -> String {
    let mut out = String::new();

    out.push_str(&format!(
        "KB GATEWAY GUARDRAIL POLICY v{} (updated {})\n",
        version, last_updated
    ));

    let owners = mapping
        .get("owners")
        .and_then(|v| v.as_sequence())
        .map(|seq| {
            seq.iter()
                .filter_map(|v| v.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        })
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "(none)".to_string());
    out.push_str(&format!("Owners: {}\n", owners));

    if let Some(desc) = top_level_str(mapping, "description") {
        let trimmed = desc.trim();
        if !trimmed.is_empty() {
            out.push('\n');
            out.push_str(trimmed);
            out.push('\n');
        }
    }

    for (key, title) in SECTION_ORDER {
        if let Some(value) = mapping.get(*key) {
            out.push('\n');
            out.push_str(title);
            out.push_str(":\n");
            render_value(value, 1, &mut out);
        }
    }

    out
}

fn line(indent: usize, text: &str, out: &mut String) {
    out.push_str(&"  ".repeat(indent));
    out.push_str(text);
    out.push('\n');
}

/// Recursive pretty-print: scalars as single bullet lines, sequences as
/// one bullet per element, mappings as "key:" + indented render.
/// Empty containers render an explicit placeholder rather than vanishing.
fn render_value(value: &Value, indent: usize, out: &mut String) {
    match value {
        Value::Null => line(indent, "- (none)", out),
        Value::Bool(b) => line(indent, &format!("- {}", b), out),
        Value::Number(n) => line(indent, &format!("- {}", n), out),
        Value::String(s) => line(indent, &format!("- {}", s.trim()), out),
        Value::Sequence(items) => {
            if items.is_empty() {
                line(indent, "- (none)", out);
            } else {
                for item in items {
                    match item {
                        Value::Sequence(_) | Value::Mapping(_) => {
                            line(indent, "-", out);
                            render_value(item, indent + 1, out);
                        }
                        _ => render_value(item, indent, out),
                    }
                }
            }
        }
        Value::Mapping(m) => {
            if m.is_empty() {
                line(indent, "(empty)", out);
            } else {
                for (k, v) in m {
                    let key = k.as_str().unwrap_or("?");
                    match v {
                        Value::Sequence(_) | Value::Mapping(_) => {
                            line(indent, &format!("{}:", key), out);
                            render_value(v, indent + 1, out);
                        }
                        Value::Null => line(indent, &format!("{}: (none)", key), out),
                        Value::Bool(b) => line(indent, &format!("{}: {}", key, b), out),
                        Value::Number(n) => line(indent, &format!("{}: {}", key, n), out),
                        Value::String(s) => line(indent, &format!("{}: {}", key, s.trim()), out),
                        Value::Tagged(t) => {
                            line(indent, &format!("{}:", key), out);
                            render_value(&t.value, indent + 1, out);
                        }
                    }
                }
            }
        }
        Value::Tagged(t) => render_value(&t.value, indent, out),
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const FIXTURE: &str = "\
version: \"0.1\"
last_updated: \"2026-01-01\"
owners:
  - Alice
  - Bob
description: Test policy.
identity:
  role: librarian
privacy:
  - keep secrets out
workflow_templates: {}
session_management: []
not_in_allowlist:
  - should never render
";

    fn write_fixture(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    fn load_fixture(content: &str) -> Result<GuardrailPolicy, PolicyError> {
        let file = write_fixture(content);
        let expected = sha256_hex(content.as_bytes());
        GuardrailPolicy::load_verified(file.path(), &expected)
    }

    // === INTEGRITY ===

    #[test]
    fn load_is_deterministic() {
        let a = load_fixture(FIXTURE).unwrap();
        let b = load_fixture(FIXTURE).unwrap();
        assert_eq!(a.sha256, b.sha256);
        assert_eq!(a.rendered, b.rendered);
    }

    #[test]
    fn single_byte_mutation_fails_load() {
        let mutated = FIXTURE.replace("librarian", "librarIan");
        let file = write_fixture(&mutated);
        // Expected hash is for the ORIGINAL bytes
        let expected = sha256_hex(FIXTURE.as_bytes());
        let result = GuardrailPolicy::load_verified(file.path(), &expected);
        assert!(matches!(result, Err(PolicyError::HashMismatch { .. })));
    }

    #[test]
    fn missing_file_fails_load() {
        let result = GuardrailPolicy::load_verified(
            std::path::Path::new("/nonexistent/GUARDRAILS.yaml"),
            PINNED_POLICY_SHA256,
        );
        assert!(matches!(result, Err(PolicyError::Read { .. })));
    }

    #[test]
    fn non_mapping_root_fails_load() {
        let content = "- just\n- a\n- list\n";
        let result = load_fixture(content);
        assert!(matches!(result, Err(PolicyError::NotAMapping)));
    }

    #[test]
    fn empty_mapping_fails_load() {
        let content = "{}\n";
        let result = load_fixture(content);
        assert!(matches!(result, Err(PolicyError::NotAMapping)));
    }

    #[test]
    fn pinned_policy_document_verifies() {
        // The shipped document must match the compiled-in pin
        let policy = GuardrailPolicy::load(&crate::paths::policy_path())
            .expect("shipped POLICY/GUARDRAILS.yaml must verify against PINNED_POLICY_SHA256");
        assert_eq!(policy.sha256, PINNED_POLICY_SHA256);
        assert!(!policy.rendered.trim().is_empty());
    }

    // === RENDERING ===

    #[test]
    fn renders_header_owners_description() {
        let policy = load_fixture(FIXTURE).unwrap();
        assert!(policy.rendered.starts_with("KB GATEWAY GUARDRAIL POLICY v0.1 (updated 2026-01-01)"));
        assert!(policy.rendered.contains("Owners: Alice, Bob"));
        assert!(policy.rendered.contains("Test policy."));
    }

    #[test]
    fn renders_sections_in_fixed_order() {
        let policy = load_fixture(FIXTURE).unwrap();
        let identity = policy.rendered.find("IDENTITY:").expect("identity section");
        let privacy = policy.rendered.find("PRIVACY:").expect("privacy section");
        let session = policy.rendered.find("SESSION MANAGEMENT:").expect("session section");
        let templates = policy.rendered.find("WORKFLOW TEMPLATES:").expect("templates section");
        assert!(identity < privacy, "identity must precede privacy");
        assert!(privacy < session, "privacy must precede session management");
        assert!(session < templates, "session management must precede workflow templates");
    }

    #[test]
    fn unlisted_keys_never_render() {
        let policy = load_fixture(FIXTURE).unwrap();
        assert!(!policy.rendered.contains("not_in_allowlist"));
        assert!(!policy.rendered.contains("should never render"));
    }

    #[test]
    fn empty_containers_render_placeholders() {
        let policy = load_fixture(FIXTURE).unwrap();
        // workflow_templates: {} and session_management: []
        assert!(policy.rendered.contains("WORKFLOW TEMPLATES:\n  (empty)"));
        assert!(policy.rendered.contains("SESSION MANAGEMENT:\n  - (none)"));
    }

    #[test]
    fn nested_structures_render_recursively() {
        let content = "\
version: \"0.1\"
last_updated: \"2026-01-01\"
owners: []
evaluation_standards:
  relevance:
    - score floor 0.3
    - report zero results
  coverage:
    minimum_docs: 5
";
        let policy = load_fixture(content).unwrap();
        assert!(policy.rendered.contains("EVALUATION STANDARDS:"));
        assert!(policy.rendered.contains("  relevance:"));
        assert!(policy.rendered.contains("    - score floor 0.3"));
        assert!(policy.rendered.contains("  coverage:"));
        assert!(policy.rendered.contains("    minimum_docs: 5"));
    }

    #[test]
    fn scalar_section_renders_as_bullet() {
        let content = "\
version: \"0.1\"
last_updated: \"2026-01-01\"
workflow: single line of guidance
";
        let policy = load_fixture(content).unwrap();
        assert!(policy.rendered.contains("WORKFLOW:\n  - single line of guidance"));
    }
}
