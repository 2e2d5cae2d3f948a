// KB Smart Gateway - Guardrail Scanner
// Copyright 2026 Joseph Stone - All Rights Reserved
//
// Recursive scan of request payloads for phrases that reference
// disabling, bypassing, ignoring, or resetting the guardrail policy.
// Runs on free-form text inputs only (research submissions, session
// notes) — a match means the call never reaches the backend.

use serde_json::Value;

/// Fixed phrase set: {disable, bypass, ignore, reset} x
/// {guardrails, safety, protections}. Plain constant so the full
/// list is reviewable at a glance.
pub const BYPASS_PHRASES: &[&str] = &[
    "disable guardrails",
    "bypass guardrails",
    "ignore guardrails",
    "reset guardrails",
    "disable safety",
    "bypass safety",
    "ignore safety",
    "reset safety",
    "disable protections",
    "bypass protections",
    "ignore protections",
    "reset protections",
];

/// Fixed user-visible rejection message for a guardrail match.
/// The dispatch layer marks the response as an error.
pub const REJECTION_MESSAGE: &str =
    "Request rejected by guardrail policy: content references disabling, bypassing, or resetting safety controls";

/// Recursively scan an arbitrary payload for bypass phrases.
/// Case-insensitive substring match over every string — values and
/// object keys alike. Short-circuits on first match. Numbers,
/// booleans, and null never match.
pub fn contains_bypass(payload: &Value) -> bool {
    match payload {
        Value::String(s) => matches_phrase(s),
        Value::Array(items) => items.iter().any(contains_bypass),
        Value::Object(map) => map
            .iter()
            .any(|(key, value)| matches_phrase(key) || contains_bypass(value)),
        _ => false,
    }
}

fn matches_phrase(text: &str) -> bool {
    let lower = text.to_lowercase();
    BYPASS_PHRASES.iter().any(|phrase| lower.contains(phrase))
}

// ============================================================================
// TESTS
// ============================================================================
