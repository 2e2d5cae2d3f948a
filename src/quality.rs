// KB Smart Gateway - Search Quality Aggregator
// Copyright 2026 Joseph Stone - All Rights Reserved
//
// Runs a batch of probe queries against one project and reduces them
// into relevance statistics. Queries run sequentially, in submitted
// order — deterministic and gentle on the backend. A failure on any
// query fails the whole test; there is no partial report.

use crate::backend::{BackendClient, BackendError, SearchResult};
use serde::Serialize;
use std::cmp::Ordering;
use thiserror::Error;

/// Built-in probe suite — five representative queries exercising the
/// kinds of questions agents actually ask of a project.
pub const PROBE_SUITE: &[&str] = &[
    "What are the main concepts covered in this project?",
    "How do the core components fit together?",
    "What configuration options are available?",
    "What are the known failure modes and workarounds?",
    "Where are the step-by-step setup instructions?",
];

/// Result shaping for probe searches
const PROBE_TOP_K: u64 = 10;
const PROBE_SNIPPET_LENGTH: u64 = 200;

#[derive(Debug, Error)]
pub enum QualityError {
    #[error("no test queries to run after deduplication")]
    EmptyQuerySet,
    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// Per-query breakdown: the full sorted result set plus its headline
/// numbers.
#[derive(Debug, Clone, Serialize)]
pub struct QueryBreakdown {
    pub query: String,
    /// Highest score in the result set, 0 when there were no results
    pub top_score: f64,
    pub result_count: usize,
    pub results: Vec<SearchResult>,
}

/// Aggregate quality statistics over a probe batch
#[derive(Debug, Clone, Serialize)]
pub struct QualityReport {
    pub queries_tested: usize,
    pub average_top_score: f64,
    /// Queries that returned nothing, in execution order
    pub zero_result_queries: Vec<String>,
    pub breakdown: Vec<QueryBreakdown>,
}

/// Deduplicate queries preserving first-occurrence order
pub fn dedup_queries(queries: &[String]) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::new();
    for query in queries {
        if seen.insert(query.clone()) {
            out.push(query.clone());
        }
    }
    out
}

/// Sort descending by score; stable, so backend order breaks ties
pub fn sort_by_score_desc(results: &mut [SearchResult]) {
    results.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
}

/// Reduce per-query breakdowns into the aggregate report
pub fn reduce(breakdown: Vec<QueryBreakdown>) -> QualityReport {
    let queries_tested = breakdown.len();
    let sum: f64 = breakdown.iter().map(|b| b.top_score).sum();
    let average_top_score = if queries_tested == 0 {
        0.0
    } else {
        sum / queries_tested as f64
    };
    let zero_result_queries = breakdown
        .iter()
        .filter(|b| b.result_count == 0)
        .map(|b| b.query.clone())
        .collect();
    QualityReport {
        queries_tested,
        average_top_score,
        zero_result_queries,
        breakdown,
    }
}

/// Run the full quality test: dedup, probe each query sequentially,
/// reduce into the aggregate report.
pub fn run_quality_test(
    client: &BackendClient,
    project_id: &str,
    queries: &[String],
) -> Result<QualityReport, QualityError> {
    let queries = dedup_queries(queries);
    if queries.is_empty() {
        return Err(QualityError::EmptyQuerySet);
    }

    let mut breakdown = Vec::with_capacity(queries.len());
    for query in queries {
        let mut results = client.search(project_id, &query, PROBE_TOP_K, PROBE_SNIPPET_LENGTH)?;
        sort_by_score_desc(&mut results);
        let top_score = results.first().map(|r| r.score).unwrap_or(0.0);
        breakdown.push(QueryBreakdown {
            top_score,
            result_count: results.len(),
            results,
            query,
        });
    }

    Ok(reduce(breakdown))
}

// ============================================================================
// TESTS
// ============================================================================
