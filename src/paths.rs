// KB Smart Gateway - Path Resolution
// Copyright 2026 Joseph Stone - All Rights Reserved
//
// Single source of truth for gateway path resolution.
// Uses walk-up discovery from binary location — never depends on $HOME.
// Cached via OnceLock for zero-overhead repeated access.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

static GATE_ROOT_CACHE: OnceLock<PathBuf> = OnceLock::new();

/// Find the gateway root from binary location — never depends on $HOME.
///
/// Resolution order:
///   1. Walk up from binary location looking for Cargo.toml
///   2. KB_GATE_ROOT environment variable
///   3. HOME env + /kb-smart-gate
///   4. Panic (unrecoverable — cannot operate without known root)
pub fn gate_root() -> &'static Path {
    GATE_ROOT_CACHE.get_or_init(|| {
        // Primary: walk up from binary location
        if let Ok(exe) = std::env::current_exe() {
            if let Ok(canonical) = exe.canonicalize() {
                let mut dir = canonical.parent();
                while let Some(d) = dir {
                    if d.join("Cargo.toml").exists() {
                        return d.to_path_buf();
                    }
                    dir = d.parent();
                }
            }
        }

        // Fallback: KB_GATE_ROOT environment variable
        if let Ok(root) = std::env::var("KB_GATE_ROOT") {
            let p = PathBuf::from(&root);
            if p.exists() {
                return p;
            }
        }

        // Last resort: HOME/kb-smart-gate
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home).join("kb-smart-gate");
        }

        panic!("Cannot determine kb-smart-gate root: binary walk-up failed, KB_GATE_ROOT not set, HOME not set");
    })
}

/// Fixed location of the guardrail policy document under the gateway root.
/// The raw bytes at this path must hash to the pinned value in policy.rs.
pub fn policy_path() -> PathBuf {
    gate_root().join("POLICY/GUARDRAILS.yaml")
}
