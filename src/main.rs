// KB Smart Gateway - Main Entry Point
// Copyright 2026 Joseph Stone - All Rights Reserved
//
// CLI and MCP stdio server. All knowledge-base tool calls route
// through this gateway.
// Usage:
//   kb-smart-gate serve                  # Run MCP server (stdio)
//   kb-smart-gate policy                 # Verify + print guardrail policy
//   kb-smart-gate tools                  # Print tool catalog as JSON
//   kb-smart-gate scan <json>            # One-shot guardrail scan
//
// Startup is fail-closed: a missing backend credential or a policy
// document that does not hash to the pinned value aborts the process
// before any tool becomes reachable.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use kb_smart_gate::{config::GatewayConfig, guard, mcp, paths, policy::GuardrailPolicy};

#[derive(Parser)]
#[command(name = "kb-smart-gate")]
#[command(author = "Joseph Stone")]
#[command(version = "1.0.0")]
#[command(about = "KB Smart Gateway - MCP knowledge-base gateway with guardrail enforcement")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run MCP server (stdio JSON-RPC)
    Serve,

    /// Verify the guardrail policy document, print its hash and rendered text
    Policy,

    /// Print the tool catalog definitions as JSON
    Tools,

    /// One-shot guardrail scan of a JSON payload — exits 1 on a match
    Scan {
        /// Payload as JSON string
        payload: String,
    },
}

fn main() -> Result<()> {
    // Initialize logging (safe if already init). KB_GATE_VERBOSE raises
    // the default filter to debug.
    let verbose = std::env::var("KB_GATE_VERBOSE")
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false);
    let default_filter = if verbose { "debug" } else { "info" };
    let _ = env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(default_filter),
    )
    .try_init();

    let cli = Cli::parse();

    match &cli.command {
        Commands::Serve => {
            // Credential first — the gateway cannot run without it
            let config = GatewayConfig::from_env()
                .context("FATAL: gateway configuration")?;

            // Policy verification is fail-closed: no verified policy,
            // no server
            let policy_path = paths::policy_path();
            let policy = GuardrailPolicy::load(&policy_path).with_context(|| {
                format!(
                    "FATAL: guardrail policy verification failed for {:?}",
                    policy_path
                )
            })?;
            log::info!(
                "Guardrail policy v{} verified (sha256 {})",
                policy.version,
                policy.sha256
            );

            mcp::run(&config, &policy).context("MCP server terminated")?;
        }

        Commands::Policy => {
            let policy_path = paths::policy_path();
            let policy = GuardrailPolicy::load(&policy_path).with_context(|| {
                format!("Policy verification failed for {:?}", policy_path)
            })?;
            println!("Policy: {:?}", policy_path);
            println!("Version: {} (updated {})", policy.version, policy.last_updated);
            println!("SHA256: {}", policy.sha256);
            println!();
            println!("{}", policy.rendered);
        }

        Commands::Tools => {
            println!("{}", serde_json::to_string_pretty(&mcp::tool_definitions())?);
        }

        Commands::Scan { payload } => {
            let value: serde_json::Value = serde_json::from_str(payload)
                .with_context(|| format!("Invalid payload JSON: {}", payload))?;
            if guard::contains_bypass(&value) {
                println!("MATCH: payload references disabling or bypassing guardrails");
                std::process::exit(1);
            }
            println!("CLEAN: no guardrail-bypass phrases found");
        }
    }

    Ok(())
}
