//! Command-line interface for the Warden capability proxy layer.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::{json, Value};
use warden_capabilities::{CapabilityContext, DOMAINS};
use warden_core::{CapabilityStatus, InvocationResult, TracingSink};

/// Warden - inspect and call capability domains.
#[derive(Parser, Debug)]
#[command(name = "warden")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Action to perform.
    #[command(subcommand)]
    command: Command,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    json_logs: bool,

    /// Verbose output.
    #[arg(short, long, global = true)]
    verbose: bool,
}

/// Available commands.
#[derive(Subcommand, Debug)]
enum Command {
    /// Show which backend serves each domain.
    Status {
        /// Print machine-readable JSON.
        #[arg(long)]
        json: bool,
    },
    /// Invoke one operation with a JSON payload.
    Invoke {
        /// Capability domain (ml, cve, ioc, sandbox).
        domain: String,
        /// Operation name, e.g. predict.
        operation: String,
        /// Request payload as JSON.
        payload: String,
        /// Print the backend, latency and degradation reason too.
        #[arg(long)]
        detail: bool,
    },
    /// List the operations of a domain.
    Ops {
        /// Capability domain.
        domain: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.json_logs, args.verbose);

    let ctx = CapabilityContext::from_env(Arc::new(TracingSink))
        .context("Failed to build capability context")?;
    tracing::debug!(domains = ?DOMAINS, "Capability context ready");

    match args.command {
        Command::Status { json } => run_status(&ctx, json),
        Command::Invoke {
            domain,
            operation,
            payload,
            detail,
        } => run_invoke(&ctx, &domain, &operation, &payload, detail).await,
        Command::Ops { domain } => run_ops(&ctx, &domain),
    }
}

fn init_logging(json_logs: bool, verbose: bool) {
    let default_directive = if verbose { "warden=debug" } else { "warden=info" };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_directive));

    if json_logs {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .compact()
            .with_writer(std::io::stderr)
            .init();
    }
}

fn run_status(ctx: &CapabilityContext, as_json: bool) -> Result<()> {
    let status = ctx.status();
    if as_json {
        println!("{}", serde_json::to_string_pretty(&status)?);
    } else {
        print!("{}", render_status(&status));
    }
    Ok(())
}

async fn run_invoke(
    ctx: &CapabilityContext,
    domain: &str,
    operation: &str,
    payload: &str,
    detail: bool,
) -> Result<()> {
    let payload: Value =
        serde_json::from_str(payload).context("Payload is not valid JSON")?;

    let result = ctx
        .invoke(domain, operation, payload)
        .await
        .with_context(|| format!("{}.{} failed", domain, operation))?;
    if result.is_degraded() {
        tracing::info!(
            domain,
            operation,
            reason = ?result.reason().map(|r| r.kind),
            "Served by fallback"
        );
    }

    let output = if detail {
        render_invocation(&result)
    } else {
        result.value().clone()
    };
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn run_ops(ctx: &CapabilityContext, domain: &str) -> Result<()> {
    let operations = ctx.operations(domain).with_context(|| {
        format!("Unknown domain '{}', expected one of: {}", domain, DOMAINS.join(", "))
    })?;

    for op in operations {
        println!("{:<20} {:<10} native: {}", op.name, op.idempotence.as_str(), op.native_method);
    }
    Ok(())
}

/// One line per domain.
fn render_status(status: &[CapabilityStatus]) -> String {
    let mut out = format!(
        "{:<8} {:<9} {:<16} {:<8} {:>6}  {}\n",
        "DOMAIN", "BACKEND", "VERSION", "HEALTHY", "CALLS", "LOAD ERROR"
    );
    for s in status {
        let load_error = s
            .load_error
            .as_ref()
            .map(|e| e.message.as_str())
            .unwrap_or("-");
        out.push_str(&format!(
            "{:<8} {:<9} {:<16} {:<8} {:>6}  {}\n",
            s.domain,
            s.backend.to_string(),
            s.version,
            if s.healthy { "yes" } else { "no" },
            s.stats.calls,
            load_error
        ));
    }
    out
}

fn render_invocation(result: &InvocationResult<Value>) -> Value {
    json!({
        "servedBy": result.served_by(),
        "degraded": result.is_degraded(),
        "latencyMs": result.latency_ms,
        "reason": result.reason(),
        "response": result.value(),
    })
}
