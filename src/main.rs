use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crypto_scan_rs::patterns::PatternRegistry;
use crypto_scan_rs::{codescan, logging, output, targets, tls};

use anyhow::Result;
use clap::{ArgGroup, Parser};
use serde::Serialize;
use time::macros::format_description;
use time::OffsetDateTime;

/// crypto-scan-rs — discover cryptographic usage across live TLS endpoints and source trees.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "crypto-scan-rs",
    version,
    about = "Discover cryptographic usage across live TLS endpoints and source trees, written out as CBOM-style CSV/JSON.",
    long_about = None
)]
#[command(group(
    ArgGroup::new("mode")
        .required(true)
        .multiple(true)
        .args(["tls_targets", "code_root"])
))]
struct Cli {
    /// File with one host[:port] target per line (port defaults to 443, `#` comments skipped).
    #[arg(long)]
    tls_targets: Option<PathBuf>,

    /// Root directory to scan for cryptographic API usage.
    #[arg(long)]
    code_root: Option<PathBuf>,

    /// Prefix for output files (<prefix>_tls.csv, <prefix>_code.json, ...).
    /// Defaults to cbom_<UTC timestamp>.
    #[arg(long)]
    out_prefix: Option<String>,

    /// Max concurrent probes / file scans.
    #[arg(long, default_value_t = 16)]
    concurrency: usize,

    /// Per-probe connect and handshake timeout in milliseconds.
    #[arg(long = "timeout-ms", default_value_t = 5000)]
    timeout_ms: u64,

    /// Increase log verbosity (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only log errors.
    #[arg(short, long, default_value_t = false)]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose, cli.quiet);

    let prefix = cli.out_prefix.clone().unwrap_or_else(default_prefix);
    let timeout = Duration::from_millis(cli.timeout_ms);

    println!("crypto-scan-rs configuration:");
    println!(
        "  tls_targets  : {}",
        cli.tls_targets
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "<none>".to_string())
    );
    println!(
        "  code_root    : {}",
        cli.code_root
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "<none>".to_string())
    );
    println!("  out_prefix   : {}", prefix);
    println!("  concurrency  : {}", cli.concurrency);
    println!("  timeout_ms   : {}", cli.timeout_ms);

    if let Some(path) = cli.tls_targets.as_deref() {
        let targets = targets::load_targets_from_path(path)?;
        println!("\nProbing {} TLS targets...", targets.len());
        let findings = tls::probe_targets(&targets, cli.concurrency, timeout, timeout).await?;
        write_outputs(&format!("{prefix}_tls"), &findings)?;
    }

    if let Some(root) = cli.code_root.as_deref() {
        let registry = Arc::new(PatternRegistry::new()?);
        println!("\nScanning source tree {}...", root.display());
        let findings = codescan::scan_dir(root, registry, cli.concurrency).await?;
        write_outputs(&format!("{prefix}_code"), &findings)?;
    }

    Ok(())
}

/// Write one finding sequence to `<stem>.csv` and `<stem>.json`.
fn write_outputs<T: Serialize>(stem: &str, records: &[T]) -> Result<()> {
    let csv_path = format!("{stem}.csv");
    if output::write_csv(&csv_path, records)? {
        println!("Wrote {} records to {}", records.len(), csv_path);
    } else {
        println!("No records for {csv_path}, skipped");
    }

    let json_path = format!("{stem}.json");
    output::write_json(&json_path, records)?;
    println!("Wrote JSON results to {json_path}");
    Ok(())
}

/// Timestamp-derived default output prefix, e.g. `cbom_20260827_120000`.
fn default_prefix() -> String {
    let fmt = format_description!("cbom_[year][month][day]_[hour][minute][second]");
    OffsetDateTime::now_utc()
        .format(&fmt)
        .unwrap_or_else(|_| String::from("cbom_19700101_000000"))
}
