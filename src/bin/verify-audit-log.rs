use anyhow::{anyhow, Result};
use chrono::Duration;
use clap::{Arg, ArgAction, Command};
use secp256k1::PublicKey;
use std::collections::BTreeMap;
use std::path::Path;
use std::str::FromStr;
use tracing::{error, info};

use compliance_audit::audit::{detect_gaps, load_entries_from_jsonl, verify_entries};
use compliance_audit::crypto::IntegritySigner;

fn main() -> Result<()> {
    let matches = Command::new("verify-audit-log")
        .version("0.1.0")
        .about("Verify an exported compliance audit ledger")
        .arg(
            Arg::new("log-path")
                .short('l')
                .long("log-path")
                .value_name("PATH")
                .help("Path to the exported JSONL ledger")
                .required(true),
        )
        .arg(
            Arg::new("public-key")
                .short('k')
                .long("public-key")
                .value_name("HEX")
                .help("Signer public key; enables signature verification"),
        )
        .arg(
            Arg::new("max-gap-minutes")
                .long("max-gap-minutes")
                .value_name("MINUTES")
                .value_parser(clap::value_parser!(i64))
                .default_value("60")
                .help("Report quiet periods longer than this"),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .action(ArgAction::SetTrue)
                .help("Enable verbose output"),
        )
        .get_matches();

    let verbose = matches.get_flag("verbose");
    tracing_subscriber::fmt()
        .with_max_level(if verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::WARN
        })
        .init();

    let log_path = matches
        .get_one::<String>("log-path")
        .ok_or_else(|| anyhow!("--log-path is required"))?;
    let public_key = matches.get_one::<String>("public-key");
    let max_gap = matches
        .get_one::<i64>("max-gap-minutes")
        .copied()
        .unwrap_or(60);

    match verify_ledger_file(Path::new(log_path), public_key, max_gap, verbose) {
        Ok(true) => {
            println!("✓ Audit ledger verification completed successfully");
            Ok(())
        }
        Ok(false) => {
            error!("Audit ledger failed verification");
            std::process::exit(1);
        }
        Err(e) => {
            error!("Audit ledger verification failed: {}", e);
            std::process::exit(1);
        }
    }
}

fn verify_ledger_file(
    log_path: &Path,
    public_key: Option<&String>,
    max_gap_minutes: i64,
    verbose: bool,
) -> Result<bool> {
    info!("Verifying audit ledger: {}", log_path.display());

    if !log_path.exists() {
        return Err(anyhow!("Audit ledger not found: {}", log_path.display()));
    }

    let verifier = match public_key {
        Some(hex) => Some(IntegritySigner::verifier(
            PublicKey::from_str(hex.trim()).map_err(|e| anyhow!("Invalid public key: {}", e))?,
        )),
        None => None,
    };

    let entries = load_entries_from_jsonl(log_path)?;
    if entries.is_empty() {
        return Err(anyhow!("Audit ledger is empty"));
    }

    let report = verify_entries(&entries, verifier.as_ref());
    println!("{}", report.summary());

    for breach in report.breach_descriptions() {
        println!("  ✗ {}", breach);
    }

    if !report.signatures_checked {
        println!("⚠ Signatures not checked (no --public-key given)");
    }
    if report.weak_signatures > 0 {
        println!(
            "⚠ {} entries carry weak (non-cryptographic) signatures",
            report.weak_signatures
        );
    }

    let max_gap = Duration::minutes(max_gap_minutes.clamp(0, i64::MAX / 60_000));
    let gaps = detect_gaps(&entries, max_gap);
    if !gaps.is_empty() {
        println!("⚠ Found {} gaps:", gaps.len());
        for gap in &gaps {
            println!("  {}", gap.description);
        }
    }

    if verbose {
        let first = &entries[0];
        let last = &entries[entries.len() - 1];
        println!("\nAudit Ledger Summary:");
        println!("  Total entries: {}", entries.len());
        println!("  First entry: {}", first.timestamp);
        println!("  Last entry: {}", last.timestamp);
        println!("  Head hash: {}", last.entry_hash);

        let mut event_types = BTreeMap::new();
        for entry in &entries {
            *event_types.entry(entry.event_type.as_str()).or_insert(0u64) += 1;
        }
        println!("\nEvent type distribution:");
        for (event_type, count) in event_types {
            println!("  {}: {}", event_type, count);
        }
    }

    Ok(report.integrity_valid)
}
