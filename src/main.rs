//! DiskWarden: find reclaimable disk space, clean it through a quarantine.
//!
//! Thin binary entry point. All logic lives in the `diskwarden-core` crate.

mod cli;
mod report;

use anyhow::{bail, Context};
use clap::Parser;
use cli::{Cli, Command, QuarantineCommand};
use diskwarden_core::model::size::{files_phrase, format_size};
use diskwarden_core::model::{Category, SafetyVerdict, ScanResult};
use diskwarden_core::platform::is_elevated;
use diskwarden_core::quarantine::QuarantineId;
use diskwarden_core::scanner::progress::ScanProgress;
use diskwarden_core::scanner::ScanReport;
use diskwarden_core::{CleanPolicy, Engine, EngineConfig};
use std::sync::atomic::AtomicBool;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so stdout stays clean for reports.
    tracing_subscriber::fmt()
        .with_max_level(if cli.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        })
        .with_writer(std::io::stderr)
        .init();

    let mut config = match &cli.config {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::load_or_default()?,
    };
    if let Some(dir) = cli.quarantine_dir.clone() {
        config.quarantine_dir = dir;
    }
    if let Some(floor) = cli.large_file_floor {
        config.large_file_floor = floor;
    }
    if let Some(max) = cli.max_entries {
        config.max_entries_per_location = max;
    }
    let engine = Engine::open(config).context("cannot open the quarantine store")?;
    tracing::info!("DiskWarden starting");

    match cli.command {
        Command::Scan { csv, path } => {
            let report = match path {
                Some(dir) => engine.scan_user_path(&dir, &AtomicBool::new(false)),
                None => scan_with_progress(&engine),
            };
            report::print_scan(&report);
            if let Some(csv) = csv {
                report::write_csv(&report, &csv)
                    .with_context(|| format!("cannot write {}", csv.display()))?;
                println!("Wrote {}", csv.display());
            }
        }
        Command::Probe => {
            report::print_probe(&engine.probe(), &engine.estimate(), is_elevated());
        }
        Command::Clean {
            category,
            auto_safe_only,
            yes,
        } => clean(&engine, category.as_deref(), auto_safe_only, yes)?,
        Command::Quarantine { action } => quarantine(&engine, action)?,
    }
    Ok(())
}

fn scan_with_progress(engine: &Engine) -> ScanReport {
    let handle = engine.start_scan();
    for msg in handle.progress_rx.iter() {
        if let ScanProgress::LocationFinished {
            name, files, bytes, ..
        } = msg
        {
            eprintln!("  scanned {name}: {} ({})", files_phrase(files), format_size(bytes));
        }
    }
    handle.join()
}

fn clean(
    engine: &Engine,
    category: Option<&str>,
    auto_safe_only: bool,
    yes: bool,
) -> anyhow::Result<()> {
    let only = match category {
        Some(name) => match Category::parse(name) {
            Some(c) => Some(c),
            None => bail!("unknown category {name:?}"),
        },
        None => None,
    };

    let report = scan_with_progress(engine);
    // The CLI approves whole categories, so never-auto results are left out.
    let approved: Vec<ScanResult> = report
        .results
        .into_iter()
        .filter(|r| r.verdict != SafetyVerdict::NeverAuto)
        .filter(|r| !auto_safe_only || r.verdict == SafetyVerdict::AutoSafe)
        .filter(|r| only.is_none_or(|c| r.category == c))
        .collect();

    if approved.is_empty() {
        println!("Nothing to clean.");
        return Ok(());
    }
    let total: u64 = approved.iter().map(|r| r.total_size).sum();
    for r in &approved {
        println!("{:>10}  {}", format_size(r.total_size), r.description);
    }
    if !yes {
        println!(
            "{} would be moved to quarantine. Re-run with --yes to proceed.",
            format_size(total)
        );
        return Ok(());
    }

    let handle = engine.start_clean(approved, CleanPolicy::new());
    for p in handle.progress_rx.iter() {
        eprintln!(
            "  [{}/{}] {}: {} removed, {} freed",
            p.current,
            p.total,
            p.current_category.label(),
            files_phrase(p.files_removed),
            format_size(p.space_freed)
        );
    }
    let result = handle.join()?;

    for e in &result.errors {
        println!("error: {e}");
    }
    for w in &result.warnings {
        println!("warning: {w}");
    }
    println!(
        "Quarantined {} ({}) in {:.1?}{}. Restore with `diskwarden quarantine restore <id>`.",
        files_phrase(result.files_removed),
        format_size(result.bytes_freed),
        result.duration,
        if result.cancelled { ", cancelled" } else { "" }
    );
    Ok(())
}

fn quarantine(engine: &Engine, action: QuarantineCommand) -> anyhow::Result<()> {
    match action {
        QuarantineCommand::List => report::print_quarantine(&engine.get_quarantine_items()),
        QuarantineCommand::Restore { id } => {
            let id = QuarantineId::from(id.as_str());
            if !id.is_well_formed() {
                bail!("{id} is not a quarantine id");
            }
            let item = engine.try_restore(&id)?;
            println!("Restored {}", item.original_path.display());
        }
        QuarantineCommand::Purge { older_than, yes } => {
            if !yes {
                let due = engine.store().due_for_purge(older_than).len();
                println!(
                    "{due} items are older than {older_than} days. Re-run with --yes to erase them permanently."
                );
                return Ok(());
            }
            let purged = engine.clear_quarantine(older_than)?;
            println!("Permanently erased {purged} items.");
        }
    }
    Ok(())
}
