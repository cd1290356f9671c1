/// Terminal and CSV rendering of engine reports.
use diskwarden_core::model::size::{age_days, files_phrase, format_size};
use diskwarden_core::model::ScanResult;
use diskwarden_core::platform::{AccessClass, ProbeReport};
use diskwarden_core::quarantine::{ItemHealth, ListReport};
use diskwarden_core::scanner::walk::SizeEstimate;
use diskwarden_core::scanner::ScanReport;
use serde::Serialize;
use std::path::Path;
use std::time::SystemTime;

pub fn print_scan(report: &ScanReport) {
    let mut results: Vec<&ScanResult> = report.results.iter().collect();
    results.sort_by(|a, b| b.total_size.cmp(&a.total_size));

    for r in &results {
        println!(
            "{:>10}  {:<18}  {:<10}  {}",
            format_size(r.total_size),
            r.verdict.label(),
            r.category.as_str(),
            r.description
        );
    }
    for w in &report.warnings {
        println!("warning: {w}");
    }
    for e in report.access_errors.iter().take(5) {
        println!("  {e}");
    }
    println!(
        "{} results, {} reclaimable, {} unreadable entries skipped ({:.1?}){}",
        results.len(),
        format_size(report.total_size()),
        report.inaccessible,
        report.duration,
        if report.cancelled { ", cancelled" } else { "" }
    );
}

#[derive(Serialize)]
struct CsvRow<'a> {
    id: String,
    category: &'a str,
    verdict: &'a str,
    name: &'a str,
    total_size: u64,
    file_count: u64,
    representative_path: String,
    location_root: String,
    scanned_at: String,
}

pub fn write_csv(report: &ScanReport, path: &Path) -> anyhow::Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    for r in &report.results {
        writer.serialize(CsvRow {
            id: r.id.to_string(),
            category: r.category.as_str(),
            verdict: r.verdict.label(),
            name: &r.name,
            total_size: r.total_size,
            file_count: r.file_count,
            representative_path: r.representative_path.display().to_string(),
            location_root: r.location_root.display().to_string(),
            scanned_at: r.scanned_at.to_rfc3339(),
        })?;
    }
    writer.flush()?;
    Ok(())
}

pub fn print_probe(probes: &[ProbeReport], estimates: &[(String, SizeEstimate)], elevated: bool) {
    println!(
        "Running {}elevated",
        if elevated { "" } else { "without being " }
    );
    for (probe, (_, estimate)) in probes.iter().zip(estimates) {
        let status = match &probe.access {
            AccessClass::Accessible { entries } => format!("readable, {entries} entries"),
            AccessClass::Denied { reason } => format!("denied: {reason}"),
            AccessClass::Absent => "not present".to_string(),
        };
        let size = if probe.access.is_accessible() {
            format!(
                "{}{} in {}",
                if estimate.truncated { "at least " } else { "" },
                format_size(estimate.sampled_bytes),
                files_phrase(estimate.sampled_files)
            )
        } else {
            String::new()
        };
        println!(
            "{:<28} {:<40} {}  {}",
            probe.name,
            probe.root.display(),
            status,
            size
        );
    }
}

pub fn print_quarantine(listing: &ListReport) {
    let now = SystemTime::now();
    for listed in &listing.items {
        let item = &listed.item;
        let age = age_days(item.quarantined_at.into(), now).unwrap_or(0);
        let health = match &listed.health {
            ItemHealth::Intact => "ok".to_string(),
            ItemHealth::Corrupt(kind) => format!("CORRUPT ({kind})"),
        };
        println!(
            "{}  {:>10}  {:>4}d  {:<9}  {}  [{health}]",
            item.id,
            format_size(item.size),
            age,
            item.category.as_str(),
            item.original_path.display()
        );
    }
    for warning in &listing.warnings {
        println!("warning: {warning}");
    }
    let total: u64 = listing.items.iter().map(|l| l.item.size).sum();
    println!(
        "{} in quarantine ({})",
        files_phrase(listing.items.len() as u64),
        format_size(total)
    );
}
