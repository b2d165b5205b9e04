//! Format scan, set and transfer results as text.

use crate::backup::{DryScanReport, ScanReport};
use crate::pipeline::{PipelineReport, RestoreReport};
use crate::sets::SetDescriptor;
use crate::size::size_to_string;
use comfy_table::presets::UTF8_BORDERS_ONLY;
use comfy_table::{CellAlignment, Table};
use owo_colors::OwoColorize;
use std::path::PathBuf;

/// Format a section heading with bold/underline.
pub fn format_section_heading(title: &str) -> String {
    format!("{}", title.bold().underline())
}

fn format_warnings(out: &mut String, warnings: &[String]) {
    if warnings.is_empty() {
        return;
    }
    out.push_str(&format!("{}\n", format_section_heading("Warnings")));
    for warning in warnings {
        out.push_str(&format!("  {}\n", warning.yellow()));
    }
    out.push('\n');
}

fn format_inclusions(out: &mut String, paths: &[PathBuf]) {
    out.push_str(&format!("{}\n", format_section_heading("Inclusion paths")));
    for path in paths {
        let shown = if path.as_os_str().is_empty() {
            ".".to_string()
        } else {
            path.display().to_string()
        };
        out.push_str(&format!("  {}\n", shown));
    }
    out.push('\n');
}

fn rows_table(rows: impl IntoIterator<Item = [String; 5]>) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY);
    table.set_header(vec!["Set", "Size", "Items", "Dirs", "Files"]);
    for row in rows {
        table.add_row(row.to_vec());
    }
    for index in 1..5 {
        if let Some(column) = table.column_mut(index) {
            column.set_cell_alignment(CellAlignment::Right);
        }
    }
    table
}

/// Table of persisted sets, one row per set, with a total line.
pub fn format_sets_table(sets: &[SetDescriptor]) -> String {
    if sets.is_empty() {
        return "No sets pending.".to_string();
    }
    let total: u64 = sets.iter().map(|s| s.info.size_bytes).sum();
    let table = rows_table(sets.iter().map(|set| {
        [
            set.stem.clone(),
            size_to_string(set.info.size_bytes),
            set.info.item_count.to_string(),
            set.info.dir_count.to_string(),
            set.info.file_count.to_string(),
        ]
    }));
    format!(
        "{}\n\n{}\n\n{} set(s), {}",
        format_section_heading("Pending sets"),
        table,
        sets.len(),
        size_to_string(total)
    )
}

pub fn format_scan_report(report: &ScanReport) -> String {
    let mut out = String::new();
    format_warnings(&mut out, &report.warnings);
    format_inclusions(&mut out, &report.inclusion_paths);
    if !report.skipped.is_empty() {
        out.push_str(&format!("{}\n", format_section_heading("Sealed, skipped")));
        for path in &report.skipped {
            out.push_str(&format!("  {}\n", path.display()));
        }
        out.push('\n');
    }
    out.push_str(&format!(
        "Crawled {} file(s), {}\n\n",
        report.files,
        size_to_string(report.bytes)
    ));
    out.push_str(&format_sets_table(&report.sets));
    out
}

pub fn format_dry_scan_report(report: &DryScanReport) -> String {
    let mut out = String::new();
    format_warnings(&mut out, &report.warnings);
    format_inclusions(&mut out, &report.inclusion_paths);
    out.push_str(&format!(
        "Crawled {} file(s), {}\n\n",
        report.files,
        size_to_string(report.bytes)
    ));
    out.push_str(&format!(
        "{}\n\n",
        format_section_heading("Planned sets (dry run, nothing written)")
    ));
    let table = rows_table(report.sets.iter().enumerate().map(|(i, set)| {
        let first = set
            .item_paths()
            .next()
            .map(|p| p.display().to_string())
            .filter(|p| !p.is_empty())
            .unwrap_or_else(|| ".".to_string());
        [
            format!("#{} {}", i + 1, first),
            size_to_string(set.total_size),
            set.items.len().to_string(),
            set.dir_count.to_string(),
            set.file_count.to_string(),
        ]
    }));
    out.push_str(&format!("{}\n\n{} set(s)", table, report.sets.len()));
    out
}

pub fn format_upload_report(report: &PipelineReport, generation: &str) -> String {
    let status = if report.is_success() {
        format!("{}", "OK".green())
    } else {
        format!("{}", "FAILED".red())
    };
    format!(
        "Upload {}: {}/{} set(s) uploaded, {} failed (generation {})",
        status, report.uploaded, report.total, report.failed, generation
    )
}

pub fn format_restore_report(report: &RestoreReport, extract_path: &std::path::Path) -> String {
    format!(
        "Restored {}/{} archive(s) into {}",
        report.restored,
        report.total,
        extract_path.display()
    )
}
