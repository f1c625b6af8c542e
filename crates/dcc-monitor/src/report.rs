use crate::ui::COLUMNS;
use anyhow::{bail, Context, Result};
use dcc_core::{MonitorConfig, Snapshot, SnapshotAggregator, StatusRecord};
use std::io::Write;

/// One polling cycle rendered to `out`, for scripts and non-interactive use.
pub fn run_once(config: &MonitorConfig, json: bool, out: &mut impl Write) -> Result<()> {
    if !config.state_dir.is_dir() {
        bail!(
            "distcc state directory not found: {}",
            config.state_dir.display()
        );
    }
    let snapshot = SnapshotAggregator::new(config.magic_policy).run_cycle(&config.state_dir);
    if json {
        serde_json::to_writer_pretty(&mut *out, &snapshot).context("encode snapshot")?;
        writeln!(out)?;
    } else {
        out.write_all(format_table(&snapshot).as_bytes())?;
    }
    Ok(())
}

pub fn format_table(snapshot: &Snapshot) -> String {
    let cells: Vec<[String; 5]> = snapshot.records.iter().map(row_cells).collect();
    let mut widths = COLUMNS.map(str::len);
    for row in &cells {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let mut out = String::new();
    push_line(&mut out, &COLUMNS.map(str::to_string), &widths);
    for row in &cells {
        push_line(&mut out, row, &widths);
    }
    out
}

fn row_cells(record: &StatusRecord) -> [String; 5] {
    [
        record.host.clone(),
        record.slot.to_string(),
        record.filename.clone(),
        record.phase.to_string(),
        record.process_id.to_string(),
    ]
}

fn push_line(out: &mut String, cells: &[String; 5], widths: &[usize; 5]) {
    let line = cells
        .iter()
        .zip(widths)
        .map(|(cell, width)| format!("{cell:<w$}", w = *width))
        .collect::<Vec<_>>()
        .join("  ");
    out.push_str(line.trim_end());
    out.push('\n');
}
