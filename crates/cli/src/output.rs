//! Terminal rendering and CSV export.
//!
//! Consumes read-only snapshots from the engine: occupancy views for
//! `--vis`, hit-rate bar charts for `--charts`, and flat key/value rows for
//! `-e`. Nothing here feeds back into the simulation.

use std::path::Path;

use cachesim_core::cache::CacheSnapshot;
use cachesim_core::stats::SimulationReport;

const BAR_WIDTH: usize = 40;
/// Sets rendered per cache before eliding the rest.
const MAX_SETS_SHOWN: usize = 32;

const DIM: &str = "\x1b[2m";
const GREEN: &str = "\x1b[32m";
const YELLOW: &str = "\x1b[33m";
const RED: &str = "\x1b[31m";
const RESET: &str = "\x1b[0m";

fn paint(text: &str, color: &str, enabled: bool) -> String {
    if enabled {
        format!("{color}{text}{RESET}")
    } else {
        text.to_string()
    }
}

/// Renders per-set occupancy for every cache level.
pub fn print_snapshots(snapshots: &[CacheSnapshot], color: bool) {
    for snap in snapshots {
        println!("\n{} occupancy ({} ways/set):", snap.label, snap.ways);
        for (set_index, set) in snap.sets.iter().enumerate().take(MAX_SETS_SHOWN) {
            let mut line = format!("  set {set_index:>4}: ");
            if set.is_empty() {
                line.push_str(&paint("(empty)", DIM, color));
            }
            for block in set {
                let cell = format!(
                    "{}:{:#x}{} ",
                    block.state,
                    block.tag,
                    if block.dirty { "*" } else { "" }
                );
                let painted = match block.state {
                    'M' => paint(&cell, RED, color),
                    'S' => paint(&cell, YELLOW, color),
                    _ => paint(&cell, GREEN, color),
                };
                line.push_str(&painted);
            }
            println!("{line}");
        }
        if snap.sets.len() > MAX_SETS_SHOWN {
            println!("  … {} more sets", snap.sets.len() - MAX_SETS_SHOWN);
        }
    }
}

/// Renders ASCII bar charts of per-level hit rates.
pub fn print_charts(report: &SimulationReport, color: bool) {
    println!("\nhit rates:");
    chart_row("L1", report.l1.hit_rate(), color);
    if let Some(l2) = &report.l2 {
        chart_row("L2", l2.hit_rate(), color);
    }
    if let Some(victim) = &report.victim {
        let total = victim.hits + victim.misses;
        if total > 0 {
            chart_row("victim", victim.hits as f64 / total as f64, color);
        }
    }
    if let Some(prefetch) = &report.prefetch {
        if prefetch.issued > 0 {
            chart_row("prefetch", prefetch.accuracy(), color);
        }
    }
    for (id, core) in report.cores.iter().enumerate() {
        let total = core.hits + core.misses;
        if total > 0 {
            chart_row(&format!("core{id}"), core.hits as f64 / total as f64, color);
        }
    }
}

fn chart_row(label: &str, rate: f64, color: bool) {
    let filled = (rate * BAR_WIDTH as f64).round() as usize;
    let bar: String = "█".repeat(filled.min(BAR_WIDTH)) + &"░".repeat(BAR_WIDTH - filled.min(BAR_WIDTH));
    let painted = if rate >= 0.9 {
        paint(&bar, GREEN, color)
    } else if rate >= 0.5 {
        paint(&bar, YELLOW, color)
    } else {
        paint(&bar, RED, color)
    };
    println!("  {label:<9} [{painted}] {:.2}%", rate * 100.0);
}

/// Writes the report as two-column CSV (`metric,value`).
pub fn export_csv(path: &Path, report: &SimulationReport) -> csv::Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(["metric", "value"])?;
    for (key, value) in report.rows() {
        writer.write_record([key.as_str(), value.as_str()])?;
    }
    writer.flush()?;
    Ok(())
}
