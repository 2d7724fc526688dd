//! Table formatting for search results and benchmark reports.

use comfy_table::{
    Attribute, Cell, CellAlignment, Color, Table, modifiers::UTF8_ROUND_CORNERS,
    presets::UTF8_FULL,
};

use crate::bench::{BenchmarkReport, Summary};
use crate::vector::SearchResult;

/// Recall below this is highlighted in benchmark tables.
const LOW_RECALL: f64 = 0.9;

fn new_table() -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    // Apply rounded corners
    table.apply_modifier(UTF8_ROUND_CORNERS);
    table
}

fn header(names: &[&str]) -> Vec<Cell> {
    names
        .iter()
        .map(|name| Cell::new(name).add_attribute(Attribute::Bold))
        .collect()
}

/// Create a table of ranked neighbors, one block of rows per query.
pub fn create_results_table(results: &[SearchResult]) -> String {
    let mut table = new_table();
    table.set_header(header(&["Query", "Rank", "ID", "Distance"]));

    for (query, result) in results.iter().enumerate() {
        if result.is_empty() {
            table.add_row(vec![
                Cell::new(query),
                Cell::new("-"),
                Cell::new("<no results>").fg(Color::DarkGrey),
                Cell::new("-"),
            ]);
            continue;
        }
        for (rank, hit) in result.hits().iter().enumerate() {
            table.add_row(vec![
                Cell::new(query),
                Cell::new(rank + 1),
                Cell::new(hit.id.as_str()),
                Cell::new(format!("{:.6}", hit.distance.get())).set_alignment(CellAlignment::Right),
            ]);
        }
    }

    table.to_string()
}

/// Create a comparison table with one row per benchmarked strategy.
pub fn create_benchmark_table(reports: &[BenchmarkReport]) -> String {
    let mut table = new_table();
    table.set_header(header(&[
        "Strategy",
        "Runs",
        "Mean time",
        "Std dev",
        "Per query",
        "Peak memory",
        "Memory std dev",
        "Recall",
    ]));

    for report in reports {
        let (peak_mean, peak_dev) = match &report.peak_memory {
            Some(Summary { mean, variance, .. }) => {
                (format_bytes(*mean), format_bytes(variance.sqrt()))
            }
            None => ("n/a".to_string(), "n/a".to_string()),
        };
        let recall = match report.recall {
            Some(recall) if recall < LOW_RECALL => {
                Cell::new(format!("{:.1}%", recall * 100.0)).fg(Color::Yellow)
            }
            Some(recall) => Cell::new(format!("{:.1}%", recall * 100.0)).fg(Color::Green),
            None => Cell::new("-"),
        };

        table.add_row(vec![
            Cell::new(&report.strategy_name),
            Cell::new(report.samples.len()),
            Cell::new(format_seconds(report.elapsed.mean)).set_alignment(CellAlignment::Right),
            Cell::new(format_seconds(report.elapsed.std_dev())).set_alignment(CellAlignment::Right),
            Cell::new(format!("{:?}", report.mean_latency_per_query()))
                .set_alignment(CellAlignment::Right),
            Cell::new(peak_mean).set_alignment(CellAlignment::Right),
            Cell::new(peak_dev).set_alignment(CellAlignment::Right),
            recall,
        ]);
    }

    table.to_string()
}

/// Create a key/value table for a single report's raw samples.
pub fn create_samples_table(report: &BenchmarkReport) -> String {
    let mut table = new_table();
    table.set_header(header(&["Run", "Elapsed", "Peak memory"]));
    for (run, sample) in report.samples.iter().enumerate() {
        table.add_row(vec![
            Cell::new(run + 1),
            Cell::new(format_seconds(sample.elapsed.as_secs_f64())),
            Cell::new(
                sample
                    .peak_memory
                    .map_or_else(|| "n/a".to_string(), |bytes| format_bytes(bytes as f64)),
            ),
        ]);
    }
    table.to_string()
}

/// Seconds rendered with four decimals.
pub fn format_seconds(seconds: f64) -> String {
    format!("{seconds:.4} s")
}

/// Bytes rendered in MiB.
pub fn format_bytes(bytes: f64) -> String {
    format!("{:.2} MiB", bytes / (1024.0 * 1024.0))
}
