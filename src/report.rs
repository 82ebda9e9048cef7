use std::fmt::Write;

use owo_colors::{AnsiColors, OwoColorize};
use serde::Serialize;
use time::OffsetDateTime;

use crate::parse::format_timestamp;
use crate::stats::{FrequencyCounter, MatrixExport};

pub const DEFAULT_TOP: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RankedEntry {
    pub key: String,
    pub count: u64,
    pub percent: u64,
}

/// Top `top` keys by count, ties ordered by key. Empty when the counter sums to zero.
pub fn rank(counter: &FrequencyCounter, top: usize) -> Vec<RankedEntry> {
    let total = counter.total();
    if total == 0 {
        return vec![];
    }

    let mut entries: Vec<(&str, u64)> = counter.iter().collect();
    entries.sort_unstable_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));

    entries
        .into_iter()
        .take(top)
        .map(|(key, count)| RankedEntry {
            key: key.to_owned(),
            count,
            percent: count * 100 / total,
        })
        .collect()
}

pub fn render_table(title: &str, counter: &FrequencyCounter, top: usize, color: bool) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "[+] Top {top} {title}");

    let entries = rank(counter, top);
    if entries.is_empty() {
        let _ = writeln!(out, "No data");
        return out;
    }

    // Column width comes from every key, not only the ones shown.
    let width = counter
        .iter()
        .map(|(k, _)| k.chars().count())
        .max()
        .unwrap_or(0);

    for entry in entries {
        let key = format!("{:<width$}", entry.key);
        let percent = format!("({}%)", entry.percent);
        if color {
            let _ = writeln!(out, "- {} {:>6} {percent}", key.bold(), entry.count);
        } else {
            let _ = writeln!(out, "- {key} {:>6} {percent}", entry.count);
        }
    }
    out
}

#[derive(Debug, Clone)]
pub struct HeatmapTitle<'a> {
    pub screen_name: &'a str,
    pub generated: OffsetDateTime,
    pub tweets: u64,
    pub utc_offset: i64,
}

fn shade(count: u64, max: u64) -> Option<AnsiColors> {
    if count == 0 || max == 0 {
        return None;
    }
    let level = (count * 4).div_ceil(max);
    Some(match level {
        1 => AnsiColors::Blue,
        2 => AnsiColors::Cyan,
        3 => AnsiColors::Yellow,
        _ => AnsiColors::Red,
    })
}

/// Weekday by hour grid of raw counts, shaded relative to the busiest cell.
pub fn render_heatmap(matrix: &MatrixExport, title: &HeatmapTitle<'_>, color: bool) -> String {
    let max = matrix.max();
    let cell_width = max.to_string().len().max(2);
    let label_width = matrix
        .row_labels
        .iter()
        .map(|l| l.len())
        .max()
        .unwrap_or(0);

    let mut out = String::new();
    let _ = writeln!(
        out,
        "Tweet activity for @{} (generated {} UTC, {} tweets, UTC offset {} s)",
        title.screen_name,
        format_timestamp(title.generated),
        title.tweets,
        title.utc_offset,
    );

    let _ = write!(out, "{:label_width$}", "");
    for label in &matrix.col_labels {
        let hour = label.split(':').next().unwrap_or(label);
        let _ = write!(out, " {hour:>cell_width$}");
    }
    out.push('\n');

    for (label, row) in matrix.row_labels.iter().zip(matrix.cells.iter()) {
        let _ = write!(out, "{label:<label_width$}");
        for &count in row {
            let cell = format!("{count:>cell_width$}");
            match shade(count, max) {
                Some(bg) if color => {
                    let _ = write!(out, " {}", cell.on_color(bg));
                }
                _ => {
                    let _ = write!(out, " {cell}");
                }
            }
        }
        out.push('\n');
    }
    out
}
