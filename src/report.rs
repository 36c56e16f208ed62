use std::fmt::Write;

use crate::filter::{Dimension, FilterSpec};
use crate::models::YEAR;
use crate::query::QueryResult;

const NO_DATA: &str = "No data for the selected filters.";

fn describe_filters(spec: &FilterSpec) -> Vec<String> {
    let mut lines = Vec::new();

    if let Some(year) = spec.year() {
        lines.push(format!("{YEAR}: {year}"));
    }

    for dimension in Dimension::ALL {
        if let Some(values) = spec.inclusion(dimension).values() {
            let joined: Vec<&str> = values.iter().map(String::as_str).collect();
            lines.push(format!("{}: {}", dimension.column(), joined.join(", ")));
        }
    }

    lines
}

pub fn build_report(result: &QueryResult<'_>, spec: &FilterSpec) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# Disciplinary Case Dashboard");

    let filters = describe_filters(spec);
    if filters.is_empty() {
        let _ = writeln!(output, "Generated for all records");
    } else {
        let _ = writeln!(output, "Generated for records matching:");
        for line in &filters {
            let _ = writeln!(output, "- {line}");
        }
    }

    let metrics = &result.metrics;
    let _ = writeln!(output);
    let _ = writeln!(output, "## Summary");
    let _ = writeln!(output, "- Total cases: {}", metrics.total);
    let _ = writeln!(output, "- Pending cases: {}", metrics.pending_count);
    let _ = writeln!(output, "- Cases with decision: {}", metrics.with_decision);
    let _ = writeln!(
        output,
        "- Completion rate: {:.1}%",
        metrics.completion_ratio * 100.0
    );

    for frequency in &result.frequencies {
        let _ = writeln!(output);
        match frequency.top_n {
            Some(n) => {
                let _ = writeln!(output, "## {} (top {})", frequency.column, n);
            }
            None => {
                let _ = writeln!(output, "## {}", frequency.column);
            }
        }

        if frequency.entries.is_empty() {
            let _ = writeln!(output, "{NO_DATA}");
            continue;
        }

        for entry in &frequency.entries {
            let share = if metrics.total == 0 {
                0.0
            } else {
                entry.count as f64 / metrics.total as f64 * 100.0
            };
            let _ = writeln!(output, "- {}: {} ({:.1}%)", entry.value, entry.count, share);
        }
    }

    for series in &result.time_series {
        let _ = writeln!(output);
        let _ = writeln!(output, "## Cases per {}", series.granularity);

        if series.buckets.is_empty() {
            let _ = writeln!(output, "{NO_DATA}");
            continue;
        }

        for bucket in &series.buckets {
            let _ = writeln!(output, "- {}: {}", bucket.bucket, bucket.count);
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Data Quality");
    if result.quality.entries.is_empty() {
        let _ = writeln!(output, "{NO_DATA}");
    } else {
        let _ = writeln!(output, "| Column | Missing | Malformed | Missing (%) |");
        let _ = writeln!(output, "|---|---:|---:|---:|");
        for entry in &result.quality.entries {
            let _ = writeln!(
                output,
                "| {} | {} | {} | {:.2} |",
                entry.column, entry.missing_count, entry.malformed_count, entry.missing_percent
            );
        }
    }

    output
}
