use crate::models::{DatasetView, QualityEntry, QualityReport};

/// Missing values per schema column over the view, worst first.
///
/// Every column of the dataset schema is reported, including columns that no
/// record in the view populates. An empty view reports 0% everywhere.
pub fn missing_report(view: &DatasetView<'_>) -> QualityReport {
    let denominator = view.len().max(1) as f64;

    let mut entries: Vec<QualityEntry> = view
        .dataset()
        .schema()
        .iter()
        .map(|column| {
            let mut missing_count = 0;
            let mut malformed_count = 0;
            for record in view.records() {
                if record.is_missing(column) {
                    missing_count += 1;
                    if record.is_malformed(column) {
                        malformed_count += 1;
                    }
                }
            }

            QualityEntry {
                column: column.clone(),
                missing_count,
                malformed_count,
                missing_percent: round2(missing_count as f64 / denominator * 100.0),
            }
        })
        .collect();

    entries.sort_by(|a, b| {
        b.missing_count
            .cmp(&a.missing_count)
            .then_with(|| a.column.cmp(&b.column))
    });

    QualityReport { entries }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
