use std::collections::BTreeMap;

use crate::models::{
    Bucket, BucketCount, DatasetView, Frequency, Granularity, Record, SummaryMetrics,
    PENDING_STATUS,
};

/// Counts the non-null values of `column`, most frequent first.
///
/// Equal counts keep the order in which values first appear in the view.
pub fn frequency_count(
    view: &DatasetView<'_>,
    column: &str,
    top_n: Option<usize>,
) -> Vec<Frequency> {
    let mut positions: std::collections::HashMap<String, usize> =
        std::collections::HashMap::new();
    let mut counts: Vec<Frequency> = Vec::new();

    for record in view.records() {
        let Some(value) = record.value(column) else {
            continue;
        };

        match positions.get(&*value).copied() {
            Some(position) => counts[position].count += 1,
            None => {
                positions.insert(value.to_string(), counts.len());
                counts.push(Frequency {
                    value: value.into_owned(),
                    count: 1,
                });
            }
        }
    }

    // stable sort preserves first-seen order among ties
    counts.sort_by(|a, b| b.count.cmp(&a.count));

    if let Some(limit) = top_n {
        counts.truncate(limit);
    }
    counts
}

/// Record counts per calendar bucket, ascending. Empty buckets are omitted.
pub fn time_series(view: &DatasetView<'_>, granularity: Granularity) -> Vec<BucketCount> {
    let mut buckets: BTreeMap<Bucket, usize> = BTreeMap::new();

    for record in view.records() {
        if let Some(bucket) = bucket_of(record, granularity) {
            *buckets.entry(bucket).or_insert(0) += 1;
        }
    }

    buckets
        .into_iter()
        .map(|(bucket, count)| BucketCount { bucket, count })
        .collect()
}

fn bucket_of(record: &Record, granularity: Granularity) -> Option<Bucket> {
    match granularity {
        Granularity::Day => record.entered_at().value().map(|ts| Bucket::Day(ts.date())),
        Granularity::Month => record.year_month().map(Bucket::Month),
        Granularity::Year => record.year().map(Bucket::Year),
    }
}

pub fn summary_metrics(view: &DatasetView<'_>) -> SummaryMetrics {
    let mut with_decision = 0;
    let mut pending_count = 0;

    for record in view.records() {
        if record.decision.is_some() {
            with_decision += 1;
        }
        if record.status.as_deref() == Some(PENDING_STATUS) {
            pending_count += 1;
        }
    }

    let total = view.len();
    SummaryMetrics {
        total,
        with_decision,
        pending_count,
        completion_ratio: if total == 0 {
            0.0
        } else {
            with_decision as f64 / total as f64
        },
    }
}
