use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::aggregate::{frequency_count, summary_metrics, time_series};
use crate::filter::{apply, FilterSpec};
use crate::models::{
    BucketCount, Dataset, DatasetView, Frequency, Granularity, QualityReport, SummaryMetrics,
    CASE_TYPE, DECISION, DOCUMENT_KIND, SUBJECT,
};
use crate::quality::missing_report;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrequencyRequest {
    pub column: String,
    #[serde(default)]
    pub top_n: Option<usize>,
}

impl FrequencyRequest {
    pub fn all(column: &str) -> Self {
        Self {
            column: column.to_string(),
            top_n: None,
        }
    }

    pub fn top(column: &str, n: usize) -> Self {
        Self {
            column: column.to_string(),
            top_n: Some(n),
        }
    }
}

/// Which aggregations a query computes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryConfig {
    #[serde(default)]
    pub frequencies: Vec<FrequencyRequest>,
    #[serde(default)]
    pub time_series: Vec<Granularity>,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            frequencies: vec![
                FrequencyRequest::all(CASE_TYPE),
                FrequencyRequest::top(DOCUMENT_KIND, 10),
                FrequencyRequest::top(SUBJECT, 10),
                FrequencyRequest::all(DECISION),
            ],
            time_series: vec![Granularity::Day, Granularity::Month, Granularity::Year],
        }
    }
}

impl QueryConfig {
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FrequencyResult {
    pub column: String,
    pub top_n: Option<usize>,
    pub entries: Vec<Frequency>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimeSeriesResult {
    pub granularity: Granularity,
    pub buckets: Vec<BucketCount>,
}

/// Everything a dashboard renders for one filter state.
#[derive(Debug, Clone, Serialize)]
pub struct QueryResult<'a> {
    #[serde(skip)]
    pub view: DatasetView<'a>,
    pub metrics: SummaryMetrics,
    pub frequencies: Vec<FrequencyResult>,
    pub time_series: Vec<TimeSeriesResult>,
    pub quality: QualityReport,
}

impl QueryResult<'_> {
    pub fn frequency(&self, column: &str) -> Option<&FrequencyResult> {
        self.frequencies.iter().find(|result| result.column == column)
    }

    pub fn series(&self, granularity: Granularity) -> Option<&TimeSeriesResult> {
        self.time_series
            .iter()
            .find(|result| result.granularity == granularity)
    }
}

/// Filters the dataset and computes the default set of aggregations.
pub fn filter_and_summarize<'a>(dataset: &'a Dataset, spec: &FilterSpec) -> QueryResult<'a> {
    filter_and_summarize_with(dataset, spec, &QueryConfig::default())
}

#[instrument(skip_all, fields(records = dataset.len()))]
pub fn filter_and_summarize_with<'a>(
    dataset: &'a Dataset,
    spec: &FilterSpec,
    config: &QueryConfig,
) -> QueryResult<'a> {
    let view = apply(dataset, spec);
    debug!(matched = view.len(), "filter applied");

    let metrics = summary_metrics(&view);

    let frequencies = config
        .frequencies
        .iter()
        .map(|request| FrequencyResult {
            column: request.column.clone(),
            top_n: request.top_n,
            entries: frequency_count(&view, &request.column, request.top_n),
        })
        .collect();

    let series = config
        .time_series
        .iter()
        .map(|&granularity| TimeSeriesResult {
            granularity,
            buckets: time_series(&view, granularity),
        })
        .collect();

    let quality = missing_report(&view);

    QueryResult {
        view,
        metrics,
        frequencies,
        time_series: series,
        quality,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::load_dataset;

    const CSV: &str = "\
ANO/PROTOCOLO,DATA E HORA DE ENTRADA,TIPO,ESPÉCIE,ASSUNTO,DECISAO,STATUS
2023/001,2023-01-05 09:00:00,PAD,Portaria,Abandono,,Pendente
2023/002,2023-01-20 10:00:00,Sindicância,Relatório,Assédio,Absolvição,Concluído
2023/003,2023-03-02 08:00:00,PAD,Portaria,Assédio,,Pendente
2022/104,2022-12-11 16:30:00,Sindicância,Despacho,Abandono,Advertência,Concluído
";

    #[test]
    fn composite_query_uses_filtered_view() {
        let dataset = load_dataset(CSV.as_bytes()).unwrap();
        let spec = FilterSpec::builder().year(2023).build();

        let result = filter_and_summarize(&dataset, &spec);
        assert_eq!(result.view.len(), 3);
        assert_eq!(result.metrics.total, 3);
        assert_eq!(result.metrics.pending_count, 2);
        assert_eq!(result.metrics.with_decision, 1);

        let case_types = result.frequency(CASE_TYPE).unwrap();
        assert_eq!(case_types.entries[0].value, "PAD");
        assert_eq!(case_types.entries[0].count, 2);

        let monthly = result.series(Granularity::Month).unwrap();
        let labels: Vec<String> = monthly.buckets.iter().map(|b| b.bucket.to_string()).collect();
        assert_eq!(labels, ["2023-01", "2023-03"]);

        let decision = result.quality.entry(DECISION).unwrap();
        assert_eq!(decision.missing_count, 2);
    }

    #[test]
    fn everything_filtered_out_is_not_an_error() {
        let dataset = load_dataset(CSV.as_bytes()).unwrap();
        let spec = FilterSpec::builder().subjects(["Peculato"]).build();

        let result = filter_and_summarize(&dataset, &spec);
        assert!(result.view.is_empty());
        assert_eq!(result.metrics.completion_ratio, 0.0);
        assert!(result.frequencies.iter().all(|f| f.entries.is_empty()));
        assert!(result.time_series.iter().all(|s| s.buckets.is_empty()));
        assert!(result.quality.entries.iter().all(|e| e.missing_percent == 0.0));
    }

    #[test]
    fn config_parses_from_json() {
        let config = QueryConfig::from_json(
            r#"{"frequencies": [{"column": "ASSUNTO", "top_n": 3}], "time_series": ["year"]}"#,
        )
        .unwrap();
        assert_eq!(config.frequencies, [FrequencyRequest::top(SUBJECT, 3)]);
        assert_eq!(config.time_series, [Granularity::Year]);

        let dataset = load_dataset(CSV.as_bytes()).unwrap();
        let result = filter_and_summarize_with(&dataset, &FilterSpec::default(), &config);
        assert_eq!(result.frequencies.len(), 1);
        assert_eq!(result.series(Granularity::Year).unwrap().buckets.len(), 2);
        assert!(result.series(Granularity::Day).is_none());
    }
}
