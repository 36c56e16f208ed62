use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;

use chrono::{Datelike, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize, Serializer};

pub const ENTRY_TIMESTAMP: &str = "DATA E HORA DE ENTRADA";
pub const ENTRY_DATE: &str = "DATA DE ENTRADA";
pub const CASE_TYPE: &str = "TIPO";
pub const DOCUMENT_KIND: &str = "ESPÉCIE";
pub const SUBJECT: &str = "ASSUNTO";
pub const DECISION: &str = "DECISAO";
pub const STATUS: &str = "STATUS";

pub const YEAR: &str = "ANO";
pub const MONTH: &str = "MES";
pub const YEAR_MONTH: &str = "MES_ANO";

/// Columns computed from the entry timestamp, appended after the input columns.
pub const DERIVED_COLUMNS: [&str; 3] = [YEAR, MONTH, YEAR_MONTH];

pub const DEFAULT_TABLE_COLUMNS: [&str; 7] = [
    "ANO/PROTOCOLO",
    ENTRY_DATE,
    CASE_TYPE,
    DOCUMENT_KIND,
    SUBJECT,
    DECISION,
    STATUS,
];

/// Status value that marks a case as still open.
pub const PENDING_STATUS: &str = "Pendente";

/// Outcome of reading a date cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DateField {
    /// The cell was empty in the source.
    Missing,
    /// The cell held text that no supported format accepts.
    Malformed(String),
    Parsed(NaiveDateTime),
}

impl DateField {
    pub fn value(&self) -> Option<NaiveDateTime> {
        match self {
            DateField::Parsed(value) => Some(*value),
            DateField::Missing | DateField::Malformed(_) => None,
        }
    }

    pub fn is_malformed(&self) -> bool {
        matches!(self, DateField::Malformed(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct YearMonth {
    pub year: i32,
    pub month: u32,
}

impl YearMonth {
    pub fn of(timestamp: &NaiveDateTime) -> Self {
        Self {
            year: timestamp.year(),
            month: timestamp.month(),
        }
    }
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl Serialize for YearMonth {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// One disciplinary-process entry.
///
/// The temporal fields are private so the derived year, month and year-month
/// can only be set together with the entry timestamp they come from.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    entered_at: DateField,
    entry_date: DateField,
    year: Option<i32>,
    month: Option<u32>,
    year_month: Option<YearMonth>,
    pub case_type: Option<String>,
    pub document_kind: Option<String>,
    pub subject: Option<String>,
    pub decision: Option<String>,
    pub status: Option<String>,
    /// Uninterpreted columns; only populated cells are stored.
    pub passthrough: BTreeMap<String, String>,
}

impl Record {
    pub fn new(entered_at: DateField, entry_date: DateField) -> Self {
        let parsed = entered_at.value();
        Self {
            year: parsed.map(|ts| ts.year()),
            month: parsed.map(|ts| ts.month()),
            year_month: parsed.as_ref().map(YearMonth::of),
            entered_at,
            entry_date,
            case_type: None,
            document_kind: None,
            subject: None,
            decision: None,
            status: None,
            passthrough: BTreeMap::new(),
        }
    }

    pub fn entered_at(&self) -> &DateField {
        &self.entered_at
    }

    pub fn entry_date(&self) -> &DateField {
        &self.entry_date
    }

    pub fn year(&self) -> Option<i32> {
        self.year
    }

    pub fn month(&self) -> Option<u32> {
        self.month
    }

    pub fn year_month(&self) -> Option<YearMonth> {
        self.year_month
    }

    /// Textual value of a column, `None` when the record has nothing there.
    pub fn value(&self, column: &str) -> Option<Cow<'_, str>> {
        match column {
            ENTRY_TIMESTAMP => self
                .entered_at
                .value()
                .map(|ts| Cow::Owned(ts.format("%Y-%m-%d %H:%M:%S").to_string())),
            ENTRY_DATE => self
                .entry_date
                .value()
                .map(|ts| Cow::Owned(ts.format("%Y-%m-%d").to_string())),
            CASE_TYPE => self.case_type.as_deref().map(Cow::Borrowed),
            DOCUMENT_KIND => self.document_kind.as_deref().map(Cow::Borrowed),
            SUBJECT => self.subject.as_deref().map(Cow::Borrowed),
            DECISION => self.decision.as_deref().map(Cow::Borrowed),
            STATUS => self.status.as_deref().map(Cow::Borrowed),
            YEAR => self.year.map(|year| Cow::Owned(year.to_string())),
            MONTH => self.month.map(|month| Cow::Owned(month.to_string())),
            YEAR_MONTH => self.year_month.map(|ym| Cow::Owned(ym.to_string())),
            other => self.passthrough.get(other).map(|value| Cow::Borrowed(value.as_str())),
        }
    }

    pub fn is_missing(&self, column: &str) -> bool {
        match column {
            ENTRY_TIMESTAMP => self.entered_at.value().is_none(),
            ENTRY_DATE => self.entry_date.value().is_none(),
            CASE_TYPE => self.case_type.is_none(),
            DOCUMENT_KIND => self.document_kind.is_none(),
            SUBJECT => self.subject.is_none(),
            DECISION => self.decision.is_none(),
            STATUS => self.status.is_none(),
            YEAR => self.year.is_none(),
            MONTH => self.month.is_none(),
            YEAR_MONTH => self.year_month.is_none(),
            other => !self.passthrough.contains_key(other),
        }
    }

    /// True when the column held text that could not be parsed.
    pub fn is_malformed(&self, column: &str) -> bool {
        match column {
            ENTRY_TIMESTAMP => self.entered_at.is_malformed(),
            ENTRY_DATE => self.entry_date.is_malformed(),
            _ => false,
        }
    }
}

/// A date cell that was present but could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParseWarning {
    /// Zero-based record index within the dataset.
    pub row: usize,
    pub column: String,
    pub raw: String,
}

/// Immutable, ordered collection of records with a fixed column schema.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    schema: Vec<String>,
    records: Vec<Record>,
    warnings: Vec<ParseWarning>,
}

impl Dataset {
    pub fn new(schema: Vec<String>, records: Vec<Record>, warnings: Vec<ParseWarning>) -> Self {
        Self {
            schema,
            records,
            warnings,
        }
    }

    pub fn schema(&self) -> &[String] {
        &self.schema
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.schema.iter().any(|name| name == column)
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn warnings(&self) -> &[ParseWarning] {
        &self.warnings
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// A view over every record.
    pub fn view(&self) -> DatasetView<'_> {
        DatasetView::new(self, (0..self.records.len()).collect())
    }
}

/// Read-only, order-preserving subsequence of a [`Dataset`].
#[derive(Debug, Clone)]
pub struct DatasetView<'a> {
    dataset: &'a Dataset,
    rows: Vec<usize>,
}

impl<'a> DatasetView<'a> {
    pub(crate) fn new(dataset: &'a Dataset, rows: Vec<usize>) -> Self {
        Self { dataset, rows }
    }

    pub fn dataset(&self) -> &'a Dataset {
        self.dataset
    }

    pub fn row_indices(&self) -> &[usize] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn records(&self) -> impl Iterator<Item = &'a Record> + '_ {
        let records = self.dataset.records();
        self.rows.iter().map(move |&row| &records[row])
    }

    /// Copies the visible records into a standalone dataset with the same schema.
    pub fn to_dataset(&self) -> Dataset {
        let positions: std::collections::HashMap<usize, usize> = self
            .rows
            .iter()
            .enumerate()
            .map(|(position, &row)| (row, position))
            .collect();

        let warnings = self
            .dataset
            .warnings()
            .iter()
            .filter_map(|warning| {
                positions.get(&warning.row).map(|&row| ParseWarning {
                    row,
                    ..warning.clone()
                })
            })
            .collect();

        Dataset::new(
            self.dataset.schema().to_vec(),
            self.records().cloned().collect(),
            warnings,
        )
    }

    /// Restricts the visible rows to the requested columns, skipping names
    /// the schema does not know.
    pub fn project<S: AsRef<str>>(&self, columns: &[S]) -> Table {
        let headers: Vec<String> = columns
            .iter()
            .filter_map(|column| {
                let column: &str = column.as_ref();
                self.dataset
                    .has_column(column)
                    .then(|| column.to_string())
            })
            .collect();

        let rows = self
            .records()
            .map(|record| {
                headers
                    .iter()
                    .map(|column| record.value(column).map(Cow::into_owned))
                    .collect()
            })
            .collect();

        Table { headers, rows }
    }
}

impl PartialEq for DatasetView<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.records().eq(other.records())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Option<String>>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Frequency {
    pub value: String,
    pub count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    Day,
    Month,
    Year,
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Granularity::Day => "day",
            Granularity::Month => "month",
            Granularity::Year => "year",
        };
        f.write_str(label)
    }
}

/// Calendar period used to group records in a time series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Bucket {
    Day(NaiveDate),
    Month(YearMonth),
    Year(i32),
}

impl fmt::Display for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Bucket::Day(date) => write!(f, "{}", date.format("%Y-%m-%d")),
            Bucket::Month(year_month) => write!(f, "{year_month}"),
            Bucket::Year(year) => write!(f, "{year}"),
        }
    }
}

impl Serialize for Bucket {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BucketCount {
    pub bucket: Bucket,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryMetrics {
    pub total: usize,
    pub with_decision: usize,
    pub pending_count: usize,
    pub completion_ratio: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QualityEntry {
    pub column: String,
    pub missing_count: usize,
    /// Subset of `missing_count` whose source text was present but unparseable.
    pub malformed_count: usize,
    pub missing_percent: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct QualityReport {
    pub entries: Vec<QualityEntry>,
}

impl QualityReport {
    /// The `n` columns with the most missing values.
    pub fn top(&self, n: usize) -> &[QualityEntry] {
        &self.entries[..n.min(self.entries.len())]
    }

    pub fn entry(&self, column: &str) -> Option<&QualityEntry> {
        self.entries.iter().find(|entry| entry.column == column)
    }
}
