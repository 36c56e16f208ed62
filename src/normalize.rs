use std::borrow::Cow;
use std::collections::HashSet;
use std::io::Read;
use std::path::Path;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use tracing::{debug, info, warn};

use crate::error::{LoadError, SchemaError};
use crate::models::{
    DateField, Dataset, ParseWarning, Record, CASE_TYPE, DECISION, DERIVED_COLUMNS,
    DOCUMENT_KIND, ENTRY_DATE, ENTRY_TIMESTAMP, STATUS, SUBJECT,
};

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%d/%m/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%d/%m/%Y"];

/// Rows of named string cells, as handed over by whoever read the upload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawTable {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl RawTable {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self { headers, rows }
    }

    /// Reads CSV with a header row. Ragged rows are accepted.
    ///
    /// Cells that are not valid UTF-8 are read as Latin-1, the encoding of
    /// many spreadsheet exports, so an odd byte never aborts the load.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self, LoadError> {
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .from_reader(reader);
        let mut transcoded = 0usize;

        let headers = reader
            .byte_headers()?
            .iter()
            .map(|header| {
                let header = decode_cell(header, &mut transcoded);
                header.trim_start_matches('\u{feff}').trim().to_string()
            })
            .collect();

        let mut rows = Vec::new();
        for result in reader.byte_records() {
            let record = result?;
            rows.push(
                record
                    .iter()
                    .map(|cell| decode_cell(cell, &mut transcoded).into_owned())
                    .collect(),
            );
        }

        if transcoded > 0 {
            warn!(cells = transcoded, "non UTF-8 cells decoded as Latin-1");
        }

        Ok(Self { headers, rows })
    }

    pub fn from_path(path: &Path) -> Result<Self, LoadError> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(file)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, LoadError> {
        Self::from_reader(bytes)
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }
}

fn decode_cell<'a>(bytes: &'a [u8], transcoded: &mut usize) -> Cow<'a, str> {
    match std::str::from_utf8(bytes) {
        Ok(text) => Cow::Borrowed(text),
        Err(_) => {
            *transcoded += 1;
            Cow::Owned(bytes.iter().map(|&byte| char::from(byte)).collect())
        }
    }
}

/// Reads CSV and normalizes it in one step.
pub fn load_dataset<R: Read>(reader: R) -> Result<Dataset, LoadError> {
    let raw = RawTable::from_reader(reader)?;
    Ok(normalize(&raw)?)
}

/// Turns raw rows into typed records.
///
/// Only a missing entry-timestamp header is fatal. Unparseable dates become
/// [`DateField::Malformed`] and are listed in [`Dataset::warnings`].
pub fn normalize(raw: &RawTable) -> Result<Dataset, SchemaError> {
    if !raw.headers.iter().any(|header| header == ENTRY_TIMESTAMP) {
        return Err(SchemaError::missing(ENTRY_TIMESTAMP));
    }

    // first occurrence of a header wins; derived names are reserved
    let mut seen = HashSet::new();
    let mut columns: Vec<(usize, &str)> = Vec::new();
    for (index, header) in raw.headers.iter().enumerate() {
        if DERIVED_COLUMNS.contains(&header.as_str()) {
            warn!(column = %header, "input column shadowed by derived column");
            continue;
        }
        if seen.insert(header.as_str()) {
            columns.push((index, header.as_str()));
        } else {
            warn!(column = %header, "duplicate input column ignored");
        }
    }

    let mut schema: Vec<String> = columns.iter().map(|(_, name)| name.to_string()).collect();
    schema.extend(DERIVED_COLUMNS.iter().map(|name| name.to_string()));

    let mut records = Vec::with_capacity(raw.rows.len());
    let mut warnings = Vec::new();

    for (row_index, row) in raw.rows.iter().enumerate() {
        let cell = |index: usize| {
            row.get(index)
                .map(|value| value.trim())
                .filter(|value| !value.is_empty())
        };

        let date_cell = |name: &str| {
            columns
                .iter()
                .find(|(_, column)| *column == name)
                .and_then(|&(index, _)| cell(index))
                .map_or(DateField::Missing, parse_date)
        };

        let entered_at = date_cell(ENTRY_TIMESTAMP);
        let entry_date = date_cell(ENTRY_DATE);

        for (column, field) in [(ENTRY_TIMESTAMP, &entered_at), (ENTRY_DATE, &entry_date)] {
            if let DateField::Malformed(raw) = field {
                debug!(row = row_index, column, raw = %raw, "unparseable date treated as missing");
                warnings.push(ParseWarning {
                    row: row_index,
                    column: column.to_string(),
                    raw: raw.clone(),
                });
            }
        }

        let mut record = Record::new(entered_at, entry_date);
        for &(index, name) in &columns {
            let Some(value) = cell(index) else {
                continue;
            };
            let value = value.to_string();
            match name {
                ENTRY_TIMESTAMP | ENTRY_DATE => {}
                CASE_TYPE => record.case_type = Some(value),
                DOCUMENT_KIND => record.document_kind = Some(value),
                SUBJECT => record.subject = Some(value),
                DECISION => record.decision = Some(value),
                STATUS => record.status = Some(value),
                other => {
                    record.passthrough.insert(other.to_string(), value);
                }
            }
        }

        records.push(record);
    }

    info!(
        records = records.len(),
        columns = schema.len(),
        malformed_dates = warnings.len(),
        "dataset normalized"
    );

    Ok(Dataset::new(schema, records, warnings))
}

/// Accepts the date layouts seen in exported case spreadsheets.
pub fn parse_date(value: &str) -> DateField {
    let value = value.trim();
    if value.is_empty() {
        return DateField::Missing;
    }

    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return DateField::Parsed(parsed.naive_local());
    }

    for format in DATETIME_FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(value, format) {
            return DateField::Parsed(parsed);
        }
    }

    for format in DATE_FORMATS {
        if let Some(parsed) = NaiveDate::parse_from_str(value, format)
            .ok()
            .and_then(|date| date.and_hms_opt(0, 0, 0))
        {
            return DateField::Parsed(parsed);
        }
    }

    DateField::Malformed(value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{YearMonth, MONTH, YEAR, YEAR_MONTH};

    fn table(headers: &[&str], rows: &[&[&str]]) -> RawTable {
        RawTable::new(
            headers.iter().map(|h| h.to_string()).collect(),
            rows.iter()
                .map(|row| row.iter().map(|v| v.to_string()).collect())
                .collect(),
        )
    }

    #[test]
    fn malformed_timestamps_degrade_to_missing() {
        let raw = table(
            &[ENTRY_TIMESTAMP],
            &[&["2023-01-15"], &["not-a-date"], &["2023-02-01"]],
        );
        let dataset = normalize(&raw).unwrap();

        let years: Vec<Option<i32>> = dataset.records().iter().map(Record::year).collect();
        assert_eq!(years, [Some(2023), None, Some(2023)]);

        let second = &dataset.records()[1];
        assert_eq!(second.month(), None);
        assert_eq!(second.year_month(), None);
        assert_eq!(dataset.warnings().len(), 1);
        assert_eq!(dataset.warnings()[0].row, 1);
        assert_eq!(dataset.warnings()[0].raw, "not-a-date");
    }

    #[test]
    fn missing_entry_timestamp_column_is_fatal() {
        let raw = table(&[ENTRY_DATE, CASE_TYPE], &[&["2023-01-15", "PAD"]]);
        let err = normalize(&raw).unwrap_err();
        assert_eq!(err.column, ENTRY_TIMESTAMP);
    }

    #[test]
    fn empty_input_with_header_loads() {
        let raw = table(&[ENTRY_TIMESTAMP, STATUS], &[]);
        let dataset = normalize(&raw).unwrap();
        assert!(dataset.is_empty());
        assert_eq!(dataset.schema(), [ENTRY_TIMESTAMP, STATUS, YEAR, MONTH, YEAR_MONTH]);
    }

    #[test]
    fn empty_cells_are_missing_not_malformed() {
        let raw = table(
            &[ENTRY_TIMESTAMP, ENTRY_DATE, DECISION],
            &[&["  ", "", "  Absolvição "]],
        );
        let dataset = normalize(&raw).unwrap();
        let record = &dataset.records()[0];
        assert_eq!(record.entered_at(), &DateField::Missing);
        assert_eq!(record.entry_date(), &DateField::Missing);
        assert_eq!(record.decision.as_deref(), Some("Absolvição"));
        assert!(dataset.warnings().is_empty());
    }

    #[test]
    fn passthrough_and_short_rows_are_kept() {
        let raw = table(
            &["ANO/PROTOCOLO", ENTRY_TIMESTAMP, CASE_TYPE, STATUS],
            &[&["2023/0001", "2023-03-04 10:15:00", "PAD"], &["2023/0002"]],
        );
        let dataset = normalize(&raw).unwrap();
        assert_eq!(dataset.len(), 2);

        let first = &dataset.records()[0];
        assert_eq!(first.value("ANO/PROTOCOLO").as_deref(), Some("2023/0001"));
        assert_eq!(first.case_type.as_deref(), Some("PAD"));
        assert_eq!(first.status, None);
        assert_eq!(first.year_month(), Some(YearMonth { year: 2023, month: 3 }));

        let second = &dataset.records()[1];
        assert_eq!(second.entered_at(), &DateField::Missing);
        assert_eq!(second.case_type, None);
    }

    #[test]
    fn derived_input_columns_are_shadowed() {
        let raw = table(&[ENTRY_TIMESTAMP, YEAR], &[&["2021-06-30", "1999"]]);
        let dataset = normalize(&raw).unwrap();
        assert_eq!(dataset.schema(), [ENTRY_TIMESTAMP, YEAR, MONTH, YEAR_MONTH]);
        assert_eq!(dataset.records()[0].value(YEAR).as_deref(), Some("2021"));
    }

    #[test]
    fn parses_supported_layouts() {
        let cases = [
            ("2023-01-15", (2023, 1, 15)),
            ("2023-01-15 08:30:00", (2023, 1, 15)),
            ("2023-01-15T08:30:00.250", (2023, 1, 15)),
            ("2023-01-15T08:30:00-03:00", (2023, 1, 15)),
            ("2023/01/15", (2023, 1, 15)),
            ("15/01/2023", (2023, 1, 15)),
            ("15/01/2023 17:45", (2023, 1, 15)),
        ];

        for (input, (year, month, day)) in cases {
            let parsed = parse_date(input).value().unwrap();
            assert_eq!(
                parsed.date(),
                NaiveDate::from_ymd_opt(year, month, day).unwrap(),
                "{input}"
            );
        }
    }

    #[test]
    fn rejects_impossible_dates() {
        assert!(parse_date("2023-02-30").is_malformed());
        assert!(parse_date("31/31/2023").is_malformed());
        assert_eq!(parse_date(""), DateField::Missing);
    }

    #[test]
    fn reads_csv_with_accented_headers() {
        let csv = "DATA E HORA DE ENTRADA,ESPÉCIE,STATUS\n2023-05-02 11:00:00,Portaria,Pendente\n";
        let dataset = load_dataset(csv.as_bytes()).unwrap();
        assert_eq!(dataset.len(), 1);
        assert_eq!(dataset.records()[0].document_kind.as_deref(), Some("Portaria"));
    }

    #[test]
    fn invalid_utf8_cells_do_not_abort_the_load() {
        let csv: &[u8] = b"DATA E HORA DE ENTRADA,OBS\n2023-01-15,ok\n2023-02-01,\xff\xfe\n2023-\xff,x\n";
        let dataset = load_dataset(csv).unwrap();

        assert_eq!(dataset.len(), 3);
        assert_eq!(dataset.records()[1].value("OBS").as_deref(), Some("\u{ff}\u{fe}"));
        assert_eq!(dataset.records()[1].year(), Some(2023));
        assert!(dataset.records()[2].entered_at().is_malformed());
        assert_eq!(dataset.warnings().len(), 1);
    }

    #[test]
    fn latin1_export_keeps_accented_columns() {
        let csv: &[u8] = b"DATA E HORA DE ENTRADA,ESP\xc9CIE,TIPO\n2023-01-15,Portaria,Sindic\xe2ncia\n";
        let raw = RawTable::from_bytes(csv).unwrap();
        assert_eq!(raw.headers()[1], DOCUMENT_KIND);

        let dataset = normalize(&raw).unwrap();
        let record = &dataset.records()[0];
        assert_eq!(record.document_kind.as_deref(), Some("Portaria"));
        assert_eq!(record.case_type.as_deref(), Some("Sindicância"));
    }

    #[test]
    fn malformed_secondary_date_degrades_independently() {
        let raw = table(
            &[ENTRY_TIMESTAMP, ENTRY_DATE],
            &[&["2023-07-03 14:00:00", "31/02/2023"], &["2023-08-01", "2023-08-01"]],
        );
        let dataset = normalize(&raw).unwrap();

        let first = &dataset.records()[0];
        assert!(first.entry_date().is_malformed());
        assert!(first.is_missing(ENTRY_DATE));
        assert_eq!(first.year(), Some(2023));
        assert_eq!(first.month(), Some(7));
        assert_eq!(first.year_month(), Some(YearMonth { year: 2023, month: 7 }));

        assert_eq!(
            dataset.warnings(),
            [ParseWarning {
                row: 0,
                column: ENTRY_DATE.to_string(),
                raw: "31/02/2023".to_string(),
            }]
        );
        assert_eq!(
            dataset.records()[1].value(ENTRY_DATE).as_deref(),
            Some("2023-08-01")
        );
    }

    #[test]
    fn reads_csv_from_disk() {
        use std::io::Write;

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "DATA E HORA DE ENTRADA,TIPO").unwrap();
        writeln!(file, "2022-11-20,Sindicância").unwrap();
        writeln!(file, "garbage,PAD,extra").unwrap();

        let raw = RawTable::from_path(file.path()).unwrap();
        assert_eq!(raw.rows().len(), 2);

        let dataset = normalize(&raw).unwrap();
        assert_eq!(dataset.records()[1].case_type.as_deref(), Some("PAD"));
        assert!(dataset.records()[1].entered_at().is_malformed());
    }
}
