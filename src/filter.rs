use std::collections::{BTreeSet, HashSet};

use serde::Serialize;

use crate::models::{Dataset, DatasetView, Record, CASE_TYPE, DOCUMENT_KIND, SUBJECT};

/// Categorical attributes a filter panel can restrict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dimension {
    CaseType,
    DocumentKind,
    Subject,
}

impl Dimension {
    pub const ALL: [Dimension; 3] = [
        Dimension::CaseType,
        Dimension::DocumentKind,
        Dimension::Subject,
    ];

    pub fn column(self) -> &'static str {
        match self {
            Dimension::CaseType => CASE_TYPE,
            Dimension::DocumentKind => DOCUMENT_KIND,
            Dimension::Subject => SUBJECT,
        }
    }

    fn value(self, record: &Record) -> Option<&str> {
        match self {
            Dimension::CaseType => record.case_type.as_deref(),
            Dimension::DocumentKind => record.document_kind.as_deref(),
            Dimension::Subject => record.subject.as_deref(),
        }
    }
}

/// Accepted values for one dimension.
///
/// An empty selection is normalized to "any value", so a panel where every
/// option was deselected shows everything rather than nothing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Inclusion(Option<BTreeSet<String>>);

impl Inclusion {
    pub fn any() -> Self {
        Self(None)
    }

    pub fn only<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let values: BTreeSet<String> = values.into_iter().map(Into::into).collect();
        if values.is_empty() {
            Self(None)
        } else {
            Self(Some(values))
        }
    }

    pub fn values(&self) -> Option<&BTreeSet<String>> {
        self.0.as_ref()
    }

    pub fn is_restricted(&self) -> bool {
        self.0.is_some()
    }

    /// A missing value never satisfies a restriction.
    pub fn matches(&self, value: Option<&str>) -> bool {
        match &self.0 {
            None => true,
            Some(values) => value.is_some_and(|value| values.contains(value)),
        }
    }
}

/// Active filter predicates, combined with AND.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FilterSpec {
    year: Option<i32>,
    case_type: Inclusion,
    document_kind: Inclusion,
    subject: Inclusion,
}

impl FilterSpec {
    pub fn builder() -> FilterSpecBuilder {
        FilterSpecBuilder::default()
    }

    pub fn year(&self) -> Option<i32> {
        self.year
    }

    pub fn inclusion(&self, dimension: Dimension) -> &Inclusion {
        match dimension {
            Dimension::CaseType => &self.case_type,
            Dimension::DocumentKind => &self.document_kind,
            Dimension::Subject => &self.subject,
        }
    }

    pub fn is_unrestricted(&self) -> bool {
        self.year.is_none()
            && Dimension::ALL
                .iter()
                .all(|&dimension| !self.inclusion(dimension).is_restricted())
    }

    pub fn matches(&self, record: &Record) -> bool {
        if let Some(year) = self.year {
            if record.year() != Some(year) {
                return false;
            }
        }

        Dimension::ALL
            .iter()
            .all(|&dimension| self.inclusion(dimension).matches(dimension.value(record)))
    }
}

#[derive(Debug, Clone, Default)]
pub struct FilterSpecBuilder {
    spec: FilterSpec,
}

impl FilterSpecBuilder {
    pub fn year(mut self, year: i32) -> Self {
        self.spec.year = Some(year);
        self
    }

    pub fn any_year(mut self) -> Self {
        self.spec.year = None;
        self
    }

    pub fn inclusion(mut self, dimension: Dimension, inclusion: Inclusion) -> Self {
        match dimension {
            Dimension::CaseType => self.spec.case_type = inclusion,
            Dimension::DocumentKind => self.spec.document_kind = inclusion,
            Dimension::Subject => self.spec.subject = inclusion,
        }
        self
    }

    pub fn case_types<I, S>(self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.inclusion(Dimension::CaseType, Inclusion::only(values))
    }

    pub fn document_kinds<I, S>(self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.inclusion(Dimension::DocumentKind, Inclusion::only(values))
    }

    pub fn subjects<I, S>(self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.inclusion(Dimension::Subject, Inclusion::only(values))
    }

    pub fn build(self) -> FilterSpec {
        self.spec
    }
}

/// Records of `dataset` that satisfy `spec`, in their original order.
pub fn apply<'a>(dataset: &'a Dataset, spec: &FilterSpec) -> DatasetView<'a> {
    let rows = dataset
        .records()
        .iter()
        .enumerate()
        .filter(|(_, record)| spec.matches(record))
        .map(|(row, _)| row)
        .collect();
    DatasetView::new(dataset, rows)
}

impl<'a> DatasetView<'a> {
    /// Narrows an existing view further.
    pub fn refine(&self, spec: &FilterSpec) -> DatasetView<'a> {
        let records = self.dataset().records();
        let rows = self
            .row_indices()
            .iter()
            .copied()
            .filter(|&row| spec.matches(&records[row]))
            .collect();
        DatasetView::new(self.dataset(), rows)
    }
}

/// Choices a filter panel can offer for a dataset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FilterOptions {
    /// Ascending.
    pub years: Vec<i32>,
    /// First-seen order.
    pub case_types: Vec<String>,
    pub document_kinds: Vec<String>,
    pub subjects: Vec<String>,
}

impl FilterOptions {
    pub fn from_dataset(dataset: &Dataset) -> Self {
        let years: BTreeSet<i32> = dataset.records().iter().filter_map(Record::year).collect();

        Self {
            years: years.into_iter().collect(),
            case_types: distinct(dataset, Dimension::CaseType),
            document_kinds: distinct(dataset, Dimension::DocumentKind),
            subjects: distinct(dataset, Dimension::Subject),
        }
    }

    pub fn values(&self, dimension: Dimension) -> &[String] {
        match dimension {
            Dimension::CaseType => &self.case_types,
            Dimension::DocumentKind => &self.document_kinds,
            Dimension::Subject => &self.subjects,
        }
    }
}

fn distinct(dataset: &Dataset, dimension: Dimension) -> Vec<String> {
    let mut seen = HashSet::new();
    dataset
        .records()
        .iter()
        .filter_map(|record| dimension.value(record))
        .filter(|value| seen.insert(*value))
        .map(str::to_string)
        .collect()
}
