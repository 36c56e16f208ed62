//! Filtering and aggregation engine for administrative disciplinary case
//! records.
//!
//! Raw CSV rows are normalized once into a [`Dataset`]; every filter change is
//! then a pure function of the dataset and a [`FilterSpec`], producing summary
//! metrics, grouped counts, time series and a missing-value report.

pub mod aggregate;
pub mod cache;
pub mod error;
pub mod filter;
pub mod logging;
pub mod models;
pub mod normalize;
pub mod quality;
pub mod query;
pub mod report;

pub use cache::{ContentHash, DatasetCache};
pub use error::{LoadError, SchemaError};
pub use filter::{apply, Dimension, FilterOptions, FilterSpec, Inclusion};
pub use models::{Dataset, DatasetView, Granularity, Record};
pub use normalize::{load_dataset, normalize, RawTable};
pub use query::{filter_and_summarize, filter_and_summarize_with, QueryConfig, QueryResult};
