//! The normalization core: raw gateway payloads in, Bitable-shaped records out.
//!
//! Everything in this module is pure and synchronous. Each [`FieldMapper::build`]
//! call is independent, so callers may fan transformations out across tasks
//! without any coordination.

pub mod deletion;
pub mod mapper;
pub mod product;
pub mod record;
pub mod statistics;
pub mod units;

pub use deletion::{DeletionDetector, UNAVAILABLE_TITLE};
pub use mapper::{FieldMapper, MalformedRecord};
pub use product::{Product, ProductExtractor};
pub use record::{
    CanonicalRecord, Link, RawVideoRecord, SecondaryStatistics, columns,
};
pub use statistics::{MergePolicy, Statistics, StatisticsReconciler};

use chrono::{DateTime, Utc};

/// One-shot entry point: transform a single raw record with the default
/// component wiring. Equivalent to `FieldMapper::new().build(...)`.
pub fn transform(
    raw: &RawVideoRecord,
    secondary: Option<&SecondaryStatistics>,
    collected_at: DateTime<Utc>,
    inaccessible: bool,
) -> Result<CanonicalRecord, MalformedRecord> {
    FieldMapper::new().build(raw, secondary, collected_at, inaccessible)
}
