// Domain models for the metrics read path

mod record;
mod sample;
mod summary;

pub use record::{FirstSeenRecord, LatestMarker, StoredRecord};
pub use sample::Sample;
pub use summary::{DashboardOverview, EntitySummary, TimelinePoint};
