//! Domain models for sources, venues, and activities.

pub mod activity;
pub mod source;
pub mod venue;

pub use activity::{
    Activity, ActivityStatus, ExtractionMethod, FreeVerificationStatus,
};
pub use source::Source;
pub use venue::Venue;
