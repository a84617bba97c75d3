//! Record types for every cached resource.
//!
//! Each resource has a wire form (the JSON the server sends, all optional
//! fields defaulted so a voided tombstone with nothing but a UUID still
//! parses) and a cache form where the two differ. Equality on cache forms
//! covers exactly the persisted field projection, which is what the
//! diff-merge engine compares.

mod chart;
mod concept;
mod form;
mod location;
mod observation;
mod order;
mod patient;
mod user;

pub use chart::{ChartItem, WireChart, WireChartGroup};
pub use concept::Concept;
pub use form::Form;
pub use location::Location;
pub use observation::{Observation, WireObservation};
pub use order::Order;
pub use patient::Patient;
pub use user::User;
