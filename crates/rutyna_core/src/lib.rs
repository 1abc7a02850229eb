pub mod checklist;
pub mod error;
pub mod ids;
pub mod occupancy;
pub mod service;
pub mod state;
pub mod store;
pub mod stream;
pub mod template;
pub mod weekday;

pub use crate::service::{PlannerService, PlannerServiceBuilder, PlannerSnapshot};
