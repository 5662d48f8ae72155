//! Data models for the EvalTrack application.
//!
//! These models match the frontend TypeScript interfaces exactly for seamless interoperability.

mod datastore;
mod evaluation;
mod staff;
mod theme;

pub use datastore::*;
pub use evaluation::*;
pub use staff::*;
pub use theme::*;
