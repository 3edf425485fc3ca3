//! HTTP handlers for the entity screens and the dashboard.

pub mod dashboard;
pub mod entity;
pub use dashboard::dashboard;
