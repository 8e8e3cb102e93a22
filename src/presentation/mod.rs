//! Output rendering for grouping reports.

pub mod report;

pub use report::{RenderError, render};
