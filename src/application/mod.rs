//! Application services layer.

pub mod error;
pub mod graph;
pub mod grouping;
