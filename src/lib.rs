//! Interest group discovery over a social graph: a cached REST client, a
//! concurrent candidate expansion and greedy bucket consolidation.

pub mod application;
pub mod cache;
pub mod config;
pub mod domain;
pub mod infra;
pub mod presentation;
