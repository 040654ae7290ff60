//! CLI command implementations.

pub mod languages;
pub mod route;
pub mod serve;
pub mod translate;
