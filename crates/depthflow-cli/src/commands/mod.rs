//! CLI command implementations.

pub mod example;
pub mod nodes;
pub mod run;
pub mod validate;
