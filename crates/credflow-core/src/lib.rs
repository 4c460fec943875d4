//! Core workflow types and execution engine (crypto and transport independent).
pub mod config;
pub mod dispatcher;
pub mod flow;
pub mod outcome;
pub mod parameter;
pub mod store;

/// Environment variable naming the Credflow config file.
pub const CREDFLOW_CONFIG: &str = "CREDFLOW_CONFIG";
