//! Default action handlers and the workflow engine facade.
pub mod engine;
pub mod handlers;
