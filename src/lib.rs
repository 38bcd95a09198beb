pub mod bootstrap;
pub mod config;
pub mod context;
pub mod engine;
pub mod error;
pub mod process;
pub mod project;
pub mod report;
pub mod stack_ref;
