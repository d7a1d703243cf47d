pub mod checks;
pub mod cli;
pub mod collector;
pub mod config;
pub mod core;
pub mod engine;
pub mod exit;
pub mod jobs;
pub mod loader;
pub mod logs;
pub mod registry;
pub mod ui;
