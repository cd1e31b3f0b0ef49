pub mod checklist;
pub mod cli;
pub mod config;
pub mod exit;
pub mod maintenance;
pub mod platform;
pub mod report;
pub mod schema;
pub mod select;
pub mod snapshot;
pub mod ui;
pub mod vlog;
