pub mod common;
pub mod completions;
pub mod config;
pub mod dead_letter;
pub mod import;
pub mod observe;
pub mod pending;
pub mod plots;
pub mod scan;
pub mod settings;
pub mod status;
pub mod sync;
