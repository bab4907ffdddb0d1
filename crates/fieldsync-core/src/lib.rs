//! fieldsync-core - Core library for fieldsync
//!
//! This crate contains the models, local store, scan resolution, observation
//! form and sync queue used by fieldsync front ends. Observations are written
//! to a durable local queue before any network call and replayed to a BrAPI
//! server in submission order once the device is online.

pub mod config;
pub mod db;
pub mod error;
pub mod import;
pub mod models;
pub mod observation;
pub mod scanner;
pub mod services;
pub mod store;
pub mod sync;

pub use error::{Error, Result};
pub use models::{ActionId, PendingSyncAction, Plot, Trait};
pub use services::FieldStore;
pub use store::{LocalStore, QueueWriter};
