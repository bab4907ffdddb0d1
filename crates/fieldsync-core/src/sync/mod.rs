//! Sync queue replay: transport seam, HTTP transport, connectivity and the
//! drain service.

mod connectivity;
mod http;
mod service;
mod transport;


pub use connectivity::Connectivity;
pub use http::{resource_path, HttpSyncTransport};
pub use service::{
    DrainOutcome, DrainReport, HaltReason, RejectionPolicy, SkipReason, SyncError, SyncOptions,
    SyncResult, SyncService, SyncStatus,
};
pub use transport::{SyncTransport, TransportError, TransportResult};
