//! `rollcall` - offline-first attendance scanning
//!
//! A volunteer scans a participant's code; [`Submitter`] records the scan
//! with the remote ledger, or keeps it in the [`OfflineStore`] when that is
//! not possible. [`SyncScheduler`] drains the queue in the background once
//! connectivity returns.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod cli;
pub mod config;
pub mod connectivity;
pub mod error;
pub mod extract;
pub mod gateway;
pub mod logging;
pub mod queue;
pub mod scan;
pub mod storage;
pub mod submit;
pub mod sync;

#[cfg(test)]
mod testing;

pub use config::Config;
pub use connectivity::{Connectivity, ReachabilityProbe};
pub use error::{Error, Result};
pub use extract::extract_id;
pub use gateway::{GatewayError, HttpGateway, SubmissionGateway};
pub use logging::init_logging;
pub use queue::OfflineQueue;
pub use scan::{AttendanceResponse, OfflineScan, SubmissionOutcome};
pub use storage::{OfflineStore, ScanStore};
pub use submit::Submitter;
pub use sync::{DrainReport, DrainStatus, SchedulerHandle, SyncScheduler};
