//! # SlotWatch Monitor
//!
//! The reconciliation engine and poll loop:
//! - [`oracle`]: decides when the calendar is stable enough to read
//! - [`reconciler`]: keeps the booking category selected
//! - [`scanner`]: walks the month window and collects marked dates
//! - [`report`]: change detection and the notification body
//! - [`session`] / [`supervisor`]: one browser session, and restarts

pub mod delay;
pub mod model;
pub mod oracle;
pub mod picker;
pub mod reconciler;
pub mod report;
pub mod scanner;
pub mod session;
pub mod supervisor;

#[cfg(test)]
mod testing;

pub use delay::{DelayGenerator, DelayKind};
pub use model::{AvailabilitySignature, AvailableDate, MonthLabel, ScanResult};
pub use reconciler::{CategoryReconciler, ReconcileOutcome};
pub use report::{diff, format_report};
pub use scanner::MonthScanner;
pub use session::{CycleKind, CycleOutcome, Session, SessionPhase, SessionState};
pub use supervisor::Supervisor;
