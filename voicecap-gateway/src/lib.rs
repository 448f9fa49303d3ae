//! voicecap-gateway: the binary. Wires together the axum HTTP surface
//! (IngestAPI plus the read APIs, spec §6), the JobProcessor worker pool
//! (spec §4.L), the SummaryScheduler (spec §4.M), and the retention /
//! orphan-reconciliation sweeps (SPEC_FULL §2).

pub mod auth;
pub mod http;
pub mod processor;
pub mod retention;
pub mod scheduler;
pub mod state;
