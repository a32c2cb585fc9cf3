//! Alert triage and recommendation engine.
//!
//! Upstream monitors (ad spend, analytics, search, local search, reviews)
//! each write terse findings into per-agent reports. This crate:
//!
//! - resolves the latest report per agent from a remote store, local report
//!   files or bundled sample data, in that order
//! - enriches raw findings with a diagnosis, evidence and suggested fixes
//! - ranks enriched alerts for presentation
//! - records human approvals in a local ledger mirrored to the remote store
//! - shows each agent's scheduler job state and public profile
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use notify::Notifier;
//! use triage::{Triage, TriageConfig};
//!
//! # async fn run() -> triage::Result<()> {
//! let config = TriageConfig::from_env()?;
//! let triage = Triage::from_config(config, Arc::new(Notifier::disabled())).await?;
//!
//! for alert in triage.detailed_alerts().await {
//!     println!("{} {} {}", alert.level, alert.alert_id, alert.title);
//! }
//! # Ok(())
//! # }
//! ```

pub mod agents;
pub mod config;
pub mod context;
pub mod cron;
pub mod enrich;
pub mod error;
pub mod leads;
pub mod ledger;
pub mod local;
pub mod metrics;
pub mod model;
pub mod ranking;
pub mod report;
pub mod resolver;
pub mod sample;
pub mod server;
pub mod status;
pub mod store;

pub use agents::{AgentCatalog, AgentDescriptor, AgentProfile, Domain};
pub use config::{ReadPolicy, TriageConfig};
pub use context::Triage;
pub use enrich::{alert_id, enrich};
pub use error::{Result, TriageError};
pub use ledger::{ApprovalLedger, ApprovalList};
pub use model::{
    Approval, ApprovalInput, CanonicalReport, EnrichedAlert, FixSuggestion, ImpactType, Level,
    RawAlert, ResolvedReport, Source,
};
pub use ranking::rank;
pub use resolver::SourceResolver;
pub use store::{RemoteStore, RestStore, RowQuery, StoreError};
