//! Character resolution and chat command handling for lodebot.
//!
//! This crate ties the lookup client, class table, and formatting together
//! into the flows the bot runs:
//! - [`pipeline`] — two-stage resolution state machine
//! - [`classify`] — class id → role bucket table
//! - [`summary`] — presentation record for the renderer
//! - [`router`] — chat text → command → reply
//! - [`schedule`] — weekly announcements injected as commands

pub mod classify;
pub mod pipeline;
pub mod router;
pub mod schedule;
pub mod summary;

pub use classify::{ClassTable, ClassifiedJob, KNOWN_UPSTREAM_CLASS_IDS, RoleBuckets};
pub use pipeline::{LookupRequest, ProgressReporter, ResolutionPipeline, Resolved, SilentProgress};
pub use router::{Command, CommandRouter, IncomingMessage, Reply};
pub use schedule::{AnnouncementScheduler, WeeklyTrigger};
pub use summary::{Summary, SummaryField, format_summary};
