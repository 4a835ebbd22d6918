//! Two-stage character resolution: search by name → fetch detail by id → classify.
//!
//! Runs as an explicit state machine:
//!
//! ```text
//! Init ─► Searching ─► Selecting ─► FetchingDetail ─► Done
//!   │         │                          │
//!   └─────────┴──────────► Failed ◄──────┘
//! ```
//!
//! A [`LookupRequest::DirectId`] goes straight from `Init` to `FetchingDetail`.
//! Faults are reported once; nothing is retried here.

use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use lodebot_lookup::{LookupClient, canonical_world};
use lodebot_shared::{Character, CharacterId, LodebotError, Result, SearchCandidate};

use crate::classify::{ClassTable, RoleBuckets};

// ---------------------------------------------------------------------------
// Request / result
// ---------------------------------------------------------------------------

/// What the caller wants resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupRequest {
    /// Search by full name within a world, then fetch the first hit.
    Search {
        world: String,
        forename: String,
        surname: String,
    },
    /// Fetch a known upstream id directly.
    DirectId(String),
}

impl std::fmt::Display for LookupRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Search {
                world,
                forename,
                surname,
            } => write!(f, "{forename} {surname} @ {world}"),
            Self::DirectId(id) => write!(f, "id {id}"),
        }
    }
}

/// A resolved and classified character.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolved {
    pub character: Character,
    pub roles: RoleBuckets,
}

// ---------------------------------------------------------------------------
// State machine
// ---------------------------------------------------------------------------

/// Pipeline states. `Done` and `Failed` are terminal.
#[derive(Debug)]
pub enum PipelineState {
    Init(LookupRequest),
    Searching {
        world: &'static str,
        forename: String,
        surname: String,
    },
    Selecting(Vec<SearchCandidate>),
    FetchingDetail(CharacterId),
    Done(Box<Resolved>),
    Failed(LodebotError),
}

impl PipelineState {
    /// Short state name for logs and progress output.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Init(_) => "init",
            Self::Searching { .. } => "searching",
            Self::Selecting(_) => "selecting",
            Self::FetchingDetail(_) => "fetching_detail",
            Self::Done(_) => "done",
            Self::Failed(_) => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done(_) | Self::Failed(_))
    }
}

/// Progress callback, called on every state entered.
pub trait ProgressReporter: Send + Sync {
    fn phase(&self, name: &str);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
}

// ---------------------------------------------------------------------------
// ResolutionPipeline
// ---------------------------------------------------------------------------

/// Owns the collaborators a resolution needs. Cheap to clone into tasks;
/// every clone shares the same client (and so the same rate limiter).
#[derive(Debug, Clone)]
pub struct ResolutionPipeline {
    client: LookupClient,
    classes: Arc<ClassTable>,
}

impl ResolutionPipeline {
    pub fn new(client: LookupClient, classes: Arc<ClassTable>) -> Self {
        Self { client, classes }
    }

    /// Resolve `request` to a terminal state.
    pub async fn run(&self, request: LookupRequest) -> Result<Resolved> {
        self.run_with_progress(request, &SilentProgress).await
    }

    /// Like [`run`](Self::run), reporting each state entered.
    #[instrument(skip_all, fields(request = %request))]
    pub async fn run_with_progress(
        &self,
        request: LookupRequest,
        progress: &dyn ProgressReporter,
    ) -> Result<Resolved> {
        let mut state = PipelineState::Init(request);
        progress.phase(state.name());

        loop {
            state = match state {
                PipelineState::Done(resolved) => {
                    info!(
                        character_id = %resolved.character.id,
                        jobs = resolved.roles.len(),
                        "character resolved"
                    );
                    return Ok(*resolved);
                }
                PipelineState::Failed(err) => {
                    warn!(error = %err, kind = ?err.kind(), "resolution failed");
                    return Err(err);
                }
                current => {
                    let from = current.name();
                    let next = self.step(current).await;
                    debug!(from, to = next.name(), "pipeline transition");
                    progress.phase(next.name());
                    next
                }
            };
        }
    }

    /// Advance one state. Terminal states are returned unchanged.
    pub async fn step(&self, state: PipelineState) -> PipelineState {
        match state {
            PipelineState::Init(request) => validate(request),

            PipelineState::Searching {
                world,
                forename,
                surname,
            } => match self.client.search_character(world, &forename, &surname).await {
                Ok(candidates) if candidates.is_empty() => PipelineState::Failed(
                    LodebotError::not_found(format!("no character named {forename} {surname} on {world}")),
                ),
                Ok(candidates) => PipelineState::Selecting(candidates),
                Err(err) => PipelineState::Failed(err),
            },

            // First hit in upstream order; no disambiguation.
            PipelineState::Selecting(candidates) => match candidates.into_iter().next() {
                Some(first) => {
                    debug!(id = %first.id, name = %first.display_name, "selected candidate");
                    PipelineState::FetchingDetail(first.id)
                }
                None => PipelineState::Failed(LodebotError::not_found("no candidates")),
            },

            PipelineState::FetchingDetail(id) => {
                let character = match self.client.fetch_character_by_id(&id).await {
                    Ok(character) => character,
                    Err(err) => return PipelineState::Failed(err),
                };
                match self.classes.classify(&character.jobs) {
                    Ok(roles) => PipelineState::Done(Box::new(Resolved { character, roles })),
                    Err(err) => PipelineState::Failed(err),
                }
            }

            terminal @ (PipelineState::Done(_) | PipelineState::Failed(_)) => terminal,
        }
    }
}

/// `Init` transition: reject bad arguments before any network call.
fn validate(request: LookupRequest) -> PipelineState {
    match request {
        LookupRequest::Search {
            world,
            forename,
            surname,
        } => {
            let (forename, surname) = (forename.trim(), surname.trim());
            if forename.is_empty() || surname.is_empty() {
                return PipelineState::Failed(LodebotError::invalid_argument(
                    "forename and surname must not be empty",
                ));
            }
            match canonical_world(&world) {
                Some(world) => PipelineState::Searching {
                    world,
                    forename: forename.to_string(),
                    surname: surname.to_string(),
                },
                None => PipelineState::Failed(LodebotError::InvalidWorld { world }),
            }
        }
        LookupRequest::DirectId(raw) => match raw.parse::<CharacterId>() {
            Ok(id) => PipelineState::FetchingDetail(id),
            Err(err) => PipelineState::Failed(err),
        },
    }
}
