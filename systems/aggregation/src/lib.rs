#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Multi-match aggregation with generation-token cancellation.
//!
//! The aggregator never performs I/O itself. A job is started with
//! [`Aggregator::begin`], after which the host either drives it synchronously
//! through [`Aggregator::poll`] with a [`MatchSource`], or hands out
//! [`FetchTicket`]s from [`Aggregator::next_fetch`] and reports each result
//! through [`Aggregator::complete_fetch`] once its asynchronous fetch resolves.
//! Overlay and pooled jobs run in separate slots. Every job carries the
//! [`Generation`] it was started under; starting another job of the same kind
//! or cancelling it retires that generation, so late results of the superseded
//! job are discarded and [`Aggregator::commit`] refuses to publish them.

mod overlay;

use std::fmt;

use match_atlas_core::{
    selection::MatchFilter, Day, MapId, MatchId, MatchSummary, TelemetryEvent,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

pub use overlay::{overlay_color, HslColor, OverlayDataset, OverlayPath, OverlaySummary};

use overlay::OverlayBuilder;

/// Number of matches processed between cooperative yields.
pub const YIELD_INTERVAL: usize = 20;

/// Failure to obtain the telemetry of one match.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum SourceError {
    /// The telemetry could not be read.
    #[error("telemetry for match {match_id} is unavailable: {reason}")]
    Unavailable {
        /// Match whose telemetry was requested.
        match_id: MatchId,
        /// Human-readable cause.
        reason: String,
    },
    /// The telemetry was read but could not be decoded.
    #[error("telemetry for match {match_id} is malformed: {reason}")]
    Malformed {
        /// Match whose telemetry was requested.
        match_id: MatchId,
        /// Human-readable cause.
        reason: String,
    },
}

/// Provider of per-match telemetry.
pub trait MatchSource {
    /// Fetches the ordered event stream of a match.
    fn fetch(&mut self, summary: &MatchSummary) -> Result<Vec<TelemetryEvent>, SourceError>;
}

/// Monotonically increasing aggregation generation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Generation(u64);

impl Generation {
    /// Raw counter value.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }

    const fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Matches an aggregation draws from.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct AggregationScope {
    /// Map every aggregated match was played on.
    pub map: MapId,
    /// Optional day restriction.
    pub day: Option<Day>,
}

impl AggregationScope {
    /// Scope covering every match on `map`.
    #[must_use]
    pub fn map(map: MapId) -> Self {
        Self { map, day: None }
    }

    /// Match filter equivalent to the scope.
    #[must_use]
    pub fn filter(&self) -> MatchFilter {
        MatchFilter::for_map(self.map.clone(), self.day.clone())
    }
}

/// Shape of the dataset an aggregation produces.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AggregationKind {
    /// Per-entity paths concatenated across matches.
    Overlay,
    /// One flat event list for aggregate heatmaps.
    Pooled,
}

impl AggregationKind {
    /// Every kind, in fetch priority order.
    pub const ALL: [Self; 2] = [Self::Overlay, Self::Pooled];
}

/// Raw events pooled from every qualifying match, duplicates included.
#[derive(Clone, Debug, PartialEq)]
pub struct PooledEvents {
    scope: AggregationScope,
    matches: usize,
    events: Vec<TelemetryEvent>,
}

impl PooledEvents {
    /// Scope the events were pooled from.
    #[must_use]
    pub const fn scope(&self) -> &AggregationScope {
        &self.scope
    }

    /// Map the events were pooled for.
    #[must_use]
    pub const fn map(&self) -> &MapId {
        &self.scope.map
    }

    /// Number of matches that contributed data.
    #[must_use]
    pub const fn matches(&self) -> usize {
        self.matches
    }

    /// Pooled events in load order.
    #[must_use]
    pub fn events(&self) -> &[TelemetryEvent] {
        &self.events
    }
}

/// Completion of a running aggregation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    /// Matches whose fetch has resolved, successfully or not.
    pub completed: usize,
    /// Matches in scope.
    pub total: usize,
}

impl Progress {
    /// Rounded completion percentage; an empty job is complete.
    #[must_use]
    pub fn percent(&self) -> u8 {
        if self.total == 0 {
            return 100;
        }
        let ratio = self.completed.min(self.total) as f64 / self.total as f64;
        (ratio * 100.0).round() as u8
    }

    /// Returns `true` once every match has resolved.
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        self.completed >= self.total
    }
}

/// Permission to fetch one match on behalf of a specific generation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FetchTicket {
    generation: Generation,
    kind: AggregationKind,
    position: usize,
    summary: MatchSummary,
}

impl FetchTicket {
    /// Generation the fetch belongs to.
    #[must_use]
    pub const fn generation(&self) -> Generation {
        self.generation
    }

    /// Kind of the job that issued the fetch.
    #[must_use]
    pub const fn kind(&self) -> AggregationKind {
        self.kind
    }

    /// Match to fetch.
    #[must_use]
    pub const fn summary(&self) -> &MatchSummary {
        &self.summary
    }

    /// Position of the match inside its job.
    #[must_use]
    pub const fn position(&self) -> usize {
        self.position
    }
}

/// State reported by [`Aggregator::poll`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JobStatus {
    /// No job of the polled kind is running.
    Idle,
    /// The job has more matches to load; the host should yield before polling again.
    Loading {
        /// Generation of the running job.
        generation: Generation,
        /// Current completion.
        progress: Progress,
    },
    /// Every match has resolved and the job awaits [`Aggregator::commit`].
    Ready {
        /// Generation of the finished job.
        generation: Generation,
        /// Final completion.
        progress: Progress,
    },
}

/// Result of attempting to publish a finished job.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CommitOutcome {
    /// The dataset of the given kind replaced the previous one.
    Committed(AggregationKind),
    /// The generation was superseded or cancelled; nothing was published.
    Stale,
    /// The job still has unresolved matches.
    Incomplete,
}

#[derive(Debug)]
enum Accumulator {
    Overlay(OverlayBuilder),
    Pooled(Vec<TelemetryEvent>, usize),
}

#[derive(Debug)]
struct Job {
    generation: Generation,
    kind: AggregationKind,
    scope: AggregationScope,
    queue: Vec<MatchSummary>,
    issued: usize,
    completed: usize,
    accumulator: Accumulator,
}

impl Job {
    fn progress(&self) -> Progress {
        Progress {
            completed: self.completed,
            total: self.queue.len(),
        }
    }

    fn status(&self) -> JobStatus {
        let progress = self.progress();
        if progress.is_complete() {
            JobStatus::Ready {
                generation: self.generation,
                progress,
            }
        } else {
            JobStatus::Loading {
                generation: self.generation,
                progress,
            }
        }
    }
}

/// Owner of the aggregation generation, the running jobs and the committed
/// datasets.
///
/// Overlay and pooled jobs occupy separate slots, so starting or cancelling
/// one kind never disturbs the other. Generations are drawn from one counter
/// and are therefore unique across both slots.
#[derive(Debug, Default)]
pub struct Aggregator {
    generation: Generation,
    overlay_job: Option<Job>,
    pooled_job: Option<Job>,
    overlay: Option<OverlayDataset>,
    pooled: Option<PooledEvents>,
}

impl Aggregator {
    /// Creates an aggregator with no job and no datasets.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Most recently issued generation.
    #[must_use]
    pub const fn generation(&self) -> Generation {
        self.generation
    }

    const fn slot(&self, kind: AggregationKind) -> &Option<Job> {
        match kind {
            AggregationKind::Overlay => &self.overlay_job,
            AggregationKind::Pooled => &self.pooled_job,
        }
    }

    fn slot_mut(&mut self, kind: AggregationKind) -> &mut Option<Job> {
        match kind {
            AggregationKind::Overlay => &mut self.overlay_job,
            AggregationKind::Pooled => &mut self.pooled_job,
        }
    }

    /// Scope of the running job of `kind`.
    #[must_use]
    pub fn running(&self, kind: AggregationKind) -> Option<&AggregationScope> {
        self.slot(kind).as_ref().map(|job| &job.scope)
    }

    /// Completion of the running job of `kind`.
    #[must_use]
    pub fn progress(&self, kind: AggregationKind) -> Option<Progress> {
        self.slot(kind).as_ref().map(Job::progress)
    }

    /// Starts a job over every match of `index` inside `scope`.
    ///
    /// A running job of the same kind is superseded; a job of the other kind
    /// keeps loading. Committed datasets are left untouched.
    pub fn begin(
        &mut self,
        kind: AggregationKind,
        scope: AggregationScope,
        index: &[MatchSummary],
    ) -> Generation {
        let _ = self.cancel(kind);
        self.generation = self.generation.next();

        let filter = scope.filter();
        let queue: Vec<MatchSummary> = index
            .iter()
            .filter(|summary| filter.accepts(summary))
            .cloned()
            .collect();
        info!(
            generation = %self.generation,
            ?kind,
            map = %scope.map,
            matches = queue.len(),
            "aggregation started"
        );

        let accumulator = match kind {
            AggregationKind::Overlay => Accumulator::Overlay(OverlayBuilder::new(scope.map.clone())),
            AggregationKind::Pooled => Accumulator::Pooled(Vec::new(), 0),
        };
        *self.slot_mut(kind) = Some(Job {
            generation: self.generation,
            kind,
            scope,
            queue,
            issued: 0,
            completed: 0,
            accumulator,
        });
        self.generation
    }

    /// Abandons the running job of `kind` and returns its generation.
    pub fn cancel(&mut self, kind: AggregationKind) -> Option<Generation> {
        let job = self.slot_mut(kind).take()?;
        info!(
            cancelled = %job.generation,
            ?kind,
            completed = job.completed,
            total = job.queue.len(),
            "aggregation cancelled"
        );
        Some(job.generation)
    }

    /// Issues the next unissued fetch of any running job, overlay first.
    pub fn next_fetch(&mut self) -> Option<FetchTicket> {
        self.issue(AggregationKind::Overlay)
            .or_else(|| self.issue(AggregationKind::Pooled))
    }

    fn issue(&mut self, kind: AggregationKind) -> Option<FetchTicket> {
        let job = self.slot_mut(kind).as_mut()?;
        let summary = job.queue.get(job.issued)?.clone();
        let ticket = FetchTicket {
            generation: job.generation,
            kind,
            position: job.issued,
            summary,
        };
        job.issued += 1;
        Some(ticket)
    }

    /// Merges the outcome of a fetch into its job.
    ///
    /// Returns `false` when the ticket belongs to a superseded generation, in
    /// which case the events are dropped. Failed fetches are logged and counted
    /// as resolved so the job can still finish.
    pub fn complete_fetch(
        &mut self,
        ticket: FetchTicket,
        result: Result<Vec<TelemetryEvent>, SourceError>,
    ) -> bool {
        let Some(job) = self
            .slot_mut(ticket.kind)
            .as_mut()
            .filter(|job| job.generation == ticket.generation)
        else {
            debug!(
                ticket = %ticket.generation,
                kind = ?ticket.kind,
                match_id = %ticket.summary.file_id,
                "discarding stale fetch result"
            );
            return false;
        };

        match result {
            Ok(events) => {
                debug!(
                    match_id = %ticket.summary.file_id,
                    events = events.len(),
                    "match aggregated"
                );
                match &mut job.accumulator {
                    Accumulator::Overlay(builder) => builder.merge(&events),
                    Accumulator::Pooled(pool, matches) => {
                        pool.extend(events);
                        *matches += 1;
                    }
                }
            }
            Err(error) => {
                warn!(%error, "skipping match");
            }
        }
        job.completed += 1;
        true
    }

    /// Loads up to [`YIELD_INTERVAL`] matches of the running job of `kind`
    /// from `source`.
    pub fn poll<S>(&mut self, kind: AggregationKind, source: &mut S) -> JobStatus
    where
        S: MatchSource + ?Sized,
    {
        for _ in 0..YIELD_INTERVAL {
            let Some(ticket) = self.issue(kind) else {
                break;
            };
            let result = source.fetch(ticket.summary());
            let _ = self.complete_fetch(ticket, result);
        }
        self.status(kind)
    }

    /// Reports the state of the running job of `kind` without loading anything.
    #[must_use]
    pub fn status(&self, kind: AggregationKind) -> JobStatus {
        self.slot(kind).as_ref().map_or(JobStatus::Idle, Job::status)
    }

    /// Publishes the dataset of a finished job started under `generation`.
    pub fn commit(&mut self, generation: Generation) -> CommitOutcome {
        let Some(kind) = AggregationKind::ALL.into_iter().find(|kind| {
            self.slot(*kind)
                .as_ref()
                .is_some_and(|job| job.generation == generation)
        }) else {
            debug!(%generation, latest = %self.generation, "refusing stale commit");
            return CommitOutcome::Stale;
        };
        let Some(job) = self.slot_mut(kind).take() else {
            return CommitOutcome::Stale;
        };
        if !job.progress().is_complete() {
            *self.slot_mut(kind) = Some(job);
            return CommitOutcome::Incomplete;
        }

        match job.accumulator {
            Accumulator::Overlay(builder) => {
                let dataset = builder.finish();
                let summary = dataset.summary();
                info!(
                    %generation,
                    map = %dataset.map(),
                    humans = summary.humans,
                    bots = summary.bots,
                    "overlay committed"
                );
                self.overlay = Some(dataset);
            }
            Accumulator::Pooled(events, matches) => {
                info!(
                    %generation,
                    map = %job.scope.map,
                    events = events.len(),
                    matches,
                    "pooled events committed"
                );
                self.pooled = Some(PooledEvents {
                    scope: job.scope,
                    matches,
                    events,
                });
            }
        }
        CommitOutcome::Committed(job.kind)
    }

    /// Committed overlay, if any.
    #[must_use]
    pub fn overlay(&self) -> Option<&OverlayDataset> {
        self.overlay.as_ref()
    }

    /// Committed pooled events, if any.
    #[must_use]
    pub fn pooled(&self) -> Option<&PooledEvents> {
        self.pooled.as_ref()
    }

    /// Drops the committed overlay and cancels a running overlay job,
    /// returning the cancelled generation.
    pub fn clear_overlay(&mut self) -> Option<Generation> {
        self.overlay = None;
        self.cancel(AggregationKind::Overlay)
    }

    /// Drops the committed pooled events and cancels a running pooled job,
    /// returning the cancelled generation.
    pub fn invalidate_pooled(&mut self) -> Option<Generation> {
        self.pooled = None;
        self.cancel(AggregationKind::Pooled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn progress_rounds_and_treats_empty_as_done() {
        assert_eq!(
            Progress {
                completed: 0,
                total: 0
            }
            .percent(),
            100
        );
        assert_eq!(
            Progress {
                completed: 1,
                total: 3
            }
            .percent(),
            33
        );
        assert_eq!(
            Progress {
                completed: 2,
                total: 3
            }
            .percent(),
            67
        );
    }

    #[test]
    fn cancel_without_job_keeps_generation() {
        let mut aggregator = Aggregator::new();

        assert_eq!(aggregator.cancel(AggregationKind::Overlay), None);
        assert_eq!(aggregator.generation(), Generation::default());
    }

    #[test]
    fn empty_scope_is_immediately_ready() {
        let mut aggregator = Aggregator::new();
        let generation = aggregator.begin(
            AggregationKind::Pooled,
            AggregationScope::map(MapId::new("GrandRift")),
            &[],
        );

        assert!(matches!(
            aggregator.status(AggregationKind::Pooled),
            JobStatus::Ready { .. }
        ));
        assert_eq!(
            aggregator.commit(generation),
            CommitOutcome::Committed(AggregationKind::Pooled)
        );
        assert_eq!(aggregator.pooled().map(PooledEvents::matches), Some(0));
        assert_eq!(aggregator.status(AggregationKind::Pooled), JobStatus::Idle);
    }
}
