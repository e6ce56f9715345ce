use std::collections::HashMap;

use match_atlas_core::{
    Day, EntityId, EventTag, MapId, MatchId, MatchSummary, TelemetryEvent,
};
use match_atlas_system_aggregation::{
    overlay_color, AggregationKind, AggregationScope, Aggregator, CommitOutcome, JobStatus,
    MatchSource, PooledEvents, SourceError, YIELD_INTERVAL,
};

#[derive(Default)]
struct MemorySource {
    matches: HashMap<MatchId, Vec<TelemetryEvent>>,
    fetched: Vec<MatchId>,
}

impl MemorySource {
    fn with_match(mut self, id: &str, events: Vec<TelemetryEvent>) -> Self {
        let _ = self.matches.insert(MatchId::new(id), events);
        self
    }
}

impl MatchSource for MemorySource {
    fn fetch(&mut self, summary: &MatchSummary) -> Result<Vec<TelemetryEvent>, SourceError> {
        self.fetched.push(summary.file_id.clone());
        self.matches
            .get(&summary.file_id)
            .cloned()
            .ok_or_else(|| SourceError::Unavailable {
                match_id: summary.file_id.clone(),
                reason: "not recorded".to_owned(),
            })
    }
}

fn summary(id: &str, map: &str, day: &str) -> MatchSummary {
    MatchSummary {
        file_id: MatchId::new(id),
        map_id: MapId::new(map),
        day: Day::new(day),
        humans: 1,
        bots: 1,
        combat_events: 0,
    }
}

fn walk(uid: &str, is_bot: bool, x: f64) -> Vec<TelemetryEvent> {
    let tag = if is_bot {
        EventTag::BotPosition
    } else {
        EventTag::Position
    };
    vec![
        TelemetryEvent::new(0.0, EntityId::new(uid), is_bot, tag, x, 0.0),
        TelemetryEvent::new(1.0, EntityId::new(uid), is_bot, tag, x + 1.0, 0.0),
        TelemetryEvent::new(2.0, EntityId::new(uid), is_bot, EventTag::Loot, x + 1.0, 0.0),
    ]
}

fn index() -> Vec<MatchSummary> {
    vec![
        summary("a1", "AmbroseValley", "February_10"),
        summary("b1", "Lockdown", "February_10"),
        summary("a2", "AmbroseValley", "February_11"),
        summary("b2", "Lockdown", "February_11"),
    ]
}

fn source() -> MemorySource {
    MemorySource::default()
        .with_match("a1", walk("ambrose-human", false, 0.0))
        .with_match("a2", walk("ambrose-bot", true, 10.0))
        .with_match("b1", walk("lockdown-human", false, 20.0))
        .with_match("b2", walk("lockdown-human", false, 30.0))
}

fn drive(
    aggregator: &mut Aggregator,
    kind: AggregationKind,
    source: &mut MemorySource,
) -> JobStatus {
    loop {
        match aggregator.poll(kind, source) {
            JobStatus::Loading { .. } => continue,
            status => return status,
        }
    }
}

#[test]
fn switching_maps_mid_load_commits_only_the_newer_map() {
    let mut aggregator = Aggregator::new();
    let mut source = source();
    let index = index();

    let first = aggregator.begin(
        AggregationKind::Overlay,
        AggregationScope::map(MapId::new("AmbroseValley")),
        &index,
    );
    let in_flight = aggregator.next_fetch().expect("map A has matches");

    let second = aggregator.begin(
        AggregationKind::Overlay,
        AggregationScope::map(MapId::new("Lockdown")),
        &index,
    );
    let late = source.fetch(in_flight.summary());
    assert!(!aggregator.complete_fetch(in_flight, late));

    assert!(matches!(
        drive(&mut aggregator, AggregationKind::Overlay, &mut source),
        JobStatus::Ready { generation, .. } if generation == second
    ));
    assert_eq!(aggregator.commit(first), CommitOutcome::Stale);
    assert_eq!(
        aggregator.commit(second),
        CommitOutcome::Committed(AggregationKind::Overlay)
    );

    let overlay = aggregator.overlay().expect("overlay committed");
    assert_eq!(overlay.map(), &MapId::new("Lockdown"));
    assert_eq!(overlay.paths().len(), 1);
    assert_eq!(overlay.paths()[0].uid, EntityId::new("lockdown-human"));
    assert_eq!(overlay.paths()[0].points.len(), 4);
}

#[test]
fn cancelled_job_issues_no_more_fetches_and_cannot_commit() {
    let mut aggregator = Aggregator::new();
    let generation = aggregator.begin(
        AggregationKind::Pooled,
        AggregationScope::map(MapId::new("Lockdown")),
        &index(),
    );
    let ticket = aggregator.next_fetch().expect("first match issued");

    assert_eq!(aggregator.cancel(AggregationKind::Pooled), Some(generation));
    assert!(aggregator.next_fetch().is_none());
    assert!(!aggregator.complete_fetch(ticket, Ok(Vec::new())));
    assert_eq!(aggregator.commit(generation), CommitOutcome::Stale);
    assert!(aggregator.pooled().is_none());
    assert_eq!(aggregator.status(AggregationKind::Pooled), JobStatus::Idle);
}

#[test]
fn unavailable_matches_are_skipped() {
    let mut aggregator = Aggregator::new();
    let mut index = index();
    index.push(summary("missing", "Lockdown", "February_12"));
    let mut source = source();

    let generation = aggregator.begin(
        AggregationKind::Pooled,
        AggregationScope::map(MapId::new("Lockdown")),
        &index,
    );
    let status = drive(&mut aggregator, AggregationKind::Pooled, &mut source);

    assert!(matches!(status, JobStatus::Ready { progress, .. } if progress.completed == 3));
    assert_eq!(
        aggregator.commit(generation),
        CommitOutcome::Committed(AggregationKind::Pooled)
    );
    let pooled = aggregator.pooled().expect("pooled committed");
    assert_eq!(pooled.matches(), 2);
    assert_eq!(pooled.events().len(), 6);
}

#[test]
fn pooled_events_keep_cross_match_duplicates() {
    let mut aggregator = Aggregator::new();
    let mut source = MemorySource::default()
        .with_match("b1", walk("same", false, 0.0))
        .with_match("b2", walk("same", false, 0.0));

    let generation = aggregator.begin(
        AggregationKind::Pooled,
        AggregationScope::map(MapId::new("Lockdown")),
        &index(),
    );
    let _ = drive(&mut aggregator, AggregationKind::Pooled, &mut source);
    let _ = aggregator.commit(generation);

    let pooled = aggregator.pooled().expect("pooled committed");
    assert_eq!(pooled.events().len(), 6);
    assert_eq!(pooled.events()[..3], pooled.events()[3..]);
}

#[test]
fn day_scope_restricts_matches() {
    let mut aggregator = Aggregator::new();
    let mut source = source();

    let generation = aggregator.begin(
        AggregationKind::Overlay,
        AggregationScope {
            map: MapId::new("AmbroseValley"),
            day: Some(Day::new("February_11")),
        },
        &index(),
    );
    let _ = drive(&mut aggregator, AggregationKind::Overlay, &mut source);
    let _ = aggregator.commit(generation);

    assert_eq!(source.fetched, vec![MatchId::new("a2")]);
    let summary = aggregator.overlay().expect("overlay committed").summary();
    assert_eq!(summary.humans, 0);
    assert_eq!(summary.bots, 1);
}

#[test]
fn poll_yields_after_each_batch() {
    let many: Vec<MatchSummary> = (0..YIELD_INTERVAL * 2 + 5)
        .map(|index| summary(&format!("m{index}"), "GrandRift", "February_10"))
        .collect();
    let mut source = MemorySource::default();
    let mut aggregator = Aggregator::new();
    let generation = aggregator.begin(
        AggregationKind::Pooled,
        AggregationScope::map(MapId::new("GrandRift")),
        &many,
    );

    let first = aggregator.poll(AggregationKind::Pooled, &mut source);
    assert!(matches!(
        first,
        JobStatus::Loading { progress, .. } if progress.completed == YIELD_INTERVAL
    ));
    assert_eq!(aggregator.commit(generation), CommitOutcome::Incomplete);

    let _ = aggregator.poll(AggregationKind::Pooled, &mut source);
    let last = aggregator.poll(AggregationKind::Pooled, &mut source);
    assert!(matches!(last, JobStatus::Ready { progress, .. } if progress.percent() == 100));
}

#[test]
fn overlay_colors_do_not_depend_on_load_order() {
    let mut forward = Aggregator::new();
    let mut reverse = Aggregator::new();
    let scope = AggregationScope::map(MapId::new("Lockdown"));
    let mut index = index();

    let generation = forward.begin(AggregationKind::Overlay, scope.clone(), &index);
    let _ = drive(&mut forward, AggregationKind::Overlay, &mut source());
    let _ = forward.commit(generation);

    index.reverse();
    let generation = reverse.begin(AggregationKind::Overlay, scope, &index);
    let _ = drive(&mut reverse, AggregationKind::Overlay, &mut source());
    let _ = reverse.commit(generation);

    let uid = EntityId::new("lockdown-human");
    let forward_color = forward.overlay().and_then(|o| o.path(&uid)).map(|p| p.color);
    let reverse_color = reverse.overlay().and_then(|o| o.path(&uid)).map(|p| p.color);
    assert_eq!(forward_color, Some(overlay_color(&uid)));
    assert_eq!(forward_color, reverse_color);
}

#[test]
fn clearing_overlay_keeps_pooled_events() {
    let mut aggregator = Aggregator::new();
    let mut source = source();
    let scope = AggregationScope::map(MapId::new("Lockdown"));

    let pooled = aggregator.begin(AggregationKind::Pooled, scope.clone(), &index());
    let _ = drive(&mut aggregator, AggregationKind::Pooled, &mut source);
    let _ = aggregator.commit(pooled);
    let overlay = aggregator.begin(AggregationKind::Overlay, scope, &index());
    let _ = drive(&mut aggregator, AggregationKind::Overlay, &mut source);
    let _ = aggregator.commit(overlay);

    let _ = aggregator.clear_overlay();

    assert!(aggregator.overlay().is_none());
    assert!(aggregator.pooled().is_some());
}

#[test]
fn overlay_job_does_not_cancel_a_pooled_job_in_flight() {
    let mut aggregator = Aggregator::new();
    let mut source = source();
    let scope = AggregationScope::map(MapId::new("Lockdown"));

    let pooled = aggregator.begin(AggregationKind::Pooled, scope.clone(), &index());
    let in_flight = aggregator.next_fetch().expect("pooled job has matches");
    let overlay = aggregator.begin(AggregationKind::Overlay, scope, &index());

    assert_eq!(in_flight.kind(), AggregationKind::Pooled);
    let result = source.fetch(in_flight.summary());
    assert!(aggregator.complete_fetch(in_flight, result));
    assert!(aggregator.running(AggregationKind::Pooled).is_some());

    let _ = drive(&mut aggregator, AggregationKind::Overlay, &mut source);
    assert!(matches!(
        drive(&mut aggregator, AggregationKind::Pooled, &mut source),
        JobStatus::Ready { generation, .. } if generation == pooled
    ));
    assert_eq!(
        aggregator.commit(overlay),
        CommitOutcome::Committed(AggregationKind::Overlay)
    );
    assert_eq!(
        aggregator.commit(pooled),
        CommitOutcome::Committed(AggregationKind::Pooled)
    );
    assert_eq!(aggregator.pooled().map(PooledEvents::matches), Some(2));
    assert!(aggregator.overlay().is_some());
}
