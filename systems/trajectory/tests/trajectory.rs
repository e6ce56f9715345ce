use match_atlas_core::{EntityId, EventKind, EventTag, TelemetryEvent};
use match_atlas_system_trajectory::{
    build_trajectories, EntityFilter, PathShape, TrajectoryBuilder, BOT_COLOR, HUMAN_PALETTE,
};

fn event(ts: f64, uid: &str, is_bot: bool, tag: EventTag, x: f64, z: f64) -> TelemetryEvent {
    TelemetryEvent::new(ts, EntityId::new(uid), is_bot, tag, x, z)
}

fn three_event_match() -> Vec<TelemetryEvent> {
    vec![
        event(0.0, "u1", false, EventTag::Position, 0.0, 0.0),
        event(5.0, "u1", false, EventTag::Position, 100.0, 0.0),
        event(10.0, "u1", false, EventTag::Kill, 100.0, 0.0),
    ]
}

fn mixed_match() -> Vec<TelemetryEvent> {
    vec![
        event(0.0, "alice", false, EventTag::Position, 0.0, 0.0),
        event(0.5, "bot-1", true, EventTag::BotPosition, 5.0, 5.0),
        event(1.0, "bob", false, EventTag::Position, 1.0, 1.0),
        event(1.5, "alice", false, EventTag::Position, 2.0, 0.0),
        event(2.0, "bot-1", true, EventTag::BotPosition, 6.0, 5.0),
        event(2.5, "carol", false, EventTag::Loot, 9.0, 9.0),
        event(3.0, "bob", false, EventTag::BotKill, 1.0, 2.0),
        event(3.5, "alice", false, EventTag::Position, 3.0, 0.0),
        event(4.0, "bot-1", true, EventTag::BotKilled, 6.0, 5.0),
        event(4.5, "bob", false, EventTag::KilledByStorm, 1.0, 3.0),
    ]
}

#[test]
fn cutoff_excludes_later_annotations() {
    let events = three_event_match();

    let at_five = build_trajectories(&events, 5.0, EntityFilter::default());
    assert_eq!(at_five.len(), 1);
    assert_eq!(at_five[0].positions.len(), 2);
    assert!(at_five[0].events.is_empty());

    let at_ten = build_trajectories(&events, 10.0, EntityFilter::default());
    assert_eq!(at_ten.len(), 1);
    assert_eq!(at_ten[0].positions.len(), 2);
    assert_eq!(at_ten[0].events.len(), 1);
    assert_eq!(at_ten[0].events[0].kind, EventKind::CombatKill);
}

#[test]
fn full_cutoff_keeps_every_position_sample() {
    let events = mixed_match();
    let max_ts = events.iter().map(|event| event.ts).fold(f64::MIN, f64::max);

    let trajectories = build_trajectories(&events, max_ts, EntityFilter::default());
    let position_count: usize = trajectories
        .iter()
        .map(|trajectory| trajectory.positions.len())
        .sum();
    let expected = events
        .iter()
        .filter(|event| event.kind == EventKind::Position)
        .count();

    assert_eq!(position_count, expected);
}

#[test]
fn raising_the_cutoff_only_appends_samples() {
    let events = mixed_match();
    let mut builder = TrajectoryBuilder::new();
    let mut previous = builder.build(&events, -1.0, EntityFilter::default());
    assert!(previous.is_empty());

    for step in 0..=10 {
        let cutoff = f64::from(step) * 0.5;
        let current = builder.build(&events, cutoff, EntityFilter::default());

        for earlier in &previous {
            let later = current
                .iter()
                .find(|trajectory| trajectory.uid == earlier.uid)
                .expect("entities never disappear when the cutoff grows");
            assert!(later.positions.starts_with(&earlier.positions));
            assert!(later.events.starts_with(&earlier.events));
        }

        previous = current;
    }
}

#[test]
fn annotations_without_positions_still_form_a_trajectory() {
    let trajectories = build_trajectories(&mixed_match(), f64::MAX, EntityFilter::default());
    let carol = trajectories
        .iter()
        .find(|trajectory| trajectory.uid == EntityId::new("carol"))
        .expect("carol contributes a loot marker");

    assert_eq!(carol.shape(), PathShape::MarkersOnly);
    assert_eq!(carol.events.len(), 1);
}

#[test]
fn excluded_bots_contribute_nothing() {
    let filter = EntityFilter {
        include_bots: false,
    };

    let trajectories = build_trajectories(&mixed_match(), f64::MAX, filter);

    assert!(trajectories.iter().all(|trajectory| !trajectory.is_bot));
    assert_eq!(trajectories.len(), 3);
}

#[test]
fn human_colors_follow_first_encounter_and_are_reproducible() {
    let events = mixed_match();

    let first = build_trajectories(&events, f64::MAX, EntityFilter::default());
    let second = build_trajectories(&events, f64::MAX, EntityFilter::default());

    let colors = |trajectories: &[match_atlas_system_trajectory::Trajectory]| {
        trajectories
            .iter()
            .map(|trajectory| (trajectory.uid.clone(), trajectory.color))
            .collect::<Vec<_>>()
    };
    assert_eq!(colors(&first), colors(&second));
    assert_eq!(
        colors(&first),
        vec![
            (EntityId::new("alice"), HUMAN_PALETTE[0]),
            (EntityId::new("bot-1"), BOT_COLOR),
            (EntityId::new("bob"), HUMAN_PALETTE[1]),
            (EntityId::new("carol"), HUMAN_PALETTE[2]),
        ]
    );
}

#[test]
fn early_cutoff_changes_palette_order_only_for_visible_entities() {
    let events = mixed_match();

    let trajectories = build_trajectories(&events, 1.0, EntityFilter::default());

    let bob = trajectories
        .iter()
        .find(|trajectory| trajectory.uid == EntityId::new("bob"))
        .expect("bob has a sample at ts 1.0");
    assert_eq!(bob.color, HUMAN_PALETTE[1]);
    assert!(trajectories
        .iter()
        .all(|trajectory| trajectory.uid != EntityId::new("carol")));
}
