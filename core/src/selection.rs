//! Filtering and ordering of the match index.

use crate::{Day, MapId, MatchSummary};

/// Restricts the match index to one map and/or one day.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MatchFilter {
    /// Map every selected match must be played on; `None` accepts all maps.
    pub map: Option<MapId>,
    /// Day every selected match must be recorded on; `None` accepts all days.
    pub day: Option<Day>,
}

impl MatchFilter {
    /// Creates a filter for the provided map and optional day.
    #[must_use]
    pub fn for_map(map: MapId, day: Option<Day>) -> Self {
        Self {
            map: Some(map),
            day,
        }
    }

    /// Returns `true` when the match satisfies the filter.
    #[must_use]
    pub fn accepts(&self, summary: &MatchSummary) -> bool {
        if let Some(map) = &self.map {
            if &summary.map_id != map {
                return false;
            }
        }
        if let Some(day) = &self.day {
            if &summary.day != day {
                return false;
            }
        }
        true
    }
}

/// Ordering applied to a filtered match list.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum SortOrder {
    /// Most combat events first.
    #[default]
    CombatEvents,
    /// Most participants (humans plus bots) first.
    Participants,
}

/// Filters and sorts the match index. Ties keep their index order.
#[must_use]
pub fn select<'a>(
    index: &'a [MatchSummary],
    filter: &MatchFilter,
    order: SortOrder,
) -> Vec<&'a MatchSummary> {
    let mut selected: Vec<&MatchSummary> = index
        .iter()
        .filter(|summary| filter.accepts(summary))
        .collect();

    match order {
        SortOrder::CombatEvents => {
            selected.sort_by(|a, b| b.combat_events.cmp(&a.combat_events));
        }
        SortOrder::Participants => {
            selected.sort_by(|a, b| b.participants().cmp(&a.participants()));
        }
    }

    selected
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MatchId;

    fn summary(id: &str, map: &str, day: &str, humans: u32, bots: u32, combat: u32) -> MatchSummary {
        MatchSummary {
            file_id: MatchId::new(id),
            map_id: MapId::new(map),
            day: Day::new(day),
            humans,
            bots,
            combat_events: combat,
        }
    }

    fn index() -> Vec<MatchSummary> {
        vec![
            summary("a", "Lockdown", "February_10", 2, 10, 4),
            summary("b", "GrandRift", "February_10", 5, 1, 9),
            summary("c", "Lockdown", "February_11", 1, 3, 9),
            summary("d", "Lockdown", "February_10", 8, 8, 1),
        ]
    }

    #[test]
    fn filters_by_map_and_day() {
        let index = index();
        let filter = MatchFilter::for_map(MapId::new("Lockdown"), Some(Day::new("February_10")));

        let ids: Vec<_> = select(&index, &filter, SortOrder::CombatEvents)
            .into_iter()
            .map(|summary| summary.file_id.as_str())
            .collect();

        assert_eq!(ids, vec!["a", "d"]);
    }

    #[test]
    fn combat_order_is_descending_and_stable() {
        let index = index();

        let ids: Vec<_> = select(&index, &MatchFilter::default(), SortOrder::CombatEvents)
            .into_iter()
            .map(|summary| summary.file_id.as_str())
            .collect();

        assert_eq!(ids, vec!["b", "c", "a", "d"]);
    }

    #[test]
    fn participant_order_counts_humans_and_bots() {
        let index = index();

        let ids: Vec<_> = select(&index, &MatchFilter::default(), SortOrder::Participants)
            .into_iter()
            .map(|summary| summary.file_id.as_str())
            .collect();

        assert_eq!(ids, vec!["d", "a", "b", "c"]);
    }
}
