use std::{fs, path::PathBuf};

use anyhow::{Context, Result};
use match_atlas_core::{MatchId, MatchSummary, TelemetryEvent};
use match_atlas_system_aggregation::{MatchSource, SourceError};

const INDEX_FILE: &str = "matches.json";

/// Match data stored as JSON files inside one directory.
///
/// The directory holds `matches.json` with the index and one
/// `match_<file_id>.json` per match.
#[derive(Clone, Debug)]
pub(crate) struct FsMatchSource {
    root: PathBuf,
}

impl FsMatchSource {
    pub(crate) fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub(crate) fn load_index(&self) -> Result<Vec<MatchSummary>> {
        let path = self.root.join(INDEX_FILE);
        let contents = fs::read_to_string(&path)
            .with_context(|| format!("failed to read match index at {}", path.display()))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("failed to parse match index at {}", path.display()))
    }

    /// Looks a match up in `index` and loads its telemetry.
    pub(crate) fn load_match(
        &mut self,
        index: &[MatchSummary],
        match_id: &MatchId,
    ) -> Result<(MatchSummary, Vec<TelemetryEvent>)> {
        let summary = index
            .iter()
            .find(|summary| &summary.file_id == match_id)
            .cloned()
            .with_context(|| format!("match `{match_id}` is not in the index"))?;
        let events = self.fetch(&summary)?;
        Ok((summary, events))
    }

    fn match_path(&self, match_id: &MatchId) -> PathBuf {
        self.root.join(format!("match_{match_id}.json"))
    }
}

impl MatchSource for FsMatchSource {
    fn fetch(&mut self, summary: &MatchSummary) -> Result<Vec<TelemetryEvent>, SourceError> {
        let path = self.match_path(&summary.file_id);
        let contents = fs::read_to_string(&path).map_err(|error| SourceError::Unavailable {
            match_id: summary.file_id.clone(),
            reason: format!("{}: {error}", path.display()),
        })?;
        serde_json::from_str(&contents).map_err(|error| SourceError::Malformed {
            match_id: summary.file_id.clone(),
            reason: error.to_string(),
        })
    }
}
