use chrono::{DateTime, Utc};
use serde::Serialize;

/// Candidate pulled from a source: an `#EXTINF` line and the URL line after it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEntry {
    pub metadata_line: String,
    pub stream_url: String,
}

impl RawEntry {
    pub fn new(metadata_line: impl Into<String>, stream_url: impl Into<String>) -> Self {
        Self {
            metadata_line: metadata_line.into(),
            stream_url: stream_url.into(),
        }
    }
}

/// Raw entry plus the outcome of its liveness probe
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbedEntry {
    pub entry: RawEntry,
    pub live: bool,
}

/// Probed entry after classification
///
/// `category == None` means the classifier excluded the entry (e.g. radio).
/// When a category is present the metadata line already carries it as its
/// single `group-title` attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedEntry {
    pub metadata_line: String,
    pub stream_url: String,
    pub display_name: String,
    pub category: Option<String>,
}

/// Accepted channel of the final playlist
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaylistEntry {
    pub display_name: String,
    pub category: String,
    pub metadata_line: String,
    pub stream_url: String,
}

/// Final ordered, URL-unique playlist
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Playlist {
    entries: Vec<PlaylistEntry>,
}

impl Playlist {
    /// Wrap entries that are already deduplicated and sorted
    pub(crate) fn from_sorted(entries: Vec<PlaylistEntry>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[PlaylistEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// One channel in the JSON summary
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ChannelRecord {
    pub name: String,
    pub stream_url: String,
    pub group: String,
}

/// Secondary artifact written next to the M3U
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistSummary {
    pub updated_at: DateTime<Utc>,
    pub total: usize,
    pub channels: Vec<ChannelRecord>,
}

impl PlaylistSummary {
    pub fn from_playlist(playlist: &Playlist, updated_at: DateTime<Utc>) -> Self {
        let channels: Vec<ChannelRecord> = playlist
            .entries()
            .iter()
            .map(|e| ChannelRecord {
                name: e.display_name.clone(),
                stream_url: e.stream_url.clone(),
                group: e.category.clone(),
            })
            .collect();

        Self {
            updated_at,
            total: channels.len(),
            channels,
        }
    }
}

/// Attrition counters for one run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunStats {
    pub sources_total: usize,
    pub sources_failed: usize,
    pub parsed: usize,
    pub filtered_out: usize,
    pub dead: usize,
    pub excluded: usize,
    pub duplicates: usize,
    pub total: usize,
}

/// What a run hands to the notifier
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub total: usize,
    pub changed: bool,
    pub stats: RunStats,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn entry(name: &str, url: &str, group: &str) -> PlaylistEntry {
        PlaylistEntry {
            display_name: name.to_string(),
            category: group.to_string(),
            metadata_line: format!("#EXTINF:-1 group-title=\"{}\",{}", group, name),
            stream_url: url.to_string(),
        }
    }

    #[test]
    fn test_summary_from_playlist() {
        let playlist = Playlist::from_sorted(vec![
            entry("Rudaw", "http://a/rudaw.m3u8", "Kurdish"),
            entry("IRIB 1", "http://a/irib1.m3u8", "Iran"),
        ]);
        let at = Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap();
        let summary = PlaylistSummary::from_playlist(&playlist, at);

        assert_eq!(summary.total, 2);
        assert_eq!(summary.channels[0].name, "Rudaw");
        assert_eq!(summary.channels[1].group, "Iran");
    }

    #[test]
    fn test_summary_json_shape() {
        let playlist = Playlist::from_sorted(vec![entry("Rudaw", "http://a/r", "Kurdish")]);
        let at = Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap();
        let json = serde_json::to_value(PlaylistSummary::from_playlist(&playlist, at)).unwrap();

        assert_eq!(json["total"], 1);
        assert_eq!(json["updatedAt"], "2026-01-02T03:04:05Z");
        assert_eq!(json["channels"][0]["streamUrl"], "http://a/r");
    }
}
