//! Cross-source merge
//!
//! Runs single-threaded after every probe has completed, so the set of
//! accepted URLs has exactly one writer.

use std::collections::HashSet;

use crate::models::{ClassifiedEntry, Playlist, PlaylistEntry};

/// Merged playlist plus what was dropped on the way
#[derive(Debug, Clone, Default)]
pub struct Aggregation {
    pub playlist: Playlist,
    pub duplicates: usize,
    pub excluded: usize,
}

/// Merge per-source entries in source order
///
/// The first accepted occurrence of a stream URL wins. Excluded entries are
/// dropped without claiming their URL. The result is sorted by display name,
/// case-insensitive, keeping first-seen order for equal names.
pub fn aggregate(per_source: Vec<Vec<ClassifiedEntry>>) -> Aggregation {
    let mut accepted_urls: HashSet<String> = HashSet::new();
    let mut entries: Vec<PlaylistEntry> = Vec::new();
    let mut duplicates = 0usize;
    let mut excluded = 0usize;

    for entry in per_source.into_iter().flatten() {
        if accepted_urls.contains(&entry.stream_url) {
            duplicates += 1;
            continue;
        }

        let Some(category) = entry.category else {
            excluded += 1;
            continue;
        };

        accepted_urls.insert(entry.stream_url.clone());
        entries.push(PlaylistEntry {
            display_name: entry.display_name,
            category,
            metadata_line: entry.metadata_line,
            stream_url: entry.stream_url,
        });
    }

    // Stable: equal keys keep insertion (first-seen) order
    entries.sort_by_cached_key(|e| e.display_name.to_lowercase());

    Aggregation {
        playlist: Playlist::from_sorted(entries),
        duplicates,
        excluded,
    }
}
