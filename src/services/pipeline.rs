//! One aggregation pass: fetch, parse, probe, classify, merge, persist

use futures::future::join_all;

use crate::error::PipelineResult;
use crate::models::{ClassifiedEntry, ProbedEntry, RawEntry, RunOutcome, RunStats};
use crate::services::aggregator::aggregate;
use crate::services::classifier::{ChannelClassifier, TargetFilter};
use crate::services::fetcher::PlaylistSource;
use crate::services::m3u_parser;
use crate::services::prober::{probe_all, StreamProbe};
use crate::services::snapshot::SnapshotWriter;

pub struct Pipeline {
    sources: Vec<String>,
    fetcher: Box<dyn PlaylistSource>,
    prober: Box<dyn StreamProbe>,
    probe_concurrency: usize,
    classifier: ChannelClassifier,
    target_filter: TargetFilter,
    writer: SnapshotWriter,
}

impl Pipeline {
    pub fn new(
        sources: Vec<String>,
        fetcher: Box<dyn PlaylistSource>,
        prober: Box<dyn StreamProbe>,
        probe_concurrency: usize,
        writer: SnapshotWriter,
    ) -> Self {
        Self {
            sources,
            fetcher,
            prober,
            probe_concurrency,
            classifier: ChannelClassifier::default(),
            target_filter: TargetFilter::default(),
            writer,
        }
    }

    pub fn with_target_filter(mut self, target_filter: TargetFilter) -> Self {
        self.target_filter = target_filter;
        self
    }

    /// Fetch and parse every source, keeping source order
    ///
    /// A failed source yields an empty list.
    async fn collect_sources(&self, stats: &mut RunStats) -> Vec<Vec<RawEntry>> {
        let fetches = self.sources.iter().map(|source| async move {
            tracing::info!("Downloading: {}", source);
            (source, self.fetcher.fetch(source).await)
        });

        join_all(fetches)
            .await
            .into_iter()
            .map(|(source, result)| match result {
                Ok(raw) => {
                    let entries = m3u_parser::parse(&raw);
                    tracing::info!(source = %source, entries = entries.len(), "Source parsed");
                    entries
                }
                Err(e) => {
                    tracing::warn!("{}", e);
                    stats.sources_failed += 1;
                    Vec::new()
                }
            })
            .collect()
    }

    /// Drop entries whose display name is not on the allowlist
    fn apply_target_filter(&self, entries: Vec<RawEntry>, stats: &mut RunStats) -> Vec<RawEntry> {
        if !self.target_filter.is_active() {
            return entries;
        }

        let before = entries.len();
        let kept: Vec<RawEntry> = entries
            .into_iter()
            .filter(|entry| {
                m3u_parser::ExtinfLine::parse(&entry.metadata_line)
                    .map(|extinf| self.target_filter.allows(&extinf.display_name()))
                    .unwrap_or(false)
            })
            .collect();
        stats.filtered_out += before - kept.len();
        kept
    }

    pub async fn run(&self) -> PipelineResult<RunOutcome> {
        let mut stats = RunStats {
            sources_total: self.sources.len(),
            ..RunStats::default()
        };

        let per_source: Vec<Vec<RawEntry>> = self
            .collect_sources(&mut stats)
            .await
            .into_iter()
            .map(|entries| {
                stats.parsed += entries.len();
                self.apply_target_filter(entries, &mut stats)
            })
            .collect();

        // Fan-in barrier: every probe finishes before anything is merged
        let candidate_urls = per_source
            .iter()
            .flatten()
            .map(|entry| entry.stream_url.clone());
        let liveness = probe_all(self.prober.as_ref(), candidate_urls, self.probe_concurrency).await;

        let classified: Vec<Vec<ClassifiedEntry>> = per_source
            .into_iter()
            .map(|entries| {
                entries
                    .into_iter()
                    .map(|entry| ProbedEntry {
                        live: liveness.get(&entry.stream_url).copied().unwrap_or(false),
                        entry,
                    })
                    .filter(|probed| {
                        if !probed.live {
                            stats.dead += 1;
                        }
                        probed.live
                    })
                    .map(|probed| self.classifier.classify_entry(probed.entry))
                    .collect()
            })
            .collect();

        let aggregation = aggregate(classified);
        stats.excluded = aggregation.excluded;
        stats.duplicates = aggregation.duplicates;
        stats.total = aggregation.playlist.len();

        tracing::info!(
            sources = stats.sources_total,
            sources_failed = stats.sources_failed,
            parsed = stats.parsed,
            filtered_out = stats.filtered_out,
            dead = stats.dead,
            excluded = stats.excluded,
            duplicates = stats.duplicates,
            total = stats.total,
            "Collected channels"
        );

        if aggregation.playlist.is_empty() {
            tracing::warn!("No channels collected");
        }

        let changed = self.writer.commit(&aggregation.playlist).await?;

        Ok(RunOutcome {
            total: stats.total,
            changed,
            stats,
        })
    }
}
