pub mod aggregator;
pub mod classifier;
pub mod fetcher;
pub mod m3u_parser;
pub mod notifier;
pub mod pipeline;
pub mod prober;
pub mod snapshot;
