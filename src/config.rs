use std::env;

/// Sources aggregated when `SOURCES` is not set
const DEFAULT_SOURCES: &[&str] = &[
    "https://iptv-org.github.io/iptv/languages/fas.m3u",
    "https://iptv-org.github.io/iptv/languages/kur.m3u",
    "https://iptv-org.github.io/iptv/countries/ir.m3u",
    "https://iptv-org.github.io/iptv/countries/iq.m3u",
];

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    // Sources
    pub sources: Vec<String>,
    pub target_channels: Vec<String>,

    // Output
    pub output_file: String,
    pub summary_file: String,

    // Fetching
    pub user_agent: String,
    pub fetch_timeout_ms: u64,
    pub fetch_max_retries: u32,
    pub max_m3u_size_mb: usize,

    // Probing
    pub probe_enabled: bool,
    pub probe_timeout_ms: u64,
    pub probe_concurrency: usize,

    // Notification
    pub telegram_token: Option<String>,
    pub telegram_chat_id: Option<String>,
    pub notify_timeout_ms: u64,
}

/// Split a comma-separated variable, dropping blanks
fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Empty credentials count as missing
fn non_empty_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

impl Config {
    /// Load configuration from environment variables with defaults
    pub fn from_env() -> Self {
        let sources = env::var("SOURCES")
            .map(|raw| parse_list(&raw))
            .ok()
            .filter(|list| !list.is_empty())
            .unwrap_or_else(|| DEFAULT_SOURCES.iter().map(|s| s.to_string()).collect());

        Self {
            // Sources
            sources,
            target_channels: env::var("TARGET_CHANNELS")
                .map(|raw| parse_list(&raw))
                .unwrap_or_default(),

            // Output
            output_file: env::var("OUTPUT_FILE")
                .unwrap_or_else(|_| "premium_list.m3u".to_string()),
            summary_file: env::var("SUMMARY_FILE")
                .unwrap_or_else(|_| "premium_list.json".to_string()),

            // Fetching - generic browser agent, some CDNs reject unknown clients
            user_agent: env::var("USER_AGENT").unwrap_or_else(|_| "Mozilla/5.0".to_string()),

            fetch_timeout_ms: env::var("FETCH_TIMEOUT_MS")
                .unwrap_or_else(|_| "20000".to_string())
                .parse()
                .unwrap_or(20_000), // 20 seconds

            fetch_max_retries: env::var("FETCH_MAX_RETRIES")
                .unwrap_or_else(|_| "0".to_string())
                .parse()
                .unwrap_or(0),

            max_m3u_size_mb: env::var("MAX_M3U_SIZE_MB")
                .unwrap_or_else(|_| "50".to_string())
                .parse()
                .unwrap_or(50),

            // Probing
            probe_enabled: env::var("PROBE_ENABLED")
                .ok()
                .and_then(|v| parse_bool(&v))
                .unwrap_or(true),

            probe_timeout_ms: env::var("PROBE_TIMEOUT_MS")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .unwrap_or(3_000), // 3 seconds

            probe_concurrency: env::var("PROBE_CONCURRENCY")
                .unwrap_or_else(|_| "20".to_string())
                .parse()
                .unwrap_or(20usize)
                .max(1),

            // Notification
            telegram_token: non_empty_var("TELEGRAM_TOKEN"),
            telegram_chat_id: non_empty_var("TELEGRAM_CHAT_ID"),
            notify_timeout_ms: env::var("NOTIFY_TIMEOUT_MS")
                .unwrap_or_else(|_| "15000".to_string())
                .parse()
                .unwrap_or(15_000), // 15 seconds
        }
    }
}
