use lazy_static::lazy_static;
use std::env;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::sync::RwLock;
use std::time::Duration;

lazy_static! {
    static ref CONFIG: RwLock<Config> = RwLock::new(Config::new());
}

const CONFIG_PATHS: [&str; 2] = ["./tsio.toml", "./tsio_config.toml"];

/// Time budgets and sizing used by the PCR timeline analyzer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnalyzerConfig {
    /// Budget for the bootstrap phase (first pcr, byte rate, last pcr)
    pub general_timeout: Duration,
    /// Budget for the whole discontinuity search
    pub discontinuity_timeout: Duration,
    /// Budget for a byte position lookup from a time position
    pub position_timeout: Duration,
    /// Budget for a single pcr lookup
    pub pcr_timeout: Duration,
    /// Initial length of a scanned segment, in seconds of pcr time
    pub segment_secs: i64,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            general_timeout: Duration::from_millis(500),
            discontinuity_timeout: Duration::from_millis(2000),
            position_timeout: Duration::from_millis(500),
            pcr_timeout: Duration::from_millis(200),
            segment_secs: 30,
        }
    }
}

/// Thresholds used by the timestamp adjuster to confirm a pcr discontinuity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdjusterConfig {
    /// Largest gap between two pcrs still considered continuous
    pub max_gap_us: i64,
    /// Number of consecutive oversized gaps confirming a discontinuity
    pub confirm_count: u32,
}

impl Default for AdjusterConfig {
    fn default() -> Self {
        Self {
            max_gap_us: crate::format::ts::types::PCR_MAX_DELTA_US,
            confirm_count: 3,
        }
    }
}

/// Process-wide configuration.
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Timeline analyzer settings
    pub analyzer: AnalyzerConfig,
    /// Timestamp adjuster settings
    pub adjuster: AdjusterConfig,
}

impl Config {
    fn new() -> Self {
        let mut config = Config::default();

        // Environment first, then config file
        for key in KEYS {
            let var = format!("TSIO_{}", key.to_uppercase());
            if let Ok(value) = env::var(&var) {
                config.apply(key, &value);
            }
        }

        for path in &CONFIG_PATHS {
            if let Ok(mut file) = File::open(path) {
                let mut content = String::new();
                if file.read_to_string(&mut content).is_ok() {
                    config.apply_content(&content);
                }
            }
        }

        config
    }

    /// Applies every `key = value` line of a configuration file body.
    pub fn apply_content(&mut self, content: &str) {
        for line in content.lines() {
            let line = line.trim();
            if line.starts_with('#') {
                continue;
            }
            if let Some((key, value)) = line.split_once('=') {
                let value = value.trim().trim_matches('"').trim_matches('\'');
                self.apply(key.trim(), value);
            }
        }
    }

    fn apply(&mut self, key: &str, value: &str) {
        let Ok(number) = value.parse::<u64>() else {
            log::warn!("ignoring non numeric value {:?} for {}", value, key);
            return;
        };
        match key {
            "analyzer_general_timeout_ms" => {
                self.analyzer.general_timeout = Duration::from_millis(number)
            }
            "analyzer_discontinuity_timeout_ms" => {
                self.analyzer.discontinuity_timeout = Duration::from_millis(number)
            }
            "analyzer_position_timeout_ms" => {
                self.analyzer.position_timeout = Duration::from_millis(number)
            }
            "analyzer_pcr_timeout_ms" => self.analyzer.pcr_timeout = Duration::from_millis(number),
            "analyzer_segment_secs" => self.analyzer.segment_secs = number.max(1) as i64,
            "adjuster_max_gap_us" => self.adjuster.max_gap_us = number as i64,
            "adjuster_confirm_count" => self.adjuster.confirm_count = number.max(1) as u32,
            _ => log::debug!("unknown configuration key {}", key),
        }
    }

    /// Re-reads environment and configuration files
    pub fn reload() {
        let new_config = Config::new();
        if let Ok(mut config) = CONFIG.write() {
            *config = new_config;
        }
    }
}

const KEYS: [&str; 7] = [
    "analyzer_general_timeout_ms",
    "analyzer_discontinuity_timeout_ms",
    "analyzer_position_timeout_ms",
    "analyzer_pcr_timeout_ms",
    "analyzer_segment_secs",
    "adjuster_max_gap_us",
    "adjuster_confirm_count",
];

/// Returns the configured analyzer settings
pub fn analyzer_config() -> AnalyzerConfig {
    CONFIG
        .read()
        .map(|config| config.analyzer)
        .unwrap_or_default()
}

/// Returns the configured adjuster settings
pub fn adjuster_config() -> AdjusterConfig {
    CONFIG
        .read()
        .map(|config| config.adjuster)
        .unwrap_or_default()
}

/// Creates a default config template file if it doesn't exist
pub fn create_default_config_template<P: AsRef<Path>>(path: P) -> std::io::Result<()> {
    if !path.as_ref().exists() {
        std::fs::write(path, TEMPLATE)?;
    }
    Ok(())
}

pub(crate) const TEMPLATE: &str = r#"# TSIO Configuration
# Copy this file to 'tsio.toml' and adjust the values.

# Timeline analyzer budgets
analyzer_general_timeout_ms = 500
analyzer_discontinuity_timeout_ms = 2000
analyzer_position_timeout_ms = 500
analyzer_pcr_timeout_ms = 200
analyzer_segment_secs = 30

# Pcr discontinuity confirmation
adjuster_max_gap_us = 200000
adjuster_confirm_count = 3
"#;
