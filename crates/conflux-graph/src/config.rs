//! KG environment configuration, grounded
//! on the original implementation's
//! module-level `KG_*` constants.

use crate::extract::ExtractionMode;
use crate::rules::SampleMethod;

#[derive(Debug, Clone)]
pub struct GraphConfig {
    pub enabled: bool,
    pub extract_mode: ExtractionMode,
    pub dynamic_rules_enabled: bool,
    pub sample_text_length: usize,
    pub sample_method: SampleMethod,
    pub dynamic_rules_retry_count: u32,
    pub dynamic_rules_retry_delay_ms: u64,
    pub max_hops: usize,
    pub worker_count: usize,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            extract_mode: ExtractionMode::NerRule,
            dynamic_rules_enabled: true,
            sample_text_length: 2000,
            sample_method: SampleMethod::Mixed,
            dynamic_rules_retry_count: 3,
            dynamic_rules_retry_delay_ms: 1000,
            max_hops: 3,
            worker_count: 2,
        }
    }
}

impl GraphConfig {
    pub fn from_env() -> Self {
        let default = Self::default();
        Self {
            enabled: env_bool("KNOWLEDGE_GRAPH_ENABLED", env_bool("KG_EXTRACT_ENABLED", default.enabled)),
            extract_mode: std::env::var("KG_EXTRACT_MODE")
                .ok()
                .and_then(|v| ExtractionMode::parse(&v))
                .unwrap_or(default.extract_mode),
            dynamic_rules_enabled: env_bool("KG_DYNAMIC_RULES_ENABLED", default.dynamic_rules_enabled),
            sample_text_length: env_usize("KG_SAMPLE_TEXT_LENGTH", default.sample_text_length),
            sample_method: std::env::var("KG_SAMPLE_METHOD")
                .ok()
                .and_then(|v| SampleMethod::parse(&v))
                .unwrap_or(default.sample_method),
            dynamic_rules_retry_count: std::env::var("KG_DYNAMIC_RULES_RETRY_COUNT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.dynamic_rules_retry_count),
            dynamic_rules_retry_delay_ms: std::env::var("KG_DYNAMIC_RULES_RETRY_DELAY")
                .ok()
                .and_then(|v| v.parse::<f64>().ok())
                .map(|secs| (secs * 1000.0) as u64)
                .unwrap_or(default.dynamic_rules_retry_delay_ms),
            max_hops: env_usize("MULTI_HOP_MAX_HOPS", default.max_hops),
            worker_count: default.worker_count,
        }
    }
}

fn env_bool(key: &str, default: bool) -> bool {
    std::env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_usize(key: &str, default: usize) -> usize {
    std::env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}
