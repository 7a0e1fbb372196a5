//! Hierarchical, validated configuration for the screening pipeline.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// API credential. Debug never prints the value, and the type is never
/// serialized as part of `ScreenerConfig`.
#[derive(Clone)]
pub struct SecretApiKey(String);

impl SecretApiKey {
    pub fn from_env(var: &str) -> Option<Self> {
        std::env::var(var).ok().filter(|v| !v.is_empty()).map(Self)
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SecretApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("<redacted>")
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AnalyzerWeights {
    pub growth: f64,
    pub risk: f64,
    pub valuation: f64,
    pub sentiment: f64,
}

impl Default for AnalyzerWeights {
    fn default() -> Self {
        Self {
            growth: 0.4,
            risk: 0.3,
            valuation: 0.2,
            sentiment: 0.1,
        }
    }
}

impl AnalyzerWeights {
    /// Divide each weight by their sum if it drifts more than 0.001 from 1.0.
    pub fn normalize(&mut self) {
        let total = self.growth + self.risk + self.valuation + self.sentiment;
        if (total - 1.0).abs() > 0.001 && total > 0.0 {
            self.growth /= total;
            self.risk /= total;
            self.valuation /= total;
            self.sentiment /= total;
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MarketCapFilter {
    pub min_market_cap: Option<f64>,
    pub max_market_cap: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GrowthThresholds {
    pub min_revenue_growth: f64,
    pub min_earnings_growth: f64,
    pub min_eps_growth: f64,
}

impl Default for GrowthThresholds {
    fn default() -> Self {
        Self {
            min_revenue_growth: 0.05,
            min_earnings_growth: 0.05,
            min_eps_growth: 0.05,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RiskThresholds {
    pub max_beta: f64,
    pub max_debt_to_equity: f64,
    pub min_current_ratio: f64,
    pub min_interest_coverage: f64,
}

impl Default for RiskThresholds {
    fn default() -> Self {
        Self {
            max_beta: 2.0,
            max_debt_to_equity: 2.0,
            min_current_ratio: 1.0,
            min_interest_coverage: 2.0,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ValuationThresholds {
    pub max_pe_ratio: f64,
    pub max_peg_ratio: f64,
    pub max_pb_ratio: f64,
    pub max_ps_ratio: f64,
}

impl Default for ValuationThresholds {
    fn default() -> Self {
        Self {
            max_pe_ratio: 50.0,
            max_peg_ratio: 2.0,
            max_pb_ratio: 10.0,
            max_ps_ratio: 10.0,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SentimentThresholds {
    pub min_analyst_rating: f64,
    pub min_esg_score: f64,
}

impl Default for SentimentThresholds {
    fn default() -> Self {
        Self {
            min_analyst_rating: 3.0,
            min_esg_score: 50.0,
        }
    }
}

/// Gate applied to a symbol's trailing ROE history before it reaches the
/// scorer: the last `years` periods must each clear `min_each_year`, and
/// their mean must clear `min_avg`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RoeGate {
    pub years: usize,
    pub min_each_year: f64,
    pub min_avg: f64,
}

impl Default for RoeGate {
    fn default() -> Self {
        Self {
            years: 3,
            min_each_year: 0.10,
            min_avg: 0.15,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScreeningCriteria {
    pub min_roe: f64,
    pub min_roa: f64,
    pub min_gross_margin: f64,
    pub min_operating_margin: f64,
    pub min_net_margin: f64,
    pub exclude_financial_services: bool,
    pub market_cap: MarketCapFilter,
    pub roe: RoeGate,
    pub growth: GrowthThresholds,
    pub risk: RiskThresholds,
    pub valuation: ValuationThresholds,
    pub sentiment: SentimentThresholds,
}

impl Default for ScreeningCriteria {
    fn default() -> Self {
        Self {
            min_roe: 0.15,
            min_roa: 0.05,
            min_gross_margin: 0.2,
            min_operating_margin: 0.1,
            min_net_margin: 0.05,
            exclude_financial_services: false,
            market_cap: MarketCapFilter::default(),
            roe: RoeGate::default(),
            growth: GrowthThresholds::default(),
            risk: RiskThresholds::default(),
            valuation: ValuationThresholds::default(),
            sentiment: SentimentThresholds::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    pub base_url_v4: String,
    pub rate_limit: u32,
    pub timeout_secs: u64,
    pub max_retries: u32,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://financialmodelingprep.com/api/v3".to_string(),
            base_url_v4: "https://financialmodelingprep.com/api/v4".to_string(),
            rate_limit: 300,
            timeout_secs: 15,
            max_retries: 3,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub backend: String,
    pub ttl_default: u64,
    pub ttl_quotes: u64,
    pub ttl_profiles: u64,
    pub ttl_financials: u64,
    pub ttl_sectors: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: "sqlite".to_string(),
            ttl_default: 3600,
            ttl_quotes: 300,
            ttl_profiles: 86_400,
            ttl_financials: 86_400,
            ttl_sectors: 604_800,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub min_quality_score: f64,
    pub max_stocks: usize,
    pub format: String,
    pub filename_prefix: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            min_quality_score: 0.6,
            max_stocks: 50,
            format: "json".to_string(),
            filename_prefix: "nasdaq_analysis".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ConcurrencyConfig {
    pub max_workers: usize,
}

impl Default for ConcurrencyConfig {
    fn default() -> Self {
        Self { max_workers: 10 }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CoherenceBonusConfig {
    pub max_multiplier: f64,
}

impl Default for CoherenceBonusConfig {
    fn default() -> Self {
        Self { max_multiplier: 1.15 }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub weights: AnalyzerWeights,
    pub coherence_bonus: CoherenceBonusConfig,
}

/// Sector-specific growth targets and valuation caps, keyed by sector name
/// in `ScreenerConfig::sector_benchmarks`. Any field left at its sector
/// falls back to the fixed defaults documented per-analyzer.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SectorBenchmark {
    pub revenue_growth_target: f64,
    pub eps_growth_target: f64,
    pub fcf_growth_target: f64,
    pub debt_to_equity_max: f64,
    pub per_max: f64,
    pub pbr_max: f64,
}

impl Default for SectorBenchmark {
    fn default() -> Self {
        Self {
            revenue_growth_target: 0.20,
            eps_growth_target: 0.15,
            fcf_growth_target: 0.15,
            debt_to_equity_max: 2.0,
            per_max: 30.0,
            pbr_max: 5.0,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ScreenerConfig {
    pub screening: ScreeningCriteria,
    pub scoring: ScoringConfig,
    pub api: ApiConfig,
    pub cache: CacheConfig,
    pub output: OutputConfig,
    pub concurrency: ConcurrencyConfig,
    pub sector_benchmarks: HashMap<String, SectorBenchmark>,
}

impl ScreenerConfig {
    pub fn from_str(document: &str) -> Result<Self, ConfigError> {
        let mut config: Self = toml::from_str(document)?;
        config.scoring.weights.normalize();
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_str(&contents)
    }

    pub fn benchmark_for(&self, sector: &str) -> SectorBenchmark {
        self.sector_benchmarks
            .get(sector)
            .cloned()
            .unwrap_or_default()
    }

    /// Overwrite the `scoring.weights` and `screening` subtrees with a named
    /// preset. Presets never touch any other section.
    pub fn apply_profile(&mut self, profile: Profile) {
        let preset = profile.preset();
        self.scoring.weights = preset.weights;
        if let Some(screening) = preset.screening {
            self.screening = screening;
        }
        self.scoring.weights.normalize();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Profile {
    Quality,
    Growth,
    Value,
    Balanced,
}

struct ProfilePreset {
    weights: AnalyzerWeights,
    screening: Option<ScreeningCriteria>,
}

impl Profile {
    fn preset(self) -> ProfilePreset {
        match self {
            Profile::Quality => ProfilePreset {
                weights: AnalyzerWeights {
                    growth: 0.30,
                    risk: 0.30,
                    valuation: 0.25,
                    sentiment: 0.15,
                },
                screening: Some(ScreeningCriteria {
                    min_roe: 0.15,
                    min_roa: 0.08,
                    min_gross_margin: 0.3,
                    min_operating_margin: 0.15,
                    risk: RiskThresholds {
                        max_debt_to_equity: 1.5,
                        min_current_ratio: 1.5,
                        ..RiskThresholds::default()
                    },
                    ..ScreeningCriteria::default()
                }),
            },
            Profile::Growth => ProfilePreset {
                weights: AnalyzerWeights {
                    growth: 0.50,
                    risk: 0.20,
                    valuation: 0.20,
                    sentiment: 0.10,
                },
                screening: Some(ScreeningCriteria {
                    growth: GrowthThresholds {
                        min_revenue_growth: 0.15,
                        min_earnings_growth: 0.15,
                        min_eps_growth: 0.15,
                    },
                    ..ScreeningCriteria::default()
                }),
            },
            Profile::Value => ProfilePreset {
                weights: AnalyzerWeights {
                    growth: 0.15,
                    risk: 0.25,
                    valuation: 0.50,
                    sentiment: 0.10,
                },
                screening: Some(ScreeningCriteria {
                    valuation: ValuationThresholds {
                        max_pe_ratio: 20.0,
                        max_peg_ratio: 1.5,
                        max_pb_ratio: 3.0,
                        ..ValuationThresholds::default()
                    },
                    ..ScreeningCriteria::default()
                }),
            },
            Profile::Balanced => ProfilePreset {
                weights: AnalyzerWeights {
                    growth: 0.25,
                    risk: 0.25,
                    valuation: 0.25,
                    sentiment: 0.25,
                },
                screening: None,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_sum_to_one() {
        let w = AnalyzerWeights::default();
        assert!((w.growth + w.risk + w.valuation + w.sentiment - 1.0).abs() < 0.001);
    }

    #[test]
    fn normalize_rescales_nonunit_sum() {
        let mut w = AnalyzerWeights {
            growth: 2.0,
            risk: 1.0,
            valuation: 1.0,
            sentiment: 0.0,
        };
        w.normalize();
        assert!((w.growth + w.risk + w.valuation + w.sentiment - 1.0).abs() < 0.001);
        assert!((w.growth - 0.5).abs() < 0.001);
    }

    #[test]
    fn empty_document_uses_defaults() {
        let config = ScreenerConfig::from_str("").unwrap();
        assert_eq!(config.concurrency.max_workers, 10);
        assert_eq!(config.cache.backend, "sqlite");
        assert!((config.scoring.coherence_bonus.max_multiplier - 1.15).abs() < 1e-9);
    }

    #[test]
    fn partial_scoring_section_still_gets_coherence_default() {
        let doc = r#"
            [scoring.weights]
            growth = 0.4
            risk = 0.3
            valuation = 0.2
            sentiment = 0.1
        "#;
        let config = ScreenerConfig::from_str(doc).unwrap();
        assert!((config.scoring.coherence_bonus.max_multiplier - 1.15).abs() < 1e-9);
    }

    #[test]
    fn unknown_keys_are_ignored() {
        let doc = r#"
            [nonsense]
            whatever = "ok"
        "#;
        assert!(ScreenerConfig::from_str(doc).is_ok());
    }

    #[test]
    fn profile_overwrites_only_weights_and_screening() {
        let mut config = ScreenerConfig::default();
        let original_cache = config.cache.clone();
        config.apply_profile(Profile::Growth);
        assert!((config.scoring.weights.growth - 0.5).abs() < 0.001);
        assert!((config.screening.growth.min_revenue_growth - 0.15).abs() < 0.001);
        assert_eq!(config.cache.backend, original_cache.backend);
    }

    #[test]
    fn benchmark_for_unknown_sector_falls_back_to_default() {
        let config = ScreenerConfig::default();
        let b = config.benchmark_for("Widgets");
        assert!((b.revenue_growth_target - 0.20).abs() < 0.001);
    }

    #[test]
    fn secret_api_key_debug_is_redacted() {
        let key = SecretApiKey("shh".to_string());
        assert_eq!(format!("{:?}", key), "<redacted>");
    }
}
