use std::env;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{DisaggError, Result};

/// Hard upper bound on points per matching cluster (width of the point bitset).
pub const MAX_CLUSTER_POINTS: usize = 256;

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

/// Read a profiled env var: tries {PROFILE}_{KEY} first, falls back to {KEY}.
fn profiled_env_opt(profile: &str, key: &str) -> Option<String> {
    if !profile.is_empty() {
        let prefixed = format!("{}_{}", profile, key);
        if let Some(v) = env_opt(&prefixed) {
            return Some(v);
        }
    }
    env_opt(key)
}

fn override_parsed<T: std::str::FromStr>(profile: &str, key: &str, slot: &mut T) {
    if let Some(v) = profiled_env_opt(profile, key).and_then(|v| v.parse().ok()) {
        *slot = v;
    }
}

// ── Top-level config ──────────────────────────────────────────

/// Tunable constants for the whole disaggregation run.
///
/// Every value is empirically tuned; none has a derivation. TOML sections map
/// one-to-one onto the nested structs and every field has a default, so an
/// empty file is a valid config.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DisaggConfig {
    #[serde(default)]
    pub segmentation: SegmentationConfig,
    #[serde(default)]
    pub extraction: ExtractionConfig,
    #[serde(default)]
    pub shapes: ShapeConfig,
    #[serde(default)]
    pub combinatorial: CombinatorialConfig,
}

impl DisaggConfig {
    /// Parse config from a TOML string (no env overrides, validated).
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let config: Self = toml::from_str(toml_str)?;
        config.validate()?;
        Ok(config)
    }

    /// Load config from a file path.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml(&content)
    }

    /// Full load: `.env`, optional TOML file, env overrides, validation.
    ///
    /// Profile is read from `DISAGG_PROFILE`. When set (e.g. `PLANT`), every
    /// override key is first looked up as `{PROFILE}_{KEY}`, falling back to `{KEY}`.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        load_dotenv();
        let mut config = match path {
            Some(p) => {
                let content = std::fs::read_to_string(p)?;
                toml::from_str(&content)?
            }
            None => Self::default(),
        };
        let profile = env_opt("DISAGG_PROFILE").unwrap_or_default().to_uppercase();
        config.apply_env_overrides(&profile);
        config.validate()?;
        Ok(config)
    }

    /// Apply environment variable overrides.
    ///
    /// Convention: `DISAGG_SECTION_KEY` overrides `section.key`, e.g.
    /// `DISAGG_SEGMENTATION_EVENT_TIME_LIMIT` or `DISAGG_COMBINATORIAL_MAX_CLUSTER_SIZE`.
    pub fn apply_env_overrides(&mut self, profile: &str) {
        let p = profile;
        let seg = &mut self.segmentation;
        if let Some(v) = profiled_env_opt(p, "DISAGG_SEGMENTATION_INSTALLATION") {
            match v.parse() {
                Ok(kind) => seg.installation = kind,
                Err(e) => tracing::warn!(error = %e, "ignoring DISAGG_SEGMENTATION_INSTALLATION"),
            }
        }
        if let Some(v) = profiled_env_opt(p, "DISAGG_SEGMENTATION_BACKGROUND_OFFSET")
            .and_then(|v| v.parse().ok())
        {
            seg.background_offset = Some(v);
        }
        override_parsed(p, "DISAGG_SEGMENTATION_EVENT_TIME_LIMIT", &mut seg.event_time_limit);

        let ext = &mut self.extraction;
        override_parsed(p, "DISAGG_EXTRACTION_DERIVATIVE_LIMIT", &mut ext.derivative_limit);
        override_parsed(p, "DISAGG_EXTRACTION_RAMP_BACK_LIMIT", &mut ext.ramp_back_limit);
        override_parsed(p, "DISAGG_EXTRACTION_RAMP_FORWARD_LIMIT", &mut ext.ramp_forward_limit);
        override_parsed(p, "DISAGG_EXTRACTION_BALANCE_LIMIT", &mut ext.balance_limit);
        override_parsed(p, "DISAGG_EXTRACTION_RECONSTRUCTION_LIMIT", &mut ext.reconstruction_limit);
        override_parsed(p, "DISAGG_EXTRACTION_FALLBACK_NOISE_THRESHOLD", &mut ext.fallback_noise_threshold);
        override_parsed(p, "DISAGG_EXTRACTION_MAX_THRESHOLD_CANDIDATES", &mut ext.max_threshold_candidates);

        let shapes = &mut self.shapes;
        override_parsed(p, "DISAGG_SHAPES_SWITCHING_THRESHOLD", &mut shapes.switching_threshold);
        override_parsed(p, "DISAGG_SHAPES_SWITCHING_MAX_GAP", &mut shapes.switching_max_gap);
        override_parsed(p, "DISAGG_SHAPES_DIRECT_THRESHOLD", &mut shapes.direct_threshold);
        override_parsed(p, "DISAGG_SHAPES_DENSE_MAX_GAP", &mut shapes.dense_max_gap);
        override_parsed(p, "DISAGG_SHAPES_DENSE_MIN_POINTS", &mut shapes.dense_min_points);
        override_parsed(p, "DISAGG_SHAPES_DENSE_CONCENTRATION", &mut shapes.dense_concentration);
        override_parsed(p, "DISAGG_SHAPES_DENSE_THRESHOLD", &mut shapes.dense_threshold);
        override_parsed(p, "DISAGG_SHAPES_CHAIR_THRESHOLD", &mut shapes.chair_threshold);
        override_parsed(p, "DISAGG_SHAPES_RECTANGLE_THRESHOLD", &mut shapes.rectangle_threshold);

        let comb = &mut self.combinatorial;
        override_parsed(p, "DISAGG_COMBINATORIAL_PAIRING_TOLERANCE", &mut comb.pairing_tolerance);
        override_parsed(p, "DISAGG_COMBINATORIAL_MAX_SUBSET_SIZE", &mut comb.max_subset_size);
        override_parsed(p, "DISAGG_COMBINATORIAL_MAX_ELIGIBLE", &mut comb.max_eligible);
        override_parsed(p, "DISAGG_COMBINATORIAL_DISTANCE_THRESHOLD", &mut comb.distance_threshold);
        override_parsed(p, "DISAGG_COMBINATORIAL_FULL_DISTANCE_THRESHOLD", &mut comb.full_distance_threshold);
        override_parsed(p, "DISAGG_COMBINATORIAL_EPSILON", &mut comb.epsilon);
        override_parsed(p, "DISAGG_COMBINATORIAL_COST_SCALE", &mut comb.cost_scale);
        override_parsed(p, "DISAGG_COMBINATORIAL_MAX_CANDIDATES", &mut comb.max_candidates);
        override_parsed(p, "DISAGG_COMBINATORIAL_MAX_CLUSTER_SIZE", &mut comb.max_cluster_size);
        override_parsed(p, "DISAGG_COMBINATORIAL_CLEANUP_LIMIT", &mut comb.cleanup_limit);
        override_parsed(p, "DISAGG_COMBINATORIAL_CLUSTER_GAP", &mut comb.cluster_gap);
        override_parsed(p, "DISAGG_COMBINATORIAL_ACCEPTANCE_MARGIN", &mut comb.acceptance_margin);
        override_parsed(p, "DISAGG_COMBINATORIAL_UNMATCHED_PENALTY", &mut comb.unmatched_penalty);
        override_parsed(p, "DISAGG_COMBINATORIAL_TIME_BUDGET_MS", &mut comb.time_budget_ms);
    }

    pub fn validate(&self) -> Result<()> {
        fn positive(name: &str, v: f64) -> Result<()> {
            if v.is_finite() && v > 0.0 {
                Ok(())
            } else {
                Err(DisaggError::InvalidConfig(format!("{name} must be a positive number, got {v}")))
            }
        }

        if let Some(offset) = self.segmentation.background_offset {
            if !offset.is_finite() || offset < 0.0 {
                return Err(DisaggError::InvalidConfig(format!(
                    "segmentation.background_offset must be >= 0, got {offset}"
                )));
            }
        }

        let ext = &self.extraction;
        positive("extraction.derivative_limit", ext.derivative_limit)?;
        positive("extraction.balance_limit", ext.balance_limit)?;
        positive("extraction.reconstruction_limit", ext.reconstruction_limit)?;
        if !ext.fallback_noise_threshold.is_finite() || ext.fallback_noise_threshold < 0.0 {
            return Err(DisaggError::InvalidConfig(
                "extraction.fallback_noise_threshold must be >= 0".to_string(),
            ));
        }

        let shapes = &self.shapes;
        positive("shapes.switching_threshold", shapes.switching_threshold)?;
        positive("shapes.direct_threshold", shapes.direct_threshold)?;
        positive("shapes.dense_threshold", shapes.dense_threshold)?;
        positive("shapes.dense_concentration", shapes.dense_concentration)?;
        positive("shapes.chair_threshold", shapes.chair_threshold)?;
        positive("shapes.rectangle_threshold", shapes.rectangle_threshold)?;
        if shapes.dense_min_points < 2 {
            return Err(DisaggError::InvalidConfig(
                "shapes.dense_min_points must be at least 2".to_string(),
            ));
        }

        let comb = &self.combinatorial;
        positive("combinatorial.distance_threshold", comb.distance_threshold)?;
        positive("combinatorial.full_distance_threshold", comb.full_distance_threshold)?;
        positive("combinatorial.epsilon", comb.epsilon)?;
        positive("combinatorial.cost_scale", comb.cost_scale)?;
        if comb.full_distance_threshold < comb.distance_threshold {
            return Err(DisaggError::InvalidConfig(
                "combinatorial.full_distance_threshold must be >= distance_threshold".to_string(),
            ));
        }
        if comb.max_subset_size == 0 || comb.max_subset_size > 6 {
            return Err(DisaggError::InvalidConfig(format!(
                "combinatorial.max_subset_size must be in 1..=6, got {}",
                comb.max_subset_size
            )));
        }
        if comb.max_cluster_size < 2 || comb.max_cluster_size > MAX_CLUSTER_POINTS {
            return Err(DisaggError::InvalidConfig(format!(
                "combinatorial.max_cluster_size must be in 2..={}, got {}",
                MAX_CLUSTER_POINTS, comb.max_cluster_size
            )));
        }
        if comb.max_candidates == 0 {
            return Err(DisaggError::InvalidConfig(
                "combinatorial.max_candidates must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Print a summary for startup logs.
    pub fn log_summary(&self) {
        let seg = &self.segmentation;
        tracing::info!("Config loaded:");
        tracing::info!(
            "  segmentation:  installation={}, offset={}W, lookahead={}",
            seg.installation,
            seg.resolved_background_offset(),
            seg.event_time_limit
        );
        tracing::info!(
            "  extraction:    derivative_limit={}%, fallback_threshold={}W",
            self.extraction.derivative_limit,
            self.extraction.fallback_noise_threshold
        );
        tracing::info!(
            "  shapes:        direct={}%, switching={}%, chair={}%",
            self.shapes.direct_threshold,
            self.shapes.switching_threshold,
            self.shapes.chair_threshold
        );
        tracing::info!(
            "  combinatorial: max_subset={}, max_cluster={}, margin={}",
            self.combinatorial.max_subset_size,
            self.combinatorial.max_cluster_size,
            self.combinatorial.acceptance_margin
        );
    }
}

// ── Segmentation ──────────────────────────────────────────────

/// Installation class; decides the default background offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstallationType {
    #[default]
    Residential,
    Commercial,
    Industrial,
}

impl InstallationType {
    /// Watts above the series minimum that count as "something switched on".
    pub fn background_offset(self) -> f64 {
        match self {
            InstallationType::Residential => 30.0,
            InstallationType::Commercial => 100.0,
            InstallationType::Industrial => 500.0,
        }
    }
}

impl std::fmt::Display for InstallationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InstallationType::Residential => write!(f, "residential"),
            InstallationType::Commercial => write!(f, "commercial"),
            InstallationType::Industrial => write!(f, "industrial"),
        }
    }
}

impl std::str::FromStr for InstallationType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "residential" => Ok(InstallationType::Residential),
            "commercial" => Ok(InstallationType::Commercial),
            "industrial" => Ok(InstallationType::Industrial),
            other => Err(format!("unknown installation type: {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentationConfig {
    #[serde(default)]
    pub installation: InstallationType,
    /// Explicit offset; overrides the installation default when set.
    #[serde(default)]
    pub background_offset: Option<f64>,
    /// Samples that must stay below threshold before an event end is confirmed.
    #[serde(default = "default_event_time_limit")]
    pub event_time_limit: usize,
}

fn default_event_time_limit() -> usize { 5 }

impl Default for SegmentationConfig {
    fn default() -> Self {
        Self {
            installation: InstallationType::default(),
            background_offset: None,
            event_time_limit: default_event_time_limit(),
        }
    }
}

impl SegmentationConfig {
    pub fn resolved_background_offset(&self) -> f64 {
        self.background_offset
            .unwrap_or_else(|| self.installation.background_offset())
    }
}

// ── Extraction ────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionConfig {
    /// Percentage derivative magnitude that marks a significant step.
    #[serde(default = "default_derivative_limit")]
    pub derivative_limit: f64,
    /// Samples a change window may grow backward to absorb a slow ramp.
    #[serde(default = "default_ramp_back_limit")]
    pub ramp_back_limit: usize,
    /// Samples a change window may grow forward to absorb a slow ramp.
    #[serde(default = "default_ramp_forward_limit")]
    pub ramp_forward_limit: usize,
    /// Max percentage imbalance between summed rising and reduction power.
    #[serde(default = "default_balance_limit")]
    pub balance_limit: f64,
    /// Max percentage error of the reconstructed cumulative curve.
    #[serde(default = "default_reconstruction_limit")]
    pub reconstruction_limit: f64,
    /// Threshold used when auto-tuning accepts no candidate.
    #[serde(default = "default_fallback_noise_threshold")]
    pub fallback_noise_threshold: f64,
    #[serde(default = "default_max_threshold_candidates")]
    pub max_threshold_candidates: usize,
}

fn default_derivative_limit() -> f64 { 5.0 }
fn default_ramp_back_limit() -> usize { 2 }
fn default_ramp_forward_limit() -> usize { 2 }
fn default_balance_limit() -> f64 { 15.0 }
fn default_reconstruction_limit() -> f64 { 10.0 }
fn default_fallback_noise_threshold() -> f64 { 15.0 }
fn default_max_threshold_candidates() -> usize { 10_000 }

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            derivative_limit: default_derivative_limit(),
            ramp_back_limit: default_ramp_back_limit(),
            ramp_forward_limit: default_ramp_forward_limit(),
            balance_limit: default_balance_limit(),
            reconstruction_limit: default_reconstruction_limit(),
            fallback_noise_threshold: default_fallback_noise_threshold(),
            max_threshold_candidates: default_max_threshold_candidates(),
        }
    }
}

// ── Shape matching ────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShapeConfig {
    #[serde(default = "default_switching_threshold")]
    pub switching_threshold: f64,
    /// Max minutes between a reduction and the rise that cancels it.
    #[serde(default = "default_switching_max_gap")]
    pub switching_max_gap: usize,
    #[serde(default = "default_direct_threshold")]
    pub direct_threshold: f64,
    /// Max minutes between neighbours of one dense run.
    #[serde(default = "default_dense_max_gap")]
    pub dense_max_gap: usize,
    #[serde(default = "default_dense_min_points")]
    pub dense_min_points: usize,
    /// Points per minute a run needs to count as dense.
    #[serde(default = "default_dense_concentration")]
    pub dense_concentration: f64,
    #[serde(default = "default_dense_threshold")]
    pub dense_threshold: f64,
    #[serde(default = "default_chair_threshold")]
    pub chair_threshold: f64,
    #[serde(default = "default_rectangle_threshold")]
    pub rectangle_threshold: f64,
}

fn default_switching_threshold() -> f64 { 20.0 }
fn default_switching_max_gap() -> usize { 1 }
fn default_direct_threshold() -> f64 { 5.0 }
fn default_dense_max_gap() -> usize { 2 }
fn default_dense_min_points() -> usize { 6 }
fn default_dense_concentration() -> f64 { 0.6 }
fn default_dense_threshold() -> f64 { 10.0 }
fn default_chair_threshold() -> f64 { 10.0 }
fn default_rectangle_threshold() -> f64 { 10.0 }

impl Default for ShapeConfig {
    fn default() -> Self {
        Self {
            switching_threshold: default_switching_threshold(),
            switching_max_gap: default_switching_max_gap(),
            direct_threshold: default_direct_threshold(),
            dense_max_gap: default_dense_max_gap(),
            dense_min_points: default_dense_min_points(),
            dense_concentration: default_dense_concentration(),
            dense_threshold: default_dense_threshold(),
            chair_threshold: default_chair_threshold(),
            rectangle_threshold: default_rectangle_threshold(),
        }
    }
}

// ── Combinatorial matching ────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CombinatorialConfig {
    /// Percent a single counterpart may exceed the anchor's magnitude.
    #[serde(default = "default_pairing_tolerance")]
    pub pairing_tolerance: f64,
    #[serde(default = "default_max_subset_size")]
    pub max_subset_size: usize,
    /// Nearest-in-time counterparts considered per anchor.
    #[serde(default = "default_max_eligible")]
    pub max_eligible: usize,
    #[serde(default = "default_distance_threshold")]
    pub distance_threshold: f64,
    /// Relaxed candidate filter for the exactly-once (full) formulation.
    #[serde(default = "default_full_distance_threshold")]
    pub full_distance_threshold: f64,
    #[serde(default = "default_epsilon")]
    pub epsilon: f64,
    /// Multiplier turning candidate weights into integer solver costs.
    #[serde(default = "default_cost_scale")]
    pub cost_scale: f64,
    #[serde(default = "default_max_candidates")]
    pub max_candidates: usize,
    #[serde(default = "default_max_cluster_size")]
    pub max_cluster_size: usize,
    /// Weak points an oversized cluster may shed before it is split.
    #[serde(default = "default_cleanup_limit")]
    pub cleanup_limit: usize,
    /// Minutes of silence that separate two clusters.
    #[serde(default = "default_cluster_gap")]
    pub cluster_gap: usize,
    /// How much worse (in normalized distance) a full solution may be and still win.
    #[serde(default = "default_acceptance_margin")]
    pub acceptance_margin: f64,
    /// Normalized-distance penalty per watt of unmatched active power.
    #[serde(default = "default_unmatched_penalty")]
    pub unmatched_penalty: f64,
    /// Wall-clock budget per event; 0 disables it.
    ///
    /// Checked before each cluster and before each full formulation. A solver
    /// call already running is not interrupted.
    #[serde(default = "default_time_budget_ms")]
    pub time_budget_ms: u64,
}

fn default_pairing_tolerance() -> f64 { 10.0 }
fn default_max_subset_size() -> usize { 3 }
fn default_max_eligible() -> usize { 10 }
fn default_distance_threshold() -> f64 { 20.0 }
fn default_full_distance_threshold() -> f64 { 60.0 }
fn default_epsilon() -> f64 { 0.01 }
fn default_cost_scale() -> f64 { 1000.0 }
fn default_max_candidates() -> usize { 2000 }
fn default_max_cluster_size() -> usize { 24 }
fn default_cleanup_limit() -> usize { 4 }
fn default_cluster_gap() -> usize { 30 }
fn default_acceptance_margin() -> f64 { 10.0 }
fn default_unmatched_penalty() -> f64 { 0.05 }
fn default_time_budget_ms() -> u64 { 30_000 }

impl Default for CombinatorialConfig {
    fn default() -> Self {
        Self {
            pairing_tolerance: default_pairing_tolerance(),
            max_subset_size: default_max_subset_size(),
            max_eligible: default_max_eligible(),
            distance_threshold: default_distance_threshold(),
            full_distance_threshold: default_full_distance_threshold(),
            epsilon: default_epsilon(),
            cost_scale: default_cost_scale(),
            max_candidates: default_max_candidates(),
            max_cluster_size: default_max_cluster_size(),
            cleanup_limit: default_cleanup_limit(),
            cluster_gap: default_cluster_gap(),
            acceptance_margin: default_acceptance_margin(),
            unmatched_penalty: default_unmatched_penalty(),
            time_budget_ms: default_time_budget_ms(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        DisaggConfig::default().validate().unwrap();
    }

    #[test]
    fn empty_toml_is_default() {
        let config = DisaggConfig::from_toml("").unwrap();
        assert_eq!(config, DisaggConfig::default());
    }

    #[test]
    fn partial_toml_keeps_other_defaults() {
        let config = DisaggConfig::from_toml(
            r#"
            [segmentation]
            installation = "commercial"
            event_time_limit = 8

            [combinatorial]
            max_cluster_size = 12
            "#,
        )
        .unwrap();
        assert_eq!(config.segmentation.installation, InstallationType::Commercial);
        assert_eq!(config.segmentation.resolved_background_offset(), 100.0);
        assert_eq!(config.segmentation.event_time_limit, 8);
        assert_eq!(config.combinatorial.max_cluster_size, 12);
        assert_eq!(config.combinatorial.max_subset_size, 3);
        assert_eq!(config.shapes, ShapeConfig::default());
    }

    #[test]
    fn explicit_offset_wins_over_installation() {
        let seg = SegmentationConfig {
            installation: InstallationType::Industrial,
            background_offset: Some(42.0),
            ..Default::default()
        };
        assert_eq!(seg.resolved_background_offset(), 42.0);
    }

    #[test]
    fn oversized_cluster_rejected() {
        let mut config = DisaggConfig::default();
        config.combinatorial.max_cluster_size = MAX_CLUSTER_POINTS + 1;
        assert!(matches!(config.validate(), Err(DisaggError::InvalidConfig(_))));
    }

    #[test]
    fn full_threshold_must_not_be_tighter() {
        let mut config = DisaggConfig::default();
        config.combinatorial.full_distance_threshold = 5.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn bad_toml_is_parse_error() {
        let err = DisaggConfig::from_toml("[segmentation\n").unwrap_err();
        assert!(matches!(err, DisaggError::ConfigParse(_)));
    }

    #[test]
    fn profiled_env_override() {
        // Unique keys so parallel tests cannot observe each other.
        env::set_var("ZZTEST_DISAGG_SEGMENTATION_EVENT_TIME_LIMIT", "11");
        let mut config = DisaggConfig::default();
        config.apply_env_overrides("ZZTEST");
        env::remove_var("ZZTEST_DISAGG_SEGMENTATION_EVENT_TIME_LIMIT");
        assert_eq!(config.segmentation.event_time_limit, 11);
    }

    #[test]
    fn every_section_key_can_be_overridden() {
        let vars = [
            ("ZZKEYS_DISAGG_EXTRACTION_RAMP_FORWARD_LIMIT", "4"),
            ("ZZKEYS_DISAGG_SHAPES_DENSE_MIN_POINTS", "9"),
            ("ZZKEYS_DISAGG_COMBINATORIAL_CLUSTER_GAP", "45"),
            ("ZZKEYS_DISAGG_COMBINATORIAL_UNMATCHED_PENALTY", "0.5"),
            ("ZZKEYS_DISAGG_COMBINATORIAL_FULL_DISTANCE_THRESHOLD", "75"),
        ];
        for (key, value) in vars {
            env::set_var(key, value);
        }
        let mut config = DisaggConfig::default();
        config.apply_env_overrides("ZZKEYS");
        for (key, _) in vars {
            env::remove_var(key);
        }
        assert_eq!(config.extraction.ramp_forward_limit, 4);
        assert_eq!(config.shapes.dense_min_points, 9);
        assert_eq!(config.combinatorial.cluster_gap, 45);
        assert_eq!(config.combinatorial.unmatched_penalty, 0.5);
        assert_eq!(config.combinatorial.full_distance_threshold, 75.0);
        config.validate().unwrap();
    }

    #[test]
    fn installation_parses_case_insensitively() {
        assert_eq!("Industrial".parse::<InstallationType>(), Ok(InstallationType::Industrial));
        assert!("castle".parse::<InstallationType>().is_err());
    }
}
