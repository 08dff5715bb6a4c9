use anyhow::{bail, Context, Result};
use dualvo::{CameraModel, FusionMethod, FusionWeights, OdometryOptions, StepMode, TrackerStrategy};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

use crate::io::OUTPUT_SCHEMA_VERSION;
use crate::synthetic::NoiseProfile;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SceneConfig {
    /// Distance travelled per frame [m]
    pub speed: f64,
    /// Peak heading excursion [rad]
    pub turn_amplitude: f64,
    /// Frames per full heading oscillation
    pub turn_period: f64,
    /// Peak vertical excursion [m]
    pub bump_amplitude: f64,
    /// Inclusive-exclusive frame ranges rendered without texture
    #[serde(default)]
    pub low_texture: Vec<[usize; 2]>,
    /// Frame ids the source reports as unavailable
    #[serde(default)]
    pub dropped: Vec<usize>,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            speed: 1.0,
            turn_amplitude: 0.8,
            turn_period: 240.0,
            bump_amplitude: 0.3,
            low_texture: Vec::new(),
            dropped: Vec::new(),
        }
    }
}

impl SceneConfig {
    pub fn is_low_texture(&self, frame_id: usize) -> bool {
        self.low_texture
            .iter()
            .any(|[start, end]| (*start..*end).contains(&frame_id))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchConfig {
    pub schema_version: String,
    pub frames: usize,
    pub seed: u64,
    pub calibration_seed: u64,
    #[serde(default)]
    pub warmup_frames: usize,
    pub num_features: usize,
    pub strategies: [TrackerStrategy; 2],
    pub method: FusionMethod,
    #[serde(default)]
    pub weights: Option<[f64; 2]>,
    #[serde(default)]
    pub step_mode: StepMode,
    pub camera: CameraModel,
    #[serde(default)]
    pub scene: SceneConfig,
    #[serde(default)]
    pub profiles: HashMap<TrackerStrategy, NoiseProfile>,
}

impl BenchConfig {
    pub fn from_toml_file(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        let cfg: BenchConfig = toml::from_str(&raw)
            .with_context(|| format!("failed to parse TOML config: {}", path.display()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        if self.schema_version != OUTPUT_SCHEMA_VERSION {
            bail!(
                "config schema_version {} does not match output schema {}",
                self.schema_version,
                OUTPUT_SCHEMA_VERSION
            );
        }
        if self.frames < 2 {
            bail!("frames must be >= 2");
        }
        if self.warmup_frames >= self.frames {
            bail!("warmup_frames must be < frames");
        }
        if self.num_features == 0 {
            bail!("num_features must be > 0");
        }
        if self.strategies[0] == self.strategies[1] {
            bail!("strategies must differ (both are {})", self.strategies[0]);
        }
        self.camera.validate()?;
        if let Some([w1, w2]) = self.weights {
            if self.method == FusionMethod::EqualAverage {
                bail!("weights cannot be set for equal_average fusion");
            }
            FusionWeights::new(w1, w2)?;
        }
        if self.scene.speed <= 0.0 {
            bail!("scene.speed must be > 0");
        }
        if self.scene.turn_period <= 0.0 {
            bail!("scene.turn_period must be > 0");
        }
        if self.scene.low_texture.iter().any(|[a, b]| a >= b) {
            bail!("scene.low_texture ranges must be non-empty [start, end)");
        }
        for (strategy, profile) in &self.profiles {
            profile
                .validate()
                .with_context(|| format!("invalid noise profile for {strategy}"))?;
        }
        Ok(())
    }

    pub fn odometry_options(&self) -> OdometryOptions {
        OdometryOptions {
            warmup_frames: self.warmup_frames,
            max_frames: Some(self.frames),
            skip_rejected_frames: false,
        }
    }

    pub fn profile_for(&self, strategy: TrackerStrategy) -> NoiseProfile {
        self.profiles
            .get(&strategy)
            .copied()
            .unwrap_or_else(|| NoiseProfile::for_strategy(strategy))
    }
}

#[cfg(test)]
pub(crate) fn test_config() -> BenchConfig {
    BenchConfig {
        schema_version: OUTPUT_SCHEMA_VERSION.to_string(),
        frames: 60,
        seed: 3,
        calibration_seed: 5,
        warmup_frames: 3,
        num_features: 2000,
        strategies: [TrackerStrategy::Brisk, TrackerStrategy::LkFast],
        method: FusionMethod::WeightedAverage,
        weights: None,
        step_mode: StepMode::Sequential,
        camera: CameraModel::new(24, 12, 14.0, 14.0, 12.0, 6.0, 10.0),
        scene: SceneConfig::default(),
        profiles: HashMap::new(),
    }
}
