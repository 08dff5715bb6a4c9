use std::sync::Arc;

use anyhow::{Context, Result};
use dualvo::{CameraModel, FrameSource, GrayImage, Pose3D, TrajectoryGroundTruth};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Normal};

use crate::config::SceneConfig;

/// A deterministic ground-vehicle drive: motion in the x/z plane with a
/// weaving heading and a gentle vertical bump.
#[derive(Debug, Clone)]
pub struct Scene {
    pub truth: Arc<TrajectoryGroundTruth>,
    pub config: SceneConfig,
    seed: u64,
}

fn heading_at(cfg: &SceneConfig, step: usize) -> f64 {
    let phase = std::f64::consts::TAU * step as f64 / cfg.turn_period;
    cfg.turn_amplitude * phase.sin()
}

impl Scene {
    pub fn generate(cfg: &SceneConfig, frames: usize, seed: u64) -> Result<Self> {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let jitter = Normal::new(0.0, 0.01).context("failed to create heading jitter distribution")?;

        let mut positions = Vec::with_capacity(frames);
        let mut pos = Pose3D::ORIGIN;
        for step in 0..frames {
            positions.push(pos);
            let yaw = heading_at(cfg, step) + jitter.sample(&mut rng);
            let bump = cfg.bump_amplitude
                * (std::f64::consts::TAU * step as f64 / (0.5 * cfg.turn_period)).sin();
            pos = Pose3D::new(
                pos.x + cfg.speed * yaw.sin(),
                bump,
                pos.z + cfg.speed * yaw.cos(),
            );
        }

        Ok(Self {
            truth: Arc::new(TrajectoryGroundTruth::new(positions)),
            config: cfg.clone(),
            seed,
        })
    }

    pub fn len(&self) -> usize {
        self.truth.positions().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Renders frame `frame_id` at the camera's resolution. Low-texture frames
    /// come out flat.
    pub fn render(&self, camera: &CameraModel, frame_id: usize) -> GrayImage {
        if self.config.is_low_texture(frame_id) {
            return GrayImage::filled(camera.width, camera.height, 40);
        }
        let shift = frame_id as u64 * 3 + (self.seed & 0xff);
        let data = (0..camera.height as u64)
            .flat_map(|y| (0..camera.width as u64).map(move |x| ((x * 7 + y * 13 + shift) % 256) as u8))
            .collect();
        GrayImage::new(camera.width, camera.height, data)
    }

    pub fn source(&self, camera: &CameraModel) -> SceneSource {
        SceneSource {
            scene: self.clone(),
            camera: camera.clone(),
        }
    }
}

/// Frame source that renders scene frames on demand.
pub struct SceneSource {
    scene: Scene,
    camera: CameraModel,
}

impl FrameSource for SceneSource {
    fn has_more(&self, next_id: usize) -> bool {
        next_id < self.scene.len()
    }

    fn image(&mut self, id: usize) -> Option<GrayImage> {
        if id >= self.scene.len() || self.scene.config.dropped.contains(&id) {
            return None;
        }
        Some(self.scene.render(&self.camera, id))
    }
}
