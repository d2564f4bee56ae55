use std::path::PathBuf;

use glam::Vec3;

use crate::util::math::degree_to_radian;

pub const MODEL_ENV_VAR: &str = "STARFIELD_MODEL";
pub const DEFAULT_MODEL_PATH: &str = "cyberpunk_robot.glb";

/// Every tunable of the scene. The defaults are the values the scene is designed around.
#[derive(Debug, Clone)]
pub struct SceneConfig {
    pub fov_y: f32,
    pub z_near: f32,
    pub z_far: f32,

    pub sphere_count: usize,
    pub sphere_radius: f32,
    pub sphere_segments: (u32, u32),
    pub sphere_opacity: f32,
    /// Half extents of the box spheres are spawned in and bounce off.
    pub bounds: Vec3,
    pub max_speed: f32,
    pub spin_per_tick: f32,
    pub hover_scale: f32,

    pub comet_count: usize,
    pub comet_speed_min: f32,
    pub comet_speed_max: f32,

    pub decorated_spheres: usize,
    pub model_scale: f32,

    pub ambient_intensity: f32,
    pub directional_intensity: f32,
    pub directional_position: Vec3,

    pub scroll_step: f32,
    pub focus_distance: f32,
    pub zoom_speed: f32,
    pub wheel_factor: f32,
    pub follow_factor: f32,
    pub arrive_distance: f32,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            fov_y: degree_to_radian(70.0),
            z_near: 0.1,
            z_far: 2000.0,

            sphere_count: 500,
            sphere_radius: 25.0,
            sphere_segments: (32, 32),
            sphere_opacity: 0.9,
            bounds: Vec3::new(800.0, 800.0, 1000.0),
            max_speed: 0.1,
            spin_per_tick: 0.01,
            hover_scale: 1.5,

            comet_count: 10,
            comet_speed_min: 0.005,
            comet_speed_max: 0.015,

            decorated_spheres: 10,
            model_scale: 5.0,

            ambient_intensity: 0.5,
            directional_intensity: 1.0,
            directional_position: Vec3::ONE,

            scroll_step: 200.0,
            focus_distance: 1000.0,
            zoom_speed: 10.0,
            wheel_factor: 0.05,
            follow_factor: 0.02,
            arrive_distance: 5.0,
        }
    }
}

impl SceneConfig {
    /// Largest virtual scroll offset that still maps onto a distinct sphere.
    pub fn max_scroll(&self) -> f32 {
        self.sphere_count as f32 * self.scroll_step
    }
}

/// First CLI argument, then `STARFIELD_MODEL`, then the bundled default name.
pub fn model_path(mut args: impl Iterator<Item = String>) -> PathBuf {
    args.next()
        .or_else(|| std::env::var(MODEL_ENV_VAR).ok())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_MODEL_PATH))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_argument_wins() {
        let path = model_path(["robot.gltf".to_owned()].into_iter());
        assert_eq!(path, PathBuf::from("robot.gltf"));
    }

    #[test]
    fn defaults_cover_the_focus_range() {
        let config = SceneConfig::default();
        assert_eq!(config.max_scroll(), 100_000.0);
        assert!((config.fov_y - 70f32.to_radians()).abs() < 1e-6);
    }
}
