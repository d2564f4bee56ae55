use glam::{EulerRot, Mat4, Quat, Vec2, Vec3};

use crate::{camera::Camera, config::SceneConfig, loader::ModelAsset};

#[derive(Debug, Clone, Copy)]
pub struct AmbientLight {
    pub color: Vec3,
    pub intensity: f32,
}

#[derive(Debug, Clone, Copy)]
pub struct DirectionalLight {
    pub color: Vec3,
    pub intensity: f32,
    /// Unit vector pointing from the scene toward the light.
    pub direction: Vec3,
}

#[derive(Debug, Clone, Copy)]
pub struct Lights {
    pub ambient: AmbientLight,
    pub directional: DirectionalLight,
}

#[derive(Debug, Clone)]
pub struct Sphere {
    pub position: Vec3,
    /// Euler angles in radians, applied X then Y then Z.
    pub rotation: Vec3,
    pub scale: Vec3,
    pub original_scale: Vec3,
    pub velocity: Vec3,
    pub radius: f32,
    /// Decorative model clone, owned by this sphere alone.
    pub model: Option<ModelAsset>,
}

impl Sphere {
    pub fn new(position: Vec3, velocity: Vec3, radius: f32) -> Self {
        let scale = Vec3::ONE;
        Self {
            position,
            rotation: Vec3::ZERO,
            scale,
            original_scale: scale,
            velocity,
            radius,
            model: None,
        }
    }

    pub fn transform(&self) -> Mat4 {
        let rotation = Quat::from_euler(
            EulerRot::XYZ,
            self.rotation.x,
            self.rotation.y,
            self.rotation.z,
        );
        Mat4::from_scale_rotation_translation(self.scale, rotation, self.position)
    }

    /// World radius including the current scale.
    pub fn bounding_radius(&self) -> f32 {
        self.radius * self.scale.max_element()
    }
}

/// A line whose visible end travels from one sphere toward another.
/// Endpoints are sphere indices, so the comet follows them as they drift.
#[derive(Debug, Clone)]
pub struct Comet {
    pub start: usize,
    pub end: usize,
    pub progress: f32,
    pub speed: f32,
    pub line: [Vec3; 2],
    /// Set when `line` changed and the GPU copy is stale.
    pub dirty: bool,
}

impl Comet {
    pub fn new(start: usize, end: usize, speed: f32, spheres: &[Sphere]) -> Self {
        Self {
            start,
            end,
            progress: 0.0,
            speed,
            line: [spheres[start].position, spheres[end].position],
            dirty: true,
        }
    }

    pub fn current_point(&self, spheres: &[Sphere]) -> Vec3 {
        spheres[self.start]
            .position
            .lerp(spheres[self.end].position, self.progress)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub asset: String,
    pub message: String,
}

/// Everything the input router, frame updater and renderer share.
///
/// Field ownership: the router writes `viewport`, `target`, camera aim and sphere
/// scale; the updater writes sphere motion, comets and camera tracking; the loader
/// writes `model`, sphere models and `diagnostics`.
#[derive(Debug)]
pub struct SceneState {
    pub config: SceneConfig,
    pub camera: Camera,
    pub viewport: (u32, u32),
    pub lights: Lights,
    pub spheres: Vec<Sphere>,
    pub comets: Vec<Comet>,
    pub target: Option<usize>,
    /// Loaded model root, kept for cloning.
    pub model: Option<ModelAsset>,
    pub diagnostics: Vec<Diagnostic>,
    pub(crate) generated: bool,
}

impl SceneState {
    pub fn new(config: SceneConfig, width: u32, height: u32) -> Self {
        let mut camera = Camera::new(config.fov_y, 1.0, config.z_near, config.z_far);
        camera.set_aspect(width, height);

        let lights = Lights {
            ambient: AmbientLight {
                color: Vec3::ONE,
                intensity: config.ambient_intensity,
            },
            directional: DirectionalLight {
                color: Vec3::ONE,
                intensity: config.directional_intensity,
                direction: config.directional_position.normalize_or_zero(),
            },
        };

        tracing::info!(width, height, "scene bootstrapped");

        Self {
            config,
            camera,
            viewport: (width, height),
            lights,
            spheres: Vec::new(),
            comets: Vec::new(),
            target: None,
            model: None,
            diagnostics: Vec::new(),
            generated: false,
        }
    }

    pub fn is_generated(&self) -> bool {
        self.generated
    }

    /// Index of the nearest sphere under a point in normalized device coordinates.
    pub fn pick(&self, ndc: Vec2) -> Option<usize> {
        let ray = self.camera.ray_from_ndc(ndc);
        self.spheres
            .iter()
            .enumerate()
            .filter_map(|(index, sphere)| {
                ray.intersect_sphere(sphere.position, sphere.bounding_radius())
                    .map(|distance| (index, distance))
            })
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(index, _)| index)
    }

    pub fn decorated_count(&self) -> usize {
        self.spheres.iter().filter(|s| s.model.is_some()).count()
    }
}
