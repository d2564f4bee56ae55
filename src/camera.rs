use glam::{Mat4, Vec2, Vec3};

/// Perspective viewpoint. Orientation is stored as a direction so moving the eye
/// does not re-aim the camera; only `look_at` does.
#[derive(Debug, Clone)]
pub struct Camera {
    pub eye: Vec3,
    pub forward: Vec3,
    pub up: Vec3,
    pub aspect: f32,
    pub fov_y: f32,
    pub z_near: f32,
    pub z_far: f32,
}

impl Camera {
    pub fn new(fov_y: f32, aspect: f32, z_near: f32, z_far: f32) -> Self {
        Self {
            eye: Vec3::ZERO,
            forward: Vec3::NEG_Z,
            up: Vec3::Y,
            aspect,
            fov_y,
            z_near,
            z_far,
        }
    }

    /// Turn the camera toward `point`. A point at the eye, or straight above/below it,
    /// leaves the orientation unchanged.
    pub fn look_at(&mut self, point: Vec3) {
        let forward = (point - self.eye).normalize_or_zero();
        if forward.cross(self.up).length_squared() > f32::EPSILON {
            self.forward = forward;
        }
    }

    pub fn set_aspect(&mut self, width: u32, height: u32) {
        if width > 0 && height > 0 {
            self.aspect = width as f32 / height as f32;
        }
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_to_rh(self.eye, self.forward, self.up)
    }

    pub fn projection_matrix(&self) -> Mat4 {
        Mat4::perspective_rh(self.fov_y, self.aspect.max(1e-6), self.z_near, self.z_far)
    }

    pub fn view_projection_matrix(&self) -> Mat4 {
        self.projection_matrix() * self.view_matrix()
    }

    /// Ray from the eye through a point given in normalized device coordinates.
    pub fn ray_from_ndc(&self, ndc: Vec2) -> Ray {
        let inverse = self.view_projection_matrix().inverse();
        let far = inverse.project_point3(ndc.extend(1.0));
        Ray {
            origin: self.eye,
            direction: (far - self.eye).normalize_or_zero(),
        }
    }
}

/// Convert a window position in pixels to normalized device coordinates (-1..1, y up).
pub fn screen_to_ndc(x: f32, y: f32, width: u32, height: u32) -> Vec2 {
    let width = width.max(1) as f32;
    let height = height.max(1) as f32;
    Vec2::new((x / width) * 2.0 - 1.0, -(y / height) * 2.0 + 1.0)
}

#[derive(Debug, Clone, Copy)]
pub struct Ray {
    pub origin: Vec3,
    pub direction: Vec3,
}

impl Ray {
    /// Distance to the first front-facing hit on a sphere. A ray starting inside the
    /// sphere does not hit it.
    pub fn intersect_sphere(&self, center: Vec3, radius: f32) -> Option<f32> {
        // |o + t*d - c|^2 = r^2  ->  a*t^2 + b*t + c = 0
        let oc = self.origin - center;
        let a = self.direction.length_squared();
        if a == 0.0 {
            return None;
        }
        let b = 2.0 * oc.dot(self.direction);
        let c = oc.length_squared() - radius * radius;
        let discriminant = b * b - 4.0 * a * c;
        if discriminant < 0.0 {
            return None;
        }

        let t = (-b - discriminant.sqrt()) / (2.0 * a);
        (t >= 0.0).then_some(t)
    }
}
