use glam::Vec3;

use crate::{scene::SceneState, util::math::ease_factor};

/// Advance the scene by `dt` reference frames (1.0 = one frame at 60 Hz).
pub fn advance(state: &mut SceneState, dt: f32) {
    move_spheres(state, dt);
    move_comets(state, dt);
    track_target(state, dt);
}

fn move_spheres(state: &mut SceneState, dt: f32) {
    let bounds = state.config.bounds;
    let spin = state.config.spin_per_tick * dt;

    for sphere in &mut state.spheres {
        sphere.position += sphere.velocity * dt;
        sphere.rotation.x += spin;
        sphere.rotation.y += spin;

        sphere.velocity = reflect(sphere.position, sphere.velocity, bounds);
    }
}

/// Flip every velocity component whose coordinate is out of bounds and still heading
/// outward. A sphere that crossed turns back exactly once.
pub fn reflect(position: Vec3, velocity: Vec3, bounds: Vec3) -> Vec3 {
    let flip = |p: f32, v: f32, bound: f32| {
        if (p > bound && v > 0.0) || (p < -bound && v < 0.0) {
            -v
        } else {
            v
        }
    };
    Vec3::new(
        flip(position.x, velocity.x, bounds.x),
        flip(position.y, velocity.y, bounds.y),
        flip(position.z, velocity.z, bounds.z),
    )
}

fn move_comets(state: &mut SceneState, dt: f32) {
    let spheres = &state.spheres;
    for comet in &mut state.comets {
        comet.progress += comet.speed * dt;
        if comet.progress > 1.0 {
            comet.progress = 0.0;
        }

        let start = spheres[comet.start].position;
        comet.line = [start, comet.current_point(spheres)];
        comet.dirty = true;
    }
}

fn track_target(state: &mut SceneState, dt: f32) {
    let Some(index) = state.target else {
        return;
    };
    let Some(target) = state.spheres.get(index).map(|s| s.position) else {
        state.target = None;
        return;
    };

    let camera = &mut state.camera;
    let goal = Vec3::new(target.x, target.y, camera.eye.z);
    camera.eye = camera
        .eye
        .lerp(goal, ease_factor(state.config.follow_factor, dt));
    camera.look_at(target);

    if camera.eye.distance(target) < state.config.arrive_distance {
        tracing::info!(sphere = index, "target reached");
        state.target = None;
    }
}
