use glam::Vec3;
use rand::Rng;

use crate::{
    error::SceneError,
    loader,
    scene::{Comet, SceneState, Sphere},
};

/// Populate the object field: spheres first, then comets between random pairs.
/// Runs once per scene; a model that arrived earlier is attached afterwards.
pub fn generate<R: Rng>(state: &mut SceneState, rng: &mut R) -> Result<(), SceneError> {
    if state.generated {
        return Err(SceneError::AlreadyGenerated);
    }

    let config = &state.config;
    let bounds = config.bounds;
    let speed = config.max_speed;

    state.spheres = (0..config.sphere_count)
        .map(|_| {
            let position = Vec3::new(
                rng.gen_range(-bounds.x..=bounds.x),
                rng.gen_range(-bounds.y..=bounds.y),
                rng.gen_range(-bounds.z..=bounds.z),
            );
            let velocity = Vec3::new(
                rng.gen_range(-speed..=speed),
                rng.gen_range(-speed..=speed),
                rng.gen_range(-speed..=speed),
            );
            Sphere::new(position, velocity, config.sphere_radius)
        })
        .collect();

    let count = state.spheres.len();
    state.comets = if count == 0 {
        Vec::new()
    } else {
        (0..config.comet_count)
            .map(|_| {
                let start = rng.gen_range(0..count);
                let end = rng.gen_range(0..count);
                let speed = rng.gen_range(config.comet_speed_min..=config.comet_speed_max);
                Comet::new(start, end, speed, &state.spheres)
            })
            .collect()
    };

    state.generated = true;
    tracing::info!(
        spheres = state.spheres.len(),
        comets = state.comets.len(),
        "object field generated"
    );

    if state.model.is_some() {
        loader::attach_clones(state);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use rand::{rngs::StdRng, SeedableRng};

    use super::*;
    use crate::config::SceneConfig;

    fn generated(seed: u64) -> SceneState {
        let mut state = SceneState::new(SceneConfig::default(), 800, 600);
        generate(&mut state, &mut StdRng::seed_from_u64(seed)).unwrap();
        state
    }

    #[test]
    fn field_sizes() {
        let state = generated(1);
        assert_eq!(state.spheres.len(), 500);
        assert_eq!(state.comets.len(), 10);
        assert!(state.is_generated());
    }

    #[test]
    fn spheres_start_inside_bounds() {
        let state = generated(2);
        for sphere in &state.spheres {
            assert!(sphere.position.x.abs() <= 800.0);
            assert!(sphere.position.y.abs() <= 800.0);
            assert!(sphere.position.z.abs() <= 1000.0);
            assert!(sphere.velocity.abs().max_element() <= 0.1);
            assert_eq!(sphere.scale, Vec3::ONE);
            assert_eq!(sphere.original_scale, Vec3::ONE);
            assert_eq!(sphere.radius, 25.0);
            assert!(sphere.model.is_none());
        }
    }

    #[test]
    fn comets_start_at_zero_with_bounded_speed() {
        let state = generated(3);
        for comet in &state.comets {
            assert_eq!(comet.progress, 0.0);
            assert!((0.005..=0.015).contains(&comet.speed));
            assert!(comet.start < 500 && comet.end < 500);
        }
    }

    #[test]
    fn generation_runs_once() {
        let mut state = generated(4);
        let before: Vec<Vec3> = state.spheres.iter().map(|s| s.position).collect();

        let again = generate(&mut state, &mut StdRng::seed_from_u64(5));
        assert!(matches!(again, Err(SceneError::AlreadyGenerated)));

        let after: Vec<Vec3> = state.spheres.iter().map(|s| s.position).collect();
        assert_eq!(before, after);
    }
}
