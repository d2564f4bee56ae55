pub mod math {
    pub fn degree_to_radian(degree: f32) -> f32 {
        degree * std::f32::consts::PI / 180.0
    }

    /// Per-tick easing factor `alpha` rescaled to a step of `dt` ticks.
    pub fn ease_factor(alpha: f32, dt: f32) -> f32 {
        1.0 - (1.0 - alpha).powf(dt)
    }
}
