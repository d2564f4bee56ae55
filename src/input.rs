use winit::{
    dpi::PhysicalPosition,
    event::{ElementState, KeyboardInput, MouseButton, MouseScrollDelta, VirtualKeyCode, WindowEvent},
};

use crate::{camera::screen_to_ndc, scene::SceneState};

/// Pixels per line for wheels that report whole lines.
const LINE_HEIGHT: f32 = 100.0;
const ARROW_STEP: f32 = 40.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputEvent {
    Resized { width: u32, height: u32 },
    /// Absolute vertical page offset in pixels.
    Scroll { offset: f32 },
    Click { x: f32, y: f32 },
    MouseMove { x: f32, y: f32 },
    /// Positive delta scrolls down / zooms out.
    Wheel { delta: f32 },
}

/// Apply one input event to the scene.
pub fn apply(state: &mut SceneState, event: InputEvent) {
    match event {
        InputEvent::Resized { width, height } => {
            state.viewport = (width, height);
            state.camera.set_aspect(width, height);
        }
        InputEvent::Scroll { offset } => scroll(state, offset),
        InputEvent::Click { x, y } => {
            let ndc = screen_to_ndc(x, y, state.viewport.0, state.viewport.1);
            if let Some(index) = state.pick(ndc) {
                tracing::info!(sphere = index, "target selected");
                state.target = Some(index);
            }
        }
        InputEvent::MouseMove { x, y } => {
            let ndc = screen_to_ndc(x, y, state.viewport.0, state.viewport.1);
            let hovered = state.pick(ndc);
            let hover_scale = state.config.hover_scale;
            for (index, sphere) in state.spheres.iter_mut().enumerate() {
                sphere.scale = if hovered == Some(index) {
                    glam::Vec3::splat(hover_scale)
                } else {
                    sphere.original_scale
                };
            }
        }
        InputEvent::Wheel { delta } => {
            state.camera.eye.z += delta * state.config.wheel_factor * state.config.zoom_speed;
        }
    }
}

/// Focused sphere index for a scroll offset.
pub fn focus_index(offset: f32, step: f32, sphere_count: usize) -> usize {
    let index = (offset / step).floor().max(0.0) as usize;
    index.min(sphere_count.saturating_sub(1))
}

fn scroll(state: &mut SceneState, offset: f32) {
    let config = &state.config;
    let index = focus_index(offset, config.scroll_step, state.spheres.len());
    state.camera.eye.z = config.focus_distance - offset * 2.0;

    // A click target keeps the camera aim until it is reached.
    if state.target.is_none() {
        if let Some(sphere) = state.spheres.get(index) {
            let point = sphere.position;
            state.camera.look_at(point);
        }
    }
    tracing::debug!(offset, focus = index, "scroll");
}

/// Translates window events into `InputEvent`s. A native window has no page to
/// scroll, so the router keeps a virtual page offset driven by the wheel and keys.
#[derive(Debug)]
pub struct InputRouter {
    cursor: PhysicalPosition<f64>,
    scroll_offset: f32,
    max_scroll: f32,
    page_height: f32,
}

impl InputRouter {
    pub fn new(max_scroll: f32, page_height: f32) -> Self {
        Self {
            cursor: PhysicalPosition::new(0.0, 0.0),
            scroll_offset: 0.0,
            max_scroll,
            page_height,
        }
    }

    pub fn scroll_offset(&self) -> f32 {
        self.scroll_offset
    }

    pub fn translate(&mut self, event: &WindowEvent) -> Vec<InputEvent> {
        match event {
            WindowEvent::Resized(size) => {
                self.page_height = size.height as f32;
                vec![InputEvent::Resized {
                    width: size.width,
                    height: size.height,
                }]
            }
            WindowEvent::ScaleFactorChanged { new_inner_size, .. } => {
                self.page_height = new_inner_size.height as f32;
                vec![InputEvent::Resized {
                    width: new_inner_size.width,
                    height: new_inner_size.height,
                }]
            }
            WindowEvent::CursorMoved { position, .. } => {
                self.cursor = *position;
                vec![InputEvent::MouseMove {
                    x: position.x as f32,
                    y: position.y as f32,
                }]
            }
            WindowEvent::MouseInput {
                state: ElementState::Pressed,
                button: MouseButton::Left,
                ..
            } => vec![InputEvent::Click {
                x: self.cursor.x as f32,
                y: self.cursor.y as f32,
            }],
            WindowEvent::MouseWheel { delta, .. } => {
                let delta = match delta {
                    MouseScrollDelta::LineDelta(_, y) => -y * LINE_HEIGHT,
                    MouseScrollDelta::PixelDelta(position) => -position.y as f32,
                };
                let mut events = vec![InputEvent::Wheel { delta }];
                events.extend(self.scroll_to(self.scroll_offset + delta));
                events
            }
            WindowEvent::KeyboardInput {
                input:
                    KeyboardInput {
                        state: ElementState::Pressed,
                        virtual_keycode: Some(keycode),
                        ..
                    },
                ..
            } => {
                let offset = match keycode {
                    VirtualKeyCode::Down => self.scroll_offset + ARROW_STEP,
                    VirtualKeyCode::Up => self.scroll_offset - ARROW_STEP,
                    VirtualKeyCode::PageDown => self.scroll_offset + self.page_height,
                    VirtualKeyCode::PageUp => self.scroll_offset - self.page_height,
                    VirtualKeyCode::Home => 0.0,
                    VirtualKeyCode::End => self.max_scroll,
                    _ => return Vec::new(),
                };
                self.scroll_to(offset).into_iter().collect()
            }
            _ => Vec::new(),
        }
    }

    /// Scroll events fire only when the clamped offset actually moves.
    fn scroll_to(&mut self, offset: f32) -> Option<InputEvent> {
        let offset = offset.clamp(0.0, self.max_scroll);
        if offset == self.scroll_offset {
            return None;
        }
        self.scroll_offset = offset;
        Some(InputEvent::Scroll { offset })
    }
}

#[cfg(test)]
mod tests {
    use glam::Vec3;
    use rand::{rngs::StdRng, SeedableRng};
    use winit::{
        dpi::PhysicalSize,
        event::{DeviceId, ModifiersState, TouchPhase},
    };

    use super::*;
    use crate::{config::SceneConfig, field, scene::Sphere};

    fn generated_state() -> SceneState {
        let mut state = SceneState::new(SceneConfig::default(), 800, 600);
        field::generate(&mut state, &mut StdRng::seed_from_u64(11)).unwrap();
        state
    }

    /// Three spheres straight ahead of a camera at the origin, nearest is index 1.
    fn lined_up_state() -> SceneState {
        let mut state = SceneState::new(SceneConfig::default(), 800, 600);
        state.spheres = [-600.0, -200.0, -900.0]
            .into_iter()
            .map(|z| Sphere::new(Vec3::new(0.0, 0.0, z), Vec3::ZERO, 25.0))
            .collect();
        state
    }

    #[test]
    fn scroll_mapping() {
        assert_eq!(focus_index(0.0, 200.0, 500), 0);
        assert_eq!(focus_index(2000.0, 200.0, 500), 10);
        assert_eq!(focus_index(199.9, 200.0, 500), 0);
        assert_eq!(focus_index(500.0 * 200.0, 200.0, 500), 499);
        assert_eq!(focus_index(1.0e9, 200.0, 500), 499);
    }

    #[test]
    fn scroll_moves_and_aims_camera() {
        let mut state = generated_state();

        apply(&mut state, InputEvent::Scroll { offset: 0.0 });
        assert_eq!(state.camera.eye.z, 1000.0);

        apply(&mut state, InputEvent::Scroll { offset: 2000.0 });
        assert_eq!(state.camera.eye.z, -3000.0);
        let expected = (state.spheres[10].position - state.camera.eye).normalize();
        assert!(state.camera.forward.abs_diff_eq(expected, 1e-5));
    }

    #[test]
    fn scroll_does_not_steal_click_aim() {
        let mut state = generated_state();
        state.target = Some(3);
        let forward = state.camera.forward;

        apply(&mut state, InputEvent::Scroll { offset: 400.0 });
        assert_eq!(state.camera.eye.z, 200.0);
        assert_eq!(state.camera.forward, forward);
    }

    #[test]
    fn click_targets_nearest_sphere() {
        let mut state = lined_up_state();
        apply(&mut state, InputEvent::Click { x: 400.0, y: 300.0 });
        assert_eq!(state.target, Some(1));
    }

    #[test]
    fn click_on_empty_space_keeps_target() {
        let mut state = lined_up_state();
        state.target = Some(2);
        apply(&mut state, InputEvent::Click { x: 0.0, y: 0.0 });
        assert_eq!(state.target, Some(2));
    }

    #[test]
    fn hover_enlarges_only_nearest() {
        let mut state = lined_up_state();
        apply(&mut state, InputEvent::MouseMove { x: 400.0, y: 300.0 });
        let scales: Vec<Vec3> = state.spheres.iter().map(|s| s.scale).collect();
        assert_eq!(scales, vec![Vec3::ONE, Vec3::splat(1.5), Vec3::ONE]);

        apply(&mut state, InputEvent::MouseMove { x: 0.0, y: 0.0 });
        assert!(state.spheres.iter().all(|s| s.scale == s.original_scale));
    }

    #[test]
    fn wheel_zooms() {
        let mut state = lined_up_state();
        apply(&mut state, InputEvent::Wheel { delta: 100.0 });
        assert!((state.camera.eye.z - 50.0).abs() < 1e-4);
        apply(&mut state, InputEvent::Wheel { delta: -40.0 });
        assert!((state.camera.eye.z - 30.0).abs() < 1e-4);
    }

    #[test]
    fn resize_updates_aspect_only() {
        let mut state = lined_up_state();
        let eye = state.camera.eye;
        apply(
            &mut state,
            InputEvent::Resized {
                width: 1000,
                height: 500,
            },
        );
        assert_eq!(state.viewport, (1000, 500));
        assert_eq!(state.camera.aspect, 2.0);
        assert_eq!(state.camera.eye, eye);
    }

    #[test]
    fn router_scroll_offset_is_clamped() {
        let mut router = InputRouter::new(1000.0, 600.0);
        assert_eq!(router.scroll_to(-50.0), None);
        assert_eq!(router.scroll_to(300.0), Some(InputEvent::Scroll { offset: 300.0 }));
        assert_eq!(router.scroll_to(5000.0), Some(InputEvent::Scroll { offset: 1000.0 }));
        assert_eq!(router.scroll_offset(), 1000.0);
    }

    fn device() -> DeviceId {
        // SAFETY: only used as an opaque id in synthesized events.
        unsafe { DeviceId::dummy() }
    }

    #[allow(deprecated)]
    fn wheel(delta: MouseScrollDelta) -> WindowEvent<'static> {
        WindowEvent::MouseWheel {
            device_id: device(),
            delta,
            phase: TouchPhase::Moved,
            modifiers: ModifiersState::empty(),
        }
    }

    #[allow(deprecated)]
    fn cursor(x: f64, y: f64) -> WindowEvent<'static> {
        WindowEvent::CursorMoved {
            device_id: device(),
            position: PhysicalPosition::new(x, y),
            modifiers: ModifiersState::empty(),
        }
    }

    #[allow(deprecated)]
    fn left_press() -> WindowEvent<'static> {
        WindowEvent::MouseInput {
            device_id: device(),
            state: ElementState::Pressed,
            button: MouseButton::Left,
            modifiers: ModifiersState::empty(),
        }
    }

    #[allow(deprecated)]
    fn key(keycode: VirtualKeyCode) -> WindowEvent<'static> {
        WindowEvent::KeyboardInput {
            device_id: device(),
            input: KeyboardInput {
                scancode: 0,
                state: ElementState::Pressed,
                virtual_keycode: Some(keycode),
                modifiers: ModifiersState::empty(),
            },
            is_synthetic: false,
        }
    }

    #[test]
    fn wheel_lines_emit_wheel_then_scroll() {
        let mut router = InputRouter::new(1000.0, 600.0);

        let down = router.translate(&wheel(MouseScrollDelta::LineDelta(0.0, -1.0)));
        assert_eq!(
            down,
            vec![
                InputEvent::Wheel { delta: 100.0 },
                InputEvent::Scroll { offset: 100.0 }
            ]
        );

        let up = router.translate(&wheel(MouseScrollDelta::LineDelta(0.0, 1.0)));
        assert_eq!(
            up,
            vec![
                InputEvent::Wheel { delta: -100.0 },
                InputEvent::Scroll { offset: 0.0 }
            ]
        );
    }

    #[test]
    fn wheel_at_top_only_zooms() {
        let mut router = InputRouter::new(1000.0, 600.0);
        let events = router.translate(&wheel(MouseScrollDelta::LineDelta(0.0, 1.0)));
        assert_eq!(events, vec![InputEvent::Wheel { delta: -100.0 }]);
        assert_eq!(router.scroll_offset(), 0.0);
    }

    #[test]
    fn pixel_wheel_is_flipped_to_page_direction() {
        let mut router = InputRouter::new(1000.0, 600.0);
        let delta = MouseScrollDelta::PixelDelta(PhysicalPosition::new(0.0, -30.0));
        assert_eq!(
            router.translate(&wheel(delta)),
            vec![
                InputEvent::Wheel { delta: 30.0 },
                InputEvent::Scroll { offset: 30.0 }
            ]
        );
    }

    #[test]
    fn click_lands_at_last_cursor_position() {
        let mut router = InputRouter::new(1000.0, 600.0);
        assert_eq!(
            router.translate(&cursor(120.0, 45.0)),
            vec![InputEvent::MouseMove { x: 120.0, y: 45.0 }]
        );
        assert_eq!(
            router.translate(&left_press()),
            vec![InputEvent::Click { x: 120.0, y: 45.0 }]
        );
    }

    #[test]
    fn keys_scroll_the_page() {
        let mut router = InputRouter::new(1000.0, 600.0);

        assert_eq!(
            router.translate(&key(VirtualKeyCode::Down)),
            vec![InputEvent::Scroll { offset: 40.0 }]
        );
        assert_eq!(
            router.translate(&key(VirtualKeyCode::PageDown)),
            vec![InputEvent::Scroll { offset: 640.0 }]
        );
        assert_eq!(
            router.translate(&key(VirtualKeyCode::End)),
            vec![InputEvent::Scroll { offset: 1000.0 }]
        );
        assert!(router.translate(&key(VirtualKeyCode::PageDown)).is_empty());
        assert_eq!(
            router.translate(&key(VirtualKeyCode::Up)),
            vec![InputEvent::Scroll { offset: 960.0 }]
        );
        assert_eq!(
            router.translate(&key(VirtualKeyCode::Home)),
            vec![InputEvent::Scroll { offset: 0.0 }]
        );
        assert!(router.translate(&key(VirtualKeyCode::A)).is_empty());
    }

    #[test]
    fn resize_changes_page_step() {
        let mut router = InputRouter::new(1000.0, 600.0);
        assert_eq!(
            router.translate(&WindowEvent::Resized(PhysicalSize::new(800, 300))),
            vec![InputEvent::Resized {
                width: 800,
                height: 300
            }]
        );
        assert_eq!(
            router.translate(&key(VirtualKeyCode::PageDown)),
            vec![InputEvent::Scroll { offset: 300.0 }]
        );
    }
}
