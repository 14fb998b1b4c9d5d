use winit::event::{DeviceEvent, ElementState, MouseButton, MouseScrollDelta, WindowEvent};
use winit::keyboard::{Key, NamedKey};

/// Normalized event fed by the winit handlers. Keyboard state the viewer does
/// not react to collapses into `Other`.
#[derive(Debug, Clone)]
pub enum InputEvent {
    MouseMove { dx: f32, dy: f32 },
    Wheel { delta: f32 },
    MouseButton { button: MouseButton, pressed: bool },
    CursorPos { x: f32, y: f32 },
    Key { key: Key, pressed: bool },
    Other,
}

impl InputEvent {
    pub fn from_window_event(ev: &WindowEvent) -> Self {
        match ev {
            WindowEvent::MouseWheel { delta, .. } => {
                let d = match delta {
                    MouseScrollDelta::LineDelta(_, y) => *y,
                    // Touchpad pixels arrive much denser than wheel lines.
                    MouseScrollDelta::PixelDelta(p) => p.y as f32 / 40.0,
                };
                InputEvent::Wheel { delta: d }
            }
            WindowEvent::CursorMoved { position, .. } => {
                InputEvent::CursorPos { x: position.x as f32, y: position.y as f32 }
            }
            WindowEvent::MouseInput { state, button, .. } => {
                InputEvent::MouseButton { button: *button, pressed: *state == ElementState::Pressed }
            }
            WindowEvent::KeyboardInput { event, .. } => InputEvent::Key {
                key: event.logical_key.clone(),
                pressed: event.state == ElementState::Pressed,
            },
            _ => InputEvent::Other,
        }
    }

    pub fn from_device_event(ev: &DeviceEvent) -> Self {
        match ev {
            DeviceEvent::MouseMotion { delta: (dx, dy) } => {
                InputEvent::MouseMove { dx: *dx as f32, dy: *dy as f32 }
            }
            _ => InputEvent::Other,
        }
    }
}

/// Per-frame pointer accumulator. Deltas pile up between frames and are
/// cleared after the update consumes them.
#[derive(Default)]
pub struct Input {
    pub mouse_delta: (f32, f32),
    wheel: f32,
    cursor_pos: Option<(f32, f32)>,
    left_pressed: bool,
    left_clicked: bool,
    left_released: bool,
    right_pressed: bool,
    mode_toggle_pressed: bool,
}

impl Input {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, ev: InputEvent) {
        match ev {
            InputEvent::MouseMove { dx, dy } => {
                self.mouse_delta.0 += dx;
                self.mouse_delta.1 += dy;
            }
            InputEvent::Wheel { delta } => {
                self.wheel += delta;
            }
            InputEvent::MouseButton { button, pressed } => match button {
                MouseButton::Left => {
                    if pressed {
                        self.left_clicked = true;
                    } else if self.left_pressed {
                        self.left_released = true;
                    }
                    self.left_pressed = pressed;
                }
                MouseButton::Right => {
                    self.right_pressed = pressed;
                }
                _ => {}
            },
            InputEvent::CursorPos { x, y } => {
                self.cursor_pos = Some((x, y));
            }
            InputEvent::Key { key, pressed } => {
                if pressed {
                    if let Key::Named(NamedKey::Tab) = key {
                        self.mode_toggle_pressed = true;
                    }
                }
            }
            InputEvent::Other => {}
        }
    }

    pub fn clear_frame(&mut self) {
        self.mouse_delta = (0.0, 0.0);
        self.wheel = 0.0;
        self.left_clicked = false;
        self.left_released = false;
        self.mode_toggle_pressed = false;
    }

    pub fn consume_wheel_delta(&mut self) -> Option<f32> {
        if self.wheel.abs() > 0.0 {
            let delta = self.wheel;
            self.wheel = 0.0;
            Some(delta)
        } else {
            None
        }
    }

    pub fn take_left_click(&mut self) -> bool {
        let was = self.left_clicked;
        self.left_clicked = false;
        was
    }

    pub fn take_left_release(&mut self) -> bool {
        let was = self.left_released;
        self.left_released = false;
        was
    }

    pub fn take_mode_toggle(&mut self) -> bool {
        let was = self.mode_toggle_pressed;
        self.mode_toggle_pressed = false;
        was
    }

    pub fn left_held(&self) -> bool {
        self.left_pressed
    }

    pub fn right_held(&self) -> bool {
        self.right_pressed
    }

    pub fn cursor_position(&self) -> Option<(f32, f32)> {
        self.cursor_pos
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deltas_accumulate_until_cleared() {
        let mut input = Input::new();
        input.push(InputEvent::MouseMove { dx: 3.0, dy: -1.0 });
        input.push(InputEvent::MouseMove { dx: 2.0, dy: 4.0 });
        assert_eq!(input.mouse_delta, (5.0, 3.0));
        input.clear_frame();
        assert_eq!(input.mouse_delta, (0.0, 0.0));
    }

    #[test]
    fn wheel_is_consumed_once() {
        let mut input = Input::new();
        input.push(InputEvent::Wheel { delta: 1.5 });
        assert_eq!(input.consume_wheel_delta(), Some(1.5));
        assert_eq!(input.consume_wheel_delta(), None);
    }

    #[test]
    fn click_edge_fires_once() {
        let mut input = Input::new();
        input.push(InputEvent::MouseButton { button: MouseButton::Left, pressed: true });
        assert!(input.take_left_click());
        assert!(!input.take_left_click());
        assert!(input.left_held());
        input.push(InputEvent::MouseButton { button: MouseButton::Left, pressed: false });
        assert!(input.take_left_release());
        assert!(!input.left_held());
    }
}
