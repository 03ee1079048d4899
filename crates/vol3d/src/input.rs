//! Translation of winit input into viewer input.

use vol3d_core::{Modifiers, PointerButton};
use winit::event::{MouseButton, MouseScrollDelta};
use winit::keyboard::{Key, ModifiersState};

/// Pixels of trackpad scroll that count as one wheel line.
const PIXELS_PER_LINE: f64 = 10.0;

/// Maps a mouse button to a pointer button, ignoring back/forward buttons.
pub fn pointer_button(button: MouseButton) -> Option<PointerButton> {
    match button {
        MouseButton::Left => Some(PointerButton::Primary),
        MouseButton::Right => Some(PointerButton::Secondary),
        MouseButton::Middle => Some(PointerButton::Middle),
        _ => None,
    }
}

pub fn modifiers(state: ModifiersState) -> Modifiers {
    Modifiers {
        alt: state.alt_key(),
        ctrl: state.control_key(),
        meta: state.super_key(),
        shift: state.shift_key(),
    }
}

/// Converts a scroll event to wheel lines. Positive zooms in.
pub fn wheel_delta(delta: MouseScrollDelta) -> f32 {
    match delta {
        MouseScrollDelta::LineDelta(_, y) => y,
        MouseScrollDelta::PixelDelta(pos) => (pos.y / PIXELS_PER_LINE) as f32,
    }
}

/// A keyboard command understood by the window host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyCommand {
    ToggleLighting,
    ToggleSurface,
    Close,
}

/// Maps a pressed key to a command. `l` toggles lighting, Escape closes, and
/// any other key toggles the surface.
pub fn key_command(key: &Key) -> KeyCommand {
    use winit::keyboard::NamedKey;

    match key {
        Key::Named(NamedKey::Escape) => KeyCommand::Close,
        Key::Character(c) if c.eq_ignore_ascii_case("l") => KeyCommand::ToggleLighting,
        _ => KeyCommand::ToggleSurface,
    }
}
