//! Keyboard and mouse bindings for the fur demo.

use corelib::{FurCommand, MeshSlot};
use winit::event::MouseScrollDelta;
use winit::keyboard::KeyCode;

/// Radians per arrow-key press.
const ORBIT_STEP: f32 = 0.1;
/// Zoom factor per scroll line.
const ZOOM_STEP: f32 = 0.9;
const PIXELS_PER_LINE: f32 = 40.0;

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Action {
    Fur(FurCommand),
    Orbit { yaw: f32, pitch: f32 },
    Zoom(f32),
    Exit,
}

/// Map a pressed key to its action.
pub fn action_for_key(code: KeyCode) -> Option<Action> {
    let action = match code {
        KeyCode::KeyL => Action::Fur(FurCommand::LengthUp),
        KeyCode::KeyK => Action::Fur(FurCommand::LengthDown),
        KeyCode::KeyM => Action::Fur(FurCommand::DensityUp),
        KeyCode::KeyN => Action::Fur(FurCommand::DensityDown),
        KeyCode::Equal => Action::Fur(FurCommand::LayersUp),
        KeyCode::Minus => Action::Fur(FurCommand::LayersDown),
        KeyCode::KeyF => Action::Fur(FurCommand::FlowUp),
        KeyCode::KeyG => Action::Fur(FurCommand::FlowDown),
        KeyCode::Space => Action::Fur(FurCommand::ToggleVisible),
        KeyCode::KeyB => Action::Fur(FurCommand::SwitchMesh(MeshSlot::Primary)),
        KeyCode::KeyR => Action::Fur(FurCommand::SwitchMesh(MeshSlot::Secondary)),
        KeyCode::ArrowLeft => Action::Orbit {
            yaw: -ORBIT_STEP,
            pitch: 0.0,
        },
        KeyCode::ArrowRight => Action::Orbit {
            yaw: ORBIT_STEP,
            pitch: 0.0,
        },
        KeyCode::ArrowUp => Action::Orbit {
            yaw: 0.0,
            pitch: ORBIT_STEP,
        },
        KeyCode::ArrowDown => Action::Orbit {
            yaw: 0.0,
            pitch: -ORBIT_STEP,
        },
        KeyCode::Escape => Action::Exit,
        _ => return None,
    };
    Some(action)
}

/// Scroll up zooms in.
pub fn action_for_scroll(delta: MouseScrollDelta) -> Option<Action> {
    let lines = match delta {
        MouseScrollDelta::LineDelta(_, y) => y,
        MouseScrollDelta::PixelDelta(pos) => pos.y as f32 / PIXELS_PER_LINE,
    };
    if lines == 0.0 {
        return None;
    }
    Some(Action::Zoom(ZOOM_STEP.powf(lines)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fur_keys_follow_the_demo_layout() {
        assert_eq!(action_for_key(KeyCode::KeyL), Some(Action::Fur(FurCommand::LengthUp)));
        assert_eq!(action_for_key(KeyCode::KeyK), Some(Action::Fur(FurCommand::LengthDown)));
        assert_eq!(action_for_key(KeyCode::KeyM), Some(Action::Fur(FurCommand::DensityUp)));
        assert_eq!(action_for_key(KeyCode::KeyN), Some(Action::Fur(FurCommand::DensityDown)));
        assert_eq!(
            action_for_key(KeyCode::KeyR),
            Some(Action::Fur(FurCommand::SwitchMesh(MeshSlot::Secondary)))
        );
        assert_eq!(action_for_key(KeyCode::KeyQ), None);
    }

    #[test]
    fn scroll_up_zooms_in() {
        let Some(Action::Zoom(f)) = action_for_scroll(MouseScrollDelta::LineDelta(0.0, 1.0)) else {
            panic!("expected zoom");
        };
        assert!(f < 1.0);
        let Some(Action::Zoom(f)) = action_for_scroll(MouseScrollDelta::LineDelta(0.0, -2.0)) else {
            panic!("expected zoom");
        };
        assert!(f > 1.0);
        assert_eq!(action_for_scroll(MouseScrollDelta::LineDelta(0.0, 0.0)), None);
    }
}
