// SPDX-License-Identifier: CEPL-1.0
use cubic_math::Motion;
use cubic_platform::winit::keyboard::KeyCode;

/// Arrow keys drive forward/back and turning, A/Z lift and lower.
pub fn motion_for(key: KeyCode) -> Option<Motion> {
    match key {
        KeyCode::ArrowUp => Some(Motion::FORWARD),
        KeyCode::ArrowDown => Some(Motion::BACKWARD),
        KeyCode::KeyA => Some(Motion::UP),
        KeyCode::KeyZ => Some(Motion::DOWN),
        KeyCode::ArrowLeft => Some(Motion::TURN_LEFT),
        KeyCode::ArrowRight => Some(Motion::TURN_RIGHT),
        _ => None,
    }
}

/// Motions whose keys are currently held down.
#[derive(Clone, Copy, Debug, Default)]
pub struct HeldKeys {
    motion: Motion,
}

impl HeldKeys {
    pub fn set(&mut self, key: KeyCode, pressed: bool) {
        if let Some(m) = motion_for(key) {
            self.motion.set(m, pressed);
        }
    }

    pub fn motion(&self) -> Motion {
        self.motion
    }

    /// Focus loss would otherwise leave keys stuck down.
    pub fn clear(&mut self) {
        self.motion = Motion::empty();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn held_keys_accumulate_and_release() {
        let mut keys = HeldKeys::default();
        keys.set(KeyCode::ArrowUp, true);
        keys.set(KeyCode::ArrowLeft, true);
        keys.set(KeyCode::Space, true);
        assert_eq!(keys.motion(), Motion::FORWARD | Motion::TURN_LEFT);

        keys.set(KeyCode::ArrowUp, false);
        assert_eq!(keys.motion(), Motion::TURN_LEFT);

        keys.clear();
        assert!(keys.motion().is_empty());
    }

    #[test]
    fn vertical_keys() {
        assert_eq!(motion_for(KeyCode::KeyA), Some(Motion::UP));
        assert_eq!(motion_for(KeyCode::KeyZ), Some(Motion::DOWN));
        assert_eq!(motion_for(KeyCode::KeyQ), None);
    }
}
