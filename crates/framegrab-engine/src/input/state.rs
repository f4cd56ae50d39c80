use std::collections::HashSet;

use super::types::{InputEvent, Key, KeyState};

/// Keyboard state for the window.
///
/// `keys_down` persists across frames; `keys_pressed` only holds the
/// transitions since the last [`InputState::end_frame`].
#[derive(Debug, Default)]
pub struct InputState {
    pub focused: bool,
    pub keys_down: HashSet<Key>,
    pub keys_pressed: HashSet<Key>,
}

impl InputState {
    pub fn apply_event(&mut self, ev: &InputEvent) {
        match *ev {
            InputEvent::Focused(focused) => {
                self.focused = focused;
                if !focused {
                    // Releases are not delivered while unfocused.
                    self.keys_down.clear();
                }
            }

            InputEvent::Key { key, state, repeat } => match state {
                KeyState::Pressed => {
                    if self.keys_down.insert(key) && !repeat {
                        self.keys_pressed.insert(key);
                    }
                }
                KeyState::Released => {
                    self.keys_down.remove(&key);
                }
            },
        }
    }

    /// Key is currently held.
    pub fn key_down(&self, key: Key) -> bool {
        self.keys_down.contains(&key)
    }

    /// Key went down during the current frame.
    pub fn key_pressed(&self, key: Key) -> bool {
        self.keys_pressed.contains(&key)
    }

    /// Drops per-frame transitions. Called by the runtime after each frame.
    pub fn end_frame(&mut self) {
        self.keys_pressed.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(key: Key, state: KeyState) -> InputEvent {
        InputEvent::Key { key, state, repeat: false }
    }

    #[test]
    fn press_sets_down_and_pressed() {
        let mut input = InputState::default();
        input.apply_event(&key(Key::Escape, KeyState::Pressed));
        assert!(input.key_down(Key::Escape));
        assert!(input.key_pressed(Key::Escape));

        input.end_frame();
        assert!(input.key_down(Key::Escape));
        assert!(!input.key_pressed(Key::Escape));
    }

    #[test]
    fn release_clears_down() {
        let mut input = InputState::default();
        input.apply_event(&key(Key::S, KeyState::Pressed));
        input.apply_event(&key(Key::S, KeyState::Released));
        assert!(!input.key_down(Key::S));
    }

    #[test]
    fn focus_loss_clears_held_keys() {
        let mut input = InputState::default();
        input.apply_event(&InputEvent::Focused(true));
        input.apply_event(&key(Key::S, KeyState::Pressed));
        input.apply_event(&InputEvent::Focused(false));
        assert!(!input.key_down(Key::S));
        assert!(!input.focused);
    }
}
