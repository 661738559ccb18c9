#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GameAction {
    Up,
    Down,
    Left,
    Right,
    Fire,
    ButtonA,
    ButtonB,
    ButtonC,
    ButtonD,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KeySample {
    pub has_key: bool,
    pub is_repeat: bool,
    pub action: Option<GameAction>,
}

/// Single pending-action slot; the last press before a cycle wins.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct ActionSlot {
    action: Option<GameAction>,
    new_key: bool,
    key_held: bool,
}

impl ActionSlot {
    pub(crate) fn press(&mut self, action: GameAction) {
        self.action = Some(action);
        self.new_key = true;
        self.key_held = true;
    }

    /// Releasing a key other than the pending one keeps the pending action held.
    pub(crate) fn release(&mut self, action: GameAction) {
        if self.action == Some(action) {
            self.key_held = false;
        }
    }

    pub(crate) fn clear(&mut self) {
        *self = Self::default();
    }

    /// Consumes the slot for one cycle. A press that was already released
    /// still dispatches once.
    pub(crate) fn sample(&mut self) -> KeySample {
        let has_key = self.new_key || self.key_held;
        let sample = KeySample {
            has_key,
            is_repeat: self.key_held && !self.new_key,
            action: if has_key { self.action } else { None },
        };
        self.new_key = false;
        sample
    }
}
