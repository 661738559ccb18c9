use super::entity::EntityId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ControllerId(pub u32);

/// Receiver of alarms and step notifications: an entity or a controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ListenerId {
    Entity(EntityId),
    Controller(ControllerId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Alarm {
    pub target_cycle: u64,
    pub timer_id: u32,
    pub listener: ListenerId,
}

/// Alarms fire on the exact cycle they target and are then forgotten.
#[derive(Debug, Default)]
pub struct AlarmRegistry {
    alarms: Vec<Alarm>,
}

impl AlarmRegistry {
    pub fn schedule(
        &mut self,
        current_cycle: u64,
        delta: u64,
        timer_id: u32,
        listener: ListenerId,
    ) {
        self.alarms.push(Alarm {
            target_cycle: current_cycle.saturating_add(delta),
            timer_id,
            listener,
        });
    }

    /// Removes and returns the oldest alarm due on `cycle`. Alarms scheduled
    /// for the same cycle while firing are picked up by later calls.
    pub fn take_due(&mut self, cycle: u64) -> Option<Alarm> {
        let index = self
            .alarms
            .iter()
            .position(|alarm| alarm.target_cycle == cycle)?;
        Some(self.alarms.remove(index))
    }

    pub fn remove_listener(&mut self, listener: ListenerId) -> usize {
        let before = self.alarms.len();
        self.alarms.retain(|alarm| alarm.listener != listener);
        before - self.alarms.len()
    }

    pub fn clear(&mut self) {
        self.alarms.clear();
    }

    pub fn len(&self) -> usize {
        self.alarms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.alarms.is_empty()
    }

    pub fn pending(&self) -> &[Alarm] {
        &self.alarms
    }
}

#[derive(Debug, Default)]
pub struct StepRegistry {
    listeners: Vec<ListenerId>,
}

impl StepRegistry {
    pub fn register(&mut self, listener: ListenerId) -> bool {
        if self.listeners.contains(&listener) {
            return false;
        }
        self.listeners.push(listener);
        true
    }

    pub fn unregister(&mut self, listener: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|registered| *registered != listener);
        before != self.listeners.len()
    }

    pub fn contains(&self, listener: ListenerId) -> bool {
        self.listeners.contains(&listener)
    }

    pub fn snapshot(&self) -> Vec<ListenerId> {
        self.listeners.clone()
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }
}
