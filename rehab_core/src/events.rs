//! Settings-change notification.
//!
//! The progression manager owns a `SettingsBus` and publishes an event after
//! every persisted mutation. Front ends subscribe through the manager
//! instead of a global listener list.

use chrono::NaiveDate;

/// What changed in the user's progress
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SettingsEvent {
    ProgressInitialized { program_id: String },
    OverrideChanged { exercise_id: String },
    OverridesCleared,
    ProgressionAccepted { week: u32 },
    ProgressionDeclined { week: u32 },
    LoadReduced,
    WeekRolledBack { week: u32 },
    ProgramSwitched { program_id: String },
    DayCompleted { days_completed: u32 },
    DayMissed { date: NaiveDate },
}

/// Handle returned by `subscribe`, used to unsubscribe
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Listener = Box<dyn FnMut(&SettingsEvent)>;

/// Publish/subscribe registry for settings changes
#[derive(Default)]
pub struct SettingsBus {
    listeners: Vec<(SubscriptionId, Listener)>,
    next_id: u64,
}

impl SettingsBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F>(&mut self, listener: F) -> SubscriptionId
    where
        F: FnMut(&SettingsEvent) + 'static,
    {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    /// Returns false if the id was not subscribed
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(existing, _)| *existing != id);
        self.listeners.len() != before
    }

    pub fn publish(&mut self, event: &SettingsEvent) {
        tracing::debug!(
            "Publishing {:?} to {} listeners",
            event,
            self.listeners.len()
        );
        for (_, listener) in &mut self.listeners {
            listener(event);
        }
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }
}

impl std::fmt::Debug for SettingsBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SettingsBus")
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn test_publish_reaches_every_listener() {
        let mut bus = SettingsBus::new();
        let seen = Rc::new(RefCell::new(Vec::new()));

        let first = Rc::clone(&seen);
        bus.subscribe(move |event| first.borrow_mut().push(("first", event.clone())));
        let second = Rc::clone(&seen);
        bus.subscribe(move |event| second.borrow_mut().push(("second", event.clone())));

        bus.publish(&SettingsEvent::LoadReduced);

        assert_eq!(seen.borrow().len(), 2);
    }

    #[test]
    fn test_unsubscribe_stops_delivery() {
        let mut bus = SettingsBus::new();
        let count = Rc::new(RefCell::new(0));

        let counter = Rc::clone(&count);
        let id = bus.subscribe(move |_| *counter.borrow_mut() += 1);

        bus.publish(&SettingsEvent::OverridesCleared);
        assert!(bus.unsubscribe(id));
        assert!(!bus.unsubscribe(id));
        bus.publish(&SettingsEvent::OverridesCleared);

        assert_eq!(*count.borrow(), 1);
        assert_eq!(bus.listener_count(), 0);
    }
}
