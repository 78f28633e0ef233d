//! Registered strategies and their operator-visible state.

use lab_core::{Error, Result, StrategyStatus, TimestampMs};
use lab_strategy::Strategy;

/// One registered strategy.
pub struct StrategySlot {
    pub(crate) name: String,
    pub(crate) strategy: Box<dyn Strategy>,
    pub(crate) status: StrategyStatus,
    pub(crate) last_error: Option<String>,
    pub(crate) last_tick_ms: Option<TimestampMs>,
    pub(crate) ticks_run: u64,
    pub(crate) errors: u64,
}

impl StrategySlot {
    fn new(strategy: Box<dyn Strategy>) -> Self {
        Self {
            name: strategy.name().to_string(),
            strategy,
            status: StrategyStatus::Running,
            last_error: None,
            last_tick_ms: None,
            ticks_run: 0,
            errors: 0,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn symbols(&self) -> &[String] {
        self.strategy.symbols()
    }

    pub fn status(&self) -> StrategyStatus {
        self.status
    }

    /// Most recent callback failure, kept until the next one.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Time of the last successful `on_tick`.
    pub fn last_tick_ms(&self) -> Option<TimestampMs> {
        self.last_tick_ms
    }

    /// Successful `on_tick` calls.
    pub fn ticks_run(&self) -> u64 {
        self.ticks_run
    }

    /// Failed callbacks.
    pub fn errors(&self) -> u64 {
        self.errors
    }

    pub fn is_running(&self) -> bool {
        self.status == StrategyStatus::Running
    }

    pub(crate) fn record_error(&mut self, message: String) {
        self.errors += 1;
        self.last_error = Some(message);
    }
}

/// Registration table in insertion order.
#[derive(Default)]
pub struct Roster {
    slots: Vec<StrategySlot>,
}

impl Roster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a strategy. Names must be unique.
    pub fn register(&mut self, strategy: Box<dyn Strategy>) -> Result<&mut StrategySlot> {
        let name = strategy.name().to_string();
        if self.get(&name).is_some() {
            return Err(Error::config(format!("strategy '{}' registered twice", name)));
        }
        self.slots.push(StrategySlot::new(strategy));
        let idx = self.slots.len() - 1;
        Ok(&mut self.slots[idx])
    }

    pub fn get(&self, name: &str) -> Option<&StrategySlot> {
        self.slots.iter().find(|s| s.name == name)
    }

    fn get_mut(&mut self, name: &str) -> Option<&mut StrategySlot> {
        self.slots.iter_mut().find(|s| s.name == name)
    }

    /// Set a strategy's status. Returns false for unknown names.
    pub fn set_status(&mut self, name: &str, status: StrategyStatus) -> bool {
        match self.get_mut(name) {
            Some(slot) => {
                slot.status = status;
                true
            }
            None => false,
        }
    }

    /// Strategies registered.
    pub fn loaded(&self) -> usize {
        self.slots.len()
    }

    /// Strategies currently running.
    pub fn active(&self) -> usize {
        self.slots.iter().filter(|s| s.is_running()).count()
    }

    pub fn iter(&self) -> impl Iterator<Item = &StrategySlot> {
        self.slots.iter()
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut StrategySlot> {
        self.slots.iter_mut()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lab_strategy::TrendFollower;

    fn trend(name: &str) -> Box<dyn Strategy> {
        Box::new(TrendFollower::new(name, "BTCUSDT", 0.01, 5, 100.0))
    }

    #[test]
    fn test_register_and_count() {
        let mut roster = Roster::new();
        roster.register(trend("a")).unwrap();
        roster.register(trend("b")).unwrap();

        assert_eq!(roster.loaded(), 2);
        assert_eq!(roster.active(), 2);
        let names: Vec<&str> = roster.iter().map(|s| s.name()).collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let mut roster = Roster::new();
        roster.register(trend("a")).unwrap();
        assert!(matches!(roster.register(trend("a")), Err(Error::Config(_))));
        assert_eq!(roster.loaded(), 1);
    }

    #[test]
    fn test_pause_and_resume() {
        let mut roster = Roster::new();
        roster.register(trend("a")).unwrap();

        assert!(roster.set_status("a", StrategyStatus::Stopped));
        assert_eq!(roster.active(), 0);
        assert_eq!(roster.get("a").unwrap().status(), StrategyStatus::Stopped);

        assert!(roster.set_status("a", StrategyStatus::Running));
        assert_eq!(roster.active(), 1);

        assert!(!roster.set_status("missing", StrategyStatus::Stopped));
    }

    #[test]
    fn test_record_error_keeps_status() {
        let mut roster = Roster::new();
        let slot = roster.register(trend("a")).unwrap();
        slot.record_error("boom".to_string());

        let slot = roster.get("a").unwrap();
        assert_eq!(slot.last_error(), Some("boom"));
        assert_eq!(slot.errors(), 1);
        assert!(slot.is_running());
    }
}
