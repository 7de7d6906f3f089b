//! Named counters for native calls and other discrete events

use std::collections::HashMap;

#[derive(Debug, Default)]
pub struct CallCounter {
    counters: HashMap<&'static str, u64>,
}

impl CallCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one occurrence of `name`.
    pub fn record(&mut self, name: &'static str) {
        self.add(name, 1);
    }

    pub fn add(&mut self, name: &'static str, value: u64) {
        *self.counters.entry(name).or_insert(0) += value;
    }

    pub fn get(&self, name: &str) -> u64 {
        self.counters.get(name).copied().unwrap_or(0)
    }

    /// Sum over every counter.
    pub fn total(&self) -> u64 {
        self.counters.values().sum()
    }

    pub fn reset_all(&mut self) {
        self.counters.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, u64)> + '_ {
        self.counters.iter().map(|(name, value)| (*name, *value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_per_name() {
        let mut counter = CallCounter::new();
        counter.record("new_component");
        counter.record("new_component");
        counter.add("new_system", 3);

        assert_eq!(counter.get("new_component"), 2);
        assert_eq!(counter.get("new_system"), 3);
        assert_eq!(counter.get("progress"), 0);
        assert_eq!(counter.total(), 5);

        counter.reset_all();
        assert_eq!(counter.total(), 0);
    }
}
