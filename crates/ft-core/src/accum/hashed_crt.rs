//! Hash map count store that also tracks correct-prediction counts.
//!
//! Correct counts are recorded during evaluation runs: each time the
//! accumulator's prediction for a context matched the observed value.

use std::collections::HashMap;

use ft_common::ValueId;

use super::CountStore;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Slot {
    count: u32,
    correct: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HashedCorrectCounts {
    slots: HashMap<ValueId, Slot>,
    correct_total: u32,
}

impl CountStore for HashedCorrectCounts {
    fn count(&self, value: ValueId) -> u32 {
        self.slots.get(&value).map_or(0, |s| s.count)
    }

    fn correct_count(&self, value: ValueId) -> u32 {
        self.slots.get(&value).map_or(0, |s| s.correct)
    }

    fn correct_total(&self) -> u32 {
        self.correct_total
    }

    fn add(&mut self, value: ValueId, n: u32) -> u32 {
        if n == 0 {
            return 0;
        }
        let slot = self.slots.entry(value).or_default();
        let before = slot.count;
        slot.count = slot.count.saturating_add(n);
        slot.count - before
    }

    fn add_correct(&mut self, value: ValueId, n: u32) -> u32 {
        // correct counts only attach to values that were trained
        let Some(slot) = self.slots.get_mut(&value) else {
            return 0;
        };
        let before = slot.correct;
        slot.correct = slot.correct.saturating_add(n);
        self.correct_total = self.correct_total.saturating_add(slot.correct - before);
        slot.correct
    }

    fn set(&mut self, value: ValueId, count: u32, correct: u32) -> u32 {
        if count == 0 {
            return self.remove(value);
        }
        let slot = self.slots.entry(value).or_default();
        let prev = slot.count;
        self.correct_total = self
            .correct_total
            .saturating_sub(slot.correct)
            .saturating_add(correct);
        *slot = Slot { count, correct };
        prev
    }

    fn subtract(&mut self, value: ValueId, n: u32) -> u32 {
        match self.slots.get_mut(&value) {
            Some(s) => {
                s.count = s.count.saturating_sub(n);
                s.count
            }
            None => 0,
        }
    }

    fn remove(&mut self, value: ValueId) -> u32 {
        match self.slots.remove(&value) {
            Some(s) => {
                self.correct_total = self.correct_total.saturating_sub(s.correct);
                s.count
            }
            None => 0,
        }
    }

    fn len(&self) -> usize {
        self.slots.len()
    }

    fn entries(&self) -> Box<dyn Iterator<Item = (ValueId, u32)> + '_> {
        Box::new(self.slots.iter().map(|(&v, s)| (v, s.count)))
    }

    fn clear(&mut self) {
        self.slots.clear();
        self.correct_total = 0;
    }
}
