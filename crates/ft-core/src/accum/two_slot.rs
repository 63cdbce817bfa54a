//! Two inline slots for contexts with at most two distinct values.

use ft_common::ValueId;

use super::CountStore;

/// Holds up to two values without touching the heap.
///
/// A third distinct value is not stored: `add` reports zero applied so the
/// accumulator total stays equal to the slot sum.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TwoSlotCounts {
    slots: [Option<(ValueId, u32)>; 2],
}

impl TwoSlotCounts {
    fn slot(&self, value: ValueId) -> Option<usize> {
        self.slots
            .iter()
            .position(|s| matches!(s, Some((v, _)) if *v == value))
    }
}

impl CountStore for TwoSlotCounts {
    fn count(&self, value: ValueId) -> u32 {
        self.slot(value)
            .and_then(|i| self.slots[i])
            .map_or(0, |(_, c)| c)
    }

    fn add(&mut self, value: ValueId, n: u32) -> u32 {
        if n == 0 {
            return 0;
        }
        if let Some(i) = self.slot(value) {
            if let Some((_, c)) = self.slots[i].as_mut() {
                let before = *c;
                *c = c.saturating_add(n);
                return *c - before;
            }
        }
        match self.slots.iter_mut().find(|s| s.is_none()) {
            Some(empty) => {
                *empty = Some((value, n));
                n
            }
            None => 0,
        }
    }

    fn set(&mut self, value: ValueId, count: u32, _correct: u32) -> u32 {
        let prev = self.count(value);
        if count == 0 {
            self.remove(value);
        } else if let Some(i) = self.slot(value) {
            self.slots[i] = Some((value, count));
        } else if let Some(empty) = self.slots.iter_mut().find(|s| s.is_none()) {
            *empty = Some((value, count));
        }
        prev
    }

    fn subtract(&mut self, value: ValueId, n: u32) -> u32 {
        match self.slot(value).and_then(|i| self.slots[i].as_mut()) {
            Some((_, c)) => {
                *c = c.saturating_sub(n);
                *c
            }
            None => 0,
        }
    }

    fn remove(&mut self, value: ValueId) -> u32 {
        match self.slot(value) {
            Some(i) => {
                let removed = self.slots[i].map_or(0, |(_, c)| c);
                self.slots[i] = None;
                // keep the occupied slot first so iteration order is insertion order
                if i == 0 {
                    self.slots.swap(0, 1);
                }
                removed
            }
            None => 0,
        }
    }

    fn len(&self) -> usize {
        self.slots.iter().flatten().count()
    }

    fn entries(&self) -> Box<dyn Iterator<Item = (ValueId, u32)> + '_> {
        Box::new(self.slots.iter().flatten().copied())
    }

    fn clear(&mut self) {
        self.slots = [None, None];
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_third_value_is_dropped() {
        let mut s = TwoSlotCounts::default();
        assert_eq!(s.add(1, 2), 2);
        assert_eq!(s.add(0, 1), 1);
        assert_eq!(s.add(7, 5), 0);
        assert_eq!(s.count(7), 0);
        assert_eq!(s.len(), 2);
    }

    #[test]
    fn test_zero_add_takes_no_slot() {
        let mut s = TwoSlotCounts::default();
        assert_eq!(s.add(1, 0), 0);
        assert_eq!(s.add(2, 0), 0);
        assert_eq!(s.len(), 0);
        assert_eq!(s.add(3, 4), 4);
        assert_eq!(s.count(3), 4);
    }

    #[test]
    fn test_remove_frees_slot() {
        let mut s = TwoSlotCounts::default();
        s.add(1, 2);
        s.add(0, 1);
        assert_eq!(s.remove(1), 2);
        assert_eq!(s.entries().collect::<Vec<_>>(), vec![(0, 1)]);
        assert_eq!(s.add(7, 4), 4);
        assert_eq!(s.count(7), 4);
    }
}
