//! Small vector of value slots scanned linearly.

use ft_common::ValueId;

use super::CountStore;

/// Insertion-ordered `(value, count)` pairs; grows by one per new value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DenseCounts {
    slots: Vec<(ValueId, u32)>,
}

impl DenseCounts {
    fn find(&self, value: ValueId) -> Option<usize> {
        self.slots.iter().position(|(v, _)| *v == value)
    }
}

impl CountStore for DenseCounts {
    fn count(&self, value: ValueId) -> u32 {
        self.find(value).map_or(0, |i| self.slots[i].1)
    }

    fn add(&mut self, value: ValueId, n: u32) -> u32 {
        if n == 0 {
            return 0;
        }
        match self.find(value) {
            Some(i) => {
                let c = &mut self.slots[i].1;
                let before = *c;
                *c = c.saturating_add(n);
                *c - before
            }
            None => {
                self.slots.reserve_exact(1);
                self.slots.push((value, n));
                n
            }
        }
    }

    fn set(&mut self, value: ValueId, count: u32, _correct: u32) -> u32 {
        let prev = self.count(value);
        if count == 0 {
            self.remove(value);
        } else {
            match self.find(value) {
                Some(i) => self.slots[i].1 = count,
                None => self.slots.push((value, count)),
            }
        }
        prev
    }

    fn subtract(&mut self, value: ValueId, n: u32) -> u32 {
        match self.find(value) {
            Some(i) => {
                let c = &mut self.slots[i].1;
                *c = c.saturating_sub(n);
                *c
            }
            None => 0,
        }
    }

    fn remove(&mut self, value: ValueId) -> u32 {
        match self.find(value) {
            Some(i) => {
                let (_, c) = self.slots.remove(i);
                self.slots.shrink_to_fit();
                c
            }
            None => 0,
        }
    }

    fn len(&self) -> usize {
        self.slots.len()
    }

    fn entries(&self) -> Box<dyn Iterator<Item = (ValueId, u32)> + '_> {
        Box::new(self.slots.iter().copied())
    }

    fn clear(&mut self) {
        self.slots = Vec::new();
    }
}
