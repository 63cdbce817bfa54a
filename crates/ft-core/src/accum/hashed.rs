//! Hash map count store for wide value vocabularies.

use std::collections::HashMap;

use ft_common::ValueId;

use super::CountStore;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HashedCounts {
    counts: HashMap<ValueId, u32>,
}

impl CountStore for HashedCounts {
    fn count(&self, value: ValueId) -> u32 {
        self.counts.get(&value).copied().unwrap_or(0)
    }

    fn add(&mut self, value: ValueId, n: u32) -> u32 {
        if n == 0 {
            return 0;
        }
        let c = self.counts.entry(value).or_insert(0);
        let before = *c;
        *c = c.saturating_add(n);
        *c - before
    }

    fn set(&mut self, value: ValueId, count: u32, _correct: u32) -> u32 {
        let prev = if count == 0 {
            self.counts.remove(&value)
        } else {
            self.counts.insert(value, count)
        };
        prev.unwrap_or(0)
    }

    fn subtract(&mut self, value: ValueId, n: u32) -> u32 {
        match self.counts.get_mut(&value) {
            Some(c) => {
                *c = c.saturating_sub(n);
                *c
            }
            None => 0,
        }
    }

    fn remove(&mut self, value: ValueId) -> u32 {
        self.counts.remove(&value).unwrap_or(0)
    }

    fn len(&self) -> usize {
        self.counts.len()
    }

    fn entries(&self) -> Box<dyn Iterator<Item = (ValueId, u32)> + '_> {
        Box::new(self.counts.iter().map(|(&v, &c)| (v, c)))
    }

    fn clear(&mut self) {
        self.counts.clear();
    }
}
