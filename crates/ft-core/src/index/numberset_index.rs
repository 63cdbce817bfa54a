use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use ft_combinatorics::{DependentTuple, NumberSet};
use ft_common::{Error, Result, SetNumber, ValueId, VectorId};

use super::{lock, read, write};
use crate::accum::{Accumulator, AccumulatorKind};
use crate::vectset::CompactionMap;

/// Shared handle to one accumulator. Each accumulator is its own lock.
pub type AccumHandle = Arc<Mutex<Accumulator>>;

/// Accumulators of one number set, keyed by context vector id.
///
/// The table lock is only written to insert or drop entries; counting goes
/// through the per-accumulator mutex under a read guard.
#[derive(Debug)]
pub struct NumberSetIndex {
    set_number: SetNumber,
    number_set: NumberSet,
    dependent: Option<Vec<DependentTuple>>,
    context: bool,
    kind: AccumulatorKind,
    turned_off: AtomicBool,
    set_default: Mutex<Accumulator>,
    accums: RwLock<HashMap<VectorId, AccumHandle>>,
}

impl NumberSetIndex {
    /// Index for `number_set`. Sets that do not include `focus` are context
    /// sets.
    pub fn new(
        set_number: SetNumber,
        number_set: NumberSet,
        kind: AccumulatorKind,
        focus: usize,
    ) -> Self {
        let context = !number_set.contains(&focus);
        Self {
            set_number,
            number_set,
            dependent: None,
            context,
            kind,
            turned_off: AtomicBool::new(false),
            set_default: Mutex::new(Accumulator::new(kind)),
            accums: RwLock::new(HashMap::new()),
        }
    }

    /// Reads dependent tiers per position as laid out in `tuples`.
    pub fn with_dependent(mut self, tuples: Vec<DependentTuple>) -> Self {
        self.dependent = Some(tuples);
        self
    }

    pub fn set_number(&self) -> SetNumber {
        self.set_number
    }

    pub fn number_set(&self) -> &[usize] {
        &self.number_set
    }

    pub fn dependent(&self) -> Option<&[DependentTuple]> {
        self.dependent.as_deref()
    }

    pub fn is_context(&self) -> bool {
        self.context
    }

    pub fn kind(&self) -> AccumulatorKind {
        self.kind
    }

    pub fn is_turned_off(&self) -> bool {
        self.turned_off.load(AtomicOrdering::Relaxed)
    }

    pub fn set_turned_off(&self, off: bool) {
        self.turned_off.store(off, AtomicOrdering::Relaxed);
    }

    /// Distribution of values over every example this set saw.
    pub fn set_default(&self) -> Result<MutexGuard<'_, Accumulator>> {
        lock(&self.set_default, "set default accumulator")
    }

    pub fn get(&self, vid: VectorId) -> Result<Option<AccumHandle>> {
        Ok(read(&self.accums, "number set index")?.get(&vid).cloned())
    }

    /// Returns the accumulator for `vid`, creating an empty one if needed.
    /// The flag is true when this call created it.
    pub fn get_or_create(&self, vid: VectorId) -> Result<(AccumHandle, bool)> {
        self.get_or_create_with(vid, |_| Ok(()))
    }

    /// Like [`get_or_create`](Self::get_or_create), running `init` on a new
    /// accumulator before any other thread can see it.
    pub fn get_or_create_with<F>(&self, vid: VectorId, init: F) -> Result<(AccumHandle, bool)>
    where
        F: FnOnce(&mut Accumulator) -> Result<()>,
    {
        if let Some(acc) = self.get(vid)? {
            return Ok((acc, false));
        }
        let mut table = write(&self.accums, "number set index")?;
        if let Some(acc) = table.get(&vid) {
            return Ok((acc.clone(), false));
        }
        let mut acc = Accumulator::with_key(self.kind, vid);
        init(&mut acc)?;
        let handle = Arc::new(Mutex::new(acc));
        table.insert(vid, handle.clone());
        Ok((handle, true))
    }

    /// Stores `acc` under its vector code; returns the one it replaced.
    pub fn put(&self, acc: Accumulator) -> Result<Option<AccumHandle>> {
        let vid = acc.vector_code();
        Ok(write(&self.accums, "number set index")?.insert(vid, Arc::new(Mutex::new(acc))))
    }

    /// Counts `value` on an existing accumulator. Returns the new count, or
    /// `None` when `vid` has no accumulator.
    pub fn add_count(&self, vid: VectorId, value: ValueId) -> Result<Option<u32>> {
        match self.get(vid)? {
            Some(acc) => Ok(Some(lock(&acc, "accumulator")?.add_count(value, 1))),
            None => Ok(None),
        }
    }

    /// Bumps an existing accumulator's total without recording a value.
    pub fn add_total(&self, vid: VectorId) -> Result<bool> {
        match self.get(vid)? {
            Some(acc) => {
                lock(&acc, "accumulator")?.adjust_total_inc(1);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn remove(&self, vid: VectorId) -> Result<bool> {
        Ok(write(&self.accums, "number set index")?.remove(&vid).is_some())
    }

    pub fn len(&self) -> usize {
        self.accums.read().map(|t| t.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Handles to every accumulator, in no particular order.
    pub fn accumulators(&self) -> Result<Vec<AccumHandle>> {
        Ok(read(&self.accums, "number set index")?.values().cloned().collect())
    }

    /// Sum of every accumulator's total.
    pub fn total_sum(&self) -> Result<u64> {
        let table = read(&self.accums, "number set index")?;
        let mut sum = 0u64;
        for acc in table.values() {
            sum += lock(acc, "accumulator")?.total() as u64;
        }
        Ok(sum)
    }

    /// Drops `value` everywhere; accumulators left without values go too.
    ///
    /// With `retain_probability` the totals stay put, so the remaining values
    /// keep their probabilities. Returns the number of counts removed.
    pub fn remove_all_value(&self, value: ValueId, retain_probability: bool) -> Result<u64> {
        let mut table = write(&self.accums, "number set index")?;
        let mut removed = 0u64;
        let mut emptied = Vec::new();
        for (&vid, acc) in table.iter() {
            let mut acc = lock(acc, "accumulator")?;
            let total = acc.total();
            let c = acc.remove(value);
            if acc.value_count() == 0 {
                emptied.push(vid);
            } else if c > 0 {
                removed += c as u64;
                if retain_probability {
                    acc.adjust_total(total);
                }
            }
        }
        for vid in &emptied {
            table.remove(vid);
        }
        Ok(removed)
    }

    /// Drops accumulators holding no values. Returns how many went.
    pub fn remove_all_empty(&self) -> Result<usize> {
        let mut table = write(&self.accums, "number set index")?;
        let before = table.len();
        let mut poisoned = false;
        table.retain(|_, acc| match acc.lock() {
            Ok(a) => a.value_count() > 0,
            Err(_) => {
                poisoned = true;
                true
            }
        });
        if poisoned {
            return Err(Error::LockPoisoned("accumulator".to_string()));
        }
        Ok(before - table.len())
    }

    /// Keeps only the listed vector ids.
    pub fn remove_all_vectors_except(&self, keep: &HashSet<VectorId>) -> Result<usize> {
        let mut table = write(&self.accums, "number set index")?;
        let before = table.len();
        table.retain(|vid, _| keep.contains(vid));
        Ok(before - table.len())
    }

    /// Drops accumulators whose total is at most `max_total`.
    pub fn remove_below_total(&self, max_total: u32) -> Result<usize> {
        let mut table = write(&self.accums, "number set index")?;
        let mut doomed = Vec::new();
        for (&vid, acc) in table.iter() {
            if lock(acc, "accumulator")?.total() <= max_total {
                doomed.push(vid);
            }
        }
        for vid in &doomed {
            table.remove(vid);
        }
        Ok(doomed.len())
    }

    /// Resets every total to the sum of its counts.
    pub fn sync_totals(&self) -> Result<usize> {
        let table = read(&self.accums, "number set index")?;
        let mut changed = 0;
        for acc in table.values() {
            let mut acc = lock(acc, "accumulator")?;
            let actual = u32::try_from(acc.value_total()).unwrap_or(u32::MAX);
            if acc.total() != actual {
                changed += 1;
            }
            acc.adjust_total(actual);
        }
        Ok(changed)
    }

    /// Rebases every total on how often `value` was seen there, optionally
    /// removing the value itself. The set default follows the same rule.
    pub fn rebase_totals_with_value(&self, value: ValueId, remove: bool) -> Result<()> {
        {
            let mut default = self.set_default()?;
            let seen = default.count(value);
            if remove {
                default.remove(value);
            }
            default.adjust_total(seen);
        }
        let mut table = write(&self.accums, "number set index")?;
        let mut emptied = Vec::new();
        for (&vid, acc) in table.iter() {
            let mut acc = lock(acc, "accumulator")?;
            let seen = acc.count(value);
            if remove {
                acc.remove(value);
                if acc.value_count() == 0 {
                    emptied.push(vid);
                }
            }
            if seen > 0 {
                acc.adjust_total(seen);
            }
        }
        for vid in &emptied {
            table.remove(vid);
        }
        Ok(())
    }

    /// How many accumulators hold each value.
    pub fn value_set(&self) -> Result<HashMap<ValueId, u32>> {
        let table = read(&self.accums, "number set index")?;
        let mut map = HashMap::new();
        for acc in table.values() {
            lock(acc, "accumulator")?.value_set(&mut map);
        }
        Ok(map)
    }

    /// Number of accumulators that have seen `value`.
    pub fn value_count(&self, value: ValueId) -> Result<usize> {
        let table = read(&self.accums, "number set index")?;
        let mut n = 0;
        for acc in table.values() {
            if lock(acc, "accumulator")?.count(value) > 0 {
                n += 1;
            }
        }
        Ok(n)
    }

    /// Highest count of `value` in any one accumulator.
    pub fn value_max_count(&self, value: ValueId) -> Result<u32> {
        let table = read(&self.accums, "number set index")?;
        let mut max = 0;
        for acc in table.values() {
            max = max.max(lock(acc, "accumulator")?.count(value));
        }
        Ok(max)
    }

    /// Snapshot ordered by top probability, then by how many values each
    /// holds, both descending.
    pub fn sorted_accumulators(&self) -> Result<Vec<Accumulator>> {
        let table = read(&self.accums, "number set index")?;
        let mut list = Vec::with_capacity(table.len());
        for acc in table.values() {
            list.push(lock(acc, "accumulator")?.clone());
        }
        drop(table);
        let top = |a: &Accumulator| a.first_most_probable().map_or(0.0, |vp| vp.probability);
        list.sort_by(|a, b| {
            top(b)
                .total_cmp(&top(a))
                .then_with(|| b.value_count().cmp(&a.value_count()))
                .then_with(|| a.vector_code().cmp(&b.vector_code()))
        });
        Ok(list)
    }

    /// Folds `other` into this index: shared keys merge, new keys are copied.
    ///
    /// Copied accumulators get their vect-set ids translated through `remap`
    /// when the other index refers to a different store. Returns the
    /// resulting size.
    pub fn merge(&self, other: &NumberSetIndex, remap: Option<&CompactionMap>) -> Result<usize> {
        if std::ptr::eq(self, other) {
            return Ok(self.len());
        }
        let theirs = read(&other.accums, "number set index")?;
        let mut mine = write(&self.accums, "number set index")?;
        if mine.is_empty() {
            self.set_turned_off(other.is_turned_off());
        }
        let mut merged = 0usize;
        for (&vid, acc) in theirs.iter() {
            let acc = lock(acc, "accumulator")?;
            match mine.get(&vid) {
                Some(existing) => {
                    lock(existing, "accumulator")?.merge(&acc);
                    merged += 1;
                }
                None => {
                    let mut copy = acc.clone();
                    if let Some(map) = remap {
                        copy.set_vect_set_id(map.apply(copy.vect_set_id()));
                    }
                    mine.insert(vid, Arc::new(Mutex::new(copy)));
                }
            }
        }
        let size = mine.len();
        drop(mine);
        drop(theirs);
        let theirs_default = other.set_default()?.clone();
        self.set_default()?.merge(&theirs_default);
        tracing::debug!(
            set_number = self.set_number.0,
            merged,
            size,
            "number set index merged"
        );
        Ok(size)
    }

    pub fn clear(&self) -> Result<()> {
        write(&self.accums, "number set index")?.clear();
        self.set_default()?.clear();
        Ok(())
    }

    /// Rewrites every accumulator's vect-set id after store compaction.
    /// Returns how many ids changed.
    pub fn update_vect_set_ids(&mut self, map: &CompactionMap) -> Result<usize> {
        let table = self
            .accums
            .get_mut()
            .map_err(|_| Error::LockPoisoned("number set index".to_string()))?;
        let mut changed = 0;
        for acc in table.values() {
            let mut acc = lock(acc, "accumulator")?;
            let old = acc.vect_set_id();
            if old.is_none() {
                continue;
            }
            let new = map.apply(old);
            if new != old {
                acc.set_vect_set_id(new);
                changed += 1;
            }
        }
        Ok(changed)
    }
}
