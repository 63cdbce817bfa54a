//! Accumulators: per-context value distributions.
//!
//! An [`Accumulator`] records, for one context key in one number set, how
//! often each target value was observed, and answers probability and ranking
//! queries from those counts. The count store behind it is chosen once at
//! construction by [`AccumulatorKind`]; every representation exposes the same
//! [`CountStore`] capability so the accumulator logic is shared.
//!
//! Absence is never an error: an empty accumulator reports zero probability,
//! no values and `false` for every most-probable query.

mod dense;
mod hashed;
mod hashed_crt;
mod two_slot;
pub mod val_prob;

use std::collections::HashMap;
use std::fmt;

use ft_common::{ValueId, VectSetId, VectorId};

pub use dense::DenseCounts;
pub use ft_config::AccumulatorKind;
pub use hashed::HashedCounts;
pub use hashed_crt::HashedCorrectCounts;
pub use two_slot::TwoSlotCounts;
pub use val_prob::{sort_ranked, ValProb};

/// Fixed-point scale for weight overrides.
pub const WEIGHT_SCALE: f64 = i32::MAX as f64;

/// Value → count storage shared by every accumulator representation.
///
/// Counts saturate instead of wrapping. Implementations never touch the
/// accumulator total; [`Accumulator`] reconciles it from the returned deltas.
pub trait CountStore {
    fn count(&self, value: ValueId) -> u32;

    /// Adds `n` to `value`, returning how much was actually applied.
    fn add(&mut self, value: ValueId, n: u32) -> u32;

    /// Overwrites `value`'s counts, returning the previous count. Zero removes.
    fn set(&mut self, value: ValueId, count: u32, correct: u32) -> u32;

    /// Lowers `value`'s count by `n` without removing it; returns the new count.
    fn subtract(&mut self, value: ValueId, n: u32) -> u32;

    /// Drops `value`, returning its count.
    fn remove(&mut self, value: ValueId) -> u32;

    /// Number of distinct values.
    fn len(&self) -> usize;

    fn entries(&self) -> Box<dyn Iterator<Item = (ValueId, u32)> + '_>;

    fn clear(&mut self);

    fn correct_count(&self, _value: ValueId) -> u32 {
        0
    }

    /// Returns the new correct count, or 0 when correct counts are not kept.
    fn add_correct(&mut self, _value: ValueId, _n: u32) -> u32 {
        0
    }

    fn correct_total(&self) -> u32 {
        0
    }

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Tagged union of the count store representations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Counts {
    TwoSlot(TwoSlotCounts),
    Dense(DenseCounts),
    Hashed(HashedCounts),
    HashedCorrect(HashedCorrectCounts),
}

impl Counts {
    pub fn new(kind: AccumulatorKind) -> Self {
        match kind {
            AccumulatorKind::TwoSlot => Counts::TwoSlot(TwoSlotCounts::default()),
            AccumulatorKind::Dense => Counts::Dense(DenseCounts::default()),
            AccumulatorKind::Hashed => Counts::Hashed(HashedCounts::default()),
            AccumulatorKind::HashedCorrect => Counts::HashedCorrect(HashedCorrectCounts::default()),
        }
    }

    pub fn kind(&self) -> AccumulatorKind {
        match self {
            Counts::TwoSlot(_) => AccumulatorKind::TwoSlot,
            Counts::Dense(_) => AccumulatorKind::Dense,
            Counts::Hashed(_) => AccumulatorKind::Hashed,
            Counts::HashedCorrect(_) => AccumulatorKind::HashedCorrect,
        }
    }

    fn store(&self) -> &dyn CountStore {
        match self {
            Counts::TwoSlot(s) => s,
            Counts::Dense(s) => s,
            Counts::Hashed(s) => s,
            Counts::HashedCorrect(s) => s,
        }
    }

    fn store_mut(&mut self) -> &mut dyn CountStore {
        match self {
            Counts::TwoSlot(s) => s,
            Counts::Dense(s) => s,
            Counts::Hashed(s) => s,
            Counts::HashedCorrect(s) => s,
        }
    }
}

/// Observed distribution of target values for one context key.
#[derive(Debug, Clone, PartialEq)]
pub struct Accumulator {
    vector_code: VectorId,
    vect_set_id: Option<VectSetId>,
    total: u32,
    ignore: bool,
    locked: Option<ValueId>,
    counts: Counts,
    /// Probability overrides, fixed point over [`WEIGHT_SCALE`].
    weights: Option<Box<HashMap<ValueId, u32>>>,
}

impl Accumulator {
    pub fn new(kind: AccumulatorKind) -> Self {
        Self::with_key(kind, 0)
    }

    pub fn with_key(kind: AccumulatorKind, vector_code: VectorId) -> Self {
        Self {
            vector_code,
            vect_set_id: None,
            total: 0,
            ignore: false,
            locked: None,
            counts: Counts::new(kind),
            weights: None,
        }
    }

    pub fn kind(&self) -> AccumulatorKind {
        self.counts.kind()
    }

    pub fn vector_code(&self) -> VectorId {
        self.vector_code
    }

    pub fn set_vector_code(&mut self, code: VectorId) {
        self.vector_code = code;
    }

    pub fn vect_set_id(&self) -> Option<VectSetId> {
        self.vect_set_id
    }

    pub fn set_vect_set_id(&mut self, id: Option<VectSetId>) {
        self.vect_set_id = id;
    }

    pub fn total(&self) -> u32 {
        self.total
    }

    pub fn is_ignore(&self) -> bool {
        self.ignore
    }

    pub fn set_ignore(&mut self, ignore: bool) {
        self.ignore = ignore;
    }

    /// True when nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.total == 0 && self.counts.store().is_empty()
    }

    // ------------------------------------------------------------------
    // Mutation
    // ------------------------------------------------------------------

    /// Records `n` observations of `value`; returns the value's new count.
    pub fn add_count(&mut self, value: ValueId, n: u32) -> u32 {
        if n == 0 {
            return self.count(value);
        }
        let applied = self.counts.store_mut().add(value, n);
        self.total = self.total.saturating_add(applied);
        self.count(value)
    }

    /// Records `n` correct predictions of `value`; returns its new correct count.
    pub fn add_correct_count(&mut self, value: ValueId, n: u32) -> u32 {
        self.counts.store_mut().add_correct(value, n)
    }

    /// Overwrites a value's counts. The total is left unchanged; callers
    /// reconcile it with [`adjust_total`](Self::adjust_total).
    pub fn set_count(&mut self, value: ValueId, count: u32, correct: u32) -> u32 {
        if count == 0 {
            self.drop_weight(value);
        }
        self.counts.store_mut().set(value, count, correct)
    }

    /// Lowers a value's count and the total by `n`. A reduction that reaches
    /// zero removes the value. Returns the count before the reduction.
    pub fn reduce_count(&mut self, value: ValueId, n: u32) -> u32 {
        let before = self.count(value);
        if before == 0 {
            return 0;
        }
        if before <= n {
            self.remove(value);
        } else {
            self.counts.store_mut().subtract(value, n);
            self.total = self.total.saturating_sub(n).max(1);
        }
        before
    }

    /// Drops a value and its share of the total. Returns the removed count.
    ///
    /// Removing the last value resets the total to zero. To keep the other
    /// values' probabilities, save the total first and restore it with
    /// [`adjust_total`](Self::adjust_total).
    pub fn remove(&mut self, value: ValueId) -> u32 {
        let removed = self.counts.store_mut().remove(value);
        self.drop_weight(value);
        if self.counts.store().is_empty() {
            self.total = 0;
        } else {
            self.total = self.total.saturating_sub(removed).max(1);
        }
        removed
    }

    /// Sets the total, floored at 1.
    pub fn adjust_total(&mut self, total: u32) {
        self.total = total.max(1);
    }

    /// Moves the total by `delta`, floored at 1.
    pub fn adjust_total_inc(&mut self, delta: i64) {
        let next = (self.total as i64).saturating_add(delta);
        self.total = next.clamp(1, u32::MAX as i64) as u32;
    }

    /// Overrides `value`'s reported probability with `probability * weight`.
    ///
    /// The result is stored in fixed point and clamped to [0, 1]. Returns
    /// `false` when the value is absent.
    pub fn weight_probability(&mut self, value: ValueId, weight: f64) -> bool {
        if !self.has_value(value) {
            return false;
        }
        let scaled = weighted_fixed_point(self.probability(value), weight);
        self.weights
            .get_or_insert_with(Default::default)
            .insert(value, scaled);
        true
    }

    pub fn clear_weight_overrides(&mut self) {
        self.weights = None;
    }

    fn weight(&self, value: ValueId) -> Option<u32> {
        self.weights.as_ref().and_then(|w| w.get(&value).copied())
    }

    fn drop_weight(&mut self, value: ValueId) {
        if let Some(w) = self.weights.as_mut() {
            w.remove(&value);
            if w.is_empty() {
                self.weights = None;
            }
        }
    }

    /// Adds every count of `other` into this accumulator. Weight overrides
    /// carried by `other` replace this accumulator's for the same value, and
    /// a lock on `other` carries over.
    pub fn merge(&mut self, other: &Accumulator) {
        for (value, count) in other.counts.store().entries() {
            self.add_count(value, count);
            let correct = other.correct_count(value);
            if correct > 0 {
                self.add_correct_count(value, correct);
            }
        }
        if let Some(weights) = other.weights.as_deref() {
            for (&value, &w) in weights {
                if self.has_value(value) {
                    self.weights
                        .get_or_insert_with(Default::default)
                        .insert(value, w);
                }
            }
        }
        if let Some(value) = other.locked {
            self.lock(value);
        }
    }

    /// Moves `from`'s count onto `into`; returns `into`'s new count.
    pub fn merge_value(&mut self, into: ValueId, from: ValueId) -> u32 {
        let c = self.count(from);
        if c > 0 {
            self.add_count(into, c);
            self.remove(from);
        }
        self.count(into)
    }

    /// Collapses the distribution onto `value` with full confidence.
    ///
    /// The value keeps a count equal to the total; later observations still
    /// count but every query reports `value` at probability 1.
    pub fn lock(&mut self, value: ValueId) {
        let total = self.total.max(1);
        self.counts.store_mut().clear();
        self.counts.store_mut().set(value, total, 0);
        self.total = total;
        self.weights = None;
        self.locked = Some(value);
    }

    pub fn is_locked(&self) -> bool {
        self.locked.is_some()
    }

    pub fn locked_value(&self) -> Option<ValueId> {
        self.locked
    }

    pub fn clear(&mut self) {
        self.counts.store_mut().clear();
        self.total = 0;
        self.weights = None;
        self.locked = None;
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    pub fn count(&self, value: ValueId) -> u32 {
        self.counts.store().count(value)
    }

    pub fn correct_count(&self, value: ValueId) -> u32 {
        self.counts.store().correct_count(value)
    }

    pub fn correct_total(&self) -> u32 {
        self.counts.store().correct_total()
    }

    /// Correct predictions over total observations, 0 when either is zero.
    pub fn correctness(&self) -> f64 {
        let crt = self.correct_total();
        if self.total == 0 || crt == 0 {
            return 0.0;
        }
        crt as f64 / self.total as f64
    }

    pub fn has_value(&self, value: ValueId) -> bool {
        self.count(value) > 0
    }

    /// Number of distinct values.
    pub fn value_count(&self) -> usize {
        self.counts.store().len()
    }

    /// Sum of per-value counts. Equals the total unless counts were set or
    /// removed without adjusting it.
    pub fn value_total(&self) -> u64 {
        self.counts.store().entries().map(|(_, c)| c as u64).sum()
    }

    pub fn max_count(&self) -> u32 {
        self.counts.store().entries().map(|(_, c)| c).max().unwrap_or(0)
    }

    /// Least common over most common count; 1.0 is perfectly even.
    pub fn balance(&self) -> f64 {
        let mut entries = self.counts.store().entries().map(|(_, c)| c);
        let Some(first) = entries.next() else {
            return 0.0;
        };
        let (min, max) = entries.fold((first, first), |(lo, hi), c| (lo.min(c), hi.max(c)));
        if max == 0 {
            return 0.0;
        }
        min as f64 / max as f64
    }

    pub fn probability(&self, value: ValueId) -> f64 {
        if let Some(locked) = self.locked {
            return if value == locked { 1.0 } else { 0.0 };
        }
        if self.total == 0 {
            return 0.0;
        }
        if let Some(w) = self.weight(value) {
            return w as f64 / WEIGHT_SCALE;
        }
        match self.count(value) {
            0 => 0.0,
            c => c as f64 / self.total as f64,
        }
    }

    pub fn val_prob(&self, value: ValueId) -> Option<ValProb> {
        let c = self.count(value);
        if self.total == 0 || c == 0 {
            return None;
        }
        if self.locked.is_some_and(|l| l != value) {
            return None;
        }
        Some(ValProb::new(value, c, self.probability(value)))
    }

    /// Every value with its count and probability, in store order.
    pub fn val_ps(&self) -> Vec<ValProb> {
        if self.total == 0 {
            return Vec::new();
        }
        if let Some(locked) = self.locked {
            return vec![ValProb::new(locked, self.count(locked), 1.0)];
        }
        self.counts
            .store()
            .entries()
            .map(|(v, c)| ValProb::new(v, c, self.probability(v)))
            .collect()
    }

    /// [`val_ps`](Self::val_ps) in ranking order.
    pub fn val_ps_sorted(&self) -> Vec<ValProb> {
        let mut list = self.val_ps();
        sort_ranked(&mut list);
        list
    }

    /// Ranked list with, for every value short of the total, a negated entry
    /// holding the complementary count.
    pub fn val_ps_sorted_boolean(&self) -> Vec<ValProb> {
        let mut list = self.val_ps();
        let total = self.total;
        let complements: Vec<ValProb> = list
            .iter()
            .filter(|vp| vp.count < total)
            .map(|vp| {
                let count = total - vp.count;
                ValProb::new(-vp.value, count, count as f64 / total as f64)
            })
            .collect();
        list.extend(complements);
        sort_ranked(&mut list);
        list
    }

    /// Ranked list rescaled toward the values in `amp_set`.
    ///
    /// Values outside `amp_set` are noise: the first `noise_limit` of them in
    /// ranking order (all of them when `None`) give up their probability
    /// mass, which is redistributed over the rest in proportion. With
    /// `keep_noise` false the noise entries are dropped from the result and
    /// every remaining entry is rescaled; otherwise only `amp_set` values are.
    pub fn val_ps_amplified(
        &self,
        amp_set: &[ValueId],
        noise_limit: Option<usize>,
        keep_noise: bool,
    ) -> Vec<ValProb> {
        let mut list = self.val_ps_sorted();
        let full_mass: f64 = list.iter().map(|vp| vp.probability).sum();
        let mut kept_mass = 0.0;
        let mut noise = 0usize;
        for (rank, vp) in list.iter().enumerate() {
            let is_noise =
                !amp_set.contains(&vp.value) && noise_limit.map_or(true, |limit| rank < limit);
            if is_noise {
                noise += 1;
            } else {
                kept_mass += vp.probability;
            }
        }
        if !keep_noise {
            list.retain(|vp| amp_set.contains(&vp.value));
        }
        if list.is_empty() || noise == 0 || kept_mass <= 0.0 {
            return list;
        }
        let scale = full_mass / kept_mass;
        for vp in list.iter_mut() {
            if !keep_noise || amp_set.contains(&vp.value) {
                vp.probability *= scale;
            }
        }
        sort_ranked(&mut list);
        list
    }

    /// Highest-ranked value; ties resolve to the lowest value id.
    pub fn first_most_probable(&self) -> Option<ValProb> {
        self.val_ps().into_iter().min_by(ValProb::rank)
    }

    pub fn is_most_probable_value(&self, value: ValueId) -> bool {
        self.first_most_probable().is_some_and(|vp| vp.value == value)
    }

    /// True when `value` shares the top probability, ties included.
    pub fn is_most_probable_values(&self, value: ValueId) -> bool {
        let p = self.probability(value);
        p > 0.0
            && self
                .first_most_probable()
                .is_some_and(|top| top.probability == p)
    }

    /// Every value sharing the top probability, in ranking order.
    pub fn most_probable(&self) -> Vec<ValProb> {
        let mut list = self.val_ps_sorted();
        if let Some(top) = list.first().map(|vp| vp.probability) {
            list.retain(|vp| vp.probability == top);
        }
        list
    }

    /// Counts, per value, how many accumulators hold it.
    pub fn value_set(&self, into: &mut HashMap<ValueId, u32>) {
        for (v, _) in self.counts.store().entries() {
            *into.entry(v).or_insert(0) += 1;
        }
    }

    /// True when both hold the same values at the same probabilities.
    pub fn compare(&self, other: &Accumulator) -> bool {
        self.total == other.total
            && self.value_count() == other.value_count()
            && self
                .counts
                .store()
                .entries()
                .all(|(v, _)| self.probability(v) == other.probability(v))
    }

    /// Number of differences against `other`, each traced at debug level.
    pub fn diff(&self, other: &Accumulator) -> usize {
        let mut differences = 0;
        let code = self.vector_code;
        if self.total != other.total {
            differences += 1;
            tracing::debug!(vector_code = code, ours = self.total, theirs = other.total, "accumulator total differs");
        }
        if self.vector_code != other.vector_code {
            differences += 1;
            tracing::debug!(vector_code = code, theirs = other.vector_code, "accumulator vector code differs");
        }
        if self.value_count() != other.value_count() {
            differences += 1;
            tracing::debug!(
                vector_code = code,
                ours = self.value_count(),
                theirs = other.value_count(),
                "accumulator value count differs"
            );
        }
        for (value, count) in self.counts.store().entries() {
            let theirs = other.count(value);
            if theirs != count {
                differences += 1;
                tracing::debug!(vector_code = code, value, ours = count, theirs, "accumulator value count differs");
            }
        }
        differences
    }
}

/// `probability * weight` in fixed point, clamped to [0, 1].
fn weighted_fixed_point(probability: f64, weight: f64) -> u32 {
    let scaled = (probability * weight * WEIGHT_SCALE).round();
    if scaled.is_nan() {
        return 0;
    }
    scaled.clamp(0.0, WEIGHT_SCALE) as u32
}

impl fmt::Display for Accumulator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.total == 0 {
            return f.write_str("NONE");
        }
        let parts: Vec<String> = self
            .val_ps_sorted()
            .iter()
            .map(|vp| format!("<{} {}/{}>", vp.value, vp.count, vp.probability))
            .collect();
        f.write_str(&parts.join(" "))
    }
}
