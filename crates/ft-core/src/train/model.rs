//! A trained (or training) model: one index per active number set.

use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};

use ft_combinatorics::{dependent_subsets, full_set, NumberSet};
use ft_common::{Error, ModelId, Result, SetNumber, ValueId, VectorId};
use ft_config::{validate_trainer, TrainerConfig};
use serde::Serialize;

use super::frame::Frame;
use crate::accum::{Accumulator, ValProb};
use crate::index::{self, NumberSetIndex};
use crate::logging::event_names;
use crate::vectset::{CompactionMap, VectorSetStore};

/// Best guess of one number set for one frame.
#[derive(Debug, Clone, Serialize)]
pub struct Prediction {
    pub set_number: SetNumber,
    pub number_set: NumberSet,
    pub key: VectorId,
    pub total: u32,
    pub best: ValProb,
}

/// Number sets, their accumulators and the raw vector store for one window
/// configuration.
#[derive(Debug)]
pub struct Model {
    id: ModelId,
    config: TrainerConfig,
    full: NumberSet,
    indices: Vec<NumberSetIndex>,
    full_number: Option<usize>,
    identity_number: Option<usize>,
    filter: HashSet<ValueId>,
    default_accum: Mutex<Accumulator>,
    store: RwLock<VectorSetStore>,
}

impl Model {
    /// Builds an empty model. The config is validated first.
    ///
    /// Set order: the configured family minus its trailing full set, then
    /// extra sets, then the full set, then dependent variants of each.
    pub fn new(config: TrainerConfig) -> Result<Self> {
        validate_trainer(&config)?;
        let window = config.window_size;
        let focus = config.focus;
        let full = full_set(window);

        let mut sets: Vec<NumberSet> = config
            .number_sets
            .family
            .sets(window, focus)
            .into_iter()
            .filter(|s| *s != full)
            .collect();
        for extra in &config.number_sets.extra {
            if !sets.contains(extra) && *extra != full {
                sets.push(extra.clone());
            }
        }
        sets.push(full.clone());

        let kind = config.accumulator;
        let mut indices: Vec<NumberSetIndex> = sets
            .iter()
            .enumerate()
            .map(|(i, s)| NumberSetIndex::new(SetNumber(i), s.clone(), kind, focus))
            .collect();

        let dependent_count = config.number_sets.dependent_count;
        if dependent_count > 0 {
            for set in &sets {
                // the first layout reads primaries only and duplicates `set`
                for layout in dependent_subsets(set, dependent_count).into_iter().skip(1) {
                    let n = indices.len();
                    indices.push(
                        NumberSetIndex::new(SetNumber(n), set.clone(), kind, focus)
                            .with_dependent(layout),
                    );
                }
            }
        }

        for &n in &config.number_sets.turned_off {
            let count = indices.len();
            indices
                .get(n)
                .ok_or(Error::NumberSetOutOfRange {
                    set_number: n,
                    count,
                })?
                .set_turned_off(true);
        }

        let full_number = indices
            .iter()
            .position(|ix| ix.dependent().is_none() && ix.number_set() == full.as_slice());
        let identity_number = indices
            .iter()
            .position(|ix| ix.dependent().is_none() && ix.number_set() == [focus]);

        let model = Self {
            id: ModelId::new(),
            filter: config.training_filter.iter().copied().collect(),
            full,
            indices,
            full_number,
            identity_number,
            default_accum: Mutex::new(Accumulator::new(kind)),
            store: RwLock::new(VectorSetStore::new()),
            config,
        };
        tracing::info!(
            target: event_names::MODEL_BUILT,
            model_id = %model.id,
            window,
            focus,
            number_sets = model.indices.len(),
            accumulator = %kind,
            "model built"
        );
        Ok(model)
    }

    pub fn id(&self) -> &ModelId {
        &self.id
    }

    pub fn config(&self) -> &TrainerConfig {
        &self.config
    }

    pub fn window(&self) -> usize {
        self.config.window_size
    }

    pub fn focus(&self) -> usize {
        self.config.focus
    }

    /// Offsets of the full window.
    pub fn full_set(&self) -> &[usize] {
        &self.full
    }

    pub fn indices(&self) -> &[NumberSetIndex] {
        &self.indices
    }

    pub fn index(&self, set_number: SetNumber) -> Result<&NumberSetIndex> {
        self.indices
            .get(set_number.0)
            .ok_or(Error::NumberSetOutOfRange {
                set_number: set_number.0,
                count: self.indices.len(),
            })
    }

    /// Finds the plain (non-dependent) index for an offset list.
    pub fn find_index(&self, set: &[usize]) -> Option<&NumberSetIndex> {
        self.indices
            .iter()
            .find(|ix| ix.dependent().is_none() && ix.number_set() == set)
    }

    pub fn full_number(&self) -> Option<SetNumber> {
        self.full_number.map(SetNumber)
    }

    pub fn full_index(&self) -> Option<&NumberSetIndex> {
        self.full_number.map(|n| &self.indices[n])
    }

    /// Index of the set that reads only the focus position.
    pub fn identity_index(&self) -> Option<&NumberSetIndex> {
        self.identity_number.map(|n| &self.indices[n])
    }

    pub fn is_full(&self, set_number: SetNumber) -> bool {
        self.full_number == Some(set_number.0)
    }

    /// True when examples of `value` only train context sets.
    pub fn is_filtered(&self, value: ValueId) -> bool {
        self.filter.contains(&value)
    }

    /// Whether `set_number` skips frames with an empty element in its positions.
    pub fn rejects_empty(&self, set_number: SetNumber) -> bool {
        self.config.no_empty_elements
            && !(self.config.no_empty_except_full && self.is_full(set_number))
    }

    /// Most probable value of every set that has seen `frame`'s context, in
    /// set order.
    pub fn predict(&self, frame: &Frame) -> Result<Vec<Prediction>> {
        if frame.window() != self.window() {
            return Err(Error::FrameMismatch {
                expected: self.window(),
                actual: frame.window(),
            });
        }
        let mut out = Vec::new();
        for ix in &self.indices {
            if ix.is_turned_off() {
                continue;
            }
            let key = frame.vector_id(
                ix.number_set(),
                ix.dependent(),
                self.rejects_empty(ix.set_number()),
            );
            let Some(acc) = ix.get(key)? else {
                continue;
            };
            let acc = index::lock(&acc, "accumulator")?;
            if let Some(best) = acc.first_most_probable() {
                out.push(Prediction {
                    set_number: ix.set_number(),
                    number_set: ix.number_set().to_vec(),
                    key,
                    total: acc.total(),
                    best,
                });
            }
        }
        Ok(out)
    }

    /// Distribution of every trained value.
    pub fn default_accumulator(&self) -> Result<MutexGuard<'_, Accumulator>> {
        index::lock(&self.default_accum, "model default accumulator")
    }

    pub fn store(&self) -> Result<RwLockReadGuard<'_, VectorSetStore>> {
        index::read(&self.store, "vector set store")
    }

    pub(crate) fn store_mut(&self) -> Result<RwLockWriteGuard<'_, VectorSetStore>> {
        index::write(&self.store, "vector set store")
    }

    /// Accumulators across every index.
    pub fn accumulator_count(&self) -> usize {
        self.indices.iter().map(NumberSetIndex::len).sum()
    }

    /// Drops empty accumulators everywhere.
    pub fn remove_all_empty(&self) -> Result<usize> {
        let mut removed = 0;
        for ix in &self.indices {
            removed += ix.remove_all_empty()?;
        }
        tracing::debug!(target: event_names::PRUNE_FINISHED, removed, "empty accumulators removed");
        Ok(removed)
    }

    /// Drops `value` from every accumulator and the model default.
    pub fn remove_all_value(&self, value: ValueId, retain_probability: bool) -> Result<u64> {
        let mut removed = 0;
        for ix in &self.indices {
            removed += ix.remove_all_value(value, retain_probability)?;
        }
        let mut default = self.default_accumulator()?;
        let total = default.total();
        default.remove(value);
        if retain_probability && default.value_count() > 0 {
            default.adjust_total(total);
        }
        tracing::debug!(target: event_names::PRUNE_FINISHED, value, removed, "value removed");
        Ok(removed)
    }

    /// Drops accumulators seen at most `max_total` times, the full set
    /// excepted since it anchors the vector store.
    pub fn remove_below_total(&self, max_total: u32) -> Result<usize> {
        let mut removed = 0;
        for (n, ix) in self.indices.iter().enumerate() {
            if Some(n) == self.full_number {
                continue;
            }
            removed += ix.remove_below_total(max_total)?;
        }
        tracing::debug!(target: event_names::PRUNE_FINISHED, max_total, removed, "rare contexts removed");
        Ok(removed)
    }

    pub fn sync_totals(&self) -> Result<usize> {
        let mut changed = 0;
        for ix in &self.indices {
            changed += ix.sync_totals()?;
        }
        Ok(changed)
    }

    /// Compacts the vector store and rewrites every accumulator's id.
    ///
    /// Needs exclusive access: no training may run concurrently.
    pub fn optimize_vect_sets(&mut self) -> Result<CompactionMap> {
        let store = self
            .store
            .get_mut()
            .map_err(|_| Error::LockPoisoned("vector set store".to_string()))?;
        let before = store.len();
        let map = store.optimize();
        let after = store.len();
        let mut rewritten = 0;
        for ix in &mut self.indices {
            rewritten += ix.update_vect_set_ids(&map)?;
        }
        tracing::info!(
            target: event_names::COMPACT_FINISHED,
            model_id = %self.id,
            before,
            after,
            rewritten,
            "vector sets compacted"
        );
        Ok(map)
    }

    /// Folds another model with the same set layout into this one.
    pub fn merge(&mut self, other: &Model) -> Result<()> {
        if self.indices.len() != other.indices.len()
            || self
                .indices
                .iter()
                .zip(&other.indices)
                .any(|(a, b)| a.number_set() != b.number_set() || a.dependent() != b.dependent())
        {
            return Err(Error::InvalidConfig {
                field: "number_sets".to_string(),
                message: "models with different number sets cannot merge".to_string(),
            });
        }
        let remap = {
            let theirs = other.store()?;
            self.store_mut()?.append_from(&theirs)?
        };
        for (mine, theirs) in self.indices.iter().zip(&other.indices) {
            mine.merge(theirs, Some(&remap))?;
        }
        let theirs = other.default_accumulator()?.clone();
        self.default_accumulator()?.merge(&theirs);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ft_combinatorics::NumberSetFamily;
    use ft_config::NumberSetConfig;

    fn config(window: usize, focus: usize) -> TrainerConfig {
        TrainerConfig {
            window_size: window,
            focus,
            ..TrainerConfig::default()
        }
    }

    #[test]
    fn test_all_family_layout() {
        let model = Model::new(config(3, 1)).unwrap();
        assert_eq!(model.indices().len(), 7);
        assert_eq!(model.full_number(), Some(SetNumber(6)));
        assert_eq!(model.full_index().unwrap().number_set(), &[0, 1, 2]);
        assert_eq!(model.identity_index().unwrap().number_set(), &[1]);
        assert!(model.find_index(&[0, 2]).unwrap().is_context());
    }

    #[test]
    fn test_extra_sets_precede_full() {
        let mut cfg = config(4, 1);
        cfg.number_sets = NumberSetConfig {
            family: NumberSetFamily::Linear,
            extra: vec![vec![0, 3]],
            ..NumberSetConfig::default()
        };
        let model = Model::new(cfg).unwrap();
        let last = model.indices().len() - 1;
        assert_eq!(model.indices()[last].number_set(), &[0, 1, 2, 3]);
        assert_eq!(model.indices()[last - 1].number_set(), &[0, 3]);
    }

    #[test]
    fn test_dependent_sets_are_appended() {
        let mut cfg = config(2, 0);
        cfg.number_sets.dependent_count = 1;
        let model = Model::new(cfg).unwrap();
        // 3 plain sets, then per set 2^len - 1 dependent layouts
        assert_eq!(model.indices().len(), 3 + 1 + 1 + 3);
        assert!(model.indices()[3].dependent().is_some());
        assert_eq!(model.full_number(), Some(SetNumber(2)));
    }

    #[test]
    fn test_turned_off_out_of_range() {
        let mut cfg = config(2, 0);
        cfg.number_sets.turned_off = vec![9];
        let err = Model::new(cfg).unwrap_err();
        assert_eq!(err.code(), 20);
    }

    #[test]
    fn test_invalid_config_rejected() {
        assert!(Model::new(config(3, 3)).is_err());
    }

    #[test]
    fn test_rejects_empty_except_full() {
        let mut cfg = config(3, 1);
        cfg.no_empty_except_full = true;
        let model = Model::new(cfg).unwrap();
        assert!(!model.rejects_empty(SetNumber(6)));
        assert!(model.rejects_empty(SetNumber(0)));
    }

    #[test]
    fn test_predict_reads_trained_contexts() {
        let model = Model::new(config(3, 1)).unwrap();
        let agg = crate::train::TrainingAggregator::new(&model);
        let frame = Frame::new(vec![1, 2, 3], 1);
        agg.train_focus(&frame, &[10]).unwrap();
        agg.train_focus(&frame, &[10]).unwrap();
        agg.train_focus(&frame, &[20]).unwrap();

        let preds = model.predict(&frame).unwrap();
        assert_eq!(preds.len(), 7);
        for p in &preds {
            assert_eq!(p.total, 3);
            assert_eq!(p.best.value, 10);
        }

        let unseen = Frame::new(vec![7, 8, 9], 1);
        assert!(model.predict(&unseen).unwrap().is_empty());
        assert!(model.predict(&Frame::new(vec![1, 2], 1)).is_err());
    }

    #[test]
    fn test_index_lookup_errors() {
        let model = Model::new(config(2, 0)).unwrap();
        assert!(model.index(SetNumber(1)).is_ok());
        assert_eq!(model.index(SetNumber(3)).unwrap_err().code(), 20);
    }
}
