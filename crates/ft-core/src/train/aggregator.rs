//! Fan-out of one example into every active number set.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};

use ft_common::{Error, Result, ValueId, VectorId};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::frame::Frame;
use super::model::Model;
use crate::accum::Accumulator;
use crate::encoding::encode_subset;
use crate::index;
use crate::logging::event_names;

/// One training example: a frame and the values observed at its focus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Example {
    pub frame: Frame,
    pub values: Vec<ValueId>,
}

impl Example {
    pub fn new(frame: Frame, value: ValueId) -> Self {
        Self {
            frame,
            values: vec![value],
        }
    }
}

/// Counters shared by every training thread.
#[derive(Debug, Default)]
pub struct TrainStats {
    examples: AtomicU64,
    trained: AtomicU64,
    skipped: AtomicU64,
    created: AtomicU64,
}

impl TrainStats {
    pub fn snapshot(&self) -> TrainSummary {
        TrainSummary {
            examples: self.examples.load(Ordering::Relaxed),
            trained: self.trained.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            accumulators_created: self.created.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`TrainStats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
pub struct TrainSummary {
    pub examples: u64,
    pub trained: u64,
    pub skipped: u64,
    pub accumulators_created: u64,
}

fn is_valid_key(vid: VectorId) -> bool {
    !matches!(vid, -2..=0)
}

/// Trains a shared [`Model`] from any number of threads.
#[derive(Debug)]
pub struct TrainingAggregator<'m> {
    model: &'m Model,
    stats: TrainStats,
}

impl<'m> TrainingAggregator<'m> {
    pub fn new(model: &'m Model) -> Self {
        Self {
            model,
            stats: TrainStats::default(),
        }
    }

    pub fn model(&self) -> &'m Model {
        self.model
    }

    pub fn stats(&self) -> TrainSummary {
        self.stats.snapshot()
    }

    /// Counts `values` at the frame's focus into every active number set.
    ///
    /// Returns false when the example was skipped because its only value is
    /// the configured non-value. Values on the training filter only reach
    /// context sets; everywhere else they bump totals.
    pub fn train_focus(&self, frame: &Frame, values: &[ValueId]) -> Result<bool> {
        let model = self.model;
        let cfg = model.config();
        self.stats.examples.fetch_add(1, Ordering::Relaxed);

        let Some(&first) = values.first() else {
            self.stats.skipped.fetch_add(1, Ordering::Relaxed);
            return Ok(false);
        };
        if values.len() == 1 && cfg.non_value == Some(first) {
            self.stats.skipped.fetch_add(1, Ordering::Relaxed);
            return Ok(false);
        }
        if frame.window() != model.window() {
            return Err(Error::FrameMismatch {
                expected: model.window(),
                actual: frame.window(),
            });
        }

        let vids: Vec<VectorId> = model
            .indices()
            .iter()
            .map(|ix| {
                if ix.is_turned_off() {
                    return super::frame::NO_VECTOR;
                }
                frame.vector_id(
                    ix.number_set(),
                    ix.dependent(),
                    model.rejects_empty(ix.set_number()),
                )
            })
            .collect();

        let filtered = model.is_filtered(first);
        let reverse = cfg.frame_reverse;
        let save = cfg.save_vect_sets && !reverse;
        let full_number = model.full_number().map(|n| n.0);
        let full = model.full_index();
        let fvid = full_number.map_or(super::frame::NO_VECTOR, |n| vids[n]);
        let no_full = full.map_or(true, |f| f.is_turned_off());
        let mut created = 0u64;

        for &value in values {
            let (key, val) = if reverse { (value, fvid) } else { (fvid, value) };

            let mut vsid = None;
            if no_full || !is_valid_key(fvid) || filtered {
                if save {
                    let existing = match full {
                        Some(f) => f.get(key)?,
                        None => None,
                    };
                    vsid = match existing {
                        Some(acc) => index::lock(&acc, "accumulator")?.vect_set_id(),
                        None => Some(model.store_mut()?.add(frame.primary().to_vec())?),
                    };
                }
            } else if let Some(f) = full {
                let (acc, made) = f.get_or_create_with(key, |a| {
                    if save {
                        let id = model.store_mut()?.add(frame.primary().to_vec())?;
                        a.set_vect_set_id(Some(id));
                    }
                    Ok(())
                })?;
                if made {
                    created += 1;
                }
                let mut acc = index::lock(&acc, "accumulator")?;
                vsid = acc.vect_set_id();
                acc.add_count(val, 1);
            }

            if !filtered {
                model.default_accumulator()?.add_count(value, 1);
            }
            if let Some(f) = full {
                let mut d = f.set_default()?;
                if filtered {
                    d.adjust_total_inc(1);
                } else {
                    d.add_count(val, 1);
                }
            }

            for (n, ix) in model.indices().iter().enumerate() {
                if Some(n) == full_number {
                    continue;
                }
                let vid = vids[n];
                if !is_valid_key(vid) || (filtered && !ix.is_context()) {
                    continue;
                }
                {
                    let mut d = ix.set_default()?;
                    if filtered {
                        d.adjust_total_inc(1);
                    } else {
                        d.add_count(value, 1);
                    }
                }

                let (k, v) = if reverse { (value, vid) } else { (vid, value) };
                let (acc, made) = ix.get_or_create_with(k, |a| {
                    a.set_vect_set_id(vsid);
                    if filtered {
                        a.adjust_total(1);
                    }
                    Ok(())
                })?;
                if made {
                    created += 1;
                }
                if !filtered {
                    index::lock(&acc, "accumulator")?.add_count(v, 1);
                } else if !made {
                    index::lock(&acc, "accumulator")?.adjust_total_inc(1);
                }
            }
        }

        self.stats.trained.fetch_add(1, Ordering::Relaxed);
        self.stats.created.fetch_add(created, Ordering::Relaxed);
        Ok(true)
    }

    /// Pins `value` for every context that has `identity_vid` at the focus.
    ///
    /// Every focus-containing set's accumulator built from a stored vector
    /// with `identity_vid` at the focus gets locked; missing ones are created
    /// locked. With no stored vector at all, only the identity set gets a
    /// locked accumulator. Returns how many accumulators were locked.
    pub fn train_locked(&self, identity_vid: i32, value: ValueId) -> Result<usize> {
        let model = self.model;
        let focus = model.focus();
        let kind = model.config().accumulator;
        let vectors: Vec<Vec<i32>> = model
            .store()?
            .sets_with_value_at(identity_vid, focus)
            .into_iter()
            .map(|(_, v)| v.to_vec())
            .collect();

        let locked_new = |key: VectorId| {
            let mut acc = Accumulator::with_key(kind, key);
            acc.add_count(value, 1);
            acc.lock(value);
            acc
        };

        if vectors.is_empty() {
            let Some(ix) = model.identity_index() else {
                return Ok(0);
            };
            ix.put(locked_new(identity_vid as VectorId))?;
            ix.set_default()?.add_count(value, 1);
            tracing::debug!(target: event_names::TRAIN_LOCKED, identity_vid, value, locked = 1, "identity locked");
            return Ok(1);
        }

        let full = model.full_set();
        let mut locked = 0;
        for ix in model.indices() {
            if ix.dependent().is_some() || !ix.number_set().contains(&focus) {
                continue;
            }
            let keys: HashSet<VectorId> = vectors
                .iter()
                .map(|v| encode_subset(v, full, ix.number_set()))
                .collect();
            for key in keys {
                match ix.get(key)? {
                    Some(acc) => index::lock(&acc, "accumulator")?.lock(value),
                    None => {
                        ix.put(locked_new(key))?;
                        ix.set_default()?.add_count(value, 1);
                    }
                }
                locked += 1;
            }
        }
        tracing::debug!(
            target: event_names::TRAIN_LOCKED,
            identity_vid,
            value,
            vectors = vectors.len(),
            locked,
            "identity locked"
        );
        Ok(locked)
    }

    /// Trains `examples` on up to `workers` scoped threads.
    ///
    /// Counts do not depend on how examples are split. Returns how many
    /// examples were trained; the first error from any worker wins.
    pub fn train_parallel(&self, examples: &[Example], workers: usize) -> Result<usize> {
        if examples.is_empty() {
            return Ok(0);
        }
        let workers = workers.clamp(1, examples.len());
        let chunk = examples.len().div_ceil(workers);
        let span = tracing::info_span!(
            "train",
            model_id = %self.model.id(),
            stage = "train"
        );
        let _guard = span.enter();
        tracing::info!(
            target: event_names::TRAIN_STARTED,
            examples = examples.len(),
            workers,
            "training started"
        );

        let results: Vec<Result<usize>> = std::thread::scope(|s| {
            let handles: Vec<_> = examples
                .chunks(chunk)
                .map(|part| {
                    s.spawn(move || {
                        let mut trained = 0;
                        for ex in part {
                            if self.train_focus(&ex.frame, &ex.values)? {
                                trained += 1;
                            }
                        }
                        Ok(trained)
                    })
                })
                .collect();
            handles
                .into_iter()
                .map(|h| {
                    h.join().unwrap_or_else(|_| {
                        tracing::error!(target: event_names::INTERNAL_ERROR, "training worker panicked");
                        Err(Error::LockPoisoned("training worker panicked".to_string()))
                    })
                })
                .collect()
        });

        let mut trained = 0;
        for r in results {
            trained += r?;
        }
        let summary = self.stats();
        tracing::info!(
            target: event_names::TRAIN_FINISHED,
            trained,
            skipped = summary.skipped,
            accumulators = self.model.accumulator_count(),
            "training finished"
        );
        Ok(trained)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ft_config::TrainerConfig;

    fn model(window: usize, focus: usize) -> Model {
        Model::new(TrainerConfig {
            window_size: window,
            focus,
            ..TrainerConfig::default()
        })
        .unwrap()
    }

    fn full_acc(model: &Model, frame: &Frame) -> Accumulator {
        let full = model.full_index().unwrap();
        let key = frame.vector_id(full.number_set(), None, true);
        let handle = full.get(key).unwrap().unwrap();
        let acc = handle.lock().unwrap().clone();
        acc
    }

    #[test]
    fn test_same_context_three_examples() {
        let m = model(3, 1);
        let agg = TrainingAggregator::new(&m);
        let frame = Frame::new(vec![1, 2, 3], 1);
        for v in [10, 10, 20] {
            assert!(agg.train_focus(&frame, &[v]).unwrap());
        }
        let acc = full_acc(&m, &frame);
        assert_eq!(acc.total(), 3);
        assert!((acc.probability(10) - 2.0 / 3.0).abs() < 1e-12);
        assert!((acc.probability(20) - 1.0 / 3.0).abs() < 1e-12);
        assert_eq!(acc.first_most_probable().unwrap().value, 10);
        // one store entry for the one full-window context
        assert_eq!(m.store().unwrap().len(), 1);
        assert_eq!(m.default_accumulator().unwrap().total(), 3);
        assert_eq!(agg.stats().trained, 3);
    }

    #[test]
    fn test_sub_sets_inherit_vect_set_id() {
        let m = model(3, 1);
        let agg = TrainingAggregator::new(&m);
        let frame = Frame::new(vec![1, 2, 3], 1);
        agg.train_focus(&frame, &[10]).unwrap();
        let full_id = full_acc(&m, &frame).vect_set_id();
        assert!(full_id.is_some());
        let ix = m.find_index(&[0, 2]).unwrap();
        let acc = ix.get(frame.vector_id(&[0, 2], None, true)).unwrap().unwrap();
        assert_eq!(acc.lock().unwrap().vect_set_id(), full_id);
        assert_eq!(ix.set_default().unwrap().count(10), 1);
    }

    #[test]
    fn test_non_value_is_skipped() {
        let m = Model::new(TrainerConfig {
            window_size: 2,
            focus: 0,
            non_value: Some(0),
            ..TrainerConfig::default()
        })
        .unwrap();
        let agg = TrainingAggregator::new(&m);
        let frame = Frame::new(vec![5, 6], 0);
        assert!(!agg.train_focus(&frame, &[0]).unwrap());
        assert!(agg.train_focus(&frame, &[0, 1]).unwrap());
        assert_eq!(agg.stats().skipped, 1);
    }

    #[test]
    fn test_empty_elements_skip_sets() {
        let m = model(3, 1);
        let agg = TrainingAggregator::new(&m);
        let frame = Frame::new(vec![crate::encoding::EMPTY_VECT, 2, 3], 1);
        agg.train_focus(&frame, &[10]).unwrap();
        assert!(m.find_index(&[0]).unwrap().is_empty());
        assert!(m.full_index().unwrap().is_empty());
        assert_eq!(m.find_index(&[1, 2]).unwrap().len(), 1);
        // the raw vector is still kept for the untracked full context
        assert_eq!(m.store().unwrap().len(), 1);
    }

    #[test]
    fn test_filtered_value_trains_context_totals_only() {
        let m = Model::new(TrainerConfig {
            window_size: 3,
            focus: 1,
            training_filter: vec![99],
            ..TrainerConfig::default()
        })
        .unwrap();
        let agg = TrainingAggregator::new(&m);
        let frame = Frame::new(vec![1, 2, 3], 1);
        agg.train_focus(&frame, &[99]).unwrap();
        agg.train_focus(&frame, &[99]).unwrap();

        assert!(m.full_index().unwrap().is_empty());
        assert!(m.find_index(&[1]).unwrap().is_empty());
        let ctx = m.find_index(&[0, 2]).unwrap();
        let acc = ctx.get(frame.vector_id(&[0, 2], None, true)).unwrap().unwrap();
        let acc = acc.lock().unwrap();
        assert_eq!(acc.total(), 2);
        assert_eq!(acc.value_count(), 0);
        assert_eq!(m.default_accumulator().unwrap().total(), 0);
        assert_eq!(m.full_index().unwrap().set_default().unwrap().total(), 2);
    }

    #[test]
    fn test_reverse_swaps_key_and_value() {
        let m = Model::new(TrainerConfig {
            window_size: 2,
            focus: 0,
            frame_reverse: true,
            ..TrainerConfig::default()
        })
        .unwrap();
        let agg = TrainingAggregator::new(&m);
        let frame = Frame::new(vec![5, 6], 0);
        agg.train_focus(&frame, &[42]).unwrap();
        let ix = m.find_index(&[0]).unwrap();
        let acc = ix.get(42).unwrap().unwrap();
        assert_eq!(acc.lock().unwrap().count(5), 1);
        assert!(m.store().unwrap().is_empty());
    }

    #[test]
    fn test_frame_width_mismatch() {
        let m = model(3, 1);
        let agg = TrainingAggregator::new(&m);
        let err = agg.train_focus(&Frame::new(vec![1, 2], 1), &[1]).unwrap_err();
        assert_eq!(err.code(), 30);
    }

    #[test]
    fn test_train_locked_without_vectors() {
        let m = model(3, 1);
        let agg = TrainingAggregator::new(&m);
        assert_eq!(agg.train_locked(7, 70).unwrap(), 1);
        let acc = m.identity_index().unwrap().get(7).unwrap().unwrap();
        let acc = acc.lock().unwrap();
        assert!(acc.is_locked());
        assert_eq!(acc.probability(70), 1.0);
    }

    #[test]
    fn test_train_locked_pins_existing_contexts() {
        let m = model(3, 1);
        let agg = TrainingAggregator::new(&m);
        let frame = Frame::new(vec![1, 2, 3], 1);
        agg.train_focus(&frame, &[10]).unwrap();
        agg.train_focus(&frame, &[20]).unwrap();
        agg.train_focus(&frame, &[20]).unwrap();

        // four sets contain the focus: [1], [0,1], [1,2], [0,1,2]
        assert_eq!(agg.train_locked(2, 10).unwrap(), 4);
        let acc = full_acc(&m, &frame);
        assert_eq!(acc.probability(10), 1.0);
        assert_eq!(acc.probability(20), 0.0);
        // context sets are untouched
        let ctx = m.find_index(&[0, 2]).unwrap();
        let c = ctx.get(frame.vector_id(&[0, 2], None, true)).unwrap().unwrap();
        assert!(!c.lock().unwrap().is_locked());
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let seq: Vec<i32> = (0..40).map(|i| (i * 7 % 5) as i32 + 1).collect();
        let examples: Vec<Example> = (0..seq.len())
            .map(|p| Example::new(Frame::from_sequence(&seq, p, 3, 1), (p % 3) as i64))
            .collect();

        let a = model(3, 1);
        let agg = TrainingAggregator::new(&a);
        for ex in &examples {
            agg.train_focus(&ex.frame, &ex.values).unwrap();
        }
        let b = model(3, 1);
        let par = TrainingAggregator::new(&b);
        assert_eq!(par.train_parallel(&examples, 4).unwrap(), examples.len());

        for (x, y) in a.indices().iter().zip(b.indices()) {
            assert_eq!(x.len(), y.len());
            assert_eq!(x.total_sum().unwrap(), y.total_sum().unwrap());
            assert_eq!(x.value_set().unwrap(), y.value_set().unwrap());
        }
        assert_eq!(
            a.default_accumulator().unwrap().val_ps_sorted(),
            b.default_accumulator().unwrap().val_ps_sorted()
        );
    }
}
