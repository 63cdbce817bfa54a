use std::borrow::Cow;
use std::cmp::Ordering;
use std::collections::BTreeMap;

use ft_common::{Error, Result, VectSetId};
use serde::Serialize;

/// Append-only arena of raw vectors, addressed by 1-based id.
///
/// Removed entries leave a tombstone so later ids stay stable until the next
/// [`optimize`](VectorSetStore::optimize).
#[derive(Debug, Clone, Default)]
pub struct VectorSetStore {
    sets: Vec<Option<Box<[i32]>>>,
}

impl VectorSetStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a vector. Equal vectors are not merged here.
    pub fn add(&mut self, vector: impl Into<Box<[i32]>>) -> Result<VectSetId> {
        let id = VectSetId::from_index(self.sets.len()).ok_or(Error::VectSetOutOfRange {
            id: u32::MAX,
        })?;
        self.sets.push(Some(vector.into()));
        Ok(id)
    }

    /// The stored vector, whatever its width.
    pub fn get_base(&self, id: VectSetId) -> Option<&[i32]> {
        self.sets.get(id.index()).and_then(|s| s.as_deref())
    }

    /// The values a number set reads from a stored full-window vector.
    ///
    /// `full` lists the window offsets the stored vector was built from;
    /// `subset` picks among them. A subset as wide as the stored vector gets
    /// the stored slice back without copying.
    pub fn get(&self, full: &[usize], subset: &[usize], id: VectSetId) -> Option<Cow<'_, [i32]>> {
        let base = self.get_base(id)?;
        if subset.len() == base.len() {
            return Some(Cow::Borrowed(base));
        }
        if full.len() < subset.len() || base.len() < full.len() {
            return None;
        }
        subset
            .iter()
            .map(|off| full.iter().position(|f| f == off).map(|k| base[k]))
            .collect::<Option<Vec<_>>>()
            .map(Cow::Owned)
    }

    /// Tombstones an entry and returns what it held.
    pub fn remove(&mut self, id: VectSetId) -> Option<Box<[i32]>> {
        self.sets.get_mut(id.index()).and_then(Option::take)
    }

    /// Number of slots, tombstones included.
    pub fn len(&self) -> usize {
        self.sets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }

    pub fn clear(&mut self) {
        self.sets.clear();
    }

    /// Live entries with their ids.
    pub fn iter(&self) -> impl Iterator<Item = (VectSetId, &[i32])> + '_ {
        self.sets.iter().enumerate().filter_map(|(i, s)| {
            let id = VectSetId::from_index(i)?;
            s.as_deref().map(|v| (id, v))
        })
    }

    /// Sorts, drops duplicates and tombstones, and reports where each old id
    /// went.
    ///
    /// Order: longer vectors first, equal widths by descending values,
    /// tombstones last. Running this twice without new entries yields the
    /// identity map.
    pub fn optimize(&mut self) -> CompactionMap {
        let mut order: Vec<usize> = (0..self.sets.len()).collect();
        order.sort_by(|&a, &b| compare_slots(self.sets[a].as_deref(), self.sets[b].as_deref()));

        let mut taken: Vec<Option<Box<[i32]>>> = std::mem::take(&mut self.sets);
        let mut moves: Vec<Option<VectSetId>> = vec![None; taken.len()];
        let mut kept: Vec<Option<Box<[i32]>>> = Vec::with_capacity(taken.len());
        let mut moved = 0usize;
        let mut duplicates = 0usize;

        for old in order {
            let Some(vector) = taken[old].take() else {
                continue;
            };
            let same_as_last = kept
                .last()
                .and_then(|k| k.as_deref())
                .is_some_and(|last| last == &*vector);
            if same_as_last {
                duplicates += 1;
                moves[old] = VectSetId::from_index(kept.len() - 1);
            } else {
                moves[old] = VectSetId::from_index(kept.len());
                kept.push(Some(vector));
            }
            if moves[old].map(VectSetId::index) != Some(old) {
                moved += 1;
            }
        }

        let dropped = moves.iter().filter(|m| m.is_none()).count();
        tracing::debug!(
            live = kept.len(),
            moved,
            duplicates,
            tombstones = dropped,
            "vector set store compacted"
        );
        self.sets = kept;
        CompactionMap { moves }
    }

    /// Appends every live vector of `other`; the map translates `other`'s ids
    /// into this store.
    pub fn append_from(&mut self, other: &VectorSetStore) -> Result<CompactionMap> {
        let mut moves = Vec::with_capacity(other.sets.len());
        for slot in &other.sets {
            let id = match slot {
                Some(v) => Some(self.add(v.clone())?),
                None => None,
            };
            moves.push(id);
        }
        Ok(CompactionMap { moves })
    }

    /// Live vectors with `vid` at `position`.
    pub fn sets_with_value_at(&self, vid: i32, position: usize) -> Vec<(VectSetId, &[i32])> {
        self.iter()
            .filter(|(_, v)| v.get(position) == Some(&vid))
            .collect()
    }

    /// Live vectors whose value at `position` belongs to `sequence` and that
    /// contain `sequence` as a contiguous run.
    pub fn sets_containing(&self, sequence: &[i32], position: usize) -> Vec<(VectSetId, &[i32])> {
        self.iter()
            .filter(|(_, v)| {
                v.get(position).is_some_and(|p| sequence.contains(p))
                    && contains_vect_set(v, sequence)
            })
            .collect()
    }

    /// Live vectors matching a window-wide filter where `0` is a wildcard.
    ///
    /// Shorter vectors align to the filter's start when `match_end` is set,
    /// otherwise to its end; the unaligned part of the filter must be zero.
    pub fn sets_matching(&self, filter: &[i32], match_end: bool) -> Vec<(VectSetId, &[i32])> {
        self.iter()
            .filter(|(_, v)| is_set_contains(v, filter, match_end))
            .collect()
    }

    pub fn stats(&self) -> StoreStats {
        let mut by_length = BTreeMap::new();
        let mut tombstones = 0;
        for slot in &self.sets {
            match slot {
                Some(v) => *by_length.entry(v.len()).or_insert(0) += 1,
                None => tombstones += 1,
            }
        }
        StoreStats {
            slots: self.sets.len(),
            live: self.sets.len() - tombstones,
            tombstones,
            min_length: by_length.keys().next().copied(),
            max_length: by_length.keys().next_back().copied(),
            by_length,
        }
    }
}

fn compare_slots(a: Option<&[i32]>, b: Option<&[i32]>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
        (Some(a), Some(b)) => b.len().cmp(&a.len()).then_with(|| b.cmp(a)),
    }
}

/// Old id to new id after compaction.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CompactionMap {
    moves: Vec<Option<VectSetId>>,
}

impl CompactionMap {
    /// New id for an old one. Ids of tombstones or past the old end map to
    /// `None`.
    pub fn apply(&self, id: Option<VectSetId>) -> Option<VectSetId> {
        id.and_then(|id| self.moves.get(id.index()).copied().flatten())
    }

    /// True when every live id kept its number.
    pub fn is_identity(&self) -> bool {
        self.moves
            .iter()
            .enumerate()
            .all(|(i, m)| m.map_or(true, |id| id.index() == i))
    }

    pub fn len(&self) -> usize {
        self.moves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.moves.is_empty()
    }
}

/// Length histogram of the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    pub slots: usize,
    pub live: usize,
    pub tombstones: usize,
    pub min_length: Option<usize>,
    pub max_length: Option<usize>,
    pub by_length: BTreeMap<usize, usize>,
}

/// True when `needle` occurs as a contiguous run inside `haystack`.
pub fn contains_vect_set(haystack: &[i32], needle: &[i32]) -> bool {
    if needle.is_empty() {
        return true;
    }
    haystack.len() >= needle.len() && haystack.windows(needle.len()).any(|w| w == needle)
}

/// Wildcard match of a stored vector against a window-wide filter.
///
/// Zero in `filter` matches anything.
pub fn is_set_contains(vector: &[i32], filter: &[i32], match_end: bool) -> bool {
    if vector.len() > filter.len() {
        return false;
    }
    let pad = filter.len() - vector.len();
    let (head, tail) = if match_end {
        filter.split_at(vector.len())
    } else {
        let (pad_part, rest) = filter.split_at(pad);
        (rest, pad_part)
    };
    tail.iter().all(|&f| f == 0)
        && head
            .iter()
            .zip(vector)
            .all(|(&f, &v)| f == 0 || f == v)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(n: u32) -> VectSetId {
        VectSetId::new(n).unwrap()
    }

    #[test]
    fn test_add_returns_one_based_ids() {
        let mut store = VectorSetStore::new();
        assert_eq!(store.add(vec![1, 2, 3]).unwrap(), id(1));
        assert_eq!(store.add(vec![1, 2, 3]).unwrap(), id(2));
        assert_eq!(store.len(), 2);
        assert_eq!(store.get_base(id(2)), Some(&[1, 2, 3][..]));
        assert_eq!(store.get_base(id(3)), None);
    }

    #[test]
    fn test_get_subset() {
        let mut store = VectorSetStore::new();
        let full = [0, 1, 2, 3];
        let v = store.add(vec![10, 20, 30, 40]).unwrap();
        assert_eq!(store.get(&full, &full, v).unwrap().as_ref(), &[10, 20, 30, 40]);
        assert_eq!(store.get(&full, &[1, 3], v).unwrap().as_ref(), &[20, 40]);
        assert_eq!(store.get(&full, &[2], v).unwrap().as_ref(), &[30]);
        assert!(store.get(&full, &[7], v).is_none());
        assert!(matches!(store.get(&full, &full, v), Some(Cow::Borrowed(_))));
    }

    #[test]
    fn test_remove_leaves_tombstone() {
        let mut store = VectorSetStore::new();
        let a = store.add(vec![1]).unwrap();
        let b = store.add(vec![2]).unwrap();
        assert_eq!(store.remove(a).as_deref(), Some(&[1][..]));
        assert!(store.get_base(a).is_none());
        assert_eq!(store.get_base(b), Some(&[2][..]));
        assert_eq!(store.stats().tombstones, 1);
        assert_eq!(store.stats().live, 1);
    }

    #[test]
    fn test_optimize_sorts_and_dedupes() {
        let mut store = VectorSetStore::new();
        let a = store.add(vec![1, 2]).unwrap();
        let b = store.add(vec![5, 5, 5]).unwrap();
        let c = store.add(vec![1, 2]).unwrap();
        let d = store.add(vec![3, 0]).unwrap();
        let e = store.add(vec![9]).unwrap();
        store.remove(e);

        let map = store.optimize();
        assert_eq!(store.len(), 3);
        assert_eq!(map.apply(Some(b)), Some(id(1)));
        assert_eq!(map.apply(Some(d)), Some(id(2)));
        assert_eq!(map.apply(Some(a)), Some(id(3)));
        assert_eq!(map.apply(Some(c)), Some(id(3)));
        assert_eq!(map.apply(Some(e)), None);
        assert_eq!(map.apply(None), None);
        assert!(!map.is_identity());

        assert_eq!(store.get_base(id(1)), Some(&[5, 5, 5][..]));
        assert_eq!(store.get_base(id(3)), Some(&[1, 2][..]));
    }

    #[test]
    fn test_optimize_twice_is_identity() {
        let mut store = VectorSetStore::new();
        for v in [vec![4, 1], vec![1, 1, 1], vec![4, 1], vec![7, 8]] {
            store.add(v).unwrap();
        }
        store.optimize();
        let before: Vec<Vec<i32>> = store.iter().map(|(_, v)| v.to_vec()).collect();
        let map = store.optimize();
        assert!(map.is_identity());
        let after: Vec<Vec<i32>> = store.iter().map(|(_, v)| v.to_vec()).collect();
        assert_eq!(before, after);
    }

    #[test]
    fn test_append_from_maps_ids() {
        let mut a = VectorSetStore::new();
        a.add(vec![1]).unwrap();
        let mut b = VectorSetStore::new();
        let x = b.add(vec![5, 6]).unwrap();
        let gone = b.add(vec![7]).unwrap();
        b.remove(gone);
        let map = a.append_from(&b).unwrap();
        assert_eq!(map.apply(Some(x)), Some(id(2)));
        assert_eq!(map.apply(Some(gone)), None);
        assert_eq!(a.get_base(id(2)), Some(&[5, 6][..]));
    }

    #[test]
    fn test_queries() {
        let mut store = VectorSetStore::new();
        let a = store.add(vec![1, 2, 3, 4]).unwrap();
        let b = store.add(vec![2, 3, 9, 9]).unwrap();
        store.add(vec![7, 7]).unwrap();

        let at: Vec<_> = store.sets_with_value_at(2, 1).into_iter().map(|(i, _)| i).collect();
        assert_eq!(at, vec![a]);

        let seq: Vec<_> = store.sets_containing(&[2, 3], 1).into_iter().map(|(i, _)| i).collect();
        assert_eq!(seq, vec![a, b]);
        let seq0: Vec<_> = store.sets_containing(&[2, 3], 0).into_iter().map(|(i, _)| i).collect();
        assert_eq!(seq0, vec![b]);

        let m: Vec<_> = store.sets_matching(&[0, 3, 0, 0], true).into_iter().map(|(i, _)| i).collect();
        assert_eq!(m, vec![b]);
    }

    #[test]
    fn test_is_set_contains_alignment() {
        assert!(is_set_contains(&[1, 2], &[1, 0, 0], true));
        assert!(!is_set_contains(&[1, 2], &[1, 0, 5], true));
        assert!(is_set_contains(&[1, 2], &[0, 0, 2], false));
        assert!(!is_set_contains(&[1, 2], &[4, 0, 2], false));
        assert!(!is_set_contains(&[1, 2, 3, 4], &[0, 0, 0], true));
    }

    #[test]
    fn test_contains_vect_set() {
        assert!(contains_vect_set(&[1, 2, 3], &[2, 3]));
        assert!(!contains_vect_set(&[1, 2, 3], &[3, 2]));
        assert!(!contains_vect_set(&[1], &[1, 2]));
    }

    #[test]
    fn test_stats_histogram() {
        let mut store = VectorSetStore::new();
        store.add(vec![1]).unwrap();
        store.add(vec![1, 2]).unwrap();
        store.add(vec![3, 4]).unwrap();
        let stats = store.stats();
        assert_eq!(stats.min_length, Some(1));
        assert_eq!(stats.max_length, Some(2));
        assert_eq!(stats.by_length.get(&2), Some(&2));
    }
}
