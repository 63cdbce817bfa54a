//! Shape predicates over number sets.

/// True when the set is two or more consecutive offsets.
pub fn is_sequence(set: &[usize]) -> bool {
    set.len() > 1 && set.windows(2).all(|w| w[1] == w[0] + 1)
}

/// True when the set has at least one gap between neighbouring offsets.
pub fn is_bridge(set: &[usize]) -> bool {
    set.len() > 1 && set.windows(2).any(|w| w[1] != w[0] + 1)
}

/// True when every offset of `subset` is in `set` and `subset` is strictly smaller.
pub fn is_subset(set: &[usize], subset: &[usize]) -> bool {
    set.len() > subset.len() && subset.iter().all(|o| set.contains(o))
}

pub fn set_contains_offset(set: &[usize], offset: usize) -> bool {
    set.contains(&offset)
}

/// Element-wise equality.
pub fn compare_set(a: &[usize], b: &[usize]) -> bool {
    a == b
}

/// Number of offsets of `find` that also appear in `set`.
pub fn count_in_set(find: &[usize], set: &[usize]) -> usize {
    find.iter().filter(|o| set.contains(o)).count()
}

/// True when `set` holds a run of at least `size` consecutive offsets that
/// includes `position`.
pub fn is_set_contains_sequence(set: &[usize], size: usize, position: usize) -> bool {
    if set.len() < size {
        return false;
    }
    let mut run = 0usize;
    let mut has_position = false;
    let mut last: Option<usize> = None;
    for &offset in set {
        if last.is_some_and(|l| offset == l + 1) {
            run += 1;
        } else {
            // a new run starting past the position can never include it
            if offset > position {
                return false;
            }
            run = 1;
            has_position = false;
        }
        if offset == position {
            has_position = true;
        }
        if has_position && run >= size {
            return true;
        }
        last = Some(offset);
    }
    false
}
