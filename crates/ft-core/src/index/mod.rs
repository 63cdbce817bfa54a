//! Per-number-set accumulator tables.

mod numberset_index;

pub use numberset_index::{AccumHandle, NumberSetIndex};

use std::sync::{Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};

use ft_common::{Error, Result};

pub(crate) fn lock<'a, T>(m: &'a Mutex<T>, what: &str) -> Result<MutexGuard<'a, T>> {
    m.lock().map_err(|_| Error::LockPoisoned(what.to_string()))
}

pub(crate) fn read<'a, T>(l: &'a RwLock<T>, what: &str) -> Result<RwLockReadGuard<'a, T>> {
    l.read().map_err(|_| Error::LockPoisoned(what.to_string()))
}

pub(crate) fn write<'a, T>(l: &'a RwLock<T>, what: &str) -> Result<RwLockWriteGuard<'a, T>> {
    l.write().map_err(|_| Error::LockPoisoned(what.to_string()))
}
