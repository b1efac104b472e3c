//! # DirtyTracker
//! Wraps a value and records whether it changed since listeners were last told about it.
//! The only way to get `&mut` access is through [`DirtyTracker::value_mut`], so a write can't go unnoticed.

use std::ops::{Deref, DerefMut};

use crate::data_model::ListenerKey;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DirtyState {
    /// Not dirty, no pending notifications
    Clean,
    /// Dirty, notify all listeners except the specified one
    DirtyExcept(ListenerKey),
    /// Dirty, notify all listeners
    DirtyAll,
}

impl DirtyState {
    /// Combine a pending state with a new write made by `modifier`.
    pub fn merge(&self, modifier: Option<ListenerKey>) -> DirtyState {
        use DirtyState::*;
        match (self, modifier) {
            (Clean, Some(key)) => DirtyExcept(key),
            (DirtyExcept(pending), Some(key)) if *pending == key => DirtyExcept(key),
            (Clean, None) => DirtyAll,
            (DirtyExcept(_), _) | (DirtyAll, _) => DirtyAll,
        }
    }

    pub fn is_dirty(&self) -> bool {
        !matches!(self, DirtyState::Clean)
    }
}

#[derive(Clone, Debug)]
pub struct DirtyTracker<T> {
    value: T,
    dirty_state: DirtyState,
}

impl<T> DirtyTracker<T> {
    /// Wrap a value without scheduling a notification for it.
    pub fn clean(value: T) -> Self {
        Self {
            value,
            dirty_state: DirtyState::Clean,
        }
    }

    pub fn get(&self) -> &T {
        &self.value
    }

    pub fn dirty_state(&self) -> &DirtyState {
        &self.dirty_state
    }

    pub fn value_mut(&mut self, modifier: Option<ListenerKey>) -> MarkDirtyOnWrite<'_, T> {
        MarkDirtyOnWrite {
            value: &mut self.value,
            dirty_state: &mut self.dirty_state,
            modifier,
        }
    }

    /// Returns the pending state and resets it to clean.
    pub fn take_dirty(&mut self) -> DirtyState {
        std::mem::replace(&mut self.dirty_state, DirtyState::Clean)
    }
}

/// Smart pointer that marks the tracker dirty the first time it is dereferenced mutably
pub struct MarkDirtyOnWrite<'a, T> {
    value: &'a mut T,
    dirty_state: &'a mut DirtyState,
    modifier: Option<ListenerKey>,
}

impl<T> Deref for MarkDirtyOnWrite<'_, T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        self.value
    }
}

impl<T> DerefMut for MarkDirtyOnWrite<'_, T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        *self.dirty_state = self.dirty_state.merge(self.modifier);
        self.value
    }
}

impl<T> MarkDirtyOnWrite<'_, T> {
    /// Replace the whole value, e.g. with the result of a reducer.
    pub fn set(&mut self, value: T) {
        **self = value;
    }
}
