//! Position-plus-table cursors over live slots.
//!
//! `Cursor<&CoalescedHashMap>` and `Cursor<&mut CoalescedHashMap>` are the
//! same type: the skip logic lives once, on any `M: Deref` to the map, and
//! only value mutation needs `DerefMut`. Since a cursor borrows its map, any
//! structural mutation that would invalidate it is rejected at compile time.

use crate::error::Error;
use crate::CoalescedHashMap;
use core::fmt;
use core::ops::{Deref, DerefMut};

/// A slot position in a [`CoalescedHashMap`]; `capacity()` is the end sentinel.
pub struct Cursor<M> {
    map: M,
    index: usize,
}

impl<M> Cursor<M> {
    pub(crate) fn new(map: M, index: usize) -> Self {
        Self { map, index }
    }

    /// The slot index this cursor points at.
    pub fn index(&self) -> usize {
        self.index
    }
}

impl<M, K, V, S> Cursor<M>
where
    M: Deref<Target = CoalescedHashMap<K, V, S>>,
{
    pub fn is_end(&self) -> bool {
        self.index >= self.map.slots.capacity()
    }

    /// Moves to the next live slot, or to the end. Stays put at the end.
    pub fn move_next(&mut self) {
        self.index = self.map.slots.next_live(self.index.saturating_add(1));
    }

    fn live_index(&self) -> Result<usize, Error> {
        let slots = &self.map.slots;
        if self.index < slots.capacity() && slots.is_live_at(self.index) {
            Ok(self.index)
        } else {
            Err(Error::OutOfRange)
        }
    }

    /// The entry under the cursor; [`Error::OutOfRange`] at the end.
    pub fn get<'a>(&'a self) -> Result<(&'a K, &'a V), Error>
    where
        K: 'a,
        V: 'a,
        S: 'a,
    {
        let index = self.live_index()?;
        self.map
            .slots
            .entry(index)
            .map(|e| (&e.key, &e.value))
            .ok_or(Error::OutOfRange)
    }

    pub fn key<'a>(&'a self) -> Result<&'a K, Error>
    where
        K: 'a,
        V: 'a,
        S: 'a,
    {
        self.get().map(|(k, _)| k)
    }

    pub fn value<'a>(&'a self) -> Result<&'a V, Error>
    where
        K: 'a,
        V: 'a,
        S: 'a,
    {
        self.get().map(|(_, v)| v)
    }
}

impl<M, K, V, S> Cursor<M>
where
    M: DerefMut<Target = CoalescedHashMap<K, V, S>>,
{
    pub fn get_mut<'a>(&'a mut self) -> Result<(&'a K, &'a mut V), Error>
    where
        K: 'a,
        V: 'a,
        S: 'a,
    {
        let index = self.live_index()?;
        self.map
            .slots
            .entry_mut(index)
            .map(|e| (&e.key, &mut e.value))
            .ok_or(Error::OutOfRange)
    }

    pub fn value_mut<'a>(&'a mut self) -> Result<&'a mut V, Error>
    where
        K: 'a,
        V: 'a,
        S: 'a,
    {
        self.get_mut().map(|(_, v)| v)
    }
}

impl<'a, K, V, S> Clone for Cursor<&'a CoalescedHashMap<K, V, S>> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<'a, K, V, S> Copy for Cursor<&'a CoalescedHashMap<K, V, S>> {}

impl<M, N, K, V, S> PartialEq<Cursor<N>> for Cursor<M>
where
    M: Deref<Target = CoalescedHashMap<K, V, S>>,
    N: Deref<Target = CoalescedHashMap<K, V, S>>,
{
    /// Same table and same position.
    fn eq(&self, other: &Cursor<N>) -> bool {
        core::ptr::eq(&*self.map, &*other.map) && self.index == other.index
    }
}

impl<M> fmt::Debug for Cursor<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cursor").field("index", &self.index).finish()
    }
}
