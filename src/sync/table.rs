//! Lazily populated primitive tables.
//!
//! Each primitive family keeps its entries in a [`PrimitiveTable`] keyed by
//! [`PrimitiveKey`]. Entries come into existence either through an explicit
//! init call or implicitly on first use; the latter is logged as a warning.

use crate::error::{Error, Result};
use crate::tracing_compat::warn;
use crate::types::PrimitiveKey;
use core::fmt;
use serde::Serialize;
use std::collections::BTreeMap;

/// Family of an emulated primitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PrimitiveKind {
    /// Mutex.
    Mutex,
    /// Counting semaphore.
    Semaphore,
    /// Condition variable.
    CondVar,
    /// Read-write lock.
    RwLock,
}

impl PrimitiveKind {
    /// Returns the lowercase family name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Mutex => "mutex",
            Self::Semaphore => "semaphore",
            Self::CondVar => "cond",
            Self::RwLock => "rwlock",
        }
    }
}

impl fmt::Display for PrimitiveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Behaviour shared by every primitive entry.
pub trait Primitive: Default {
    /// Family of the primitive, for diagnostics.
    const KIND: PrimitiveKind;

    /// Number of threads queued on this entry.
    fn waiters(&self) -> usize;
}

/// Entries of one primitive family keyed by identity.
#[derive(Debug, Clone)]
pub struct PrimitiveTable<P> {
    entries: BTreeMap<PrimitiveKey, P>,
    implicit_creations: u64,
}

impl<P> Default for PrimitiveTable<P> {
    fn default() -> Self {
        Self {
            entries: BTreeMap::new(),
            implicit_creations: 0,
        }
    }
}

impl<P: Primitive> PrimitiveTable<P> {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the entry for `key`, creating a default one with a warning.
    pub fn get_or_create(&mut self, key: PrimitiveKey) -> &mut P {
        if !self.entries.contains_key(&key) {
            warn!(kind = %P::KIND, key = %key, "primitive used without explicit init");
            self.implicit_creations += 1;
        }
        self.entries.entry(key).or_default()
    }

    /// Installs `entry` under `key`, replacing any existing entry.
    ///
    /// Replacing an entry that still has waiters is fatal.
    pub fn init(&mut self, key: PrimitiveKey, entry: P) -> Result<()> {
        if let Some(existing) = self.entries.get(&key) {
            let waiters = existing.waiters();
            if waiters > 0 {
                return Err(Error::ReinitWithWaiters {
                    kind: P::KIND,
                    key,
                    waiters,
                });
            }
        }
        self.entries.insert(key, entry);
        Ok(())
    }

    /// Removes the entry for `key`.
    ///
    /// Destroying an unknown entry is a warning; destroying one with waiters
    /// is fatal.
    pub fn destroy(&mut self, key: PrimitiveKey) -> Result<()> {
        let Some(existing) = self.entries.get(&key) else {
            warn!(kind = %P::KIND, key = %key, "destroy of unknown or already destroyed primitive");
            return Ok(());
        };
        let waiters = existing.waiters();
        if waiters > 0 {
            return Err(Error::DestroyWithWaiters {
                kind: P::KIND,
                key,
                waiters,
            });
        }
        self.entries.remove(&key);
        Ok(())
    }

    /// Returns the entry for `key` without creating it.
    #[must_use]
    pub fn get(&self, key: PrimitiveKey) -> Option<&P> {
        self.entries.get(&key)
    }

    /// Returns the number of live entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if there are no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns how many entries were created implicitly.
    #[must_use]
    pub const fn implicit_creations(&self) -> u64 {
        self.implicit_creations
    }

    /// Iterates over the entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (PrimitiveKey, &P)> {
        self.entries.iter().map(|(k, v)| (*k, v))
    }
}
