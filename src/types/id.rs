//! Identifier types for engine entities.
//!
//! These types provide type-safe identities for the three kinds of things an
//! observed program talks about: its threads, its synchronization primitives,
//! and the OS-level handles produced by thread creation.

use core::fmt;
use serde::{Deserialize, Serialize};

/// Identifier of an observed thread.
///
/// Thread ids index the engine's fixed-size thread table, so they are small
/// dense integers assigned by the instrumentation layer (the first thread of
/// the program is usually `0`).
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ThreadId(u32);

impl ThreadId {
    /// Creates a thread id from its raw table index.
    #[inline]
    #[must_use]
    pub const fn new(index: u32) -> Self {
        Self(index)
    }

    /// Returns the raw id.
    #[inline]
    #[must_use]
    pub const fn as_u32(self) -> u32 {
        self.0
    }

    /// Returns the thread table slot for this id.
    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl From<u32> for ThreadId {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

impl fmt::Debug for ThreadId {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ThreadId({})", self.0)
    }
}

impl fmt::Display for ThreadId {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "T{}", self.0)
    }
}

/// Address-equivalent identity of a synchronization primitive.
///
/// The instrumentation layer passes the address of the intercepted object
/// (a `pthread_mutex_t*`, a `sem_t*`, ...). The engine never dereferences it;
/// it is only a key. The same type names non-reentrant functions guarded by
/// an exclusive handshake.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PrimitiveKey(u64);

impl PrimitiveKey {
    /// Creates a key from a raw address or token.
    #[inline]
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw token.
    #[inline]
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl From<u64> for PrimitiveKey {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl fmt::Debug for PrimitiveKey {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PrimitiveKey({:#x})", self.0)
    }
}

impl fmt::Display for PrimitiveKey {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// Opaque OS-level thread handle returned by a create call.
///
/// Joins name their target by this handle, so the engine keeps a mapping from
/// the created thread's [`ThreadId`] to it.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OsHandle(u64);

impl OsHandle {
    /// Creates a handle from its raw value.
    #[inline]
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw handle value.
    #[inline]
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl From<u64> for OsHandle {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl fmt::Debug for OsHandle {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "OsHandle({})", self.0)
    }
}

impl fmt::Display for OsHandle {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "H{}", self.0)
    }
}
