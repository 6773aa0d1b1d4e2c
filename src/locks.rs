// Copyright (c) 2025 Flavio Neto
// Licensed under the MIT License. See LICENSE file for details.

//! Poison-tolerant lock helpers.
//!
//! The poll task and the view share the session state behind an `RwLock`.
//! A panic while holding the write guard poisons the lock; for a display
//! front-end, showing possibly-stale transfer rows beats dying, so these
//! helpers log the event and recover the guard instead of panicking.

use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Acquire a read lock, recovering from poisoning if necessary.
#[inline]
pub fn resilient_read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    match lock.read() {
        Ok(guard) => guard,
        Err(poisoned) => {
            tracing::error!(
                "RwLock poisoned during read acquisition; recovering. \
                 A task panicked while holding this lock."
            );
            poisoned.into_inner()
        }
    }
}

/// Acquire a write lock, recovering from poisoning if necessary.
#[inline]
pub fn resilient_write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    match lock.write() {
        Ok(guard) => guard,
        Err(poisoned) => {
            tracing::error!(
                "RwLock poisoned during write acquisition; recovering. \
                 A task panicked while holding this lock."
            );
            poisoned.into_inner()
        }
    }
}
