pub mod logging;

use std::sync::{Mutex, MutexGuard};

/// Locks `mutex`, taking the guard even if a previous holder panicked.
///
/// Everything guarded this way is plain status data that stays valid after a
/// panic, so a poisoned lock is not worth tearing the worker down for.
pub fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| {
        log::warn!("recovering from poisoned lock");
        poisoned.into_inner()
    })
}
