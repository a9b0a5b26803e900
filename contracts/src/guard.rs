//! Reentrancy guard for the engine's mutating operations.
//!
//! One flag for the whole engine. [`ReentrancyGuard::enter`] either claims it
//! and hands back a [`GuardScope`], or fails immediately with
//! [`VaultError::ReentrantCall`]. Nothing ever waits on the flag. Dropping the
//! scope releases it, which covers every exit path including `?` and panics.

use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::VaultError;

#[derive(Debug, Default)]
pub struct ReentrancyGuard {
    entered: AtomicBool,
}

impl ReentrancyGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims the guard for the lifetime of the returned scope.
    pub fn enter(&self) -> Result<GuardScope<'_>, VaultError> {
        self.entered
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| VaultError::ReentrantCall)?;
        Ok(GuardScope { guard: self })
    }

    /// Returns whether a guarded operation is currently in flight.
    pub fn is_entered(&self) -> bool {
        self.entered.load(Ordering::Acquire)
    }
}

/// Proof that the guard is held. Releases it on drop.
#[must_use = "the guard is released as soon as the scope is dropped"]
#[derive(Debug)]
pub struct GuardScope<'a> {
    guard: &'a ReentrancyGuard,
}

impl Drop for GuardScope<'_> {
    fn drop(&mut self) {
        self.guard.entered.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_entry_is_rejected() {
        let guard = ReentrancyGuard::new();
        let outer = guard.enter().unwrap();
        assert!(guard.is_entered());
        assert!(matches!(guard.enter(), Err(VaultError::ReentrantCall)));
        drop(outer);
        assert!(!guard.is_entered());
    }

    #[test]
    fn released_on_early_return() {
        fn failing(guard: &ReentrancyGuard) -> Result<(), VaultError> {
            let _scope = guard.enter()?;
            Err(VaultError::DivisionByZero)
        }

        let guard = ReentrancyGuard::new();
        assert!(failing(&guard).is_err());
        assert!(!guard.is_entered());
        assert!(guard.enter().is_ok());
    }

    #[test]
    fn released_on_panic() {
        let guard = ReentrancyGuard::new();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _scope = guard.enter().unwrap();
            panic!("collaborator blew up");
        }));
        assert!(result.is_err());
        assert!(!guard.is_entered());
    }
}
