//! Index lock requiring agreement from both master and cache.
//!
//! A compound lock is held iff both underlying locks are held. Partial
//! acquisition is always unwound before `obtain` returns: a half-held
//! compound lock left standing would deadlock other processes against the
//! master side.

use replisearch_core::error::ReplicaResult;
use replisearch_core::traits::IndexLock;
use tracing::warn;

/// Pairs a master-side and a cache-side lock.
#[derive(Debug)]
pub struct CompoundLock {
    master: Box<dyn IndexLock>,
    cache: Box<dyn IndexLock>,
}

impl CompoundLock {
    #[must_use]
    pub fn new(master: Box<dyn IndexLock>, cache: Box<dyn IndexLock>) -> Self {
        Self { master, cache }
    }
}

impl IndexLock for CompoundLock {
    /// Master first; the cache lock is only attempted once the master side
    /// is held, and the master side is released again on any cache-side
    /// outcome other than success.
    fn obtain(&self) -> ReplicaResult<bool> {
        if !self.master.obtain()? {
            return Ok(false);
        }
        match self.cache.obtain() {
            Ok(true) => Ok(true),
            Ok(false) => {
                self.master.release()?;
                Ok(false)
            }
            Err(cache_err) => {
                if let Err(master_err) = self.master.release() {
                    warn!(
                        target: "replisearch",
                        error = %master_err,
                        "failed to unwind master lock after cache-side obtain error"
                    );
                }
                Err(cache_err)
            }
        }
    }

    /// Held if either side is held.
    fn is_locked(&self) -> ReplicaResult<bool> {
        Ok(self.master.is_locked()? || self.cache.is_locked()?)
    }

    /// Release master first; a master-side failure still attempts the
    /// cache side before propagating, so it never leaks the cache lock.
    fn release(&self) -> ReplicaResult<()> {
        let master_result = self.master.release();
        let cache_result = self.cache.release();
        master_result?;
        cache_result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use replisearch_core::error::ReplicaError;

    /// Scriptable lock: succeeds, contends, or errors on obtain.
    #[derive(Debug)]
    struct ScriptedLock {
        obtain_outcome: ObtainOutcome,
        held: AtomicBool,
        obtains: AtomicUsize,
        releases: AtomicUsize,
    }

    #[derive(Debug, Clone, Copy)]
    enum ObtainOutcome {
        Granted,
        Contended,
        Fails,
    }

    impl ScriptedLock {
        fn new(outcome: ObtainOutcome) -> Self {
            Self {
                obtain_outcome: outcome,
                held: AtomicBool::new(false),
                obtains: AtomicUsize::new(0),
                releases: AtomicUsize::new(0),
            }
        }
    }

    impl IndexLock for &ScriptedLock {
        fn obtain(&self) -> ReplicaResult<bool> {
            self.obtains.fetch_add(1, Ordering::SeqCst);
            match self.obtain_outcome {
                ObtainOutcome::Granted => {
                    self.held.store(true, Ordering::SeqCst);
                    Ok(true)
                }
                ObtainOutcome::Contended => Ok(false),
                ObtainOutcome::Fails => Err(ReplicaError::Transient {
                    path: "lock".into(),
                    detail: "lock backend unavailable".into(),
                }),
            }
        }

        fn is_locked(&self) -> ReplicaResult<bool> {
            Ok(self.held.load(Ordering::SeqCst))
        }

        fn release(&self) -> ReplicaResult<()> {
            self.releases.fetch_add(1, Ordering::SeqCst);
            self.held.store(false, Ordering::SeqCst);
            Ok(())
        }
    }

    fn boxed(lock: &'static ScriptedLock) -> Box<dyn IndexLock> {
        Box::new(lock)
    }

    fn leak(lock: ScriptedLock) -> &'static ScriptedLock {
        Box::leak(Box::new(lock))
    }

    #[test]
    fn obtain_requires_both_sides() {
        let master = leak(ScriptedLock::new(ObtainOutcome::Granted));
        let cache = leak(ScriptedLock::new(ObtainOutcome::Granted));
        let compound = CompoundLock::new(boxed(master), boxed(cache));

        assert!(compound.obtain().expect("obtain"));
        assert!(compound.is_locked().expect("locked"));
        compound.release().expect("release");
        assert!(!compound.is_locked().expect("unlocked"));
    }

    #[test]
    fn master_contention_short_circuits() {
        let master = leak(ScriptedLock::new(ObtainOutcome::Contended));
        let cache = leak(ScriptedLock::new(ObtainOutcome::Granted));
        let compound = CompoundLock::new(boxed(master), boxed(cache));

        assert!(!compound.obtain().expect("obtain"));
        assert_eq!(cache.obtains.load(Ordering::SeqCst), 0, "cache untouched");
    }

    #[test]
    fn cache_contention_unwinds_master() {
        let master = leak(ScriptedLock::new(ObtainOutcome::Granted));
        let cache = leak(ScriptedLock::new(ObtainOutcome::Contended));
        let compound = CompoundLock::new(boxed(master), boxed(cache));

        assert!(!compound.obtain().expect("obtain"));
        assert_eq!(master.releases.load(Ordering::SeqCst), 1);
        assert!(!master.held.load(Ordering::SeqCst), "master must be free");
    }

    #[test]
    fn cache_error_unwinds_master_and_propagates() {
        let master = leak(ScriptedLock::new(ObtainOutcome::Granted));
        let cache = leak(ScriptedLock::new(ObtainOutcome::Fails));
        let compound = CompoundLock::new(boxed(master), boxed(cache));

        let err = compound.obtain().expect_err("must propagate");
        assert!(matches!(err, ReplicaError::Transient { .. }));
        assert_eq!(master.releases.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn is_locked_when_either_side_held() {
        let master = leak(ScriptedLock::new(ObtainOutcome::Granted));
        let cache = leak(ScriptedLock::new(ObtainOutcome::Granted));
        master.held.store(true, Ordering::SeqCst);
        let compound = CompoundLock::new(boxed(master), boxed(cache));
        assert!(compound.is_locked().expect("locked"));
    }

    #[test]
    fn release_always_reaches_the_cache_side() {
        #[derive(Debug)]
        struct FailingRelease(&'static ScriptedLock);

        impl IndexLock for FailingRelease {
            fn obtain(&self) -> ReplicaResult<bool> {
                Ok(true)
            }
            fn is_locked(&self) -> ReplicaResult<bool> {
                Ok(true)
            }
            fn release(&self) -> ReplicaResult<()> {
                self.0.releases.fetch_add(1, Ordering::SeqCst);
                Err(ReplicaError::Transient {
                    path: "master.lock".into(),
                    detail: "remote store offline".into(),
                })
            }
        }

        let master_probe = leak(ScriptedLock::new(ObtainOutcome::Granted));
        let cache = leak(ScriptedLock::new(ObtainOutcome::Granted));
        let compound = CompoundLock::new(Box::new(FailingRelease(master_probe)), boxed(cache));

        let err = compound.release().expect_err("master failure propagates");
        assert!(matches!(err, ReplicaError::Transient { .. }));
        assert_eq!(
            cache.releases.load(Ordering::SeqCst),
            1,
            "cache release must still have been attempted"
        );
    }
}
