//! Per-patient run serialization
//!
//! Two sync runs for the same patient would interleave field updates and
//! group inserts. Runs take the patient's lock for their whole duration;
//! different patients never wait on each other.

use rtwiz_common::PatientId;
use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex, PoisonError};
use tokio::sync::{Mutex, OwnedMutexGuard};

type Registry = Arc<StdMutex<HashMap<PatientId, Arc<Mutex<()>>>>>;

/// Registry of per-patient locks
#[derive(Debug, Clone, Default)]
pub struct PatientLocks {
    registry: Registry,
}

impl PatientLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for and hold the patient's lock until the guard is dropped
    pub async fn acquire(&self, patient_id: PatientId) -> PatientGuard {
        let lock = {
            let mut map = self.registry.lock().unwrap_or_else(PoisonError::into_inner);
            map.entry(patient_id).or_default().clone()
        };
        let guard = lock.clone().lock_owned().await;

        PatientGuard {
            patient_id,
            lock,
            guard: Some(guard),
            registry: self.registry.clone(),
        }
    }

    /// True while some run holds the patient's lock
    pub fn is_locked(&self, patient_id: PatientId) -> bool {
        let map = self.registry.lock().unwrap_or_else(PoisonError::into_inner);
        map.get(&patient_id)
            .map(|lock| lock.try_lock().is_err())
            .unwrap_or(false)
    }

    /// Number of patients with a live lock entry
    pub fn tracked(&self) -> usize {
        self.registry
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

/// Held patient lock; releases and prunes the registry entry on drop
#[derive(Debug)]
pub struct PatientGuard {
    patient_id: PatientId,
    lock: Arc<Mutex<()>>,
    guard: Option<OwnedMutexGuard<()>>,
    registry: Registry,
}

impl PatientGuard {
    pub fn patient_id(&self) -> PatientId {
        self.patient_id
    }
}

impl Drop for PatientGuard {
    fn drop(&mut self) {
        self.guard.take();
        let mut map = self.registry.lock().unwrap_or_else(PoisonError::into_inner);
        // Registry entry plus ours: nobody else is waiting
        if Arc::strong_count(&self.lock) == 2 {
            map.remove(&self.patient_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn patient(id: i64) -> PatientId {
        PatientId::new(id).unwrap()
    }

    #[tokio::test]
    async fn test_same_patient_waits() {
        let locks = PatientLocks::new();
        let first = locks.acquire(patient(1)).await;
        assert!(locks.is_locked(patient(1)));

        let locks2 = locks.clone();
        let waiter = tokio::spawn(async move {
            let _second = locks2.acquire(patient(1)).await;
        });

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!waiter.is_finished());

        drop(first);
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter should acquire after release")
            .unwrap();
    }

    #[tokio::test]
    async fn test_different_patients_do_not_block() {
        let locks = PatientLocks::new();
        let _a = locks.acquire(patient(1)).await;
        let b = tokio::time::timeout(Duration::from_millis(200), locks.acquire(patient(2))).await;
        assert!(b.is_ok());
    }

    #[tokio::test]
    async fn test_registry_is_pruned_after_release() {
        let locks = PatientLocks::new();
        {
            let guard = locks.acquire(patient(5)).await;
            assert_eq!(guard.patient_id(), patient(5));
            assert_eq!(locks.tracked(), 1);
        }
        assert_eq!(locks.tracked(), 0);
        assert!(!locks.is_locked(patient(5)));
    }
}
