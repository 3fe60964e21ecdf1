//! Transaction handle

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use uuid::Uuid;

#[derive(Debug)]
struct TxState {
    id: Uuid,
    active: AtomicBool,
    deadline: Option<Instant>,
}

/// Handle to the transaction a session executes in.
///
/// Cloning shares the state: closing the transaction through any clone
/// makes every clone inactive.
#[derive(Debug, Clone)]
pub struct Transaction {
    state: Arc<TxState>,
}

impl Transaction {
    /// Starts an active transaction without deadline
    pub fn begin() -> Self {
        Self {
            state: Arc::new(TxState {
                id: Uuid::new_v4(),
                active: AtomicBool::new(true),
                deadline: None,
            }),
        }
    }

    /// Starts an active transaction that expires after `timeout`
    pub fn begin_with_timeout(timeout: Duration) -> Self {
        Self {
            state: Arc::new(TxState {
                id: Uuid::new_v4(),
                active: AtomicBool::new(true),
                deadline: Some(Instant::now() + timeout),
            }),
        }
    }

    pub fn id(&self) -> Uuid {
        self.state.id
    }

    pub fn is_active(&self) -> bool {
        self.state.active.load(Ordering::Acquire)
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.state.deadline
    }

    /// Ends the transaction; later writes through this handle fail
    pub fn close(&self) {
        self.state.active.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_close_is_shared_by_clones() {
        let tx = Transaction::begin();
        let other = tx.clone();
        assert!(other.is_active());
        tx.close();
        assert!(!other.is_active());
        assert_eq!(tx.id(), other.id());
    }

    #[test]
    fn test_deadline() {
        assert!(Transaction::begin().deadline().is_none());
        let tx = Transaction::begin_with_timeout(Duration::from_secs(5));
        assert!(tx.deadline().unwrap() > Instant::now());
    }
}
