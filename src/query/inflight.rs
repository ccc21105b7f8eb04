//! In-flight fetch table for request coalescing.
//!
//! The first query to miss on a full key becomes the leader and runs its
//! fetcher; queries that miss on the same key while the leader is running
//! subscribe to its result instead of fetching again.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde_json::Value;
use tokio::sync::watch;

/// Outcome broadcast by a leader: the fetched value as JSON, or the error
/// message.
pub(crate) type FlightResult = Result<Value, String>;

type FlightSlot = watch::Receiver<Option<FlightResult>>;

#[derive(Debug, Default)]
pub(crate) struct InFlight {
    calls: Mutex<HashMap<String, FlightSlot>>,
}

pub(crate) enum Flight {
    Leader(FlightGuard),
    Follower(FlightSlot),
}

impl InFlight {
    fn lock(&self) -> MutexGuard<'_, HashMap<String, FlightSlot>> {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Joins the flight for `key`, starting one if none is running.
    pub fn join(self: &Arc<Self>, key: &str) -> Flight {
        let mut calls = self.lock();
        if let Some(slot) = calls.get(key) {
            return Flight::Follower(slot.clone());
        }

        let (tx, rx) = watch::channel(None);
        calls.insert(key.to_string(), rx);
        Flight::Leader(FlightGuard {
            key: key.to_string(),
            tx,
            table: Arc::clone(self),
        })
    }

    /// Number of keys with a fetch in progress.
    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.lock().len()
    }
}

/// Held by the leader. Dropping it, completed or not, retires the flight;
/// followers of an abandoned flight see the channel close.
pub(crate) struct FlightGuard {
    key: String,
    tx: watch::Sender<Option<FlightResult>>,
    table: Arc<InFlight>,
}

impl FlightGuard {
    pub fn complete(self, result: FlightResult) {
        self.tx.send_replace(Some(result));
    }
}

impl Drop for FlightGuard {
    fn drop(&mut self) {
        self.table.lock().remove(&self.key);
    }
}

/// Waits for the leader's result. `None` means the leader went away without
/// finishing.
pub(crate) async fn wait(mut slot: FlightSlot) -> Option<FlightResult> {
    match slot.wait_for(Option::is_some).await {
        Ok(result) => result.clone(),
        Err(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_second_caller_follows() {
        let table = Arc::new(InFlight::default());

        let Flight::Leader(guard) = table.join("cache:k") else {
            panic!("first caller should lead");
        };
        let Flight::Follower(slot) = table.join("cache:k") else {
            panic!("second caller should follow");
        };
        assert_eq!(table.len(), 1);

        guard.complete(Ok(json!(7)));
        assert_eq!(wait(slot).await, Some(Ok(json!(7))));
        assert_eq!(table.len(), 0);
    }

    #[tokio::test]
    async fn test_abandoned_flight_releases_followers() {
        let table = Arc::new(InFlight::default());

        let Flight::Leader(guard) = table.join("cache:k") else {
            panic!("first caller should lead");
        };
        let Flight::Follower(slot) = table.join("cache:k") else {
            panic!("second caller should follow");
        };

        drop(guard);
        assert_eq!(wait(slot).await, None);
        assert!(matches!(table.join("cache:k"), Flight::Leader(_)));
    }

    #[test]
    fn test_late_follower_sees_completed_result() {
        let table = Arc::new(InFlight::default());

        let Flight::Leader(guard) = table.join("cache:k") else {
            panic!("first caller should lead");
        };
        let Flight::Follower(slot) = table.join("cache:k") else {
            panic!("second caller should follow");
        };
        guard.complete(Err("boom".to_string()));

        let result = tokio_test::block_on(wait(slot));
        assert_eq!(result, Some(Err("boom".to_string())));
    }

    #[tokio::test]
    async fn test_keys_are_independent() {
        let table = Arc::new(InFlight::default());
        let _a = table.join("cache:a");
        assert!(matches!(table.join("cache:b"), Flight::Leader(_)));
    }
}
