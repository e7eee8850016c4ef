use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

use courtside_core::domain::user::PhoneNumber;

/// One async mutex per sender. Holding the guard makes the caller the only
/// writer for that phone; different senders never wait on each other.
#[derive(Default)]
pub struct SenderLocks {
    slots: DashMap<String, Arc<Mutex<()>>>,
}

impl SenderLocks {
    pub async fn acquire(&self, sender: &PhoneNumber) -> OwnedMutexGuard<()> {
        // the map shard guard is released before awaiting the sender lock
        let slot = Arc::clone(self.slots.entry(sender.0.clone()).or_default().value());
        slot.lock_owned().await
    }
}
