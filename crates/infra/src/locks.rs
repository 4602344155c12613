use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use campusdesk_core::CartId;

/// One async mutex per cart.
///
/// Held across an order mutation and the cart recomputation that follows it,
/// so sibling orders of one cart change status one at a time.
#[derive(Debug, Default)]
pub struct CartLocks {
    locks: Mutex<HashMap<CartId, Arc<AsyncMutex<()>>>>,
}

impl CartLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lock(&self, cart: CartId) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
            locks.entry(cart).or_default().clone()
        };
        lock.lock_owned().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn same_cart_is_serialized() {
        let locks = Arc::new(CartLocks::new());
        let cart = CartId::new();
        let guard = locks.lock(cart).await;

        let contender = {
            let locks = locks.clone();
            tokio::spawn(async move {
                let _g = locks.lock(cart).await;
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!contender.is_finished());

        drop(guard);
        contender.await.unwrap();
    }

    #[tokio::test]
    async fn different_carts_do_not_block() {
        let locks = CartLocks::new();
        let _a = locks.lock(CartId::new()).await;
        let _b = locks.lock(CartId::new()).await;
    }
}
