use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

/// Enforces a minimum spacing between request starts against one provider.
///
/// Shared by every fetch worker, so the spacing holds across all of them
/// rather than per worker. Slots are handed out in call order.
#[derive(Debug)]
pub struct RequestPacer {
    spacing: Duration,
    next_slot: Mutex<Option<Instant>>,
}

impl RequestPacer {
    pub fn new(spacing: Duration) -> Self {
        Self {
            spacing,
            next_slot: Mutex::new(None),
        }
    }

    pub fn spacing(&self) -> Duration {
        self.spacing
    }

    /// Wait until this caller may start its request.
    pub async fn acquire(&self) {
        let wait_until = {
            let mut next = self.next_slot.lock().await;
            let now = Instant::now();
            let slot = match *next {
                Some(t) if t > now => t,
                _ => now,
            };
            *next = Some(slot + self.spacing);
            slot
        };
        if wait_until > Instant::now() {
            tokio::time::sleep_until(wait_until).await;
        }
    }
}
