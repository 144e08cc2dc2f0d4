use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::controller::Event;

/// Owned, cancellable renewal timer.
///
/// The timer is a task that sleeps until its deadline and then posts its
/// event to the controller queue. Dropping the handle cancels it.
#[derive(Debug)]
pub struct RenewalTimer {
    handle: JoinHandle<()>,
    delay: Duration,
}

impl RenewalTimer {
    /// Arms a timer that posts `event` after `delay`
    pub fn arm(delay: Duration, events: UnboundedSender<Event>, event: Event) -> Self {
        let deadline = Instant::now() + delay;
        let handle = tokio::spawn(async move {
            tokio::time::sleep_until(deadline).await;
            // Controller gone means nobody is left to renew for
            let _ = events.send(event);
        });

        Self { handle, delay }
    }

    pub fn cancel(&self) {
        self.handle.abort();
    }

    /// True until the timer has fired
    pub fn is_live(&self) -> bool {
        !self.handle.is_finished()
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }
}

impl Drop for RenewalTimer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
