//! Periodic driver for the inactivity deadlines.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info};

use crate::tracking::session::{SessionManager, SessionTransition};

/// Something that owns a session and can apply its inactivity deadlines.
pub trait Inactivity: Send {
    fn poll_inactivity(&mut self) -> Option<SessionTransition>;
}

impl Inactivity for SessionManager {
    fn poll_inactivity(&mut self) -> Option<SessionTransition> {
        self.poll()
    }
}

/// Polls `target` every `period` until the returned handle is aborted.
pub fn spawn_inactivity_monitor<T>(target: Arc<Mutex<T>>, period: Duration) -> JoinHandle<()>
where
    T: Inactivity + 'static,
{
    tokio::spawn(async move {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        debug!(?period, "inactivity monitor started");
        loop {
            ticker.tick().await;
            let transition = target.lock().await.poll_inactivity();
            if let Some(transition) = transition {
                info!(?transition, "inactivity transition");
            }
        }
    })
}
