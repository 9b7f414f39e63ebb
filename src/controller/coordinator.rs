use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tracing::debug;

use crate::controller::{ChangeSubscription, PlayerHandle, SessionBackend, SubscriptionGuard};
use crate::error::ControlError;
use crate::session::{CommandKind, MediaSession, PlaybackStatus, SessionSnapshot, distinct_sessions};

/// How long one wait for a post-command change may take before the
/// coordinator intervenes. Two of these fit inside the default outer
/// command deadline with room to spare, so a silent player still produces a
/// best-effort answer instead of a top-level timeout.
pub const CHANGE_WAIT: Duration = Duration::from_millis(800);

/// One initial wait plus one recovery attempt.
const WAIT_ATTEMPTS: u32 = 2;

/// Issues transport commands and reports the player's state once it has
/// genuinely changed, or the latest known state when the player never
/// signals anything distinguishable.
pub struct Controller<B: SessionBackend> {
    backend: B,
    change_wait: Duration,
    waits: Mutex<HashMap<String, ActiveWait>>,
    wait_seq: AtomicU64,
}

/// At most one of these exists per player key. Claiming a new one retires
/// the previous occupant's subscription first.
struct ActiveWait {
    id: u64,
    guard: SubscriptionGuard,
}

impl<B: SessionBackend> Controller<B> {
    pub fn new(backend: B) -> Self {
        Controller {
            backend,
            change_wait: CHANGE_WAIT,
            waits: Mutex::new(HashMap::new()),
            wait_seq: AtomicU64::new(0),
        }
    }

    #[cfg(test)]
    fn with_change_wait(mut self, change_wait: Duration) -> Self {
        self.change_wait = change_wait;
        self
    }

    /// Sessions currently playing, optionally deduplicated by
    /// (title, artist).
    pub async fn playing_sessions(
        &self,
        distinct: bool,
    ) -> Result<Vec<MediaSession>, ControlError> {
        let mut sessions = self.backend.sessions().await?;
        sessions.retain(|session| session.status == PlaybackStatus::Playing);
        if distinct {
            sessions = distinct_sessions(sessions);
        }
        Ok(sessions)
    }

    /// Issue `command` to the selected player and return its post-command
    /// state.
    ///
    /// The subscription and the wait-table entry are released on every exit
    /// path; cancellation from an outer deadline unwinds through the slot
    /// and guard drops.
    pub async fn transport(
        &self,
        source: Option<&str>,
        command: CommandKind,
    ) -> Result<SessionSnapshot, ControlError> {
        let handle = self.backend.discover(source).await?;
        debug!(player = handle.key(), %command, "issuing transport command");

        let baseline = self.backend.snapshot(&handle).await?;

        // Retire any wait still in flight for this player before installing
        // ours; two live subscriptions on one handle would double-deliver.
        self.retire(handle.key());
        let mut subscription = self.backend.subscribe(&handle).await?;
        let slot = WaitSlot::claim(self, handle.key(), subscription.guard());

        self.backend.execute(&handle, command).await?;
        let outcome = self
            .wait_for_change(&handle, &baseline, command, &mut subscription)
            .await;
        drop(slot);
        outcome
    }

    /// Observe the player until a snapshot differs materially from the
    /// baseline. Notifications only say "something happened"; each one
    /// triggers a fresh snapshot fetch, which is the single authority on
    /// whether the change is real.
    async fn wait_for_change(
        &self,
        handle: &B::Handle,
        baseline: &SessionSnapshot,
        command: CommandKind,
        subscription: &mut ChangeSubscription,
    ) -> Result<SessionSnapshot, ControlError> {
        let mut reissued_after_reset = false;

        'attempts: for attempt in 0..WAIT_ATTEMPTS {
            if attempt > 0 {
                debug!(player = handle.key(), %command, "no change observed, re-issuing once");
                self.backend.execute(handle, command).await?;
            }

            let interval = tokio::time::sleep(self.change_wait);
            tokio::pin!(interval);

            loop {
                tokio::select! {
                    _ = &mut interval => continue 'attempts,
                    changed = subscription.changed() => {
                        if changed.is_none() {
                            // Superseded or the player vanished; nothing
                            // more will arrive.
                            break 'attempts;
                        }
                        let current = self.backend.snapshot(handle).await?;
                        if current.differs_materially(baseline) {
                            debug!(player = handle.key(), "state change detected");
                            return Ok(current);
                        }
                        if command.reset_to_start_aware()
                            && !reissued_after_reset
                            && current.is_reset_to_start_of(baseline)
                        {
                            // The player snapped to the start of the current
                            // track instead of going back one; skip again and
                            // keep waiting for the real change.
                            debug!(player = handle.key(), "track reset to start, skipping again");
                            reissued_after_reset = true;
                            self.backend.execute(handle, command).await?;
                        }
                    }
                }
            }
        }

        // Some players never emit a distinguishable signal (toggling an
        // already-paused single track changes no metadata). The latest known
        // state beats surfacing a timeout for a legitimate no-op.
        debug!(player = handle.key(), "no state change observed, returning current state");
        self.backend.snapshot(handle).await
    }

    fn retire(&self, key: &str) {
        let mut waits = self.waits.lock().unwrap();
        if let Some(previous) = waits.remove(key) {
            previous.guard.release();
        }
    }

    fn finish(&self, key: &str, id: u64) {
        let mut waits = self.waits.lock().unwrap();
        if waits.get(key).is_some_and(|wait| wait.id == id) {
            if let Some(wait) = waits.remove(key) {
                wait.guard.release();
            }
        }
    }
}

/// Occupancy of the wait table for the duration of one `transport` call.
/// Dropping it (normal return, error, or cancellation) releases the
/// subscription and vacates the entry unless a later wait already took it
/// over.
struct WaitSlot<'a, B: SessionBackend> {
    controller: &'a Controller<B>,
    key: String,
    id: u64,
}

impl<'a, B: SessionBackend> WaitSlot<'a, B> {
    fn claim(controller: &'a Controller<B>, key: &str, guard: SubscriptionGuard) -> Self {
        let id = controller.wait_seq.fetch_add(1, Ordering::Relaxed) + 1;
        let mut waits = controller.waits.lock().unwrap();
        if let Some(previous) = waits.insert(key.to_string(), ActiveWait { id, guard }) {
            previous.guard.release();
        }
        WaitSlot {
            controller,
            key: key.to_string(),
            id,
        }
    }
}

impl<B: SessionBackend> Drop for WaitSlot<'_, B> {
    fn drop(&mut self) {
        self.controller.finish(&self.key, self.id);
    }
}
