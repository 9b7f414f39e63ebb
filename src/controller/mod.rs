//! Platform-independent session control: the backend contract and the
//! coordinator that turns a fire-and-forget transport command into the
//! player's observed post-command state.

mod coordinator;
pub mod deadline;

pub use coordinator::Controller;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::ControlError;
use crate::session::{CommandKind, MediaSession, SessionSnapshot};

/// Opaque reference to one discovered player, valid for one invocation.
pub trait PlayerHandle: Clone + Send + Sync + 'static {
    /// Stable key identifying the player within this process, used to keep
    /// at most one live change subscription per player.
    fn key(&self) -> &str;
}

/// Platform binding the coordinator drives. Implementations live in
/// `crate::backend`; tests substitute a scripted fake.
#[async_trait]
pub trait SessionBackend: Send + Sync {
    type Handle: PlayerHandle;

    /// Enumerate all current sessions, most recently active first.
    async fn sessions(&self) -> Result<Vec<MediaSession>, ControlError>;

    /// Resolve a source selector (case-insensitive short name; `None` means
    /// the first discovered player) to a handle.
    async fn discover(&self, source: Option<&str>) -> Result<Self::Handle, ControlError>;

    /// Point-in-time read of one player. Pure query.
    async fn snapshot(&self, handle: &Self::Handle) -> Result<SessionSnapshot, ControlError>;

    /// Issue a transport command. Completion of this call says nothing
    /// about whether the player has reacted yet.
    async fn execute(
        &self,
        handle: &Self::Handle,
        command: CommandKind,
    ) -> Result<(), ControlError>;

    /// Start delivering change notifications for one player.
    async fn subscribe(&self, handle: &Self::Handle) -> Result<ChangeSubscription, ControlError>;
}

/// A live stream of "something changed" signals for one player. The payload
/// carries no information on purpose: many players deliver partial or stale
/// change payloads, so observers re-fetch a snapshot on every signal.
pub struct ChangeSubscription {
    events: mpsc::Receiver<()>,
    guard: SubscriptionGuard,
}

impl ChangeSubscription {
    /// `on_release` tears down the platform-side registration. It runs at
    /// most once, no matter how many guard clones call `release`.
    pub fn new(events: mpsc::Receiver<()>, on_release: impl Fn() + Send + Sync + 'static) -> Self {
        ChangeSubscription {
            events,
            guard: SubscriptionGuard {
                inner: Arc::new(GuardInner {
                    released: AtomicBool::new(false),
                    on_release: Box::new(on_release),
                }),
            },
        }
    }

    /// Wait for the next notification. `None` means the subscription is
    /// gone: released, superseded, or the player disappeared.
    pub async fn changed(&mut self) -> Option<()> {
        self.events.recv().await
    }

    pub fn guard(&self) -> SubscriptionGuard {
        self.guard.clone()
    }
}

/// Shared release handle for a [`ChangeSubscription`]. Cloned into the
/// coordinator's wait table so a superseding wait can retire the previous
/// subscription without owning its event stream.
#[derive(Clone)]
pub struct SubscriptionGuard {
    inner: Arc<GuardInner>,
}

struct GuardInner {
    released: AtomicBool,
    on_release: Box<dyn Fn() + Send + Sync>,
}

impl SubscriptionGuard {
    /// Idempotent, safe after the underlying connection is gone.
    pub fn release(&self) {
        if !self.inner.released.swap(true, Ordering::AcqRel) {
            (self.inner.on_release)();
        }
    }

    pub fn is_released(&self) -> bool {
        self.inner.released.load(Ordering::Acquire)
    }
}

impl Drop for GuardInner {
    // Backstop for cancellation paths that drop the subscription without
    // reaching an explicit release.
    fn drop(&mut self) {
        if !self.released.swap(true, Ordering::AcqRel) {
            (self.on_release)();
        }
    }
}
