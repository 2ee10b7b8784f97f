//! Session lifecycle notifications.
//!
//! The notifier holds an armed latch. Signing in or renewing arms it;
//! ending the session fires [`SessionEvent::Ended`] only if it was armed,
//! then disarms it. However many callers observe the failure of one
//! renewal, listeners hear about it once.

use crate::credential::Identity;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// A login or registration established a session.
    SignedIn { identity: Option<Identity> },
    /// The credential was renewed in the background.
    Renewed { identity: Option<Identity> },
    /// The user signed out explicitly.
    SignedOut,
    /// The session ended involuntarily; the user must sign in again.
    Ended,
}

impl SessionEvent {
    pub fn name(&self) -> &'static str {
        match self {
            SessionEvent::SignedIn { .. } => "session:signed_in",
            SessionEvent::Renewed { .. } => "session:renewed",
            SessionEvent::SignedOut => "session:signed_out",
            SessionEvent::Ended => "session:ended",
        }
    }
}

/// Callback type for session notifications.
pub type SessionListener = Arc<dyn Fn(&SessionEvent) + Send + Sync>;

/// Handle returned by [`SessionNotifier::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

pub struct SessionNotifier {
    listeners: Mutex<Vec<(ListenerId, SessionListener)>>,
    next_id: AtomicU64,
    armed: AtomicBool,
}

impl SessionNotifier {
    /// A new notifier starts armed: a client that never signed in still
    /// reports the first failed renewal.
    pub fn new() -> Self {
        Self {
            listeners: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
            armed: AtomicBool::new(true),
        }
    }

    pub fn subscribe<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&SessionEvent) + Send + Sync + 'static,
    {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners.lock().push((id, Arc::new(listener)));
        id
    }

    /// Returns false if `id` was not subscribed.
    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.lock();
        let before = listeners.len();
        listeners.retain(|(existing, _)| *existing != id);
        listeners.len() != before
    }

    /// Fire `Ended` if the latch is armed. Returns whether it fired.
    pub fn notify_session_ended(&self) -> bool {
        if self.armed.swap(false, Ordering::SeqCst) {
            self.emit(&SessionEvent::Ended);
            true
        } else {
            debug!("Session end already reported, suppressing duplicate");
            false
        }
    }

    pub(crate) fn signed_in(&self, identity: Option<Identity>) {
        self.armed.store(true, Ordering::SeqCst);
        self.emit(&SessionEvent::SignedIn { identity });
    }

    pub(crate) fn renewed(&self, identity: Option<Identity>) {
        self.armed.store(true, Ordering::SeqCst);
        self.emit(&SessionEvent::Renewed { identity });
    }

    /// An explicit sign-out disarms the latch; the user already knows.
    pub(crate) fn signed_out(&self) {
        self.armed.store(false, Ordering::SeqCst);
        self.emit(&SessionEvent::SignedOut);
    }

    pub fn is_armed(&self) -> bool {
        self.armed.load(Ordering::SeqCst)
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.lock().len()
    }

    // Listeners run outside the lock so they may subscribe or unsubscribe.
    fn emit(&self, event: &SessionEvent) {
        let listeners: Vec<SessionListener> = self
            .listeners
            .lock()
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();

        debug!(event = event.name(), listeners = listeners.len(), "Emitting session event");
        for listener in listeners {
            listener(event);
        }
    }
}

impl Default for SessionNotifier {
    fn default() -> Self {
        Self::new()
    }
}
