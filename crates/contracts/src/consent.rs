//! User/system consent for sensor access.
//!
//! The device answers a consent request asynchronously. The answer is latched
//! in a [`ConsentSignal`] owned by the scenario and shared with every engine.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};

/// Outcome of a consent request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Consent {
    Allowed,
    DeniedBySystem,
    DeniedByUser,
    NotDeclaredByApp,
    UserPromptRequired,
}

impl Consent {
    pub fn is_allowed(self) -> bool {
        self == Consent::Allowed
    }
}

impl fmt::Display for Consent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Consent::Allowed => "allowed",
            Consent::DeniedBySystem => "denied by system",
            Consent::DeniedByUser => "denied by user",
            Consent::NotDeclaredByApp => "not declared by app",
            Consent::UserPromptRequired => "user prompt required",
        };
        f.write_str(text)
    }
}

#[derive(Default)]
struct ConsentState {
    outcome: Mutex<Option<Consent>>,
    granted: Condvar,
}

/// Latched, cloneable consent outcome.
///
/// The first call to [`ConsentSignal::grant`] wins; later calls are ignored.
#[derive(Clone, Default)]
pub struct ConsentSignal {
    state: Arc<ConsentState>,
}

impl ConsentSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Latch the outcome and wake every waiter. Returns false if already latched.
    pub fn grant(&self, consent: Consent) -> bool {
        let mut outcome = self.state.outcome.lock();
        if outcome.is_some() {
            return false;
        }
        *outcome = Some(consent);
        self.state.granted.notify_all();
        true
    }

    /// Current outcome without blocking.
    pub fn peek(&self) -> Option<Consent> {
        *self.state.outcome.lock()
    }

    /// Wait up to `timeout` for the outcome.
    pub fn wait_timeout(&self, timeout: Duration) -> Option<Consent> {
        let mut outcome = self.state.outcome.lock();
        if outcome.is_none() {
            let _ = self.state.granted.wait_for(&mut outcome, timeout);
        }
        *outcome
    }
}

impl fmt::Debug for ConsentSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConsentSignal")
            .field("outcome", &self.peek())
            .finish()
    }
}
