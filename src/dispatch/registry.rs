use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use tracing::{Level, event, info_span};

use super::cookie::CompletionCookie;
use super::payload::ResultPayload;
use crate::core::{BridgeError, CallId, Result};

/// Outstanding completion cookies, keyed by the id handed to the client library.
///
/// The registry owns the countdown: every `complete` decrements the cookie
/// and the entry is dropped, releasing its host references, when no
/// completions remain. The map is never borrowed while a user callback
/// runs, so callbacks can register and complete other calls.
#[derive(Default)]
pub struct CookieRegistry {
    cookies: RefCell<HashMap<CallId, Rc<CompletionCookie>>>,
    next_id: Cell<u64>,
}

impl CookieRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, cookie: CompletionCookie) -> CallId {
        let id = CallId(self.next_id.get() + 1);
        self.next_id.set(id.0);

        if cookie.remaining() == 0 {
            event!(Level::WARN, call = %id, "cookie registered with no expected completions");
        }
        self.cookies.borrow_mut().insert(id, Rc::new(cookie));
        id
    }

    pub fn get(&self, id: CallId) -> Option<Rc<CompletionCookie>> {
        self.cookies.borrow().get(&id).cloned()
    }

    pub fn contains(&self, id: CallId) -> bool {
        self.cookies.borrow().contains_key(&id)
    }

    /// Number of logical calls still waiting for completions.
    pub fn pending(&self) -> usize {
        self.cookies.borrow().len()
    }

    /// Delivers one completion for `id` and retires the cookie once its
    /// count reaches zero. A failing callback still counts as delivered.
    pub fn complete(&self, id: CallId, payload: &ResultPayload<'_>) -> Result<()> {
        let span = info_span!("registry.complete", call = %id, operation = %payload.operation());
        let _enter = span.enter();

        let cookie = self.get(id).ok_or_else(|| {
            event!(Level::ERROR, "completion for unknown cookie");
            BridgeError::UnknownCookie(id)
        })?;

        let outcome = cookie.result(payload);

        let left = cookie.decrement();
        if left == 0 {
            self.cookies.borrow_mut().remove(&id);
            event!(Level::DEBUG, "cookie retired");
        } else {
            event!(Level::TRACE, remaining = left, "awaiting further completions");
        }

        outcome
    }

    /// Drops every outstanding cookie. Only valid once the client library
    /// can no longer deliver completions for them.
    pub fn release_all(&self) -> usize {
        let drained: Vec<_> = self.cookies.borrow_mut().drain().collect();
        let count = drained.len();
        if count > 0 {
            event!(Level::WARN, count, "releasing cookies with outstanding completions");
        }
        drop(drained);
        count
    }
}
