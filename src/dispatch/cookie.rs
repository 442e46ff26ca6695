use std::cell::Cell;
use std::rc::Rc;

use tracing::{Level, event, trace_span};

use super::payload::{ErrorEncoding, ResultPayload};
use crate::core::{BridgeError, HostFunction, HostValue, Result};
use crate::host::{HandleScope, HostRuntime, Persistent};

/// Per-call completion context.
///
/// One cookie exists per logical call made by the host, however many
/// single-key operations that call fans out into. It keeps the issuing
/// object alive, and turns every completion into one invocation of the
/// user's callback.
///
/// The cookie does not count its own completions down; whoever owns it
/// drives `decrement` and decides when to drop it.
pub struct CompletionCookie {
    runtime: Rc<dyn HostRuntime>,
    remaining: Cell<u32>,
    parent: Persistent,
    user_data: Persistent,
    callback: Persistent,
    encoding: ErrorEncoding,
}

impl CompletionCookie {
    pub fn new(
        runtime: &Rc<dyn HostRuntime>,
        parent: &HostValue,
        callback: &HostFunction,
        user_data: Option<&HostValue>,
        expected: u32,
    ) -> Self {
        Self::with_encoding(
            runtime,
            parent,
            callback,
            user_data,
            expected,
            ErrorEncoding::default(),
        )
    }

    pub fn with_encoding(
        runtime: &Rc<dyn HostRuntime>,
        parent: &HostValue,
        callback: &HostFunction,
        user_data: Option<&HostValue>,
        expected: u32,
        encoding: ErrorEncoding,
    ) -> Self {
        let sentinel = runtime.create_undefined();
        Self {
            runtime: Rc::clone(runtime),
            remaining: Cell::new(expected),
            parent: Persistent::new(runtime, parent),
            user_data: Persistent::new(runtime, user_data.unwrap_or(&sentinel)),
            callback: Persistent::new(runtime, &HostValue::Function(callback.clone())),
            encoding,
        }
    }

    pub fn remaining(&self) -> u32 {
        self.remaining.get()
    }

    /// Counts one completion off and returns how many are still expected.
    pub fn decrement(&self) -> u32 {
        let left = self.remaining.get().saturating_sub(1);
        self.remaining.set(left);
        left
    }

    pub fn user_data(&self) -> HostValue {
        self.user_data
            .get()
            .unwrap_or_else(|| self.runtime.create_undefined())
    }

    pub fn parent(&self) -> Option<HostValue> {
        self.parent.get()
    }

    pub fn encoding(&self) -> ErrorEncoding {
        self.encoding
    }

    pub fn is_disposed(&self) -> bool {
        self.callback.is_empty()
    }

    /// Invokes the user callback for one completion.
    ///
    /// The callback runs synchronously and may issue further operations,
    /// including on the same client, before this returns.
    pub fn result(&self, payload: &ResultPayload<'_>) -> Result<()> {
        let _scope = HandleScope::enter(self.runtime.as_ref());
        let span = trace_span!(
            "cookie.result",
            operation = %payload.operation(),
            error = payload.error().code(),
            key_len = payload.key().len()
        );
        let _enter = span.enter();

        let slot = self.callback.get();
        let callback = match slot.as_ref().and_then(HostValue::as_function) {
            Some(callback) => callback,
            None => {
                event!(Level::WARN, "completion delivered to a disposed cookie");
                return Err(BridgeError::CookieDisposed);
            }
        };

        let args = payload.to_arguments(self.user_data(), self.runtime.as_ref(), self.encoding);
        if let Err(err) = self.runtime.invoke(callback, &args) {
            event!(Level::ERROR, error = %err, "completion callback failed");
            return Err(err);
        }

        event!(Level::TRACE, "completion delivered");
        Ok(())
    }

    /// Releases the parent, user data and callback references.
    /// Safe to call any number of times.
    pub fn dispose(&self) {
        self.parent.dispose();
        self.user_data.dispose();
        self.callback.dispose();
    }
}

impl std::fmt::Debug for CompletionCookie {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompletionCookie")
            .field("remaining", &self.remaining.get())
            .field("disposed", &self.is_disposed())
            .field("encoding", &self.encoding)
            .finish()
    }
}
