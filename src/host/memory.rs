use std::cell::{Cell, RefCell};
use std::collections::HashMap;

use log::debug;

use super::{HostRuntime, PersistentId};
use crate::core::{BridgeError, CasToken, HostFunction, HostValue, ObjectHandle, Result};

/// One recorded call made through [`InMemoryHost::invoke`].
#[derive(Debug, Clone)]
pub struct Invocation {
    pub function: String,
    pub args: Vec<HostValue>,
    pub scope_depth: usize,
}

/// In-process host runtime.
///
/// Keeps durable references in a handle table and records every invocation,
/// which makes reference leaks and argument lists observable. No internal
/// borrow is held while a host function runs, so functions may call back
/// into the runtime.
#[derive(Default)]
pub struct InMemoryHost {
    handles: RefCell<HashMap<PersistentId, HostValue>>,
    next_handle: Cell<u64>,
    next_object: Cell<u64>,
    scope_depth: Cell<usize>,
    max_scope_depth: Cell<usize>,
    disposals: Cell<u64>,
    ignored_disposals: Cell<u64>,
    invocations: RefCell<Vec<Invocation>>,
}

impl InMemoryHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Durable references currently alive.
    pub fn live_handles(&self) -> usize {
        self.handles.borrow().len()
    }

    pub fn disposals(&self) -> u64 {
        self.disposals.get()
    }

    /// Dispose calls that targeted an id that was not alive.
    pub fn ignored_disposals(&self) -> u64 {
        self.ignored_disposals.get()
    }

    pub fn scope_depth(&self) -> usize {
        self.scope_depth.get()
    }

    pub fn max_scope_depth(&self) -> usize {
        self.max_scope_depth.get()
    }

    pub fn invocations(&self) -> Vec<Invocation> {
        self.invocations.borrow().clone()
    }

    pub fn invocation_count(&self) -> usize {
        self.invocations.borrow().len()
    }

    pub fn last_invocation(&self) -> Option<Invocation> {
        self.invocations.borrow().last().cloned()
    }
}

impl HostRuntime for InMemoryHost {
    fn open_scope(&self) {
        let depth = self.scope_depth.get() + 1;
        self.scope_depth.set(depth);
        if depth > self.max_scope_depth.get() {
            self.max_scope_depth.set(depth);
        }
    }

    fn close_scope(&self) {
        self.scope_depth.set(self.scope_depth.get().saturating_sub(1));
    }

    fn persist(&self, value: &HostValue) -> PersistentId {
        let id = PersistentId(self.next_handle.get() + 1);
        self.next_handle.set(id.0);
        self.handles.borrow_mut().insert(id, value.clone());
        id
    }

    fn resolve(&self, id: PersistentId) -> Option<HostValue> {
        self.handles.borrow().get(&id).cloned()
    }

    fn dispose(&self, id: PersistentId) {
        if self.handles.borrow_mut().remove(&id).is_some() {
            self.disposals.set(self.disposals.get() + 1);
        } else {
            debug!("ignoring dispose of unknown handle {}", id.0);
            self.ignored_disposals.set(self.ignored_disposals.get() + 1);
        }
    }

    fn create_object(&self, _class: &str) -> HostValue {
        let handle = ObjectHandle(self.next_object.get() + 1);
        self.next_object.set(handle.0);
        HostValue::Object(handle)
    }

    fn create_cas(&self, cas: CasToken) -> HostValue {
        HostValue::Cas(cas)
    }

    fn invoke(&self, function: &HostFunction, args: &[HostValue]) -> Result<()> {
        let depth = self.scope_depth.get();
        if depth == 0 {
            return Err(BridgeError::Host(format!(
                "function '{}' invoked outside of a handle scope",
                function.name()
            )));
        }

        self.invocations.borrow_mut().push(Invocation {
            function: function.name().to_string(),
            args: args.to_vec(),
            scope_depth: depth,
        });

        function.call(args)
    }
}
