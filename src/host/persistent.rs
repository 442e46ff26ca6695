use std::cell::Cell;
use std::rc::Rc;

use super::{HostRuntime, PersistentId};
use crate::core::HostValue;

/// Owned durable reference to a host value.
///
/// Released at most once: either through `dispose` or when dropped.
pub struct Persistent {
    runtime: Rc<dyn HostRuntime>,
    id: Cell<Option<PersistentId>>,
}

impl Persistent {
    pub fn new(runtime: &Rc<dyn HostRuntime>, value: &HostValue) -> Self {
        let id = runtime.persist(value);
        Self {
            runtime: Rc::clone(runtime),
            id: Cell::new(Some(id)),
        }
    }

    pub fn get(&self) -> Option<HostValue> {
        self.id.get().and_then(|id| self.runtime.resolve(id))
    }

    pub fn is_empty(&self) -> bool {
        self.id.get().is_none()
    }

    pub fn dispose(&self) {
        if let Some(id) = self.id.take() {
            self.runtime.dispose(id);
        }
    }
}

impl Drop for Persistent {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl std::fmt::Debug for Persistent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.id.get() {
            Some(id) => write!(f, "Persistent({})", id.0),
            None => write!(f, "Persistent(empty)"),
        }
    }
}
