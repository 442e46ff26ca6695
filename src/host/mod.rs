//! Boundary with the host runtime that owns callback functions and values.
//!
//! The bridge never inspects host objects; it only asks the runtime to box
//! values, keep durable references alive and invoke functions inside a scope.

pub mod memory;
pub mod persistent;
pub mod scope;

pub use memory::{InMemoryHost, Invocation};
pub use persistent::Persistent;
pub use scope::HandleScope;

use crate::core::{CasToken, HostFunction, HostValue, Result};

/// Identifier of a durable reference held by the runtime on behalf of the bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PersistentId(pub u64);

/// Primitives the bridge consumes from the host runtime.
pub trait HostRuntime {
    /// Open an execution scope. Scopes nest; each open is paired with one close.
    fn open_scope(&self);

    fn close_scope(&self);

    /// Create a durable reference that survives across scopes until disposed.
    fn persist(&self, value: &HostValue) -> PersistentId;

    fn resolve(&self, id: PersistentId) -> Option<HostValue>;

    /// Release a durable reference. Unknown or already released ids are ignored.
    fn dispose(&self, id: PersistentId);

    fn create_object(&self, class: &str) -> HostValue;

    /// Box a raw CAS stamp as a host value. The bridge treats the result as opaque.
    fn create_cas(&self, cas: CasToken) -> HostValue;

    /// Call `function` with `args`. Must be called with a scope open.
    fn invoke(&self, function: &HostFunction, args: &[HostValue]) -> Result<()>;

    fn create_bytes(&self, bytes: &[u8]) -> HostValue {
        HostValue::Bytes(bytes.to_vec())
    }

    fn create_number(&self, value: f64) -> HostValue {
        HostValue::Number(value)
    }

    fn create_false(&self) -> HostValue {
        HostValue::Boolean(false)
    }

    fn create_null(&self) -> HostValue {
        HostValue::Null
    }

    fn create_undefined(&self) -> HostValue {
        HostValue::Undefined
    }
}
