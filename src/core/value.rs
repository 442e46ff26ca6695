use std::fmt;
use std::rc::Rc;

use crate::core::{CasToken, Result};

/// Opaque identity of an object living in the host runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjectHandle(pub u64);

type FunctionBody = dyn Fn(&[HostValue]) -> Result<()>;

/// A callable host value. Cloning shares the same function; equality is identity.
#[derive(Clone)]
pub struct HostFunction {
    name: Rc<str>,
    body: Rc<FunctionBody>,
}

impl HostFunction {
    pub fn new<F>(name: &str, body: F) -> Self
    where
        F: Fn(&[HostValue]) -> Result<()> + 'static,
    {
        Self {
            name: Rc::from(name),
            body: Rc::new(body),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Runs the function body directly. Runtimes call this from `invoke`
    /// once their own bookkeeping is done.
    pub fn call(&self, args: &[HostValue]) -> Result<()> {
        (self.body)(args)
    }
}

impl fmt::Debug for HostFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HostFunction({})", self.name)
    }
}

impl PartialEq for HostFunction {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.body, &other.body)
    }
}

/// Values the bridge hands to, or receives from, the host runtime.
#[derive(Debug, Clone)]
pub enum HostValue {
    Undefined,
    Null,
    Boolean(bool),
    Number(f64),
    Bytes(Vec<u8>),
    Cas(CasToken),
    Object(ObjectHandle),
    Function(HostFunction),
}

impl HostValue {
    /// Host truthiness. Callbacks branch on this to detect an error slot.
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Undefined | Self::Null => false,
            Self::Boolean(b) => *b,
            Self::Number(n) => *n != 0.0 && !n.is_nan(),
            Self::Bytes(b) => !b.is_empty(),
            Self::Cas(_) | Self::Object(_) | Self::Function(_) => true,
        }
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, Self::Undefined)
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Bytes(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_cas(&self) -> Option<CasToken> {
        match self {
            Self::Cas(cas) => Some(*cas),
            _ => None,
        }
    }

    pub fn as_function(&self) -> Option<&HostFunction> {
        match self {
            Self::Function(f) => Some(f),
            _ => None,
        }
    }
}

impl PartialEq for HostValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Undefined, Self::Undefined) => true,
            (Self::Null, Self::Null) => true,
            (Self::Boolean(a), Self::Boolean(b)) => a == b,
            (Self::Number(a), Self::Number(b)) => a == b || (a.is_nan() && b.is_nan()),
            (Self::Bytes(a), Self::Bytes(b)) => a == b,
            (Self::Cas(a), Self::Cas(b)) => a == b,
            (Self::Object(a), Self::Object(b)) => a == b,
            (Self::Function(a), Self::Function(b)) => a == b,
            _ => false,
        }
    }
}

impl From<&str> for HostValue {
    fn from(s: &str) -> Self {
        Self::Bytes(s.as_bytes().to_vec())
    }
}

impl From<f64> for HostValue {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<bool> for HostValue {
    fn from(b: bool) -> Self {
        Self::Boolean(b)
    }
}

impl From<HostFunction> for HostValue {
    fn from(f: HostFunction) -> Self {
        Self::Function(f)
    }
}

impl fmt::Display for HostValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Undefined => write!(f, "undefined"),
            Self::Null => write!(f, "null"),
            Self::Boolean(b) => write!(f, "{}", b),
            Self::Number(n) => write!(f, "{}", n),
            Self::Bytes(b) => write!(f, "{:?}", String::from_utf8_lossy(b)),
            Self::Cas(cas) => write!(f, "Cas({})", cas.0),
            Self::Object(handle) => write!(f, "[object #{}]", handle.0),
            Self::Function(func) => write!(f, "[function {}]", func.name()),
        }
    }
}
