use std::rc::{Rc, Weak};

use crate::core::{
    CallId, CasToken, ConfigurationChange, ErrorCode, OperationKind, Result, StorageOperation,
};
use crate::dispatch::CookieRegistry;

/// Response layout the bridge understands.
pub const SUPPORTED_RESPONSE_VERSION: u32 = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GetResponseV0<'a> {
    pub key: &'a [u8],
    pub bytes: &'a [u8],
    pub flags: u32,
    pub cas: CasToken,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GetResponse<'a> {
    pub version: u32,
    pub v0: GetResponseV0<'a>,
}

impl<'a> GetResponse<'a> {
    pub fn v0(key: &'a [u8], bytes: &'a [u8], flags: u32, cas: CasToken) -> Self {
        Self {
            version: 0,
            v0: GetResponseV0 {
                key,
                bytes,
                flags,
                cas,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreResponseV0<'a> {
    pub key: &'a [u8],
    pub cas: CasToken,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreResponse<'a> {
    pub version: u32,
    pub v0: StoreResponseV0<'a>,
}

impl<'a> StoreResponse<'a> {
    pub fn v0(key: &'a [u8], cas: CasToken) -> Self {
        Self {
            version: 0,
            v0: StoreResponseV0 { key, cas },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArithmeticResponseV0<'a> {
    pub key: &'a [u8],
    pub value: u64,
    pub cas: CasToken,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArithmeticResponse<'a> {
    pub version: u32,
    pub v0: ArithmeticResponseV0<'a>,
}

impl<'a> ArithmeticResponse<'a> {
    pub fn v0(key: &'a [u8], value: u64, cas: CasToken) -> Self {
        Self {
            version: 0,
            v0: ArithmeticResponseV0 { key, value, cas },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyResponseV0<'a> {
    pub key: &'a [u8],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemoveResponse<'a> {
    pub version: u32,
    pub v0: KeyResponseV0<'a>,
}

impl<'a> RemoveResponse<'a> {
    pub fn v0(key: &'a [u8]) -> Self {
        Self {
            version: 0,
            v0: KeyResponseV0 { key },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TouchResponse<'a> {
    pub version: u32,
    pub v0: KeyResponseV0<'a>,
}

impl<'a> TouchResponse<'a> {
    pub fn v0(key: &'a [u8]) -> Self {
        Self {
            version: 0,
            v0: KeyResponseV0 { key },
        }
    }
}

pub type GetCallback = fn(&dyn LibraryInstance, CallId, ErrorCode, &GetResponse<'_>) -> Result<()>;
pub type StoreCallback =
    fn(&dyn LibraryInstance, CallId, StorageOperation, ErrorCode, &StoreResponse<'_>) -> Result<()>;
pub type ArithmeticCallback =
    fn(&dyn LibraryInstance, CallId, ErrorCode, &ArithmeticResponse<'_>) -> Result<()>;
pub type RemoveCallback =
    fn(&dyn LibraryInstance, CallId, ErrorCode, &RemoveResponse<'_>) -> Result<()>;
pub type TouchCallback =
    fn(&dyn LibraryInstance, CallId, ErrorCode, &TouchResponse<'_>) -> Result<()>;
pub type ErrorCallback = fn(&dyn LibraryInstance, ErrorCode, Option<&str>);
pub type ConfigurationCallback = fn(&dyn LibraryInstance, ConfigurationChange);

/// Callback slots of a library instance. Unset slots drop completions.
#[derive(Debug, Clone, Copy, Default)]
pub struct CallbackTable {
    pub error: Option<ErrorCallback>,
    pub get: Option<GetCallback>,
    pub store: Option<StoreCallback>,
    pub arithmetic: Option<ArithmeticCallback>,
    pub remove: Option<RemoveCallback>,
    pub touch: Option<TouchCallback>,
    pub configuration: Option<ConfigurationCallback>,
}

/// A single-key request scheduled on the library.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Get {
        key: Vec<u8>,
    },
    Store {
        operation: StorageOperation,
        key: Vec<u8>,
        value: Vec<u8>,
        flags: u32,
        cas: CasToken,
        expiry: u32,
    },
    Arithmetic {
        key: Vec<u8>,
        delta: i64,
        initial: Option<u64>,
        expiry: u32,
    },
    Remove {
        key: Vec<u8>,
        cas: CasToken,
    },
    Touch {
        key: Vec<u8>,
        expiry: u32,
    },
}

impl Command {
    pub fn key(&self) -> &[u8] {
        match self {
            Self::Get { key }
            | Self::Store { key, .. }
            | Self::Arithmetic { key, .. }
            | Self::Remove { key, .. }
            | Self::Touch { key, .. } => key,
        }
    }

    pub fn kind(&self) -> OperationKind {
        match self {
            Self::Get { .. } => OperationKind::Get,
            Self::Store { .. } => OperationKind::Store,
            Self::Arithmetic { .. } => OperationKind::Arithmetic,
            Self::Remove { .. } => OperationKind::Remove,
            Self::Touch { .. } => OperationKind::Touch,
        }
    }
}

/// The object that owns a library instance and receives its completions.
pub trait InstanceOwner {
    fn registry(&self) -> &CookieRegistry;

    fn on_error(&self, error: ErrorCode, info: Option<&str>);

    fn on_configuration(&self, change: ConfigurationChange);
}

/// Registration and scheduling surface of the callback-driven client library.
///
/// Implementations deliver completions by calling the registered callbacks
/// from inside `wait`, on the calling thread.
pub trait LibraryInstance {
    fn set_error_callback(&self, callback: ErrorCallback);
    fn set_get_callback(&self, callback: GetCallback);
    fn set_store_callback(&self, callback: StoreCallback);
    fn set_arithmetic_callback(&self, callback: ArithmeticCallback);
    fn set_remove_callback(&self, callback: RemoveCallback);
    fn set_touch_callback(&self, callback: TouchCallback);
    fn set_configuration_callback(&self, callback: ConfigurationCallback);

    /// Store the owning object in the instance's user-data slot.
    fn set_owner(&self, owner: Weak<dyn InstanceOwner>);

    fn owner(&self) -> Option<Rc<dyn InstanceOwner>>;

    /// Queue a copy of `command`; its completion carries `cookie`. A refusal
    /// is reported synchronously and no completion will follow.
    fn schedule(&self, cookie: CallId, command: &Command) -> std::result::Result<(), ErrorCode>;

    /// Run the event loop until nothing is pending.
    fn wait(&self) -> Result<()>;
}
