use std::fmt;

/// Status code reported by the key-value client library.
///
/// The dispatch path only distinguishes success from failure; every other
/// code is handed to the user callback unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ErrorCode(pub u32);

impl ErrorCode {
    pub const SUCCESS: ErrorCode = ErrorCode(0x00);
    pub const AUTH_CONTINUE: ErrorCode = ErrorCode(0x01);
    pub const AUTH_ERROR: ErrorCode = ErrorCode(0x02);
    pub const DELTA_BADVAL: ErrorCode = ErrorCode(0x03);
    pub const E2BIG: ErrorCode = ErrorCode(0x04);
    pub const EBUSY: ErrorCode = ErrorCode(0x05);
    pub const EINTERNAL: ErrorCode = ErrorCode(0x06);
    pub const EINVAL: ErrorCode = ErrorCode(0x07);
    pub const ENOMEM: ErrorCode = ErrorCode(0x08);
    pub const ERANGE: ErrorCode = ErrorCode(0x09);
    pub const ERROR: ErrorCode = ErrorCode(0x0a);
    pub const ETMPFAIL: ErrorCode = ErrorCode(0x0b);
    pub const KEY_EEXISTS: ErrorCode = ErrorCode(0x0c);
    pub const KEY_ENOENT: ErrorCode = ErrorCode(0x0d);
    pub const DLOPEN_FAILED: ErrorCode = ErrorCode(0x0e);
    pub const DLSYM_FAILED: ErrorCode = ErrorCode(0x0f);
    pub const NETWORK_ERROR: ErrorCode = ErrorCode(0x10);
    pub const NOT_MY_VBUCKET: ErrorCode = ErrorCode(0x11);
    pub const NOT_STORED: ErrorCode = ErrorCode(0x12);
    pub const NOT_SUPPORTED: ErrorCode = ErrorCode(0x13);
    pub const UNKNOWN_COMMAND: ErrorCode = ErrorCode(0x14);
    pub const UNKNOWN_HOST: ErrorCode = ErrorCode(0x15);
    pub const PROTOCOL_ERROR: ErrorCode = ErrorCode(0x16);
    pub const ETIMEDOUT: ErrorCode = ErrorCode(0x17);
    pub const CONNECT_ERROR: ErrorCode = ErrorCode(0x18);
    pub const BUCKET_ENOENT: ErrorCode = ErrorCode(0x19);
    pub const CLIENT_ENOMEM: ErrorCode = ErrorCode(0x1a);

    #[inline]
    pub const fn is_success(&self) -> bool {
        self.0 == Self::SUCCESS.0
    }

    #[inline]
    pub const fn code(&self) -> u32 {
        self.0
    }

    pub fn name(&self) -> &'static str {
        match self.0 {
            0x00 => "SUCCESS",
            0x01 => "AUTH_CONTINUE",
            0x02 => "AUTH_ERROR",
            0x03 => "DELTA_BADVAL",
            0x04 => "E2BIG",
            0x05 => "EBUSY",
            0x06 => "EINTERNAL",
            0x07 => "EINVAL",
            0x08 => "ENOMEM",
            0x09 => "ERANGE",
            0x0a => "ERROR",
            0x0b => "ETMPFAIL",
            0x0c => "KEY_EEXISTS",
            0x0d => "KEY_ENOENT",
            0x0e => "DLOPEN_FAILED",
            0x0f => "DLSYM_FAILED",
            0x10 => "NETWORK_ERROR",
            0x11 => "NOT_MY_VBUCKET",
            0x12 => "NOT_STORED",
            0x13 => "NOT_SUPPORTED",
            0x14 => "UNKNOWN_COMMAND",
            0x15 => "UNKNOWN_HOST",
            0x16 => "PROTOCOL_ERROR",
            0x17 => "ETIMEDOUT",
            0x18 => "CONNECT_ERROR",
            0x19 => "BUCKET_ENOENT",
            0x1a => "CLIENT_ENOMEM",
            _ => "UNKNOWN",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (0x{:02x})", self.name(), self.0)
    }
}

/// Compare-and-swap stamp returned by the store. Zero means "no CAS" when
/// used on a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct CasToken(pub u64);

impl CasToken {
    pub const NONE: CasToken = CasToken(0);

    #[inline]
    pub const fn value(&self) -> u64 {
        self.0
    }

    #[inline]
    pub const fn is_none(&self) -> bool {
        self.0 == 0
    }
}

/// Identifier handed to the client library in place of a raw cookie pointer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CallId(pub u64);

impl fmt::Display for CallId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "call#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    Get,
    Store,
    Arithmetic,
    Remove,
    Touch,
}

impl OperationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "get",
            Self::Store => "store",
            Self::Arithmetic => "arithmetic",
            Self::Remove => "remove",
            Self::Touch => "touch",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Mutation mode passed along with a store completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum StorageOperation {
    Add = 1,
    Replace = 2,
    Set = 3,
    Append = 4,
    Prepend = 5,
}

/// Cluster configuration notification delivered to the owning client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ConfigurationChange {
    New = 0,
    Changed = 1,
    Unchanged = 2,
}
