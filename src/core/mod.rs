pub mod error;
pub mod types;
pub mod value;

pub use error::{BridgeError, Result};
pub use types::{
    CallId, CasToken, ConfigurationChange, ErrorCode, OperationKind, StorageOperation,
};
pub use value::{HostFunction, HostValue, ObjectHandle};
