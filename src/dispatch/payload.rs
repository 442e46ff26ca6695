use serde::{Deserialize, Serialize};

use crate::core::{CasToken, ErrorCode, HostValue, OperationKind, StorageOperation};
use crate::host::HostRuntime;

/// How the error slot is filled when an operation succeeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorEncoding {
    /// `false`, tested by callers for truthiness.
    #[default]
    FalseSentinel,
    /// `null`, for callers that want an explicit optional error.
    Null,
}

/// Argument layout produced for a completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultShape {
    /// `(data, error, key, cas, flags, value)`
    Read,
    /// `(data, error, key, cas)`
    Ack,
    /// `(data, error, key, cas, value)`
    Counter,
    /// `(data, error, key)`
    KeyOnly,
}

impl ResultShape {
    pub const fn arity(&self) -> usize {
        match self {
            Self::Read => 6,
            Self::Ack => 4,
            Self::Counter => 5,
            Self::KeyOnly => 3,
        }
    }
}

/// Completion of one single-key operation, as reported by the client library.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultPayload<'a> {
    Get {
        error: ErrorCode,
        key: &'a [u8],
        value: &'a [u8],
        flags: u32,
        cas: CasToken,
    },
    Store {
        error: ErrorCode,
        key: &'a [u8],
        cas: CasToken,
        operation: StorageOperation,
    },
    Arithmetic {
        error: ErrorCode,
        key: &'a [u8],
        value: u64,
        cas: CasToken,
    },
    Remove {
        error: ErrorCode,
        key: &'a [u8],
    },
    Touch {
        error: ErrorCode,
        key: &'a [u8],
    },
}

impl<'a> ResultPayload<'a> {
    pub fn operation(&self) -> OperationKind {
        match self {
            Self::Get { .. } => OperationKind::Get,
            Self::Store { .. } => OperationKind::Store,
            Self::Arithmetic { .. } => OperationKind::Arithmetic,
            Self::Remove { .. } => OperationKind::Remove,
            Self::Touch { .. } => OperationKind::Touch,
        }
    }

    pub fn shape(&self) -> ResultShape {
        match self {
            Self::Get { .. } => ResultShape::Read,
            Self::Store { .. } => ResultShape::Ack,
            Self::Arithmetic { .. } => ResultShape::Counter,
            Self::Remove { .. } | Self::Touch { .. } => ResultShape::KeyOnly,
        }
    }

    pub fn error(&self) -> ErrorCode {
        match self {
            Self::Get { error, .. }
            | Self::Store { error, .. }
            | Self::Arithmetic { error, .. }
            | Self::Remove { error, .. }
            | Self::Touch { error, .. } => *error,
        }
    }

    pub fn key(&self) -> &'a [u8] {
        match self {
            Self::Get { key, .. }
            | Self::Store { key, .. }
            | Self::Arithmetic { key, .. }
            | Self::Remove { key, .. }
            | Self::Touch { key, .. } => key,
        }
    }

    /// Builds the callback argument list.
    ///
    /// Slot 0 is `user_data`, slot 1 the error indicator, slot 2 the key as a
    /// byte string. Payload slots follow and are `undefined` on failure, so
    /// the list length depends only on the shape.
    pub fn to_arguments(
        &self,
        user_data: HostValue,
        runtime: &dyn HostRuntime,
        encoding: ErrorEncoding,
    ) -> Vec<HostValue> {
        let error = self.error();
        let mut args = Vec::with_capacity(self.shape().arity());

        args.push(user_data);
        args.push(if error.is_success() {
            match encoding {
                ErrorEncoding::FalseSentinel => runtime.create_false(),
                ErrorEncoding::Null => runtime.create_null(),
            }
        } else {
            runtime.create_number(f64::from(error.code()))
        });
        args.push(runtime.create_bytes(self.key()));

        let payload_slots = self.shape().arity() - args.len();
        if !error.is_success() {
            args.extend((0..payload_slots).map(|_| runtime.create_undefined()));
            return args;
        }

        match *self {
            Self::Get {
                value, flags, cas, ..
            } => {
                args.push(runtime.create_cas(cas));
                args.push(runtime.create_number(f64::from(flags)));
                args.push(runtime.create_bytes(value));
            }
            Self::Store { cas, .. } => {
                args.push(runtime.create_cas(cas));
            }
            Self::Arithmetic { value, cas, .. } => {
                args.push(runtime.create_cas(cas));
                // Host numbers are doubles; counters above 2^53 lose precision.
                args.push(runtime.create_number(value as f64));
            }
            Self::Remove { .. } | Self::Touch { .. } => {}
        }

        args
    }
}
