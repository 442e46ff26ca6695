//! Trampolines registered with the client library.
//!
//! Each per-operation trampoline checks the response layout version, turns
//! the response into a [`ResultPayload`] and hands it to the owner's cookie
//! registry. The two instance-scoped callbacks go straight to the owner.

use log::{debug, warn};

use super::instance::{
    ArithmeticResponse, GetResponse, LibraryInstance, RemoveResponse, StoreResponse,
    SUPPORTED_RESPONSE_VERSION, TouchResponse,
};
use crate::core::{
    BridgeError, CallId, ConfigurationChange, ErrorCode, OperationKind, Result, StorageOperation,
};
use crate::dispatch::ResultPayload;

/// Install every trampoline on `instance`. Called once per instance.
pub fn setup_callbacks(instance: &dyn LibraryInstance) {
    instance.set_error_callback(error_callback);
    instance.set_get_callback(get_callback);
    instance.set_store_callback(store_callback);
    instance.set_arithmetic_callback(arithmetic_callback);
    instance.set_remove_callback(remove_callback);
    instance.set_touch_callback(touch_callback);
    instance.set_configuration_callback(configuration_callback);
}

fn ensure_version(operation: OperationKind, version: u32) -> Result<()> {
    if version != SUPPORTED_RESPONSE_VERSION {
        return Err(BridgeError::UnsupportedVersion { operation, version });
    }
    Ok(())
}

fn forward(
    instance: &dyn LibraryInstance,
    cookie: CallId,
    payload: ResultPayload<'_>,
) -> Result<()> {
    let owner = instance.owner().ok_or(BridgeError::DetachedInstance)?;
    owner.registry().complete(cookie, &payload)
}

pub fn get_callback(
    instance: &dyn LibraryInstance,
    cookie: CallId,
    error: ErrorCode,
    resp: &GetResponse<'_>,
) -> Result<()> {
    ensure_version(OperationKind::Get, resp.version)?;
    forward(
        instance,
        cookie,
        ResultPayload::Get {
            error,
            key: resp.v0.key,
            value: resp.v0.bytes,
            flags: resp.v0.flags,
            cas: resp.v0.cas,
        },
    )
}

pub fn store_callback(
    instance: &dyn LibraryInstance,
    cookie: CallId,
    operation: StorageOperation,
    error: ErrorCode,
    resp: &StoreResponse<'_>,
) -> Result<()> {
    ensure_version(OperationKind::Store, resp.version)?;
    forward(
        instance,
        cookie,
        ResultPayload::Store {
            error,
            key: resp.v0.key,
            cas: resp.v0.cas,
            operation,
        },
    )
}

pub fn arithmetic_callback(
    instance: &dyn LibraryInstance,
    cookie: CallId,
    error: ErrorCode,
    resp: &ArithmeticResponse<'_>,
) -> Result<()> {
    ensure_version(OperationKind::Arithmetic, resp.version)?;
    forward(
        instance,
        cookie,
        ResultPayload::Arithmetic {
            error,
            key: resp.v0.key,
            value: resp.v0.value,
            cas: resp.v0.cas,
        },
    )
}

pub fn remove_callback(
    instance: &dyn LibraryInstance,
    cookie: CallId,
    error: ErrorCode,
    resp: &RemoveResponse<'_>,
) -> Result<()> {
    ensure_version(OperationKind::Remove, resp.version)?;
    forward(
        instance,
        cookie,
        ResultPayload::Remove {
            error,
            key: resp.v0.key,
        },
    )
}

pub fn touch_callback(
    instance: &dyn LibraryInstance,
    cookie: CallId,
    error: ErrorCode,
    resp: &TouchResponse<'_>,
) -> Result<()> {
    ensure_version(OperationKind::Touch, resp.version)?;
    forward(
        instance,
        cookie,
        ResultPayload::Touch {
            error,
            key: resp.v0.key,
        },
    )
}

pub fn error_callback(instance: &dyn LibraryInstance, error: ErrorCode, info: Option<&str>) {
    match instance.owner() {
        Some(owner) => owner.on_error(error, info),
        None => warn!("instance error {} with no owner: {:?}", error, info),
    }
}

pub fn configuration_callback(instance: &dyn LibraryInstance, change: ConfigurationChange) {
    match instance.owner() {
        Some(owner) => owner.on_configuration(change),
        None => debug!("configuration {:?} with no owner", change),
    }
}
