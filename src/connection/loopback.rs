//! In-process, event-loop driven implementation of [`LibraryInstance`].
//!
//! Scheduled commands are queued and only executed when the loop is pumped
//! by [`LibraryInstance::wait`], which then calls the registered trampolines
//! on the current thread, the same way the networked library delivers
//! responses as they arrive.

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, VecDeque};
use std::rc::{Rc, Weak};

use log::{debug, info, warn};

use super::instance::{
    ArithmeticCallback, ArithmeticResponse, ArithmeticResponseV0, CallbackTable, Command,
    ConfigurationCallback, ErrorCallback, GetCallback, GetResponse, GetResponseV0,
    InstanceOwner, KeyResponseV0, LibraryInstance, RemoveCallback, RemoveResponse,
    SUPPORTED_RESPONSE_VERSION, StoreCallback, StoreResponse, StoreResponseV0, TouchCallback,
    TouchResponse,
};
use crate::core::{
    CallId, CasToken, ConfigurationChange, ErrorCode, OperationKind, Result, StorageOperation,
};

/// Order in which queued events are delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeliveryOrder {
    #[default]
    Fifo,
    /// Newest first; models responses overtaking each other on the wire.
    Lifo,
}

#[derive(Debug, Clone)]
struct Item {
    value: Vec<u8>,
    flags: u32,
    cas: CasToken,
    expiry: u32,
}

enum Event {
    Operation { cookie: CallId, command: Command },
    Configuration(ConfigurationChange),
    Error { code: ErrorCode, info: Option<String> },
}

/// Outcome of executing a command against the item table.
enum Outcome {
    Read { value: Vec<u8>, flags: u32, cas: CasToken },
    Stored { cas: CasToken },
    Counter { value: u64, cas: CasToken },
    Done,
}

#[derive(Default)]
pub struct LoopbackInstance {
    callbacks: RefCell<CallbackTable>,
    owner: RefCell<Option<Weak<dyn InstanceOwner>>>,
    items: RefCell<HashMap<Vec<u8>, Item>>,
    queue: RefCell<VecDeque<Event>>,
    last_cas: Cell<u64>,
    order: Cell<DeliveryOrder>,
    faults: RefCell<HashMap<Vec<u8>, ErrorCode>>,
    versions: RefCell<HashMap<OperationKind, u32>>,
    refusal: Cell<Option<ErrorCode>>,
    delivered: Cell<u64>,
}

impl LoopbackInstance {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the initial cluster configuration, as a fresh connection does.
    pub fn connect(&self) {
        info!("loopback instance connecting");
        self.queue
            .borrow_mut()
            .push_back(Event::Configuration(ConfigurationChange::New));
    }

    pub fn notify_configuration(&self, change: ConfigurationChange) {
        self.queue.borrow_mut().push_back(Event::Configuration(change));
    }

    /// Queue an instance-level error such as a lost connection.
    pub fn raise_error(&self, code: ErrorCode, info: Option<&str>) {
        self.queue.borrow_mut().push_back(Event::Error {
            code,
            info: info.map(str::to_string),
        });
    }

    /// Fail the next operation on `key` with `code` instead of executing it.
    /// A success code is replaced by `EINTERNAL`.
    pub fn inject_error(&self, key: &[u8], code: ErrorCode) {
        self.faults.borrow_mut().insert(key.to_vec(), failure(code));
    }

    /// Stamp responses of `kind` with a foreign layout version.
    pub fn override_version(&self, kind: OperationKind, version: u32) {
        self.versions.borrow_mut().insert(kind, version);
    }

    pub fn set_delivery_order(&self, order: DeliveryOrder) {
        self.order.set(order);
    }

    /// Make `schedule` refuse every command with `code`; `None` accepts again.
    /// A success code is replaced by `EINTERNAL`.
    pub fn refuse_scheduling(&self, code: Option<ErrorCode>) {
        self.refusal.set(code.map(failure));
    }

    pub fn queued(&self) -> usize {
        self.queue.borrow().len()
    }

    pub fn delivered(&self) -> u64 {
        self.delivered.get()
    }

    pub fn item_count(&self) -> usize {
        self.items.borrow().len()
    }

    pub fn expiry_of(&self, key: &[u8]) -> Option<u32> {
        self.items.borrow().get(key).map(|item| item.expiry)
    }

    /// Deliver one queued event. Returns `false` when the queue is empty.
    ///
    /// The queue borrow is released before any callback runs.
    pub fn pump_one(&self) -> Result<bool> {
        let next = {
            let mut queue = self.queue.borrow_mut();
            match self.order.get() {
                DeliveryOrder::Fifo => queue.pop_front(),
                DeliveryOrder::Lifo => queue.pop_back(),
            }
        };

        let Some(event) = next else {
            return Ok(false);
        };
        self.delivered.set(self.delivered.get() + 1);

        let table = *self.callbacks.borrow();
        match event {
            Event::Configuration(change) => {
                if let Some(callback) = table.configuration {
                    callback(self, change);
                }
            }
            Event::Error { code, info } => {
                if let Some(callback) = table.error {
                    callback(self, code, info.as_deref());
                }
            }
            Event::Operation { cookie, command } => {
                self.deliver(&table, cookie, command)?;
            }
        }
        Ok(true)
    }

    fn version_for(&self, kind: OperationKind) -> u32 {
        self.versions
            .borrow()
            .get(&kind)
            .copied()
            .unwrap_or(SUPPORTED_RESPONSE_VERSION)
    }

    fn deliver(&self, table: &CallbackTable, cookie: CallId, command: Command) -> Result<()> {
        let kind = command.kind();
        let version = self.version_for(kind);
        let injected = self.faults.borrow_mut().remove(command.key());
        let (error, outcome) = match injected {
            Some(code) => (code, Outcome::Done),
            None => match self.execute(&command) {
                Ok(outcome) => (ErrorCode::SUCCESS, outcome),
                Err(code) => (code, Outcome::Done),
            },
        };
        debug!("delivering {} for {} ({})", kind, cookie, error);

        let key = command.key();
        match command {
            Command::Get { .. } => {
                let Some(callback) = table.get else {
                    return unregistered(kind);
                };
                let (value, flags, cas) = match &outcome {
                    Outcome::Read { value, flags, cas } => (value.as_slice(), *flags, *cas),
                    _ => (&[][..], 0, CasToken::NONE),
                };
                let resp = GetResponse {
                    version,
                    v0: GetResponseV0 {
                        key,
                        bytes: value,
                        flags,
                        cas,
                    },
                };
                callback(self, cookie, error, &resp)
            }
            Command::Store { operation, .. } => {
                let Some(callback) = table.store else {
                    return unregistered(kind);
                };
                let cas = match outcome {
                    Outcome::Stored { cas } => cas,
                    _ => CasToken::NONE,
                };
                let resp = StoreResponse {
                    version,
                    v0: StoreResponseV0 { key, cas },
                };
                callback(self, cookie, operation, error, &resp)
            }
            Command::Arithmetic { .. } => {
                let Some(callback) = table.arithmetic else {
                    return unregistered(kind);
                };
                let (value, cas) = match outcome {
                    Outcome::Counter { value, cas } => (value, cas),
                    _ => (0, CasToken::NONE),
                };
                let resp = ArithmeticResponse {
                    version,
                    v0: ArithmeticResponseV0 { key, value, cas },
                };
                callback(self, cookie, error, &resp)
            }
            Command::Remove { .. } => {
                let Some(callback) = table.remove else {
                    return unregistered(kind);
                };
                let resp = RemoveResponse {
                    version,
                    v0: KeyResponseV0 { key },
                };
                callback(self, cookie, error, &resp)
            }
            Command::Touch { .. } => {
                let Some(callback) = table.touch else {
                    return unregistered(kind);
                };
                let resp = TouchResponse {
                    version,
                    v0: KeyResponseV0 { key },
                };
                callback(self, cookie, error, &resp)
            }
        }
    }

    fn next_cas(&self) -> CasToken {
        let cas = self.last_cas.get() + 1;
        self.last_cas.set(cas);
        CasToken(cas)
    }

    fn execute(&self, command: &Command) -> std::result::Result<Outcome, ErrorCode> {
        let mut items = self.items.borrow_mut();
        match command {
            Command::Get { key } => {
                let item = items.get(key).ok_or(ErrorCode::KEY_ENOENT)?;
                Ok(Outcome::Read {
                    value: item.value.clone(),
                    flags: item.flags,
                    cas: item.cas,
                })
            }
            Command::Store {
                operation,
                key,
                value,
                flags,
                cas,
                expiry,
            } => {
                let existing = items.get(key);
                if let Some(item) = existing {
                    if !cas.is_none() && item.cas != *cas {
                        return Err(ErrorCode::KEY_EEXISTS);
                    }
                } else if !cas.is_none() {
                    return Err(ErrorCode::KEY_ENOENT);
                }

                let value = match (operation, existing) {
                    (StorageOperation::Add, Some(_)) => return Err(ErrorCode::KEY_EEXISTS),
                    (StorageOperation::Replace, None) => return Err(ErrorCode::KEY_ENOENT),
                    (StorageOperation::Append | StorageOperation::Prepend, None) => {
                        return Err(ErrorCode::NOT_STORED);
                    }
                    (StorageOperation::Append, Some(item)) => {
                        let mut joined = item.value.clone();
                        joined.extend_from_slice(value);
                        joined
                    }
                    (StorageOperation::Prepend, Some(item)) => {
                        let mut joined = value.clone();
                        joined.extend_from_slice(&item.value);
                        joined
                    }
                    _ => value.clone(),
                };
                let (flags, expiry) = match (operation, existing) {
                    (StorageOperation::Append | StorageOperation::Prepend, Some(item)) => {
                        (item.flags, item.expiry)
                    }
                    _ => (*flags, *expiry),
                };

                let cas = self.next_cas();
                items.insert(
                    key.clone(),
                    Item {
                        value,
                        flags,
                        cas,
                        expiry,
                    },
                );
                Ok(Outcome::Stored { cas })
            }
            Command::Arithmetic {
                key,
                delta,
                initial,
                expiry,
            } => {
                let value = match items.get(key) {
                    Some(item) => {
                        let current = std::str::from_utf8(&item.value)
                            .ok()
                            .and_then(|s| s.trim().parse::<u64>().ok())
                            .ok_or(ErrorCode::DELTA_BADVAL)?;
                        if *delta >= 0 {
                            current.wrapping_add(delta.unsigned_abs())
                        } else {
                            current.saturating_sub(delta.unsigned_abs())
                        }
                    }
                    None => initial.ok_or(ErrorCode::KEY_ENOENT)?,
                };
                let (flags, expiry) = items
                    .get(key)
                    .map(|item| (item.flags, item.expiry))
                    .unwrap_or((0, *expiry));

                let cas = self.next_cas();
                items.insert(
                    key.clone(),
                    Item {
                        value: value.to_string().into_bytes(),
                        flags,
                        cas,
                        expiry,
                    },
                );
                Ok(Outcome::Counter { value, cas })
            }
            Command::Remove { key, cas } => {
                let item = items.get(key).ok_or(ErrorCode::KEY_ENOENT)?;
                if !cas.is_none() && item.cas != *cas {
                    return Err(ErrorCode::KEY_EEXISTS);
                }
                items.remove(key);
                Ok(Outcome::Done)
            }
            Command::Touch { key, expiry } => {
                let item = items.get_mut(key).ok_or(ErrorCode::KEY_ENOENT)?;
                item.expiry = *expiry;
                Ok(Outcome::Done)
            }
        }
    }
}

fn failure(code: ErrorCode) -> ErrorCode {
    if code.is_success() {
        warn!("success is not a failure code, using {}", ErrorCode::EINTERNAL);
        return ErrorCode::EINTERNAL;
    }
    code
}

fn unregistered(kind: OperationKind) -> Result<()> {
    warn!("no {} callback registered, dropping completion", kind);
    Ok(())
}

impl LibraryInstance for LoopbackInstance {
    fn set_error_callback(&self, callback: ErrorCallback) {
        self.callbacks.borrow_mut().error = Some(callback);
    }

    fn set_get_callback(&self, callback: GetCallback) {
        self.callbacks.borrow_mut().get = Some(callback);
    }

    fn set_store_callback(&self, callback: StoreCallback) {
        self.callbacks.borrow_mut().store = Some(callback);
    }

    fn set_arithmetic_callback(&self, callback: ArithmeticCallback) {
        self.callbacks.borrow_mut().arithmetic = Some(callback);
    }

    fn set_remove_callback(&self, callback: RemoveCallback) {
        self.callbacks.borrow_mut().remove = Some(callback);
    }

    fn set_touch_callback(&self, callback: TouchCallback) {
        self.callbacks.borrow_mut().touch = Some(callback);
    }

    fn set_configuration_callback(&self, callback: ConfigurationCallback) {
        self.callbacks.borrow_mut().configuration = Some(callback);
    }

    fn set_owner(&self, owner: Weak<dyn InstanceOwner>) {
        *self.owner.borrow_mut() = Some(owner);
    }

    fn owner(&self) -> Option<Rc<dyn InstanceOwner>> {
        self.owner.borrow().as_ref().and_then(Weak::upgrade)
    }

    fn schedule(&self, cookie: CallId, command: &Command) -> std::result::Result<(), ErrorCode> {
        if let Some(code) = self.refusal.get() {
            return Err(code);
        }
        if command.key().is_empty() {
            return Err(ErrorCode::EINVAL);
        }
        self.queue
            .borrow_mut()
            .push_back(Event::Operation {
                cookie,
                command: command.clone(),
            });
        Ok(())
    }

    fn wait(&self) -> Result<()> {
        while self.pump_one()? {}
        Ok(())
    }
}
