// ============================================================================
// kvbridge Library
// ============================================================================

pub mod connection;
pub mod core;
pub mod dispatch;
pub mod host;
pub mod prelude;

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use log::{debug, error, info, warn};

// Re-export main types for convenience
pub use connection::{BridgeConfig, DeliveryOrder, LibraryInstance, LoopbackInstance};
pub use crate::core::{
    BridgeError, CallId, CasToken, ConfigurationChange, ErrorCode, HostFunction, HostValue,
    OperationKind, Result, StorageOperation,
};
pub use dispatch::{CompletionCookie, CookieRegistry, ErrorEncoding, ResultPayload};
pub use host::{HostRuntime, InMemoryHost};

use connection::{Command, InstanceOwner, setup_callbacks};
use host::{HandleScope, Persistent};

// ============================================================================
// High-level Client API
// ============================================================================

/// Events the client forwards from the library instance to host handlers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClientEvent {
    /// First cluster configuration received: `()`.
    Connect,
    /// Instance-level failure: `(code, info)`.
    Error,
}

/// Per-mutation options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreOptions {
    pub flags: u32,
    /// Only apply the mutation if the item still carries this CAS.
    pub cas: CasToken,
    pub expiry: u32,
}

/// Host-facing client object owning one library instance.
///
/// Every operation is one logical call: it takes a host callback and an
/// optional piece of user data, creates a single completion cookie, and
/// schedules one library command per key. The callback is invoked once for
/// each key as completions are pumped by [`Client::wait`].
///
/// # Examples
///
/// ```
/// use std::rc::Rc;
/// use kvbridge::{BridgeConfig, Client, HostFunction, HostRuntime, InMemoryHost, StoreOptions};
///
/// # fn main() -> kvbridge::Result<()> {
/// let host = Rc::new(InMemoryHost::new());
/// let runtime: Rc<dyn HostRuntime> = host.clone();
/// let (client, _library) = Client::loopback(runtime, BridgeConfig::default())?;
///
/// let done = HostFunction::new("done", |args| {
///     assert!(!args[1].is_truthy());
///     Ok(())
/// });
/// client.set("greeting", "hello", StoreOptions::default(), &done, None)?;
/// client.get(["greeting"], &done, None)?;
/// client.wait()?;
///
/// assert_eq!(host.invocation_count(), 2);
/// # Ok(())
/// # }
/// ```
pub struct Client {
    runtime: Rc<dyn HostRuntime>,
    instance: Rc<dyn LibraryInstance>,
    registry: CookieRegistry,
    handle: HostValue,
    config: BridgeConfig,
    connected: Cell<bool>,
    last_error: RefCell<Option<(ErrorCode, Option<String>)>>,
    handlers: RefCell<HashMap<ClientEvent, Persistent>>,
}

impl Client {
    /// Attach a client to `instance` and register the completion trampolines.
    pub fn new(
        runtime: Rc<dyn HostRuntime>,
        instance: Rc<dyn LibraryInstance>,
        config: BridgeConfig,
    ) -> Result<Rc<Self>> {
        config.validate()?;

        let handle = runtime.create_object("Client");
        let client = Rc::new(Self {
            runtime,
            instance,
            registry: CookieRegistry::new(),
            handle,
            config,
            connected: Cell::new(false),
            last_error: RefCell::new(None),
            handlers: RefCell::new(HashMap::new()),
        });

        let owner: Rc<dyn InstanceOwner> = client.clone();
        client.instance.set_owner(Rc::downgrade(&owner));
        setup_callbacks(client.instance.as_ref());

        info!("client attached to {}", client.config.to_url());
        Ok(client)
    }

    /// Create a client over a fresh in-process library instance and connect it.
    pub fn loopback(
        runtime: Rc<dyn HostRuntime>,
        config: BridgeConfig,
    ) -> Result<(Rc<Self>, Rc<LoopbackInstance>)> {
        let library = Rc::new(LoopbackInstance::new());
        let instance: Rc<dyn LibraryInstance> = library.clone();
        let client = Self::new(runtime, instance, config)?;
        library.connect();
        Ok((client, library))
    }

    /// The host object that completion cookies keep alive.
    pub fn handle(&self) -> &HostValue {
        &self.handle
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    pub fn is_connected(&self) -> bool {
        self.connected.get()
    }

    pub fn last_error(&self) -> Option<(ErrorCode, Option<String>)> {
        self.last_error.borrow().clone()
    }

    /// Logical calls with completions still outstanding.
    pub fn pending_calls(&self) -> usize {
        self.registry.pending()
    }

    /// Install the host handler for `event`, replacing any previous one.
    pub fn on(&self, event: ClientEvent, handler: &HostFunction) {
        let handle = Persistent::new(&self.runtime, &HostValue::Function(handler.clone()));
        let previous = self.handlers.borrow_mut().insert(event, handle);
        drop(previous);
    }

    /// Fetch `keys`. Callback arguments: `(data, error, key, cas, flags, value)`.
    pub fn get<I>(
        &self,
        keys: I,
        callback: &HostFunction,
        user_data: Option<HostValue>,
    ) -> Result<CallId>
    where
        I: IntoIterator,
        I::Item: AsRef<[u8]>,
    {
        let commands = keys
            .into_iter()
            .map(|key| Command::Get {
                key: key.as_ref().to_vec(),
            })
            .collect();
        self.issue(commands, callback, user_data)
    }

    /// Callback arguments: `(data, error, key, cas)`.
    pub fn store(
        &self,
        operation: StorageOperation,
        key: impl AsRef<[u8]>,
        value: impl AsRef<[u8]>,
        options: StoreOptions,
        callback: &HostFunction,
        user_data: Option<HostValue>,
    ) -> Result<CallId> {
        let command = Command::Store {
            operation,
            key: key.as_ref().to_vec(),
            value: value.as_ref().to_vec(),
            flags: options.flags,
            cas: options.cas,
            expiry: options.expiry,
        };
        self.issue(vec![command], callback, user_data)
    }

    pub fn set(
        &self,
        key: impl AsRef<[u8]>,
        value: impl AsRef<[u8]>,
        options: StoreOptions,
        callback: &HostFunction,
        user_data: Option<HostValue>,
    ) -> Result<CallId> {
        self.store(StorageOperation::Set, key, value, options, callback, user_data)
    }

    pub fn add(
        &self,
        key: impl AsRef<[u8]>,
        value: impl AsRef<[u8]>,
        options: StoreOptions,
        callback: &HostFunction,
        user_data: Option<HostValue>,
    ) -> Result<CallId> {
        self.store(StorageOperation::Add, key, value, options, callback, user_data)
    }

    pub fn replace(
        &self,
        key: impl AsRef<[u8]>,
        value: impl AsRef<[u8]>,
        options: StoreOptions,
        callback: &HostFunction,
        user_data: Option<HostValue>,
    ) -> Result<CallId> {
        self.store(StorageOperation::Replace, key, value, options, callback, user_data)
    }

    pub fn append(
        &self,
        key: impl AsRef<[u8]>,
        value: impl AsRef<[u8]>,
        options: StoreOptions,
        callback: &HostFunction,
        user_data: Option<HostValue>,
    ) -> Result<CallId> {
        self.store(StorageOperation::Append, key, value, options, callback, user_data)
    }

    pub fn prepend(
        &self,
        key: impl AsRef<[u8]>,
        value: impl AsRef<[u8]>,
        options: StoreOptions,
        callback: &HostFunction,
        user_data: Option<HostValue>,
    ) -> Result<CallId> {
        self.store(StorageOperation::Prepend, key, value, options, callback, user_data)
    }

    /// Adjust a counter by `delta`, creating it with `initial` when missing.
    /// Callback arguments: `(data, error, key, cas, value)`.
    pub fn arithmetic(
        &self,
        key: impl AsRef<[u8]>,
        delta: i64,
        initial: Option<u64>,
        callback: &HostFunction,
        user_data: Option<HostValue>,
    ) -> Result<CallId> {
        let command = Command::Arithmetic {
            key: key.as_ref().to_vec(),
            delta,
            initial,
            expiry: 0,
        };
        self.issue(vec![command], callback, user_data)
    }

    /// Callback arguments: `(data, error, key)`.
    pub fn remove<I>(
        &self,
        keys: I,
        callback: &HostFunction,
        user_data: Option<HostValue>,
    ) -> Result<CallId>
    where
        I: IntoIterator,
        I::Item: AsRef<[u8]>,
    {
        let commands = keys
            .into_iter()
            .map(|key| Command::Remove {
                key: key.as_ref().to_vec(),
                cas: CasToken::NONE,
            })
            .collect();
        self.issue(commands, callback, user_data)
    }

    /// Remove `key` only if it still carries `cas`.
    pub fn remove_if(
        &self,
        key: impl AsRef<[u8]>,
        cas: CasToken,
        callback: &HostFunction,
        user_data: Option<HostValue>,
    ) -> Result<CallId> {
        let command = Command::Remove {
            key: key.as_ref().to_vec(),
            cas,
        };
        self.issue(vec![command], callback, user_data)
    }

    /// Callback arguments: `(data, error, key)`.
    pub fn touch<I>(
        &self,
        keys: I,
        expiry: u32,
        callback: &HostFunction,
        user_data: Option<HostValue>,
    ) -> Result<CallId>
    where
        I: IntoIterator,
        I::Item: AsRef<[u8]>,
    {
        let commands = keys
            .into_iter()
            .map(|key| Command::Touch {
                key: key.as_ref().to_vec(),
                expiry,
            })
            .collect();
        self.issue(commands, callback, user_data)
    }

    /// Pump the library until every scheduled completion has been delivered.
    pub fn wait(&self) -> Result<()> {
        self.instance.wait()
    }

    /// Create the cookie for one logical call and schedule its commands.
    ///
    /// Refused commands are completed immediately through the callback. If
    /// one of those callbacks fails, its error is returned and the call id is
    /// not; commands that were accepted still complete during [`Client::wait`]
    /// and remain counted by [`Client::pending_calls`].
    fn issue(
        &self,
        commands: Vec<Command>,
        callback: &HostFunction,
        user_data: Option<HostValue>,
    ) -> Result<CallId> {
        if commands.is_empty() {
            return Err(BridgeError::InvalidArgument(
                "at least one key is required".to_string(),
            ));
        }
        if commands.len() > self.config.max_keys_per_call {
            return Err(BridgeError::InvalidArgument(format!(
                "{} keys exceed the limit of {} per call",
                commands.len(),
                self.config.max_keys_per_call
            )));
        }
        let expected = u32::try_from(commands.len())
            .map_err(|_| BridgeError::InvalidArgument("too many keys".to_string()))?;

        let cookie = CompletionCookie::with_encoding(
            &self.runtime,
            &self.handle,
            callback,
            user_data.as_ref(),
            expected,
            self.config.error_encoding,
        );
        let id = self.registry.register(cookie);
        debug!("{} scheduling {} command(s)", id, expected);

        let mut first_failure = None;
        for command in &commands {
            if let Err(code) = self.instance.schedule(id, command) {
                let code = if code.is_success() {
                    error!("{} {} refused with a success code", id, command.kind());
                    ErrorCode::EINTERNAL
                } else {
                    code
                };
                warn!("{} {} refused by library: {}", id, command.kind(), code);
                if let Err(err) = self.complete_refused(id, command, code) {
                    first_failure.get_or_insert(err);
                }
            }
        }

        match first_failure {
            Some(err) => Err(err),
            None => Ok(id),
        }
    }

    /// Report a command the library refused through the normal callback path.
    fn complete_refused(&self, id: CallId, command: &Command, code: ErrorCode) -> Result<()> {
        let key = command.key();
        let payload = match command {
            Command::Get { .. } => ResultPayload::Get {
                error: code,
                key,
                value: &[],
                flags: 0,
                cas: CasToken::NONE,
            },
            Command::Store { operation, .. } => ResultPayload::Store {
                error: code,
                key,
                cas: CasToken::NONE,
                operation: *operation,
            },
            Command::Arithmetic { .. } => ResultPayload::Arithmetic {
                error: code,
                key,
                value: 0,
                cas: CasToken::NONE,
            },
            Command::Remove { .. } => ResultPayload::Remove { error: code, key },
            Command::Touch { .. } => ResultPayload::Touch { error: code, key },
        };
        self.registry.complete(id, &payload)
    }

    fn emit(&self, event: ClientEvent, args: &[HostValue]) {
        let handler = self
            .handlers
            .borrow()
            .get(&event)
            .and_then(Persistent::get);
        let Some(handler) = handler.as_ref().and_then(HostValue::as_function) else {
            return;
        };

        let _scope = HandleScope::enter(self.runtime.as_ref());
        if let Err(err) = self.runtime.invoke(handler, args) {
            error!("{:?} handler failed: {}", event, err);
        }
    }
}

impl InstanceOwner for Client {
    fn registry(&self) -> &CookieRegistry {
        &self.registry
    }

    fn on_error(&self, error: ErrorCode, info: Option<&str>) {
        warn!("instance error {}: {}", error, info.unwrap_or("-"));
        *self.last_error.borrow_mut() = Some((error, info.map(str::to_string)));

        let info = match info {
            Some(text) => self.runtime.create_bytes(text.as_bytes()),
            None => self.runtime.create_undefined(),
        };
        let code = self.runtime.create_number(f64::from(error.code()));
        self.emit(ClientEvent::Error, &[code, info]);
    }

    fn on_configuration(&self, change: ConfigurationChange) {
        debug!("configuration update: {:?}", change);
        if change == ConfigurationChange::New && !self.connected.replace(true) {
            info!("connected to bucket '{}'", self.config.bucket);
            self.emit(ClientEvent::Connect, &[]);
        }
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        self.registry.release_all();
    }
}
