/// Client API tests
///
/// Drive the bridge end to end through `Client` over the in-process library.
/// Run with: cargo test --test client_api_tests
use kvbridge::{
    BridgeConfig, BridgeError, CasToken, Client, ClientEvent, DeliveryOrder, ErrorCode,
    ErrorEncoding, HostFunction, HostRuntime, HostValue, InMemoryHost, LoopbackInstance,
    OperationKind, StoreOptions,
};
use kvbridge::connection::{
    ArithmeticCallback, Command, ConfigurationCallback, ErrorCallback, GetCallback,
    InstanceOwner, LibraryInstance, RemoveCallback, StoreCallback, TouchCallback,
};
use std::cell::RefCell;
use std::rc::{Rc, Weak};

type Calls = Rc<RefCell<Vec<Vec<HostValue>>>>;

fn setup() -> (Rc<InMemoryHost>, Rc<Client>, Rc<LoopbackInstance>) {
    setup_with(BridgeConfig::default())
}

fn setup_with(config: BridgeConfig) -> (Rc<InMemoryHost>, Rc<Client>, Rc<LoopbackInstance>) {
    let host = Rc::new(InMemoryHost::new());
    let runtime: Rc<dyn HostRuntime> = host.clone();
    let (client, library) = Client::loopback(runtime, config).unwrap();
    client.wait().unwrap();
    (host, client, library)
}

fn recorder(name: &str) -> (HostFunction, Calls) {
    let calls: Calls = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&calls);
    let f = HostFunction::new(name, move |args| {
        sink.borrow_mut().push(args.to_vec());
        Ok(())
    });
    (f, calls)
}

fn bytes(s: &str) -> HostValue {
    HostValue::from(s)
}

fn seed(client: &Client, key: &str, value: &str) -> CasToken {
    let (cb, calls) = recorder("seed");
    client
        .set(key, value, StoreOptions::default(), &cb, None)
        .unwrap();
    client.wait().unwrap();
    let calls = calls.borrow();
    calls[0][3].as_cas().unwrap()
}

#[test]
fn test_client_connects() {
    let (_host, client, _library) = setup();
    assert!(client.is_connected());
    assert_eq!(client.pending_calls(), 0);
}

#[test]
fn test_get_success() {
    let (_host, client, _library) = setup();
    let cas = seed(&client, "k1", "v1");

    let (cb, calls) = recorder("get");
    let data = bytes("ctx");
    client.get(["k1"], &cb, Some(data.clone())).unwrap();
    client.wait().unwrap();

    let calls = calls.borrow();
    assert_eq!(calls.len(), 1);
    assert_eq!(
        calls[0],
        vec![
            data,
            HostValue::Boolean(false),
            bytes("k1"),
            HostValue::Cas(cas),
            HostValue::Number(0.0),
            bytes("v1"),
        ]
    );
}

#[test]
fn test_get_missing_key() {
    let (_host, client, _library) = setup();
    let (cb, calls) = recorder("get");
    let data = bytes("ctx");
    client.get(["missing"], &cb, Some(data.clone())).unwrap();
    client.wait().unwrap();

    let calls = calls.borrow();
    assert_eq!(
        calls[0],
        vec![
            data,
            HostValue::Number(f64::from(ErrorCode::KEY_ENOENT.code())),
            bytes("missing"),
            HostValue::Undefined,
            HostValue::Undefined,
            HostValue::Undefined,
        ]
    );
}

#[test]
fn test_multi_get_one_callback_per_key() {
    let (host, client, _library) = setup();
    seed(&client, "a", "1");
    seed(&client, "b", "2");

    let (cb, calls) = recorder("multi");
    let id = client.get(["a", "b", "nope"], &cb, None).unwrap();
    assert_eq!(client.pending_calls(), 1);
    client.wait().unwrap();

    let calls = calls.borrow();
    assert_eq!(calls.len(), 3);
    assert_eq!(calls[0][5], bytes("1"));
    assert_eq!(calls[1][5], bytes("2"));
    assert!(calls[2][1].is_truthy());
    assert!(calls.iter().all(|args| args[0] == HostValue::Undefined));

    assert_eq!(client.pending_calls(), 0);
    assert!(id.0 > 0);
    assert_eq!(host.live_handles(), 0);
}

#[test]
fn test_lifo_delivery_reverses_completion_order() {
    let (_host, client, library) = setup();
    seed(&client, "a", "1");
    seed(&client, "b", "2");
    library.set_delivery_order(DeliveryOrder::Lifo);

    let (cb, calls) = recorder("multi");
    client.get(["a", "b"], &cb, None).unwrap();
    client.wait().unwrap();

    let keys: Vec<_> = calls.borrow().iter().map(|args| args[2].clone()).collect();
    assert_eq!(keys, vec![bytes("b"), bytes("a")]);
}

#[test]
fn test_store_modes() {
    let (_host, client, _library) = setup();
    let (cb, calls) = recorder("store");

    client.add("k", "v", StoreOptions::default(), &cb, None).unwrap();
    client.add("k", "v", StoreOptions::default(), &cb, None).unwrap();
    client.replace("absent", "v", StoreOptions::default(), &cb, None).unwrap();
    client.append("k", "!", StoreOptions::default(), &cb, None).unwrap();
    client.prepend("absent", "!", StoreOptions::default(), &cb, None).unwrap();
    client.wait().unwrap();

    let errors: Vec<_> = calls.borrow().iter().map(|args| args[1].clone()).collect();
    assert_eq!(
        errors,
        vec![
            HostValue::Boolean(false),
            HostValue::Number(f64::from(ErrorCode::KEY_EEXISTS.code())),
            HostValue::Number(f64::from(ErrorCode::KEY_ENOENT.code())),
            HostValue::Boolean(false),
            HostValue::Number(f64::from(ErrorCode::NOT_STORED.code())),
        ]
    );
    assert!(calls.borrow().iter().all(|args| args.len() == 4));

    let (get, read) = recorder("get");
    client.get(["k"], &get, None).unwrap();
    client.wait().unwrap();
    assert_eq!(read.borrow()[0][5], bytes("v!"));
}

#[test]
fn test_store_flags_round_trip() {
    let (_host, client, _library) = setup();
    let (cb, _) = recorder("store");
    let options = StoreOptions {
        flags: 0xdead,
        ..StoreOptions::default()
    };
    client.set("f", "x", options, &cb, None).unwrap();

    let (get, read) = recorder("get");
    client.get(["f"], &get, None).unwrap();
    client.wait().unwrap();
    assert_eq!(read.borrow()[0][4], HostValue::Number(f64::from(0xdead_u32)));
}

#[test]
fn test_cas_mismatch_is_reported() {
    let (_host, client, _library) = setup();
    let cas = seed(&client, "doc", "v1");

    let (cb, calls) = recorder("cas");
    let stale = StoreOptions {
        cas: CasToken(cas.0 + 1000),
        ..StoreOptions::default()
    };
    client.set("doc", "v2", stale, &cb, None).unwrap();
    client.remove_if("doc", CasToken(cas.0 + 1000), &cb, None).unwrap();
    client.remove_if("doc", cas, &cb, None).unwrap();
    client.wait().unwrap();

    let calls = calls.borrow();
    let conflict = HostValue::Number(f64::from(ErrorCode::KEY_EEXISTS.code()));
    assert_eq!(calls[0][1], conflict);
    assert_eq!(calls[0][3], HostValue::Undefined);
    assert_eq!(calls[1][1], conflict);
    assert_eq!(calls[2], vec![HostValue::Undefined, HostValue::Boolean(false), bytes("doc")]);
}

#[test]
fn test_counter() {
    let (_host, client, _library) = setup();
    let (cb, calls) = recorder("ctr");
    client.arithmetic("ctr", 1, Some(7), &cb, None).unwrap();
    client.arithmetic("ctr", 5, None, &cb, None).unwrap();
    client.arithmetic("none", 1, None, &cb, None).unwrap();
    client.wait().unwrap();

    let calls = calls.borrow();
    assert_eq!(calls[0].len(), 5);
    assert_eq!(calls[0][1], HostValue::Boolean(false));
    assert_eq!(calls[0][2], bytes("ctr"));
    assert!(calls[0][3].as_cas().is_some());
    assert_eq!(calls[0][4], HostValue::Number(7.0));
    assert_eq!(calls[1][4], HostValue::Number(12.0));
    assert_eq!(calls[2][1], HostValue::Number(f64::from(ErrorCode::KEY_ENOENT.code())));
    assert!(calls[2][3..].iter().all(HostValue::is_undefined));
}

#[test]
fn test_remove_and_touch() {
    let (_host, client, library) = setup();
    seed(&client, "a", "1");
    seed(&client, "b", "2");

    let (touched, touch_calls) = recorder("touch");
    client.touch(["a", "zzz"], 60, &touched, None).unwrap();
    let (removed, remove_calls) = recorder("remove");
    client.remove(["a", "b"], &removed, None).unwrap();
    client.wait().unwrap();

    let touch_calls = touch_calls.borrow();
    assert_eq!(touch_calls.len(), 2);
    assert_eq!(touch_calls[0][1], HostValue::Boolean(false));
    assert_eq!(touch_calls[1][1], HostValue::Number(f64::from(ErrorCode::KEY_ENOENT.code())));
    assert!(touch_calls.iter().all(|args| args.len() == 3));

    assert_eq!(remove_calls.borrow().len(), 2);
    assert_eq!(library.item_count(), 0);
}

#[test]
fn test_injected_timeout_goes_through_callback() {
    let (_host, client, library) = setup();
    seed(&client, "slow", "v");
    library.inject_error(b"slow", ErrorCode::ETIMEDOUT);

    let (cb, calls) = recorder("get");
    client.get(["slow"], &cb, None).unwrap();
    assert!(client.wait().is_ok());

    let calls = calls.borrow();
    assert_eq!(calls[0][1], HostValue::Number(f64::from(ErrorCode::ETIMEDOUT.code())));
    assert!(calls[0][3..].iter().all(HostValue::is_undefined));
}

#[test]
fn test_refused_scheduling_completes_synchronously() {
    let (host, client, library) = setup();
    library.refuse_scheduling(Some(ErrorCode::ETMPFAIL));

    let (cb, calls) = recorder("refused");
    client.get(["a", "b"], &cb, None).unwrap();

    assert_eq!(calls.borrow().len(), 2);
    assert!(calls.borrow().iter().all(|args| {
        args[1] == HostValue::Number(f64::from(ErrorCode::ETMPFAIL.code())) && args.len() == 6
    }));
    assert_eq!(client.pending_calls(), 0);
    assert_eq!(host.live_handles(), 0);
    assert_eq!(library.queued(), 0);
}

/// Library that refuses every command but reports the refusal as success.
#[derive(Default)]
struct SuccessRefusingLibrary {
    owner: RefCell<Option<Weak<dyn InstanceOwner>>>,
}

impl LibraryInstance for SuccessRefusingLibrary {
    fn set_error_callback(&self, _: ErrorCallback) {}
    fn set_get_callback(&self, _: GetCallback) {}
    fn set_store_callback(&self, _: StoreCallback) {}
    fn set_arithmetic_callback(&self, _: ArithmeticCallback) {}
    fn set_remove_callback(&self, _: RemoveCallback) {}
    fn set_touch_callback(&self, _: TouchCallback) {}
    fn set_configuration_callback(&self, _: ConfigurationCallback) {}

    fn set_owner(&self, owner: Weak<dyn InstanceOwner>) {
        *self.owner.borrow_mut() = Some(owner);
    }

    fn owner(&self) -> Option<Rc<dyn InstanceOwner>> {
        self.owner.borrow().as_ref().and_then(Weak::upgrade)
    }

    fn schedule(&self, _: kvbridge::CallId, _: &Command) -> std::result::Result<(), ErrorCode> {
        Err(ErrorCode::SUCCESS)
    }

    fn wait(&self) -> kvbridge::Result<()> {
        Ok(())
    }
}

#[test]
fn test_refusal_with_success_code_is_reported_as_failure() {
    let host = Rc::new(InMemoryHost::new());
    let runtime: Rc<dyn HostRuntime> = host.clone();
    let library: Rc<dyn LibraryInstance> = Rc::new(SuccessRefusingLibrary::default());
    let client = Client::new(runtime, library, BridgeConfig::default()).unwrap();

    let (cb, calls) = recorder("refused");
    client.get(["never"], &cb, None).unwrap();

    let calls = calls.borrow();
    assert_eq!(calls.len(), 1);
    assert!(calls[0][1].is_truthy());
    assert_eq!(calls[0][1], HostValue::Number(f64::from(ErrorCode::EINTERNAL.code())));
    assert!(calls[0][3..].iter().all(HostValue::is_undefined));
    assert_eq!(client.pending_calls(), 0);
}

#[test]
fn test_loopback_success_refusal_and_fault_are_failures() {
    let (_host, client, library) = setup();
    library.refuse_scheduling(Some(ErrorCode::SUCCESS));
    let (cb, calls) = recorder("refused");
    client.get(["never"], &cb, None).unwrap();

    library.refuse_scheduling(None);
    library.inject_error(b"also-never", ErrorCode::SUCCESS);
    client.get(["also-never"], &cb, None).unwrap();
    client.wait().unwrap();

    let calls = calls.borrow();
    assert_eq!(calls.len(), 2);
    for args in calls.iter() {
        assert!(args[1].is_truthy());
        assert!(args[3..].iter().all(HostValue::is_undefined));
    }
    assert_eq!(library.item_count(), 0);
}

#[test]
fn test_failed_refusal_callback_leaves_accepted_commands_pending() {
    let (host, client, _library) = setup();
    seed(&client, "ok", "v");

    let (record, calls) = recorder("record");
    let cb = HostFunction::new("strict", move |args| {
        if args[2].as_bytes() == Some(&b""[..]) {
            return Err(BridgeError::Host("empty key".into()));
        }
        record.call(args)
    });

    let err = client.get(["", "ok"], &cb, None).unwrap_err();
    assert!(matches!(err, BridgeError::Host(_)));
    assert_eq!(client.pending_calls(), 1);

    client.wait().unwrap();
    assert_eq!(calls.borrow().len(), 1);
    assert_eq!(calls.borrow()[0][5], bytes("v"));
    assert_eq!(client.pending_calls(), 0);
    assert_eq!(host.live_handles(), 0);
}

#[test]
fn test_unsupported_version_surfaces_from_wait() {
    let (host, client, library) = setup();
    library.override_version(OperationKind::Get, 1);

    let (cb, calls) = recorder("get");
    client.get(["k"], &cb, None).unwrap();
    let err = client.wait().unwrap_err();

    assert!(matches!(
        err,
        BridgeError::UnsupportedVersion {
            operation: OperationKind::Get,
            version: 1
        }
    ));
    assert!(err.is_structural());
    assert!(calls.borrow().is_empty());
    assert_eq!(client.pending_calls(), 1);
    assert_eq!(host.live_handles(), 3);
}

#[test]
fn test_null_error_encoding() {
    let (_host, client, _library) =
        setup_with(BridgeConfig::default().error_encoding(ErrorEncoding::Null));
    let (cb, calls) = recorder("null");
    client.set("k", "v", StoreOptions::default(), &cb, None).unwrap();
    client.wait().unwrap();
    assert_eq!(calls.borrow()[0][1], HostValue::Null);
}

#[test]
fn test_instance_error_reaches_handler() {
    let (_host, client, library) = setup();
    let (handler, calls) = recorder("on_error");
    client.on(ClientEvent::Error, &handler);

    library.raise_error(ErrorCode::NETWORK_ERROR, Some("connection reset"));
    client.wait().unwrap();

    assert_eq!(
        client.last_error(),
        Some((ErrorCode::NETWORK_ERROR, Some("connection reset".to_string())))
    );
    assert_eq!(
        calls.borrow()[0],
        vec![
            HostValue::Number(f64::from(ErrorCode::NETWORK_ERROR.code())),
            bytes("connection reset"),
        ]
    );
}

#[test]
fn test_connect_handler_fires_once() {
    let host = Rc::new(InMemoryHost::new());
    let runtime: Rc<dyn HostRuntime> = host.clone();
    let (client, library) = Client::loopback(runtime, BridgeConfig::default()).unwrap();
    let (handler, calls) = recorder("on_connect");
    client.on(ClientEvent::Connect, &handler);

    library.connect();
    client.wait().unwrap();

    assert!(client.is_connected());
    assert_eq!(calls.borrow().len(), 1);
    assert!(calls.borrow()[0].is_empty());
}

#[test]
fn test_failing_handler_is_contained() {
    let (_host, client, library) = setup();
    let handler = HostFunction::new("throws", |_| Err(BridgeError::Host("boom".into())));
    client.on(ClientEvent::Error, &handler);

    library.raise_error(ErrorCode::ERROR, None);
    assert!(client.wait().is_ok());
    assert_eq!(client.last_error(), Some((ErrorCode::ERROR, None)));
}

#[test]
fn test_callback_error_propagates_and_retires_cookie() {
    let (host, client, _library) = setup();
    let cb = HostFunction::new("throws", |_| Err(BridgeError::Host("user code threw".into())));
    client.get(["x"], &cb, None).unwrap();

    assert!(matches!(client.wait(), Err(BridgeError::Host(_))));
    assert_eq!(client.pending_calls(), 0);
    assert_eq!(host.live_handles(), 0);
}
