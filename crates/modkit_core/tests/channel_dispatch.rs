use modkit_core::{
    Core, CoreError, DispatchPolicy, ErrorReporter, Module, ModuleError, ModuleInstance, Options,
    RuntimeConfig, Sandbox, StartOptions,
};
use serde_json::{json, Value};
use std::cell::RefCell;
use std::rc::Rc;

#[derive(Default)]
struct Recorder {
    reported: RefCell<Vec<String>>,
}

impl ErrorReporter for Recorder {
    fn report(&self, operation: &'static str, error: &CoreError) {
        self.reported
            .borrow_mut()
            .push(format!("{operation}: {error}"));
    }
}

/// Subscribes to `topic` during init and records every payload it sees.
struct Listener {
    sandbox: Sandbox,
    inbox: Rc<RefCell<Vec<String>>>,
}

impl Module for Listener {
    fn init(&mut self, options: &mut Options) -> Result<(), ModuleError> {
        let topic = options
            .get("topic")
            .and_then(Value::as_str)
            .ok_or_else(|| ModuleError::new("missing topic"))?
            .to_string();
        let inbox = Rc::clone(&self.inbox);
        let me = self.sandbox.instance_id().to_string();
        self.sandbox.subscribe(&topic, move |args: &[Value]| {
            inbox
                .borrow_mut()
                .push(format!("{me}:{}", Value::from(args.to_vec())));
            Ok(())
        });
        Ok(())
    }

    fn destroy(&mut self) -> Result<(), ModuleError> {
        Ok(())
    }
}

fn register_listener(core: &Core, inbox: &Rc<RefCell<Vec<String>>>) {
    let inbox = Rc::clone(inbox);
    assert!(core.register(
        "listener",
        move |sandbox: Sandbox| -> Result<ModuleInstance, ModuleError> {
            Ok(ModuleInstance::sync(Listener {
                sandbox,
                inbox: Rc::clone(&inbox),
            }))
        },
        modkit_core::options_from_value(json!({ "topic": "news" })),
    ));
}

#[test]
fn publish_without_subscribers_invokes_nothing() {
    let core = Core::new();
    assert!(!core.publish("news", &[json!("hello")]));
    assert_eq!(core.subscriber_count("news"), 0);
}

#[test]
fn instances_receive_in_start_order_with_identical_args() {
    let core = Core::new();
    let inbox = Rc::new(RefCell::new(Vec::new()));
    register_listener(&core, &inbox);

    assert!(core.start("listener", StartOptions::new().instance_id("first")));
    assert!(core.start("listener", StartOptions::new().instance_id("second")));
    assert_eq!(core.subscriber_count("news"), 2);

    assert!(core.publish("news", &[json!("a"), json!(2)]));
    assert_eq!(
        *inbox.borrow(),
        vec![r#"first:["a",2]"#.to_string(), r#"second:["a",2]"#.to_string()]
    );
}

#[test]
fn stop_removes_instance_subscriptions() {
    let core = Core::new();
    let inbox = Rc::new(RefCell::new(Vec::new()));
    register_listener(&core, &inbox);

    assert!(core.start("listener", StartOptions::new().instance_id("first")));
    assert!(core.start("listener", StartOptions::new().instance_id("second")));
    assert!(core.stop("first"));

    assert!(core.publish("news", &[]));
    assert_eq!(*inbox.borrow(), vec!["second:[]".to_string()]);

    assert!(core.stop("second"));
    assert!(!core.publish("news", &[]));
}

/// Relays `ping` payloads onto `pong` through its sandbox.
struct Relay {
    sandbox: Sandbox,
}

impl Module for Relay {
    fn init(&mut self, _options: &mut Options) -> Result<(), ModuleError> {
        let bus = self.sandbox.clone();
        self.sandbox.subscribe("ping", move |args: &[Value]| {
            bus.publish("pong", args);
            Ok(())
        });
        Ok(())
    }

    fn destroy(&mut self) -> Result<(), ModuleError> {
        Ok(())
    }
}

#[test]
fn instances_talk_only_through_channels() {
    let core = Core::new();
    let inbox = Rc::new(RefCell::new(Vec::new()));
    assert!(core.register(
        "relay",
        |sandbox: Sandbox| -> Result<ModuleInstance, ModuleError> {
            Ok(ModuleInstance::sync(Relay { sandbox }))
        },
        None,
    ));
    assert!(core.start("relay", StartOptions::new()));

    let sink = Rc::clone(&inbox);
    core.mediator()
        .subscribe("pong", "host", move |args: &[Value]| {
            sink.borrow_mut().push(Value::from(args.to_vec()));
            Ok(())
        });

    assert!(core.publish("ping", &[json!({ "n": 1 })]));
    assert_eq!(*inbox.borrow(), vec![json!([{ "n": 1 }])]);
}

#[test]
fn failing_subscriber_is_reported_and_dispatch_continues() {
    let recorder = Rc::new(Recorder::default());
    let core = Core::with_reporter(recorder.clone());
    let inbox = Rc::new(RefCell::new(Vec::new()));

    core.mediator()
        .subscribe("news", "broken", |_args: &[Value]| {
            Err(ModuleError::new("bad payload"))
        });
    register_listener(&core, &inbox);
    assert!(core.start("listener", StartOptions::new()));

    assert!(core.publish("news", &[]));
    assert_eq!(inbox.borrow().len(), 1);
    assert_eq!(
        *recorder.reported.borrow(),
        vec!["channel_publish: module `broken` failed: bad payload".to_string()]
    );
}

#[test]
fn abort_policy_stops_at_first_failure() {
    let recorder = Rc::new(Recorder::default());
    let config = RuntimeConfig {
        dispatch_policy: DispatchPolicy::Abort,
        ..RuntimeConfig::default()
    };
    let core = Core::with_parts(config, recorder.clone()).expect("valid config");
    let inbox = Rc::new(RefCell::new(Vec::new()));

    core.mediator()
        .subscribe("news", "broken", |_args: &[Value]| {
            Err(ModuleError::new("bad payload"))
        });
    register_listener(&core, &inbox);
    assert!(core.start("listener", StartOptions::new()));

    assert!(core.publish("news", &[]));
    assert!(inbox.borrow().is_empty());
    assert_eq!(recorder.reported.borrow().len(), 1);
}

/// Stops itself when told to, from inside its own subscriber.
struct SelfStopping {
    sandbox: Sandbox,
}

impl Module for SelfStopping {
    fn init(&mut self, _options: &mut Options) -> Result<(), ModuleError> {
        let sandbox = self.sandbox.clone();
        self.sandbox.subscribe("shutdown", move |_args: &[Value]| {
            let core = sandbox
                .core()
                .ok_or_else(|| ModuleError::new("core dropped"))?;
            core.stop(sandbox.instance_id());
            Ok(())
        });
        Ok(())
    }

    fn destroy(&mut self) -> Result<(), ModuleError> {
        Ok(())
    }
}

#[test]
fn instance_can_stop_itself_from_a_subscriber() {
    let core = Core::new();
    assert!(core.register(
        "self-stopping",
        |sandbox: Sandbox| -> Result<ModuleInstance, ModuleError> {
            Ok(ModuleInstance::sync(SelfStopping { sandbox }))
        },
        None,
    ));
    assert!(core.start("self-stopping", StartOptions::new()));

    assert!(core.publish("shutdown", &[]));
    assert_eq!(core.is_running("self-stopping"), None);
    assert_eq!(core.subscriber_count("shutdown"), 0);
}

/// Subscribes to `news`, then fails its first `init`.
struct FailsOnce {
    sandbox: Sandbox,
    attempts: Rc<RefCell<u32>>,
    hits: Rc<RefCell<u32>>,
}

impl Module for FailsOnce {
    fn init(&mut self, _options: &mut Options) -> Result<(), ModuleError> {
        let hits = Rc::clone(&self.hits);
        self.sandbox.subscribe("news", move |_args: &[Value]| {
            *hits.borrow_mut() += 1;
            Ok(())
        });
        *self.attempts.borrow_mut() += 1;
        if *self.attempts.borrow() == 1 {
            return Err(ModuleError::new("warming up"));
        }
        Ok(())
    }

    fn destroy(&mut self) -> Result<(), ModuleError> {
        Ok(())
    }
}

#[test]
fn failed_init_drops_its_subscriptions() {
    let core = Core::new();
    let attempts = Rc::new(RefCell::new(0));
    let hits = Rc::new(RefCell::new(0));
    let (attempt_count, hit_count) = (Rc::clone(&attempts), Rc::clone(&hits));
    assert!(core.register(
        "fails-once",
        move |sandbox: Sandbox| -> Result<ModuleInstance, ModuleError> {
            Ok(ModuleInstance::sync(FailsOnce {
                sandbox,
                attempts: Rc::clone(&attempt_count),
                hits: Rc::clone(&hit_count),
            }))
        },
        None,
    ));

    assert!(!core.start("fails-once", StartOptions::new()));
    assert_eq!(core.is_running("fails-once"), Some(false));
    assert_eq!(core.subscriber_count("news"), 0);
    assert!(!core.publish("news", &[]));
    assert_eq!(*hits.borrow(), 0);

    assert!(core.start("fails-once", StartOptions::new()));
    assert_eq!(core.subscriber_count("news"), 1);
    assert!(core.publish("news", &[]));
    assert_eq!(*hits.borrow(), 1);
}
