//! Integration Tests for Reactive System
//!
//! These tests verify that observable state, computations and the scheduler
//! work together correctly.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use weft_core::reactive::{Array, Runtime, Scope, Value, WatchOptions};
use weft_core::{RecordingReporter, RuntimeConfig, Warning};

fn json(value: serde_json::Value) -> Value {
    Value::from_json(value)
}

fn counter() -> (Rc<Cell<usize>>, Rc<Cell<usize>>) {
    let count = Rc::new(Cell::new(0));
    (count.clone(), count)
}

fn number(scope: &Scope, key: &str) -> f64 {
    scope.data().get(key).and_then(|v| v.as_f64()).unwrap_or(0.0)
}

/// Test that a render job re-runs after a property it read changes.
#[test]
fn render_tracks_property_reads() {
    let runtime = Runtime::default();
    let scope = runtime.scope(json(serde_json::json!({ "count": 1 })));
    let seen = Rc::new(Cell::new(0.0));

    let sink = seen.clone();
    scope
        .mount(move |scope| {
            sink.set(number(scope, "count"));
            Ok(Value::Null)
        })
        .unwrap();
    assert_eq!(seen.get(), 1.0);

    scope.data().insert("count", 7);

    // Nothing runs until the tick
    assert_eq!(seen.get(), 1.0);
    runtime.drain_ticks();
    assert_eq!(seen.get(), 7.0);
}

/// Test that a branch no longer taken stops triggering re-runs.
#[test]
fn switching_branches_drops_stale_dependencies() {
    let runtime = Runtime::default();
    let scope = runtime.scope(json(serde_json::json!({ "flag": true, "a": 1, "b": 2 })));
    let (runs, count) = counter();

    scope
        .mount(move |scope| {
            count.set(count.get() + 1);
            let data = scope.data();
            let flag = data.get("flag").and_then(|v| v.as_bool()).unwrap_or(false);
            Ok(data.get(if flag { "a" } else { "b" }).unwrap_or_default())
        })
        .unwrap();

    let data = scope.data();
    data.insert("flag", false);
    runtime.drain_ticks();
    assert_eq!(runs.get(), 2);

    // `a` is no longer read
    data.insert("a", 100);
    runtime.drain_ticks();
    assert_eq!(runs.get(), 2);

    data.insert("b", 100);
    runtime.drain_ticks();
    assert_eq!(runs.get(), 3);
}

/// Test that any number of mutations in one batch cause a single run.
#[test]
fn one_run_per_batch() {
    let runtime = Runtime::default();
    let scope = runtime.scope(json(serde_json::json!({ "a": 1, "b": 2, "c": 3 })));
    let (runs, count) = counter();

    scope
        .mount(move |scope| {
            count.set(count.get() + 1);
            Ok(Value::from(
                number(scope, "a") + number(scope, "b") + number(scope, "c"),
            ))
        })
        .unwrap();

    let data = scope.data();
    data.insert("a", 10);
    data.insert("b", 20);
    data.insert("c", 30);
    runtime.drain_ticks();

    assert_eq!(runs.get(), 2);
}

/// Test that writing the current value does not notify, including NaN.
#[test]
fn writing_the_same_value_is_a_no_op() {
    let runtime = Runtime::default();
    let scope = runtime.scope(json(serde_json::json!({ "a": 1, "n": null })));
    scope.data().insert("n", f64::NAN);
    let (runs, count) = counter();

    scope
        .mount(move |scope| {
            count.set(count.get() + 1);
            let data = scope.data();
            data.get("a");
            data.get("n");
            Ok(Value::Null)
        })
        .unwrap();

    let data = scope.data();
    data.insert("a", 1);
    data.insert("n", f64::NAN);

    assert!(!runtime.has_pending_ticks());
    runtime.drain_ticks();
    assert_eq!(runs.get(), 1);
}

/// Test that the earlier-created watcher runs first, regardless of which
/// was notified first.
#[test]
fn watchers_run_in_creation_order() {
    let runtime = Runtime::default();
    let scope = runtime.scope(json(serde_json::json!({ "x": 0, "y": 0 })));
    let order = Rc::new(RefCell::new(Vec::new()));

    let log = order.clone();
    scope
        .watch(
            "x",
            move |_, _| {
                log.borrow_mut().push("A");
                Ok(())
            },
            WatchOptions::default(),
        )
        .unwrap();
    let log = order.clone();
    scope
        .watch(
            "y",
            move |_, _| {
                log.borrow_mut().push("B");
                Ok(())
            },
            WatchOptions::default(),
        )
        .unwrap();

    let data = scope.data();
    data.insert("y", 1);
    data.insert("x", 1);
    runtime.drain_ticks();

    assert_eq!(*order.borrow(), vec!["A", "B"]);
}

/// Test that a deep watcher sees mutations far below the watched value.
#[test]
fn deep_watch_sees_nested_mutation() {
    let runtime = Runtime::default();
    let scope = runtime.scope(json(serde_json::json!({ "list": [{ "n": 1 }] })));
    let (fired, count) = counter();

    scope
        .watch(
            "list",
            move |_, _| {
                count.set(count.get() + 1);
                Ok(())
            },
            WatchOptions {
                deep: true,
                ..Default::default()
            },
        )
        .unwrap();

    let list = scope.data().peek("list").unwrap();
    let item = list.as_array().unwrap().get(0).unwrap();
    item.as_object().unwrap().insert("n", 2);
    runtime.drain_ticks();

    assert_eq!(fired.get(), 1);
}

/// Test that a shallow watcher ignores the same nested mutation.
#[test]
fn shallow_watch_ignores_nested_mutation() {
    let runtime = Runtime::default();
    let scope = runtime.scope(json(serde_json::json!({ "user": { "name": "a" } })));
    let (fired, count) = counter();

    scope
        .watch(
            "user",
            move |_, _| {
                count.set(count.get() + 1);
                Ok(())
            },
            WatchOptions::default(),
        )
        .unwrap();

    let user = scope.data().peek("user").unwrap();
    user.as_object().unwrap().insert("name", "b");
    runtime.drain_ticks();

    assert_eq!(fired.get(), 0);
}

/// Test that array mutators notify once and observe what they insert.
#[test]
fn array_push_notifies_and_observes() {
    let runtime = Runtime::default();
    let scope = runtime.scope(json(serde_json::json!({ "items": [] })));
    let (fired, count) = counter();

    scope
        .watch(
            "items",
            move |_, _| {
                count.set(count.get() + 1);
                Ok(())
            },
            WatchOptions {
                sync: true,
                ..Default::default()
            },
        )
        .unwrap();

    let items = scope.data().peek("items").unwrap();
    let items = items.as_array().unwrap();
    items.push(json(serde_json::json!({ "k": 1 })));

    assert_eq!(fired.get(), 1);
    let pushed = items.get(0).unwrap();
    assert!(pushed.observer().is_some());
    assert!(pushed.as_object().unwrap().is_reactive("k"));
}

fn watch_sync(scope: &Scope, path: &str) -> Rc<Cell<usize>> {
    let (fired, count) = counter();
    scope
        .watch(
            path,
            move |_, _| {
                count.set(count.get() + 1);
                Ok(())
            },
            WatchOptions {
                sync: true,
                ..Default::default()
            },
        )
        .unwrap();
    fired
}

/// Test that each of the seven mutators notifies an observed array once.
#[test]
fn every_array_mutator_notifies_once() {
    let cases: [(&str, fn(&Array)); 7] = [
        ("push", |items: &Array| {
            items.push(4);
        }),
        ("pop", |items: &Array| {
            items.pop();
        }),
        ("shift", |items: &Array| {
            items.shift();
        }),
        ("unshift", |items: &Array| {
            items.unshift(0);
        }),
        ("splice", |items: &Array| {
            items.splice(1, 1, vec![Value::from(9)]);
        }),
        ("sort", |items: &Array| items.sort()),
        ("reverse", |items: &Array| items.reverse()),
    ];

    for (name, mutate) in cases {
        let runtime = Runtime::default();
        let scope = runtime.scope(json(serde_json::json!({ "items": [3, 1, 2] })));
        let fired = watch_sync(&scope, "items");

        let items = scope.data().peek("items").unwrap();
        mutate(items.as_array().unwrap());

        assert_eq!(fired.get(), 1, "{name} should notify once");
    }
}

/// Test that unshift and splice observe the elements they insert.
#[test]
fn inserting_mutators_observe_new_elements() {
    let runtime = Runtime::default();
    let scope = runtime.scope(json(serde_json::json!({ "items": [1] })));
    let items = scope.data().peek("items").unwrap();
    let items = items.as_array().unwrap();

    items.unshift(json(serde_json::json!({ "a": 1 })));
    items.splice(
        1,
        0,
        vec![json(serde_json::json!({ "b": 2 })), json(serde_json::json!([3]))],
    );

    let front = items.get(0).unwrap();
    assert!(front.observer().is_some());
    assert!(front.as_object().unwrap().is_reactive("a"));

    let spliced = items.get(1).unwrap();
    assert!(spliced.observer().is_some());
    assert!(spliced.as_object().unwrap().is_reactive("b"));
    assert!(items.get(2).unwrap().observer().is_some());
    assert_eq!(items.len(), 4);
}

/// Test that deleting an array entry through the runtime notifies readers.
#[test]
fn runtime_delete_on_array_notifies() {
    let runtime = Runtime::default();
    let scope = runtime.scope(json(serde_json::json!({ "items": [1, 2, 3] })));
    let fired = watch_sync(&scope, "items");

    let items = scope.data().peek("items").unwrap();
    runtime.delete(&items, 1usize);

    assert_eq!(fired.get(), 1);
    assert_eq!(
        items.as_array().unwrap().to_vec(),
        vec![Value::from(1), Value::from(3)]
    );
}

/// Test that index reads do not track, but the owning property does.
#[test]
fn array_reorder_reaches_render() {
    let runtime = Runtime::default();
    let scope = runtime.scope(json(serde_json::json!({ "items": [3, 1, 2] })));
    let first = Rc::new(Cell::new(0.0));

    let sink = first.clone();
    scope
        .mount(move |scope| {
            let items = scope.data().get("items").unwrap_or_default();
            let head = items.as_array().and_then(|a| a.get(0));
            sink.set(head.and_then(|v| v.as_f64()).unwrap_or(0.0));
            Ok(Value::Null)
        })
        .unwrap();
    assert_eq!(first.get(), 3.0);

    let items = scope.data().peek("items").unwrap();
    items.as_array().unwrap().sort();
    runtime.drain_ticks();
    assert_eq!(first.get(), 1.0);

    items.as_array().unwrap().reverse();
    runtime.drain_ticks();
    assert_eq!(first.get(), 3.0);
}

/// Test that a computed value recomputes only when read after a change.
#[test]
fn computed_values_are_lazy_and_cached() {
    let runtime = Runtime::default();
    let scope = runtime.scope(json(serde_json::json!({ "n": 1 })));
    let (evaluations, count) = counter();

    let doubled = scope
        .computed(move |scope| {
            count.set(count.get() + 1);
            Ok(Value::from(number(scope, "n") * 2.0))
        })
        .unwrap();
    assert_eq!(evaluations.get(), 0);

    assert_eq!(doubled.get().unwrap(), Value::from(2));
    assert_eq!(doubled.get().unwrap(), Value::from(2));
    assert_eq!(evaluations.get(), 1);

    scope.data().insert("n", 3);
    assert_eq!(evaluations.get(), 1);
    assert_eq!(doubled.get().unwrap(), Value::from(6));
    assert_eq!(evaluations.get(), 2);
}

/// Test that the loop guard stops a self-triggering watcher and that the
/// scheduler keeps working afterwards.
#[test]
fn loop_guard_aborts_runaway_flush() {
    let runtime = Runtime::new(RuntimeConfig {
        debug: true,
        ..RuntimeConfig::default()
    });
    let reporter = RecordingReporter::new();
    runtime.set_reporter(reporter.clone());
    let scope = runtime.scope(json(serde_json::json!({ "count": 0, "other": 0 })));
    let (calls, count) = counter();

    let writer = scope.data();
    scope
        .watch(
            "count",
            move |new, _| {
                count.set(count.get() + 1);
                writer.insert("count", new.as_f64().unwrap_or(0.0) + 1.0);
                Ok(())
            },
            WatchOptions::default(),
        )
        .unwrap();

    scope.data().insert("count", 1);
    runtime.drain_ticks();

    assert_eq!(calls.get(), 101);
    assert!(matches!(
        reporter.warnings().as_slice(),
        [Warning::InfiniteUpdateLoop { .. }]
    ));

    // A later, well-behaved flush still runs
    let (other_calls, other_count) = counter();
    scope
        .watch(
            "other",
            move |_, _| {
                other_count.set(other_count.get() + 1);
                Ok(())
            },
            WatchOptions::default(),
        )
        .unwrap();
    scope.data().insert("other", 1);
    runtime.drain_ticks();
    assert_eq!(other_calls.get(), 1);
}

/// Test that adding a key with `set` is reactive while a plain insert is
/// not.
#[test]
fn set_adds_reactive_keys() {
    let runtime = Runtime::default();
    let scope = runtime.scope(json(serde_json::json!({ "user": {} })));
    let (fired, count) = counter();

    scope
        .watch_fn(
            |scope| {
                let user = scope.data().get("user").unwrap_or_default();
                Ok(user
                    .as_object()
                    .and_then(|u| u.get("name"))
                    .unwrap_or_default())
            },
            move |_, _| {
                count.set(count.get() + 1);
                Ok(())
            },
            WatchOptions::default(),
        )
        .unwrap();

    let user = scope.data().peek("user").unwrap();
    runtime.set(&user, "name", "ada");
    runtime.drain_ticks();
    assert_eq!(fired.get(), 1);

    // Now reactive, so plain assignment notifies too
    user.as_object().unwrap().insert("name", "grace");
    runtime.drain_ticks();
    assert_eq!(fired.get(), 2);

    runtime.delete(&user, "name");
    runtime.drain_ticks();
    assert_eq!(fired.get(), 3);
}

/// Test that root state refuses new keys at runtime.
#[test]
fn root_state_is_protected() {
    let runtime = Runtime::new(RuntimeConfig {
        debug: true,
        ..RuntimeConfig::default()
    });
    let reporter = RecordingReporter::new();
    runtime.set_reporter(reporter.clone());
    let scope = runtime.scope(json(serde_json::json!({ "a": 1 })));

    let root = Value::from(scope.data());
    runtime.set(&root, "b", 2);
    runtime.delete(&root, "a");

    assert!(!scope.data().contains_key("b"));
    assert!(scope.data().contains_key("a"));
    assert_eq!(
        reporter.warnings(),
        vec![
            Warning::RootStateMutation { key: "b".into() },
            Warning::RootStateMutation { key: "a".into() },
        ]
    );
}

/// Test that disposing a scope stops all of its work.
#[test]
fn disposed_scope_never_runs_again() {
    let runtime = Runtime::default();
    let scope = runtime.scope(json(serde_json::json!({ "a": 1 })));
    let (runs, count) = counter();

    scope
        .mount(move |scope| {
            count.set(count.get() + 1);
            Ok(scope.data().get("a").unwrap_or_default())
        })
        .unwrap();

    // Queued before disposal
    scope.data().insert("a", 2);
    scope.dispose();
    runtime.drain_ticks();

    assert_eq!(runs.get(), 1);
    assert!(scope.is_destroyed());
}

/// Test that a scope's watcher runs before its render job in the same
/// flush.
#[test]
fn watcher_runs_before_render() {
    let runtime = Runtime::default();
    let scope = runtime.scope(json(serde_json::json!({ "a": 1, "label": "" })));
    let rendered = Rc::new(RefCell::new(String::new()));

    let writer = scope.data();
    scope
        .watch(
            "a",
            move |new, _| {
                writer.insert("label", format!("a={}", new.as_f64().unwrap_or(0.0)));
                Ok(())
            },
            WatchOptions::default(),
        )
        .unwrap();

    let sink = rendered.clone();
    let (renders, count) = counter();
    scope
        .mount(move |scope| {
            count.set(count.get() + 1);
            let label = scope.data().get("label").unwrap_or_default();
            *sink.borrow_mut() = label.as_str().unwrap_or_default().to_string();
            Ok(Value::Null)
        })
        .unwrap();

    scope.data().insert("a", 2);
    runtime.drain_ticks();

    assert_eq!(*rendered.borrow(), "a=2");
    assert_eq!(renders.get(), 2);
}

/// Test that the sync flush mode runs updates without a tick.
#[test]
fn sync_mode_flushes_immediately() {
    let runtime = Runtime::new(RuntimeConfig::from_json(r#"{ "flush": "sync" }"#).unwrap());
    let scope = runtime.scope(json(serde_json::json!({ "a": 1 })));
    let (runs, count) = counter();

    scope
        .mount(move |scope| {
            count.set(count.get() + 1);
            Ok(scope.data().get("a").unwrap_or_default())
        })
        .unwrap();

    scope.data().insert("a", 2);
    assert_eq!(runs.get(), 2);
    assert!(!runtime.has_pending_ticks());
}

/// Test that the async tick drives deferred work under tokio.
#[tokio::test]
async fn async_tick_flushes() {
    let runtime = Runtime::default();
    let scope = runtime.scope(json(serde_json::json!({ "a": 1 })));
    let seen = Rc::new(Cell::new(0.0));

    let sink = seen.clone();
    scope
        .mount(move |scope| {
            sink.set(number(scope, "a"));
            Ok(Value::Null)
        })
        .unwrap();

    scope.data().insert("a", 5);
    runtime.tick().await;
    assert_eq!(seen.get(), 5.0);

    // Work queued from `next_tick` runs after the flush it follows
    let order = Rc::new(RefCell::new(Vec::new()));
    let log = order.clone();
    let reader = scope.data();
    scope.data().insert("a", 6);
    runtime.next_tick(move || log.borrow_mut().push(reader.peek("a")));
    runtime.tick().await;
    assert_eq!(*order.borrow(), vec![Some(Value::from(6))]);
    assert_eq!(seen.get(), 6.0);
}
