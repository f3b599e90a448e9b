//! Integration Tests for the Reactive Engine and Reconciler
//!
//! These tests verify that observed data, effects, computeds, the job
//! scheduler and the renderer work together correctly.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use tessera_core::config::DiffStrategy;
use tessera_core::reactive::{
    computed, effect, effect_with, has_subscriber, reactive, readonly, subscriber_count, watch,
    DepKey, EffectOptions, Object, Value, WatchOptions,
};
use tessera_core::render::{
    dispatch_in, render_effect, HostOp, MemoryHost, MemoryNode, PropValue, Renderer, VNode,
};
use tessera_core::scheduler::{flush_jobs, has_pending_jobs};

fn counter() -> (Rc<Cell<usize>>, impl Fn()) {
    let count = Rc::new(Cell::new(0));
    let bump = {
        let count = count.clone();
        move || count.set(count.get() + 1)
    };
    (count, bump)
}

/// Test that an effect subscribes exactly to the keys its last run read.
#[test]
fn effect_subscriptions_follow_last_run() {
    let state = reactive(Object::from_fields([
        ("ok", Value::from(true)),
        ("text", Value::from("hello")),
    ]));

    let s = state.clone();
    let e = effect(move || {
        if s.get("ok").is_truthy() {
            s.get("text");
        }
    });

    let text = DepKey::Field("text".into());
    assert!(has_subscriber(state.id(), &text, e.id()));

    // Flip the branch; `text` is no longer read
    state.set("ok", false);
    assert!(!has_subscriber(state.id(), &text, e.id()));
    assert_eq!(subscriber_count(state.id(), &text), 0);
}

/// Test that a write to a key the effect stopped reading does not re-run it.
#[test]
fn no_spurious_branch_triggering() {
    let state = reactive(Object::from_fields([
        ("ok", Value::from(true)),
        ("text", Value::from("hello")),
    ]));
    let shown = Rc::new(RefCell::new(String::new()));

    let (s, out) = (state.clone(), shown.clone());
    let e = effect(move || {
        let text = if s.get("ok").is_truthy() {
            s.get("text").as_str().unwrap_or_default().to_string()
        } else {
            "fallback".to_string()
        };
        *out.borrow_mut() = text;
    });
    assert_eq!(*shown.borrow(), "hello");

    state.set("ok", false);
    assert_eq!(*shown.borrow(), "fallback");
    let runs = e.run_count();

    state.set("text", "ignored");
    assert_eq!(e.run_count(), runs);
}

/// Test that an effect incrementing its own input runs once per outside write.
#[test]
fn self_writes_do_not_recurse() {
    let state = reactive(Object::from_fields([("n", Value::from(0))]));

    let s = state.clone();
    let e = effect(move || {
        let n = s.get("n").as_f64().unwrap_or_default();
        s.set("n", n + 1.0);
    });

    assert_eq!(e.run_count(), 1);
    assert_eq!(state.get("n"), Value::from(1));

    state.set("n", 10);
    assert_eq!(e.run_count(), 2);
    assert_eq!(state.get("n"), Value::from(11));
}

/// Test that computeds are lazy, cached, and propagate to effects.
#[test]
fn computed_is_lazy_and_cached() {
    let state = reactive(Object::from_fields([("n", Value::from(2))]));
    let (computes, bump) = counter();

    let s = state.clone();
    let squared = computed(move || {
        bump();
        let n = s.get("n").as_f64().unwrap_or_default();
        n * n
    });
    assert_eq!(computes.get(), 0);

    assert_eq!(squared.get(), 4.0);
    assert_eq!(squared.get(), 4.0);
    assert_eq!(computes.get(), 1);

    // Invalidated, not recomputed
    state.set("n", 3);
    assert_eq!(computes.get(), 1);
    assert!(squared.is_dirty());

    let seen = Rc::new(Cell::new(0.0));
    let (sq, out) = (squared.clone(), seen.clone());
    let _e = effect(move || out.set(sq.get()));
    assert_eq!(seen.get(), 9.0);

    state.set("n", 4);
    assert_eq!(seen.get(), 16.0);
    assert_eq!(computes.get(), 3);
}

/// Test that queued effects collapse repeated triggers into one run that
/// sees the final state.
#[test]
fn scheduler_batches_triggers() {
    let state = reactive(Object::from_fields([("n", Value::from(0))]));
    let seen = Rc::new(RefCell::new(Vec::new()));

    let (s, out) = (state.clone(), seen.clone());
    let e = effect_with(
        move || out.borrow_mut().push(s.get("n")),
        EffectOptions::default().queued(),
    );
    assert_eq!(e.run_count(), 1);

    for n in 1..=5 {
        state.set("n", n);
    }
    assert_eq!(e.run_count(), 1);
    assert!(has_pending_jobs());

    assert_eq!(flush_jobs(), 1);
    assert_eq!(e.run_count(), 2);
    assert_eq!(*seen.borrow(), vec![Value::from(0), Value::from(5)]);
    assert!(!has_pending_jobs());
}

/// Test that effects run in a fixed order: subscribers of the written key
/// in subscription order, then iteration readers.
#[test]
fn trigger_order_is_deterministic() {
    let state = reactive(Object::from_fields([("y", Value::from(0))]));
    let log: Rc<RefCell<Vec<&'static str>>> = Rc::default();

    let (s, l) = (state.clone(), log.clone());
    let _keys = effect(move || {
        s.own_keys();
        l.borrow_mut().push("keys");
    });
    let (s, l) = (state.clone(), log.clone());
    let _first = effect(move || {
        s.get("x");
        l.borrow_mut().push("first");
    });
    let (s, l) = (state.clone(), log.clone());
    let _second = effect(move || {
        s.get("x");
        l.borrow_mut().push("second");
    });
    log.borrow_mut().clear();

    // ADD: key subscribers first, iteration after
    state.set("x", 1);
    assert_eq!(*log.borrow(), vec!["first", "second", "keys"]);
    log.borrow_mut().clear();

    // SET: iteration readers are untouched
    state.set("x", 2);
    assert_eq!(*log.borrow(), vec!["first", "second"]);
}

/// Test index and length writes at the edges of an array.
#[test]
fn array_index_and_length_boundaries() {
    let list = reactive(Object::array([1, 2, 3]));
    let (length_runs, bump_length) = counter();
    let (last_runs, bump_last) = counter();

    let l = list.clone();
    let _length = effect(move || {
        bump_length();
        l.len().unwrap_or_default();
    });
    let l = list.clone();
    let _last = effect(move || {
        bump_last();
        l.get(2);
    });

    // Shrinking notifies the removed index and length readers
    assert!(list.set("length", 1));
    assert_eq!((length_runs.get(), last_runs.get()), (2, 2));
    assert_eq!(list.get(2), Value::Undefined);

    // Writing past the end is an ADD that grows the array
    assert!(list.set(4, 5));
    assert_eq!(list.len().unwrap(), 5);
    assert_eq!(length_runs.get(), 3);
    assert_eq!(list.get(3), Value::Undefined);

    // Out-of-range writes are refused without touching anything
    assert!(!list.set(usize::MAX, 1));
    assert!(!list.set("length", 1e20));
    assert_eq!(list.len().unwrap(), 5);
    assert_eq!((length_runs.get(), last_runs.get()), (3, 2));
}

/// Test that adding a key re-runs iteration, but replacing a value does not.
#[test]
fn add_and_set_are_distinguished() {
    let state = reactive(Object::from_fields([("a", Value::from(1))]));
    let (iterations, bump) = counter();

    let s = state.clone();
    let _e = effect(move || {
        bump();
        s.own_keys();
    });
    assert_eq!(iterations.get(), 1);

    state.set("a", 2);
    assert_eq!(iterations.get(), 1);

    state.set("b", 1);
    assert_eq!(iterations.get(), 2);

    state.delete("b");
    assert_eq!(iterations.get(), 3);
}

/// Test that array pushes notify length readers and map writes notify
/// iteration.
#[test]
fn arrays_and_maps_notify_shape_readers() {
    let list = reactive(Object::array([1, 2]));
    let totals = Rc::new(Cell::new(0.0));

    let (l, out) = (list.clone(), totals.clone());
    let _sum = effect(move || {
        let values = l.to_vec().unwrap_or_default();
        out.set(values.iter().filter_map(Value::as_f64).sum());
    });
    assert_eq!(totals.get(), 3.0);

    list.push([3]).unwrap();
    assert_eq!(totals.get(), 6.0);

    let map = reactive(Object::map([("x", 1)]));
    let (sizes, bump) = counter();
    let m = map.clone();
    let _size = effect(move || {
        bump();
        m.size().unwrap_or_default();
    });

    map.set_entry("y", 2).unwrap();
    assert_eq!(sizes.get(), 2);
    map.clear().unwrap();
    assert_eq!(sizes.get(), 3);
}

/// Test that read-only views reject writes and never trigger.
#[test]
fn readonly_views_reject_writes() {
    let source = Object::from_fields([("n", Value::from(1))]);
    let writable = reactive(source.clone());
    let view = readonly(source);
    let (runs, bump) = counter();

    let w = writable.clone();
    let _e = effect(move || {
        bump();
        w.get("n");
    });

    assert!(view.set("n", 5));
    assert_eq!(view.get("n"), Value::from(1));
    assert_eq!(runs.get(), 1);

    writable.set("n", 2);
    assert_eq!(view.get("n"), Value::from(2));
    assert_eq!(runs.get(), 2);
}

/// Test that invalidation marks superseded work as stale.
#[test]
fn watch_invalidation_marks_previous_run_stale() {
    let state = reactive(Object::from_fields([("query", Value::from("a"))]));
    let stale_flags: Rc<RefCell<Vec<Rc<Cell<bool>>>>> = Rc::default();

    let s = state.clone();
    let flags = stale_flags.clone();
    let _w = watch(
        move || s.get("query"),
        move |_, _, on_invalidate| {
            let stale = Rc::new(Cell::new(false));
            let mark = stale.clone();
            on_invalidate.register(move || mark.set(true));
            flags.borrow_mut().push(stale);
        },
        WatchOptions::default(),
    );

    state.set("query", "ab");
    state.set("query", "abc");

    let flags = stale_flags.borrow();
    assert_eq!(flags.len(), 2);
    assert!(flags[0].get());
    assert!(!flags[1].get());
}

fn keyed(keys: &[i32]) -> VNode<MemoryNode> {
    VNode::element("ol").with_children(
        keys.iter()
            .map(|key| VNode::element("li").with_key(*key).with_text(&key.to_string()))
            .collect(),
    )
}

fn mounted(strategy: DiffStrategy, keys: &[i32]) -> (Renderer<MemoryHost>, MemoryNode) {
    let mut renderer = Renderer::new(MemoryHost::new());
    renderer.set_strategy(strategy);
    let root = renderer.host_mut().create_root();
    renderer.render(Some(keyed(keys)), &root).unwrap();
    renderer.host_mut().clear_ops();
    (renderer, root)
}

/// Test that the fast diff moves only the node outside the stable run.
#[test]
fn fast_diff_uses_minimal_moves() {
    let (mut renderer, root) = mounted(DiffStrategy::Fast, &[1, 2, 3, 4, 5]);
    let ol = renderer.host().children(&root)[0];
    let two = renderer.host().children(&ol)[1];

    renderer.render(Some(keyed(&[1, 3, 4, 2, 5])), &root).unwrap();
    let ops = renderer.host_mut().take_ops();

    let moves: Vec<_> = ops
        .iter()
        .filter_map(|op| match op {
            HostOp::Move { node, .. } => Some(*node),
            _ => None,
        })
        .collect();
    assert_eq!(moves, vec![two]);
    assert!(!ops
        .iter()
        .any(|op| matches!(op, HostOp::Insert { .. } | HostOp::Remove { .. })));
}

/// Test that the double-ended diff rotates without remounting.
#[test]
fn double_ended_diff_keeps_nodes() {
    let (mut renderer, root) = mounted(DiffStrategy::DoubleEnded, &[1, 2, 3]);
    let ol = renderer.host().children(&root)[0];
    let before = renderer.host().children(&ol);

    renderer.render(Some(keyed(&[3, 1, 2])), &root).unwrap();
    let ops = renderer.host_mut().take_ops();

    assert!(!ops.iter().any(|op| matches!(
        op,
        HostOp::CreateElement { .. } | HostOp::Insert { .. } | HostOp::Remove { .. }
    )));
    assert_eq!(renderer.host().children(&ol), vec![before[2], before[0], before[1]]);
}

/// Test that re-rendering an identical tree performs no host mutation.
#[test]
fn identical_render_is_a_no_op() {
    for strategy in [DiffStrategy::Fast, DiffStrategy::DoubleEnded] {
        let (mut renderer, root) = mounted(strategy, &[1, 2, 3, 4]);
        renderer.render(Some(keyed(&[1, 2, 3, 4])), &root).unwrap();
        assert!(renderer.host().ops().is_empty(), "{strategy:?}");
    }
}

/// Test a full loop: state drives the view, events drive the state.
#[test]
fn events_update_state_and_rerender() {
    let state = reactive(Object::from_fields([("clicks", Value::from(0))]));
    let renderer = Rc::new(RefCell::new(Renderer::new(MemoryHost::new())));
    let root = renderer.borrow_mut().host_mut().create_root();

    let s = state.clone();
    let on_click = PropValue::handler(move |_| {
        let clicks = s.get("clicks").as_f64().unwrap_or_default();
        s.set("clicks", clicks + 1.0);
    });

    let s = state.clone();
    let _view = render_effect(renderer.clone(), root, move || {
        let clicks = s.get("clicks").as_f64().unwrap_or_default();
        VNode::element("button")
            .with_prop("onClick", on_click.clone())
            .with_text(&format!("clicked {clicks}"))
    });

    let button = renderer.borrow().host().children(&root)[0];
    let now = renderer.borrow().host().now();

    assert_eq!(dispatch_in(&renderer, &button, "click", now), 1);
    assert_eq!(dispatch_in(&renderer, &button, "click", now), 1);
    flush_jobs();

    assert_eq!(
        renderer.borrow().host().serialize(&root),
        "<div><button>clicked 2</button></div>"
    );
    assert_eq!(renderer.borrow().host().listener_count(&button, "click"), 1);
}
