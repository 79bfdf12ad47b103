use weft_core::*;

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use weft_testing::{probe, EngineTestRule, ProbeLog, ProbePhase};

fn count_state() -> Record {
    Record::builder().set("count", 1).finish()
}

#[test]
fn test_set_state_with_identical_values_is_a_no_op() {
    let log = ProbeLog::new();
    let alpha = probe("alpha", &log).initial_state(count_state()).build();
    let rule = EngineTestRule::for_children(vec![alpha], Value::object([("a", Value::from(1))]));

    rule.run_cycle().expect("first cycle");
    let instance = rule.root().children()[0].clone();

    instance.set_state(Record::builder().set("count", 1).finish());
    assert!(!rule.store_changed());

    rule.run_cycle().expect("quiet cycle");
    assert_eq!(log.count("alpha", ProbePhase::Render), 1);
}

#[test]
fn test_set_state_fires_one_notification_and_rerenders() {
    let log = ProbeLog::new();
    let alpha = probe("alpha", &log).initial_state(count_state()).build();
    let rule = EngineTestRule::for_children(vec![alpha], Value::object([("a", Value::from(1))]));

    rule.run_cycle().expect("first cycle");
    let instance = rule.root().children()[0].clone();

    let notifications = Rc::new(Cell::new(0u32));
    let seen = Rc::clone(&notifications);
    let _sub = rule.store().subscribe(move || seen.set(seen.get() + 1));

    instance.set_state(Record::builder().set("count", 2).finish());
    assert_eq!(notifications.get(), 1);
    assert!(rule.store_changed());

    rule.run_cycle().expect("dirty cycle");
    assert_eq!(log.count("alpha", ProbePhase::Render), 2);
}

#[test]
fn test_set_state_merges_shallowly() {
    let log = ProbeLog::new();
    let alpha = probe("alpha", &log)
        .initial_state(Record::builder().set("count", 1).set("label", "keep").finish())
        .build();
    let rule = EngineTestRule::for_children(vec![alpha], Value::object([("a", Value::from(1))]));

    rule.run_cycle().expect("first cycle");
    let instance = rule.root().children()[0].clone();
    instance.set_state(Record::builder().set("count", 5).finish());

    let state = instance.state().expect("state present");
    assert_eq!(state.get("count"), Some(&Value::from(5)));
    assert_eq!(state.get("label"), Some(&Value::from("keep")));
}

#[test]
fn test_replace_state_skips_identity_equal_records() {
    let log = ProbeLog::new();
    let alpha = probe("alpha", &log).initial_state(count_state()).build();
    let rule = EngineTestRule::for_children(vec![alpha], Value::object([("a", Value::from(1))]));

    rule.run_cycle().expect("first cycle");
    let instance = rule.root().children()[0].clone();
    let current = instance.state().expect("state present");

    instance.replace_state(current.clone());
    assert!(!rule.store_changed());

    instance.replace_state(Record::builder().set("count", 9).finish());
    assert!(rule.store_changed());
    rule.run_cycle().expect("dirty cycle");
    assert_eq!(log.count("alpha", ProbePhase::Render), 2);
}

#[test]
fn test_deep_state_change_rerenders_memoizing_ancestors() {
    let log = ProbeLog::new();
    let gamma = probe("gamma", &log).initial_state(count_state()).build();
    let beta = probe("beta", &log).child(gamma).build();
    let alpha = probe("alpha", &log).child(beta).build();
    let rule = EngineTestRule::for_children(vec![alpha], Value::object([("a", Value::from(1))]));

    rule.run_cycle().expect("first cycle");
    rule.run_cycle().expect("quiet cycle");
    log.take();

    let deep = rule.root().children()[0].children()[0].children()[0].clone();
    deep.set_state(Record::builder().set("count", 2).finish());
    rule.run_cycle().expect("dirty cycle");

    // the dirty walk reaches every ancestor even though their own data is
    // unchanged
    assert_eq!(log.count("gamma", ProbePhase::Render), 1);
    assert_eq!(log.count("beta", ProbePhase::Render), 1);
    assert_eq!(log.count("alpha", ProbePhase::Render), 1);
}

#[test]
fn test_set_through_a_bound_property_writes_the_store() {
    let field = Widget::builder("field")
        .property("title", PropertySpec::bind("doc.title"))
        .render(|_context, _instance, _key| Ok(RenderResult::empty()))
        .build();
    let rule = EngineTestRule::new(field, Value::object([("doc", Value::object([("title", "old")]))]));

    rule.run_cycle().expect("first cycle");
    assert!(rule.root().set("title", "new"));
    assert_eq!(rule.store().get("doc.title"), Value::from("new"));
}

#[test]
fn test_set_through_an_action_routes_the_reducer() {
    let store = Store::with_reducer(
        Value::object([("title", Value::from("old"))]),
        |root, action| {
            let kind = action.get_path(&Path::parse("type")).cloned();
            if kind == Some(Value::from("rename")) {
                let value = action.get_path(&Path::parse("value")).cloned();
                root.with_path_set(&Path::parse("title"), value.unwrap_or(Value::Null))
                    .unwrap_or_else(|| root.clone())
            } else {
                root.clone()
            }
        },
    );
    let field = Widget::builder("field")
        .property(
            "title",
            PropertySpec::action(|_instance, value| {
                Value::object([("type", Value::from("rename")), ("value", value.clone())])
            }),
        )
        .render(|_context, _instance, _key| Ok(RenderResult::empty()))
        .build();
    let rule = EngineTestRule::with_store(field, store);

    rule.run_cycle().expect("first cycle");
    assert!(rule.root().set("title", "renamed"));
    assert_eq!(rule.store().get("title"), Value::from("renamed"));
}

#[test]
fn test_setter_precedence_prefers_set_over_bind() {
    let handled: Rc<RefCell<Vec<Value>>> = Rc::default();
    let seen = Rc::clone(&handled);
    let mut spec = PropertySpec::handler(move |_instance, value| {
        seen.borrow_mut().push(value.clone());
    });
    spec.bind = Some(Path::parse("title"));
    let field = Widget::builder("field")
        .property("title", spec)
        .render(|_context, _instance, _key| Ok(RenderResult::empty()))
        .build();
    let rule = EngineTestRule::new(field, Value::object([("title", Value::from("old"))]));

    rule.run_cycle().expect("first cycle");
    assert!(rule.root().set("title", "new"));
    assert_eq!(*handled.borrow(), vec![Value::from("new")]);
    // the handler won; the binding never wrote through
    assert_eq!(rule.store().get("title"), Value::from("old"));
}

#[test]
fn test_set_of_an_undeclared_property_reports_false() {
    let log = ProbeLog::new();
    let alpha = probe("alpha", &log).build();
    let rule = EngineTestRule::new(alpha, Value::object([("a", Value::from(1))]));
    rule.run_cycle().expect("cycle");
    assert!(!rule.root().set("nothing", 1));
}

#[test]
fn test_debounced_set_coalesces_and_resets_its_deadline() {
    let field = Widget::builder("field")
        .property("query", PropertySpec::bind("query").debounced(100))
        .render(|_context, _instance, _key| Ok(RenderResult::empty()))
        .build();
    let rule = EngineTestRule::new(field, Value::object([("query", Value::Null)]));

    rule.run_cycle().expect("first cycle");
    assert!(rule.root().set("query", "a"));
    assert!(rule.session().has_pending_timers());
    assert_eq!(rule.store().get("query"), Value::Null);

    rule.advance_time(60).expect("before deadline");
    assert!(rule.root().set("query", "ab"));

    // the second write pushed the deadline to 160
    rule.advance_time(120).expect("still pending");
    assert_eq!(rule.store().get("query"), Value::Null);

    rule.advance_time(160).expect("fires");
    assert_eq!(rule.store().get("query"), Value::from("ab"));
    assert!(!rule.session().has_pending_timers());
}

#[test]
fn test_throttled_set_fires_trailing_edge_with_the_latest_value() {
    let field = Widget::builder("field")
        .property("scroll", PropertySpec::bind("scroll").throttled(100))
        .render(|_context, _instance, _key| Ok(RenderResult::empty()))
        .build();
    let rule = EngineTestRule::new(field, Value::object([("scroll", Value::from(0))]));

    rule.run_cycle().expect("first cycle");
    assert!(rule.root().set("scroll", 10));
    assert_eq!(rule.session().next_timer_due(), Some(100));

    rule.advance_time(50).expect("mid window");
    assert!(rule.root().set("scroll", 20));
    // the window keeps its original end
    assert_eq!(rule.session().next_timer_due(), Some(100));

    rule.advance_time(100).expect("window closes");
    assert_eq!(rule.store().get("scroll"), Value::from(20));

    // the next write opens a fresh window
    assert!(rule.root().set("scroll", 30));
    assert_eq!(rule.session().next_timer_due(), Some(200));
    rule.advance_time(200).expect("second window closes");
    assert_eq!(rule.store().get("scroll"), Value::from(30));
}

#[test]
fn test_pending_deferred_writes_drop_when_the_instance_is_destroyed() {
    let field = Widget::builder("field")
        .visible_path("show")
        .property("query", PropertySpec::bind("query").debounced(100))
        .render(|_context, _instance, _key| Ok(RenderResult::empty()))
        .build();
    let rule = EngineTestRule::for_children(
        vec![field],
        Value::object([("show", Value::Bool(true)), ("query", Value::Null)]),
    );

    rule.run_cycle().expect("first cycle");
    let instance = rule.root().children()[0].clone();
    assert!(instance.set("query", "doomed"));
    assert!(rule.session().has_pending_timers());

    rule.store().set("show", false);
    rule.run_cycle().expect("hiding cycle");
    assert!(!rule.session().has_pending_timers());

    rule.advance_time(500).expect("nothing due");
    assert_eq!(rule.store().get("query"), Value::Null);
}

#[test]
fn test_state_survives_cache_reuse_across_cycles() {
    let log = ProbeLog::new();
    let alpha = probe("alpha", &log).initial_state(count_state()).build();
    let rule = EngineTestRule::for_children(vec![alpha], Value::object([("a", Value::from(1))]));

    rule.run_cycle().expect("first cycle");
    let instance = rule.root().children()[0].clone();
    instance.set_state(Record::builder().set("count", 7).finish());
    rule.run_cycle().expect("second cycle");

    let again = rule.root().children()[0].clone();
    assert!(instance.same(&again));
    assert_eq!(
        again.state().expect("state present").get("count"),
        Some(&Value::from(7))
    );
}
