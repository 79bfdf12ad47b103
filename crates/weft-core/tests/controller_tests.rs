use weft_core::*;

use std::cell::Cell;
use std::rc::Rc;

use weft_testing::{probe, EngineTestRule, ProbeLog};

/// A host widget declaring a controller and mounting `children`.
fn controlled_host(
    name: &str,
    controller: impl Fn(&ControllerInit<'_>) -> Controller + 'static,
    children: Vec<Rc<Widget>>,
) -> Rc<Widget> {
    Widget::builder(name.to_string())
        .controller(controller)
        .explore(move |context, instance, _data| {
            let mut live = Vec::with_capacity(children.len());
            for child_widget in &children {
                let child = instance.get_child(child_widget, None, None);
                if child.schedule_explore_if_visible(context) {
                    live.push(child);
                }
            }
            instance.set_children(live);
        })
        .render(|context, instance, _key| {
            Ok(RenderResult::new(Output::fragment(
                instance.render_children(context)?,
            )))
        })
        .build()
}

#[test]
fn test_children_inherit_the_nearest_controller() {
    let log = ProbeLog::new();
    let leaf = probe("leaf", &log).build();
    let host = controlled_host(
        "panel",
        |_init| {
            Controller::builder()
                .method("whoami", |owner, _args| Value::from(owner.widget_type()))
                .build()
        },
        vec![leaf],
    );
    let rule = EngineTestRule::new(host, Value::object([("a", Value::from(1))]));

    rule.run_cycle().expect("cycle");
    let leaf_instance = rule.root().children()[0].clone();
    let callback = leaf_instance.get_callback("whoami").expect("resolved");
    // methods run against the declaring instance, not the invoker
    assert_eq!(callback.call(&[]), Value::from("panel"));
}

#[test]
fn test_inner_controllers_shadow_outer_methods() {
    let log = ProbeLog::new();
    let leaf = probe("leaf", &log).build();
    let inner = controlled_host(
        "inner",
        |_init| {
            Controller::builder()
                .method("name", |_owner, _args| Value::from("inner"))
                .build()
        },
        vec![leaf],
    );
    let outer = controlled_host(
        "outer",
        |_init| {
            Controller::builder()
                .method("name", |_owner, _args| Value::from("outer"))
                .method("outer_only", |_owner, _args| Value::from("reachable"))
                .build()
        },
        vec![inner],
    );
    let rule = EngineTestRule::new(outer, Value::object([("a", Value::from(1))]));

    rule.run_cycle().expect("cycle");
    let leaf_instance = rule.root().children()[0].children()[0].clone();

    let shadowed = leaf_instance.get_callback("name").expect("resolved");
    assert_eq!(shadowed.call(&[]), Value::from("inner"));

    // unresolved names keep walking outward
    let outer_only = leaf_instance.get_callback("outer_only").expect("resolved");
    assert_eq!(outer_only.call(&[]), Value::from("reachable"));
}

#[test]
fn test_get_callback_without_a_controller_fails() {
    let log = ProbeLog::new();
    let alpha = probe("alpha", &log).build();
    let rule = EngineTestRule::for_children(vec![alpha], Value::object([("a", Value::from(1))]));

    rule.run_cycle().expect("cycle");
    let instance = rule.root().children()[0].clone();
    let err = instance.get_callback("anything").expect_err("no controller");
    assert!(matches!(err, EngineError::MissingController { .. }));
}

#[test]
fn test_unresolved_method_is_reported_through_the_whole_chain() {
    let log = ProbeLog::new();
    let leaf = probe("leaf", &log).build();
    let host = controlled_host(
        "panel",
        |_init| Controller::builder().build(),
        vec![leaf],
    );
    let rule = EngineTestRule::new(host, Value::object([("a", Value::from(1))]));

    rule.run_cycle().expect("cycle");
    let instance = rule.root().children()[0].clone();
    let err = instance.get_callback("missing").expect_err("unresolved");
    assert!(matches!(err, EngineError::CallbackUnresolved { .. }));
    assert!(err.to_string().contains("missing"));
}

#[test]
fn test_invoking_an_undeclared_callback_fails() {
    let log = ProbeLog::new();
    let alpha = probe("alpha", &log).build();
    let rule = EngineTestRule::new(alpha, Value::object([("a", Value::from(1))]));

    rule.run_cycle().expect("cycle");
    let err = rule.root().invoke("nothing", &[]).expect_err("undeclared");
    assert!(matches!(err, EngineError::CallbackNotInvokable { .. }));
}

#[test]
fn test_invoke_resolves_handler_and_method_callbacks() {
    let button = Widget::builder("button")
        .callback("onPing", |_instance, args| {
            args.first().cloned().unwrap_or(Value::Null)
        })
        .callback_method("onRename", "rename")
        .render(|_context, _instance, _key| Ok(RenderResult::empty()))
        .build();
    let host = controlled_host(
        "panel",
        |_init| {
            Controller::builder()
                .method("rename", |owner, args| {
                    let value = args.first().cloned().unwrap_or(Value::Null);
                    owner.store().set("title", value.clone());
                    value
                })
                .build()
        },
        vec![button],
    );
    let rule = EngineTestRule::new(host, Value::object([("title", Value::from("old"))]));

    rule.run_cycle().expect("cycle");
    let button_instance = rule.root().children()[0].clone();

    let echoed = button_instance
        .invoke("onPing", &[Value::from(42)])
        .expect("handler");
    assert_eq!(echoed, Value::from(42));

    button_instance
        .invoke("onRename", &[Value::from("next")])
        .expect("method callback");
    assert_eq!(rule.store().get("title"), Value::from("next"));
}

#[test]
fn test_method_mode_setters_resolve_through_the_chain() {
    let field = Widget::builder("field")
        .property("title", PropertySpec::method("rename"))
        .render(|_context, _instance, _key| Ok(RenderResult::empty()))
        .build();
    let host = controlled_host(
        "panel",
        |_init| {
            Controller::builder()
                .method("rename", |owner, args| {
                    let value = args.first().cloned().unwrap_or(Value::Null);
                    owner.store().set("title", value);
                    Value::Null
                })
                .build()
        },
        vec![field],
    );
    let rule = EngineTestRule::new(host, Value::object([("title", Value::from("old"))]));

    rule.run_cycle().expect("cycle");
    let field_instance = rule.root().children()[0].clone();
    assert!(field_instance.set("title", "via controller"));
    assert_eq!(rule.store().get("title"), Value::from("via controller"));
}

#[test]
fn test_controller_explore_runs_every_cycle() {
    let explores = Rc::new(Cell::new(0u32));
    let seen = Rc::clone(&explores);
    let host = controlled_host(
        "panel",
        move |_init| {
            let seen = Rc::clone(&seen);
            Controller::builder()
                .on_explore(move |_context, _instance| seen.set(seen.get() + 1))
                .build()
        },
        Vec::new(),
    );
    let rule = EngineTestRule::new(host, Value::object([("a", Value::from(1))]));

    rule.run_cycle().expect("first cycle");
    rule.run_cycle().expect("second cycle");
    assert_eq!(explores.get(), 2);
}

#[test]
fn test_controller_teardown_runs_once_on_hide() {
    let teardowns = Rc::new(Cell::new(0u32));
    let seen = Rc::clone(&teardowns);
    let host = Widget::builder("panel")
        .visible_path("show")
        .controller(move |_init| {
            let seen = Rc::clone(&seen);
            Controller::builder()
                .on_destroy(move |_instance| seen.set(seen.get() + 1))
                .build()
        })
        .render(|_context, _instance, _key| Ok(RenderResult::empty()))
        .build();
    let rule = EngineTestRule::for_children(
        vec![host],
        Value::object([("show", Value::Bool(true))]),
    );

    rule.run_cycle().expect("visible cycle");
    assert_eq!(teardowns.get(), 0);

    rule.store().set("show", false);
    rule.run_cycle().expect("hiding cycle");
    assert_eq!(teardowns.get(), 1);

    rule.run_cycle().expect("quiet cycle");
    assert_eq!(teardowns.get(), 1);
}

#[test]
fn test_event_handlers_surface_declared_on_attributes() {
    let taps = Rc::new(Cell::new(0u32));
    let seen = Rc::clone(&taps);
    let button = Widget::builder("button")
        .event_attribute("onTap")
        .event_attribute("tabindex")
        .callback("onTap", move |_instance, _args| {
            seen.set(seen.get() + 1);
            Value::Null
        })
        .render(|_context, _instance, _key| Ok(RenderResult::empty()))
        .build();
    let rule = EngineTestRule::new(button, Value::object([("a", Value::from(1))]));

    rule.run_cycle().expect("cycle");
    let handlers = rule.root().event_handlers().expect("attributes declared");
    // only names shaped like events come back
    assert_eq!(handlers.len(), 1);
    assert_eq!(handlers[0].name(), "onTap");

    handlers[0].emit(&[]).expect("invoked");
    assert_eq!(taps.get(), 1);
}

#[test]
fn test_event_handlers_absent_without_declared_attributes() {
    let log = ProbeLog::new();
    let alpha = probe("alpha", &log).build();
    let rule = EngineTestRule::new(alpha, Value::object([("a", Value::from(1))]));
    rule.run_cycle().expect("cycle");
    assert!(rule.root().event_handlers().is_none());
}
