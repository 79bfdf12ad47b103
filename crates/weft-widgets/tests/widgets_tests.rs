use weft_widgets::*;

use std::cell::Cell;
use std::rc::Rc;

use weft_core::{Value, WidgetId};
use weft_testing::EngineTestRule;

fn rows(labels: &[&str]) -> Value {
    Value::list(
        labels
            .iter()
            .map(|label| Value::object([("label", *label)])),
    )
}

#[test]
fn test_element_renders_bound_attributes() {
    let input = element("input")
        .attr("value", "query")
        .attr_value("kind", "search")
        .build();
    let rule = EngineTestRule::new(input, Value::object([("query", Value::from("hello"))]));
    assert_eq!(
        rule.dump().expect("cycle"),
        "<input value=\"hello\" kind=\"search\"/>"
    );
}

#[test]
fn test_element_drops_null_attributes() {
    let input = element("input").attr("value", "no.such.path").build();
    let rule = EngineTestRule::new(input, Value::object([("a", Value::from(1))]));
    assert_eq!(rule.dump().expect("cycle"), "<input/>");
}

#[test]
fn test_element_computed_attributes_follow_the_store() {
    let badge = element("badge")
        .attr_compute("count", |data| {
            data.get_path(&weft_core::Path::parse("items"))
                .and_then(Value::as_list)
                .map(|items| items.len())
                .unwrap_or(0)
                .into()
        })
        .build();
    let rule = EngineTestRule::new(badge, Value::object([("items", Value::list([1, 2]))]));
    assert_eq!(rule.dump().expect("cycle"), "<badge count=\"2\"/>");

    rule.store().set("items.2", 3);
    assert_eq!(rule.dump().expect("cycle"), "<badge count=\"3\"/>");
}

#[test]
fn test_element_children_respect_visibility() {
    let list = element("ul")
        .child(element("li").attr_value("id", "a").build())
        .child(element("li").attr_value("id", "b").visible("more").build())
        .build();
    let rule = EngineTestRule::new(list, Value::object([("more", Value::Bool(false))]));
    assert_eq!(rule.dump().expect("cycle"), "<ul><li id=\"a\"/></ul>");

    rule.store().set("more", true);
    assert_eq!(
        rule.dump().expect("cycle"),
        "<ul><li id=\"a\"/><li id=\"b\"/></ul>"
    );
}

#[test]
fn test_text_and_label_render_their_values() {
    let root = container(vec![text("greeting"), label("!")]);
    let rule = EngineTestRule::new(root, Value::object([("greeting", Value::from("hi"))]));
    assert_eq!(rule.dump().expect("cycle"), "hi!");
}

#[test]
fn test_element_event_handlers_invoke_callbacks() {
    let pressed = Rc::new(Cell::new(0u32));
    let seen = Rc::clone(&pressed);
    let button = element("button")
        .on("onPress")
        .callback("onPress", move |_instance, _args| {
            seen.set(seen.get() + 1);
            Value::Null
        })
        .build();
    let rule = EngineTestRule::new(button, Value::object([("a", Value::from(1))]));
    rule.run_cycle().expect("cycle");

    let handlers = rule.root().event_handlers().expect("declared");
    assert_eq!(handlers[0].name(), "onPress");
    handlers[0].emit(&[]).expect("invoked");
    assert_eq!(pressed.get(), 1);
}

#[test]
fn test_repeater_mounts_one_child_per_record() {
    let item = element("li").child(text("label")).build();
    let rule = EngineTestRule::new(
        repeater("rows", item),
        Value::object([("rows", rows(&["one", "two"]))]),
    );
    assert_eq!(
        rule.dump().expect("cycle"),
        "<li>one</li><li>two</li>"
    );
}

#[test]
fn test_repeater_follows_list_growth_and_shrink() {
    let item = element("li").child(text("label")).build();
    let rule = EngineTestRule::new(
        repeater("rows", item),
        Value::object([("rows", rows(&["one"]))]),
    );
    assert_eq!(rule.dump().expect("cycle"), "<li>one</li>");

    rule.store().set("rows", rows(&["one", "two", "three"]));
    assert_eq!(
        rule.dump().expect("grown"),
        "<li>one</li><li>two</li><li>three</li>"
    );

    rule.store().set("rows", rows(&["three"]));
    // positional keys: the surviving slot shows the remaining record
    assert_eq!(rule.dump().expect("shrunk"), "<li>three</li>");
}

#[test]
fn test_repeater_tolerates_missing_or_malformed_records() {
    let item = element("li").child(text("label")).build();
    let rule = EngineTestRule::new(
        repeater("rows", item),
        Value::object([("a", Value::from(1))]),
    );
    assert_eq!(rule.dump().expect("absent"), "");

    rule.store().set("rows", "not a list");
    assert_eq!(rule.dump().expect("malformed"), "");
}

#[test]
fn test_keyed_repeater_keeps_instances_across_reorders() {
    let item = element("li").child(text("label")).build();
    let initial = Value::list([
        Value::object([("id", "a"), ("label", "first")]),
        Value::object([("id", "b"), ("label", "second")]),
    ]);
    let rule = EngineTestRule::new(
        repeater_keyed("rows", Some("id"), item),
        Value::object([("rows", initial)]),
    );

    assert_eq!(
        rule.dump().expect("cycle"),
        "<li>first</li><li>second</li>"
    );
    let a_before = rule.root().children()[0].clone();
    assert_eq!(a_before.key().prefix(), Some("item-a"));
    assert_eq!(a_before.store().base().to_string(), "rows.0");

    rule.store().set(
        "rows",
        Value::list([
            Value::object([("id", "b"), ("label", "second")]),
            Value::object([("id", "a"), ("label", "first")]),
        ]),
    );
    assert_eq!(
        rule.dump().expect("reordered"),
        "<li>second</li><li>first</li>"
    );

    // the record moved and its instance moved with it, store view rebound
    let a_after = rule.root().children()[1].clone();
    assert!(a_before.same(&a_after));
    assert_eq!(a_after.store().base().to_string(), "rows.1");
}

#[test]
fn test_same_widget_without_prefix_collapses_to_one_instance() {
    let shared = element("li").build();
    let root = container(vec![Rc::clone(&shared), shared]);
    let rule = EngineTestRule::new(root, Value::object([("a", Value::from(1))]));
    rule.run_cycle().expect("cycle");

    // cache keys are widget identity plus prefix; without a prefix both
    // mounts land on one entry, which is why repeaters prefix their items
    let children = rule.root().children();
    assert_eq!(children.len(), 2);
    let ids: Vec<WidgetId> = children.iter().map(|c| c.widget().id()).collect();
    assert_eq!(ids[0], ids[1]);
    assert!(children[0].same(&children[1]));
}
