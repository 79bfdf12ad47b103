use weft_core::*;

use weft_testing::{probe, EngineTestRule, ProbeLog, ProbePhase};
use weft_widgets::{content_placeholder, frame_layout};

#[test]
fn test_content_renders_only_through_its_placeholder() {
    let log = ProbeLog::new();
    let side = probe("side", &log).put_into("panel").build();
    let slot = content_placeholder("panel");
    let rule = EngineTestRule::for_children(
        vec![side, slot],
        Value::object([("a", Value::from(1))]),
    );

    let output = rule.run_cycle().expect("cycle");
    // the declaring position yields nothing; the slot does the rendering
    assert_eq!(output.content.dump(), "<side/>");
    assert_eq!(log.count("side", ProbePhase::Render), 1);
}

#[test]
fn test_adoption_works_for_either_declaration_order() {
    for flipped in [false, true] {
        let log = ProbeLog::new();
        let side = probe("side", &log).put_into("panel").build();
        let slot = content_placeholder("panel");
        let children = if flipped { vec![slot, side] } else { vec![side, slot] };
        let rule = EngineTestRule::for_children(
            children,
            Value::object([("a", Value::from(1))]),
        );

        let output = rule.run_cycle().expect("cycle");
        assert_eq!(output.content.dump(), "<side/>", "flipped={}", flipped);
        assert_eq!(log.count("side", ProbePhase::Render), 1);
    }
}

#[test]
fn test_unclaimed_content_renders_nothing() {
    let log = ProbeLog::new();
    let side = probe("side", &log).put_into("panel").build();
    let rule = EngineTestRule::for_children(
        vec![side],
        Value::object([("a", Value::from(1))]),
    );

    let output = rule.run_cycle().expect("cycle");
    assert!(output.content.is_empty());
    assert_eq!(log.count("side", ProbePhase::Render), 0);
    // explored, just never pulled
    assert_eq!(log.count("side", ProbePhase::Explore), 1);
}

#[test]
fn test_empty_placeholder_renders_nothing() {
    let slot = content_placeholder("panel");
    let rule = EngineTestRule::for_children(
        vec![slot],
        Value::object([("a", Value::from(1))]),
    );
    let output = rule.run_cycle().expect("cycle");
    assert!(output.content.is_empty());
}

#[test]
fn test_projected_content_memoizes_across_cycles() {
    let log = ProbeLog::new();
    let ticker = probe("ticker", &log).text("msg").build();
    let side = probe("side", &log).put_into("panel").build();
    let slot = content_placeholder("panel");
    let rule = EngineTestRule::for_children(
        vec![ticker, side, slot],
        Value::object([("msg", Value::from("one"))]),
    );

    rule.run_cycle().expect("first cycle");

    // an unrelated change re-renders the tree around it; the projected
    // content reuses its committed output
    rule.store().set("msg", "two");
    rule.run_cycle().expect("second cycle");
    assert_eq!(log.count("ticker", ProbePhase::Render), 2);
    assert_eq!(log.count("side", ProbePhase::Render), 1);
}

#[test]
fn test_updated_content_punches_through_memoizing_hosts() {
    let log = ProbeLog::new();
    let side = probe("side", &log).text("msg").put_into("panel").build();
    // the host memoizes and has no data of its own; adoption must still
    // invalidate it when the projected content changes
    let host = probe("host", &log)
        .child(content_placeholder("panel"))
        .build();
    let rule = EngineTestRule::for_children(
        vec![side, host],
        Value::object([("msg", Value::from("one"))]),
    );

    let output = rule.run_cycle().expect("first cycle");
    assert_eq!(output.content.dump(), "<host><side>one</side></host>");

    rule.store().set("msg", "two");
    let output = rule.run_cycle().expect("second cycle");
    assert_eq!(output.content.dump(), "<host><side>two</side></host>");
    assert_eq!(log.count("side", ProbePhase::Render), 2);
}

#[test]
fn test_outer_layout_wraps_the_declaring_instance() {
    let log = ProbeLog::new();
    let inner = probe("inner", &log)
        .outer_layout(frame_layout("panel"))
        .build();
    let rule = EngineTestRule::for_children(
        vec![inner],
        Value::object([("a", Value::from(1))]),
    );

    let output = rule.run_cycle().expect("cycle");
    assert_eq!(
        output.content.dump(),
        "<frame title=\"panel\"><inner/></frame>"
    );
    assert_eq!(log.count("inner", ProbePhase::Render), 1);
}

#[test]
fn test_content_from_outside_a_layout_is_adoptable_inside_it() {
    let log = ProbeLog::new();
    let side = probe("side", &log).put_into("panel").build();
    // the layout scope inherits the enclosing registrations, so content
    // declared before the wrapped subtree still reaches a slot inside it
    let inner = probe("inner", &log)
        .child(content_placeholder("panel"))
        .outer_layout(frame_layout("shell"))
        .build();
    let rule = EngineTestRule::for_children(
        vec![side, inner],
        Value::object([("a", Value::from(1))]),
    );

    let output = rule.run_cycle().expect("cycle");
    assert_eq!(
        output.content.dump(),
        "<frame title=\"shell\"><inner><side/></inner></frame>"
    );
    assert_eq!(log.count("side", ProbePhase::Render), 1);
}

#[test]
fn test_sibling_layout_scopes_do_not_leak() {
    let log = ProbeLog::new();
    let one = probe("one", &log)
        .outer_layout(frame_layout("first"))
        .build();
    let two = probe("two", &log)
        .outer_layout(frame_layout("second"))
        .build();
    let rule = EngineTestRule::for_children(
        vec![one, two],
        Value::object([("a", Value::from(1))]),
    );

    let output = rule.run_cycle().expect("cycle");
    assert_eq!(
        output.content.dump(),
        "<frame title=\"first\"><one/></frame><frame title=\"second\"><two/></frame>"
    );
}

#[test]
fn test_outer_layout_reuses_its_instance_across_cycles() {
    let log = ProbeLog::new();
    let inner = probe("inner", &log)
        .outer_layout(frame_layout("panel"))
        .build();
    let rule = EngineTestRule::for_children(
        vec![inner],
        Value::object([("a", Value::from(1))]),
    );

    let first = rule.run_cycle().expect("first cycle");
    let second = rule.run_cycle().expect("second cycle");
    // the whole wrapped subtree memoizes quiet cycles
    assert!(first.same(&second));
    assert_eq!(log.count("inner", ProbePhase::Init), 1);
    assert_eq!(log.count("inner", ProbePhase::Render), 1);
}

#[test]
fn test_root_instance_hosts_its_own_layout() {
    let log = ProbeLog::new();
    let inner = probe("inner", &log)
        .outer_layout(frame_layout("shell"))
        .build();
    let rule = EngineTestRule::new(inner, Value::object([("a", Value::from(1))]));

    let output = rule.run_cycle().expect("cycle");
    assert_eq!(
        output.content.dump(),
        "<frame title=\"shell\"><inner/></frame>"
    );
}
