use std::cell::RefCell;
use std::rc::Rc;

use weft_core::{ElementNode, Output, Path, Record, RenderResult, Widget};

/// One lifecycle hook firing on a probe widget.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProbePhase {
    Init,
    Explore,
    Prepare,
    PrepareCleanup,
    Render,
    Cleanup,
    Destroy,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProbeEvent {
    pub label: String,
    pub phase: ProbePhase,
}

/// Shared recorder probe widgets append their lifecycle events to.
#[derive(Clone, Default)]
pub struct ProbeLog {
    events: Rc<RefCell<Vec<ProbeEvent>>>,
}

impl ProbeLog {
    pub fn new() -> ProbeLog {
        ProbeLog::default()
    }

    fn record(&self, label: &str, phase: ProbePhase) {
        self.events.borrow_mut().push(ProbeEvent {
            label: label.to_string(),
            phase,
        });
    }

    pub fn events(&self) -> Vec<ProbeEvent> {
        self.events.borrow().clone()
    }

    /// Drain recorded events, for per-cycle assertions.
    pub fn take(&self) -> Vec<ProbeEvent> {
        self.events.borrow_mut().drain(..).collect()
    }

    pub fn count(&self, label: &str, phase: ProbePhase) -> usize {
        self.events
            .borrow()
            .iter()
            .filter(|e| e.label == label && e.phase == phase)
            .count()
    }

    /// The phase sequence recorded for one label.
    pub fn phases(&self, label: &str) -> Vec<ProbePhase> {
        self.events
            .borrow()
            .iter()
            .filter(|e| e.label == label)
            .map(|e| e.phase)
            .collect()
    }
}

/// Builder for probe widgets: element-producing widgets reporting every
/// enabled lifecycle hook to a shared [`ProbeLog`]. The rendered element is
/// tagged with the probe label, so `Output::dump` doubles as a tree
/// assertion.
pub struct ProbeBuilder {
    label: String,
    log: ProbeLog,
    children: Vec<Rc<Widget>>,
    visible: Option<Path>,
    text: Option<Path>,
    initial_state: Option<Record>,
    put_into: Option<String>,
    outer_layout: Option<Rc<Widget>>,
    prepare: bool,
    cleanup: bool,
    destroy: bool,
    pure: bool,
}

pub fn probe(label: impl Into<String>, log: &ProbeLog) -> ProbeBuilder {
    ProbeBuilder {
        label: label.into(),
        log: log.clone(),
        children: Vec::new(),
        visible: None,
        text: None,
        initial_state: None,
        put_into: None,
        outer_layout: None,
        prepare: false,
        cleanup: false,
        destroy: false,
        pure: true,
    }
}

impl ProbeBuilder {
    pub fn child(mut self, child: Rc<Widget>) -> Self {
        self.children.push(child);
        self
    }

    pub fn visible(mut self, path: impl Into<Path>) -> Self {
        self.visible = Some(path.into());
        self
    }

    /// Bind the element text to a store value so the probe re-renders with
    /// it.
    pub fn text(mut self, path: impl Into<Path>) -> Self {
        self.text = Some(path.into());
        self
    }

    pub fn initial_state(mut self, state: Record) -> Self {
        self.initial_state = Some(state);
        self
    }

    /// Mark as projected content for the named slot.
    pub fn put_into(mut self, slot: impl Into<String>) -> Self {
        self.put_into = Some(slot.into());
        self
    }

    pub fn outer_layout(mut self, layout: Rc<Widget>) -> Self {
        self.outer_layout = Some(layout);
        self
    }

    /// Record prepare and prepare-cleanup passes.
    pub fn with_prepare(mut self) -> Self {
        self.prepare = true;
        self
    }

    pub fn with_cleanup(mut self) -> Self {
        self.cleanup = true;
        self
    }

    /// Carry a destroy obligation and record its discharge.
    pub fn with_destroy(mut self) -> Self {
        self.destroy = true;
        self
    }

    pub fn impure(mut self) -> Self {
        self.pure = false;
        self
    }

    pub fn build(self) -> Rc<Widget> {
        let ProbeBuilder {
            label,
            log,
            children,
            visible,
            text,
            initial_state,
            put_into,
            outer_layout,
            prepare,
            cleanup,
            destroy,
            pure,
        } = self;
        let label: Rc<str> = Rc::from(label);

        let mut builder = Widget::builder(Rc::clone(&label)).pure(pure);
        if let Some(path) = visible {
            builder = builder.visible_path(path);
        }
        if let Some(path) = text {
            builder = builder.bind("text", path);
        }
        if let Some(state) = initial_state {
            builder = builder.init_state(move |_context, _instance| Some(state.clone()));
        }
        if let Some(slot) = put_into {
            builder = builder.content_for(slot);
        }
        if let Some(layout) = outer_layout {
            builder = builder.outer_layout(layout);
        }

        {
            let log = log.clone();
            let label = Rc::clone(&label);
            builder = builder
                .init_instance(move |_context, _instance| log.record(&label, ProbePhase::Init));
        }
        {
            let log = log.clone();
            let label = Rc::clone(&label);
            builder = builder.explore(move |context, instance, _data| {
                log.record(&label, ProbePhase::Explore);
                let mut live = Vec::with_capacity(children.len());
                for child_widget in &children {
                    let child = instance.get_child(child_widget, None, None);
                    if child.schedule_explore_if_visible(context) {
                        live.push(child);
                    }
                }
                instance.set_children(live);
            });
        }
        if prepare {
            {
                let log = log.clone();
                let label = Rc::clone(&label);
                builder = builder
                    .prepare(move |_context, _instance| log.record(&label, ProbePhase::Prepare));
            }
            let log = log.clone();
            let label_cleanup = Rc::clone(&label);
            builder = builder.prepare_cleanup(move |_context, _instance| {
                log.record(&label_cleanup, ProbePhase::PrepareCleanup)
            });
        }
        if cleanup {
            let log = log.clone();
            let label = Rc::clone(&label);
            builder = builder
                .cleanup(move |_context, _instance| log.record(&label, ProbePhase::Cleanup));
        }
        if destroy {
            let log = log.clone();
            let label = Rc::clone(&label);
            builder =
                builder.on_destroy(move |_instance| log.record(&label, ProbePhase::Destroy));
        }
        {
            let log = log.clone();
            let label = Rc::clone(&label);
            builder = builder.render(move |context, instance, key| {
                log.record(&label, ProbePhase::Render);
                let data = instance.data();
                let mut node = ElementNode::new(label.as_ref(), key);
                if let Some(text) = data.get("text") {
                    if !text.is_null() {
                        node.children.push(Output::text(text.to_text()));
                    }
                }
                node.children.extend(instance.render_children(context)?);
                Ok(RenderResult::new(Output::element(node)))
            });
        }
        builder.build()
    }
}
