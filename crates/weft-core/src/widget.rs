//! Shared widget descriptors.
//!
//! A [`Widget`] is the immutable, `Rc`-shared description of one node kind:
//! a fixed set of optional lifecycle hooks, declarative data bindings,
//! property setters, callbacks and composition flags. All per-mount state
//! lives in instances; the only mutable widget fields are the version
//! counter (hot-reconfiguration signal) and the one-shot init latch.

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use indexmap::IndexMap;

use crate::collections::map::HashMap;
use crate::context::TraversalContext;
use crate::controller::ControllerFactory;
use crate::defer::DeferMode;
use crate::error::EngineError;
use crate::instance::Instance;
use crate::output::RenderResult;
use crate::record::Record;
use crate::selector::{Binding, SelectorSpec, VISIBLE_FIELD};
use crate::value::{Path, Value};

static NEXT_WIDGET_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique widget identity, part of every instance cache key.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WidgetId(u64);

impl WidgetId {
    fn next() -> WidgetId {
        WidgetId(NEXT_WIDGET_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for WidgetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "w{}", self.0)
    }
}

pub type InitHook = Rc<dyn Fn(&Widget)>;
pub type InstanceHook = Rc<dyn Fn(&mut TraversalContext, &Instance)>;
pub type InitStateHook = Rc<dyn Fn(&mut TraversalContext, &Instance) -> Option<Record>>;
pub type VisibilityHook = Rc<dyn Fn(&mut TraversalContext, &Instance, &Record) -> bool>;
pub type ExploreHook = Rc<dyn Fn(&mut TraversalContext, &Instance, &Record)>;
pub type RenderHook =
    Rc<dyn Fn(&mut TraversalContext, &Instance, &str) -> Result<RenderResult, EngineError>>;
pub type DestroyHook = Rc<dyn Fn(&Instance)>;
pub type SetterFn = Rc<dyn Fn(&Instance, &Value)>;
pub type ActionFn = Rc<dyn Fn(&Instance, &Value) -> Value>;
pub type CallbackFn = Rc<dyn Fn(&Instance, &[Value]) -> Value>;

/// How a declarative property write lands.
#[derive(Clone)]
pub enum PropertySetter {
    /// Call a function with the instance and the new value.
    Handler(SetterFn),
    /// Resolve a controller method of this name through the chain.
    Method(String),
}

/// Declarative two-way binding descriptor for one named property.
///
/// Write precedence is `set`, then `action`, then `bind`; one mode applies.
#[derive(Clone, Default)]
pub struct PropertySpec {
    pub bind: Option<Path>,
    pub action: Option<ActionFn>,
    pub set: Option<PropertySetter>,
    pub defer: Option<DeferMode>,
}

impl PropertySpec {
    pub fn bind(path: impl Into<Path>) -> PropertySpec {
        PropertySpec {
            bind: Some(path.into()),
            ..PropertySpec::default()
        }
    }

    /// Dispatch the value through the store as an action built by `f`.
    pub fn action(f: impl Fn(&Instance, &Value) -> Value + 'static) -> PropertySpec {
        PropertySpec {
            action: Some(Rc::new(f)),
            ..PropertySpec::default()
        }
    }

    pub fn handler(f: impl Fn(&Instance, &Value) + 'static) -> PropertySpec {
        PropertySpec {
            set: Some(PropertySetter::Handler(Rc::new(f))),
            ..PropertySpec::default()
        }
    }

    pub fn method(name: impl Into<String>) -> PropertySpec {
        PropertySpec {
            set: Some(PropertySetter::Method(name.into())),
            ..PropertySpec::default()
        }
    }

    pub fn debounced(mut self, delay_ms: u64) -> PropertySpec {
        self.defer = Some(DeferMode::Debounce(delay_ms));
        self
    }

    pub fn throttled(mut self, interval_ms: u64) -> PropertySpec {
        self.defer = Some(DeferMode::Throttle(interval_ms));
        self
    }
}

/// Invokable callback declared on a widget.
#[derive(Clone)]
pub enum CallbackSpec {
    Handler(CallbackFn),
    /// Indirection to a controller method resolved at call time.
    Method(String),
}

pub struct Widget {
    pub(crate) id: WidgetId,
    pub(crate) type_name: Rc<str>,
    pub(crate) version: Cell<u32>,
    pub(crate) initialized: Cell<bool>,
    pub(crate) selector: SelectorSpec,

    pub(crate) init: Option<InitHook>,
    pub(crate) init_instance: Option<InstanceHook>,
    pub(crate) init_state: Option<InitStateHook>,
    pub(crate) check_visible: Option<VisibilityHook>,
    pub(crate) prepare_data: Option<InstanceHook>,
    pub(crate) explore: Option<ExploreHook>,
    pub(crate) on_explore: Option<InstanceHook>,
    pub(crate) explore_cleanup: Option<InstanceHook>,
    pub(crate) prepare: Option<InstanceHook>,
    pub(crate) prepare_cleanup: Option<InstanceHook>,
    pub(crate) render: Option<RenderHook>,
    pub(crate) cleanup: Option<InstanceHook>,
    pub(crate) on_destroy: Option<DestroyHook>,

    pub(crate) controller: Option<ControllerFactory>,
    pub(crate) pure: bool,
    pub(crate) memoize: bool,
    pub(crate) is_content: bool,
    pub(crate) put_into: Option<Rc<str>>,
    pub(crate) outer_layout: Option<Rc<Widget>>,
    pub(crate) helpers: IndexMap<String, Rc<Widget>>,
    pub(crate) properties: HashMap<String, PropertySpec>,
    pub(crate) callbacks: HashMap<String, CallbackSpec>,
    pub(crate) event_attributes: Vec<String>,
}

impl Widget {
    pub fn builder(type_name: impl Into<Rc<str>>) -> WidgetBuilder {
        WidgetBuilder {
            type_name: type_name.into(),
            bindings: IndexMap::new(),
            init: None,
            init_instance: None,
            init_state: None,
            check_visible: None,
            prepare_data: None,
            explore: None,
            on_explore: None,
            explore_cleanup: None,
            prepare: None,
            prepare_cleanup: None,
            render: None,
            cleanup: None,
            on_destroy: None,
            controller: None,
            pure: true,
            memoize: None,
            is_content: false,
            put_into: None,
            outer_layout: None,
            helpers: IndexMap::new(),
            properties: HashMap::default(),
            callbacks: HashMap::default(),
            event_attributes: Vec::new(),
        }
    }

    pub fn id(&self) -> WidgetId {
        self.id
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn version(&self) -> u32 {
        self.version.get()
    }

    /// Signal hot-reconfiguration; every instance re-renders next cycle.
    pub fn bump_version(&self) {
        self.version.set(self.version.get() + 1);
    }

    pub fn is_pure(&self) -> bool {
        self.pure
    }

    pub fn memoize(&self) -> bool {
        self.memoize
    }

    pub fn is_content(&self) -> bool {
        self.is_content
    }

    pub fn put_into(&self) -> Option<&str> {
        self.put_into.as_deref()
    }

    pub fn property(&self, name: &str) -> Option<&PropertySpec> {
        self.properties.get(name)
    }

    pub(crate) fn default_visibility(&self, raw_data: &Record) -> bool {
        raw_data.get(VISIBLE_FIELD).map_or(true, Value::is_truthy)
    }
}

pub struct WidgetBuilder {
    type_name: Rc<str>,
    bindings: IndexMap<String, Binding>,
    init: Option<InitHook>,
    init_instance: Option<InstanceHook>,
    init_state: Option<InitStateHook>,
    check_visible: Option<VisibilityHook>,
    prepare_data: Option<InstanceHook>,
    explore: Option<ExploreHook>,
    on_explore: Option<InstanceHook>,
    explore_cleanup: Option<InstanceHook>,
    prepare: Option<InstanceHook>,
    prepare_cleanup: Option<InstanceHook>,
    render: Option<RenderHook>,
    cleanup: Option<InstanceHook>,
    on_destroy: Option<DestroyHook>,
    controller: Option<ControllerFactory>,
    pure: bool,
    memoize: Option<bool>,
    is_content: bool,
    put_into: Option<Rc<str>>,
    outer_layout: Option<Rc<Widget>>,
    helpers: IndexMap<String, Rc<Widget>>,
    properties: HashMap<String, PropertySpec>,
    callbacks: HashMap<String, CallbackSpec>,
    event_attributes: Vec<String>,
}

impl WidgetBuilder {
    /// Select the value at `path` into the named data field.
    pub fn bind(mut self, name: impl Into<String>, path: impl Into<Path>) -> Self {
        self.bindings.insert(name.into(), Binding::Path(path.into()));
        self
    }

    pub fn bind_value(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.bindings.insert(name.into(), Binding::Const(value.into()));
        self
    }

    pub fn bind_compute(
        mut self,
        name: impl Into<String>,
        f: impl Fn(&Value) -> Value + 'static,
    ) -> Self {
        self.bindings
            .insert(name.into(), Binding::Compute(Rc::new(f)));
        self
    }

    /// Tie visibility to the truthiness of the value at `path`.
    pub fn visible_path(self, path: impl Into<Path>) -> Self {
        self.bind(VISIBLE_FIELD, path)
    }

    pub fn visible_value(self, visible: bool) -> Self {
        self.bind_value(VISIBLE_FIELD, visible)
    }

    /// One-shot hook run when the first instance of this widget initializes.
    pub fn on_init(mut self, f: impl Fn(&Widget) + 'static) -> Self {
        self.init = Some(Rc::new(f));
        self
    }

    pub fn init_instance(mut self, f: impl Fn(&mut TraversalContext, &Instance) + 'static) -> Self {
        self.init_instance = Some(Rc::new(f));
        self
    }

    /// Produce the initial instance state; `None` leaves the instance
    /// stateless until the first `set_state`.
    pub fn init_state(
        mut self,
        f: impl Fn(&mut TraversalContext, &Instance) -> Option<Record> + 'static,
    ) -> Self {
        self.init_state = Some(Rc::new(f));
        self
    }

    /// Replace the default visibility predicate.
    pub fn check_visible(
        mut self,
        f: impl Fn(&mut TraversalContext, &Instance, &Record) -> bool + 'static,
    ) -> Self {
        self.check_visible = Some(Rc::new(f));
        self
    }

    /// Post-process freshly selected data; runs only when the memo keys
    /// changed.
    pub fn prepare_data(mut self, f: impl Fn(&mut TraversalContext, &Instance) + 'static) -> Self {
        self.prepare_data = Some(Rc::new(f));
        self
    }

    /// Drive children: schedule them on the traversal context.
    pub fn explore(
        mut self,
        f: impl Fn(&mut TraversalContext, &Instance, &Record) + 'static,
    ) -> Self {
        self.explore = Some(Rc::new(f));
        self
    }

    /// Notification fired right after the explore hook, before content
    /// registration and layout entry.
    pub fn on_explore(mut self, f: impl Fn(&mut TraversalContext, &Instance) + 'static) -> Self {
        self.on_explore = Some(Rc::new(f));
        self
    }

    pub fn explore_cleanup(
        mut self,
        f: impl Fn(&mut TraversalContext, &Instance) + 'static,
    ) -> Self {
        self.explore_cleanup = Some(Rc::new(f));
        self
    }

    pub fn prepare(mut self, f: impl Fn(&mut TraversalContext, &Instance) + 'static) -> Self {
        self.prepare = Some(Rc::new(f));
        self
    }

    pub fn prepare_cleanup(
        mut self,
        f: impl Fn(&mut TraversalContext, &Instance) + 'static,
    ) -> Self {
        self.prepare_cleanup = Some(Rc::new(f));
        self
    }

    pub fn render(
        mut self,
        f: impl Fn(&mut TraversalContext, &Instance, &str) -> Result<RenderResult, EngineError>
            + 'static,
    ) -> Self {
        self.render = Some(Rc::new(f));
        self
    }

    pub fn cleanup(mut self, f: impl Fn(&mut TraversalContext, &Instance) + 'static) -> Self {
        self.cleanup = Some(Rc::new(f));
        self
    }

    /// Teardown hook; declaring one makes every instance carry a destroy
    /// obligation.
    pub fn on_destroy(mut self, f: impl Fn(&Instance) + 'static) -> Self {
        self.on_destroy = Some(Rc::new(f));
        self
    }

    pub fn controller(
        mut self,
        factory: impl Fn(&crate::controller::ControllerInit<'_>) -> crate::controller::Controller
            + 'static,
    ) -> Self {
        self.controller = Some(Rc::new(factory));
        self
    }

    /// Impure widgets re-render every cycle.
    pub fn pure(mut self, pure: bool) -> Self {
        self.pure = pure;
        self
    }

    /// Override output caching; defaults to the purity flag.
    pub fn memoize(mut self, memoize: bool) -> Self {
        self.memoize = Some(memoize);
        self
    }

    /// Mark as projected content targeting the named placeholder.
    pub fn content_for(mut self, name: impl Into<Rc<str>>) -> Self {
        self.is_content = true;
        self.put_into = Some(name.into());
        self
    }

    /// Wrap every instance of this widget in the given layout widget.
    pub fn outer_layout(mut self, layout: Rc<Widget>) -> Self {
        self.outer_layout = Some(layout);
        self
    }

    pub fn helper(mut self, name: impl Into<String>, widget: Rc<Widget>) -> Self {
        self.helpers.insert(name.into(), widget);
        self
    }

    pub fn property(mut self, name: impl Into<String>, spec: PropertySpec) -> Self {
        self.properties.insert(name.into(), spec);
        self
    }

    pub fn callback(
        mut self,
        name: impl Into<String>,
        f: impl Fn(&Instance, &[Value]) -> Value + 'static,
    ) -> Self {
        self.callbacks
            .insert(name.into(), CallbackSpec::Handler(Rc::new(f)));
        self
    }

    /// Declare a callback forwarding to a controller method.
    pub fn callback_method(
        mut self,
        name: impl Into<String>,
        method: impl Into<String>,
    ) -> Self {
        self.callbacks
            .insert(name.into(), CallbackSpec::Method(method.into()));
        self
    }

    /// Declare an attribute surfaced through `event_handlers`; only names
    /// starting with `on` are picked up there.
    pub fn event_attribute(mut self, name: impl Into<String>) -> Self {
        self.event_attributes.push(name.into());
        self
    }

    pub fn build(self) -> Rc<Widget> {
        let memoize = self.memoize.unwrap_or(self.pure);
        Rc::new(Widget {
            id: WidgetId::next(),
            type_name: self.type_name,
            version: Cell::new(0),
            initialized: Cell::new(false),
            selector: SelectorSpec::new(self.bindings),
            init: self.init,
            init_instance: self.init_instance,
            init_state: self.init_state,
            check_visible: self.check_visible,
            prepare_data: self.prepare_data,
            explore: self.explore,
            on_explore: self.on_explore,
            explore_cleanup: self.explore_cleanup,
            prepare: self.prepare,
            prepare_cleanup: self.prepare_cleanup,
            render: self.render,
            cleanup: self.cleanup,
            on_destroy: self.on_destroy,
            controller: self.controller,
            pure: self.pure,
            memoize,
            is_content: self.is_content,
            put_into: self.put_into,
            outer_layout: self.outer_layout,
            helpers: self.helpers,
            properties: self.properties,
            callbacks: self.callbacks,
            event_attributes: self.event_attributes,
        })
    }
}
