//! Instances: per-mount state for widgets, and the pipeline that drives them.
//!
//! An [`Instance`] pairs one shared [`Widget`] with one mount point in the
//! tree. Instances survive across cycles inside their parent's
//! [`InstanceCache`], keyed by widget identity plus an optional caller
//! prefix; reconciliation is mark-and-sweep over that cache. The pipeline
//! phases live here: `check_visible`, `explore` (pre/post visit), `prepare`,
//! `render` and `cleanup`, along with the memoization keys the explore step
//! compares and the render step commits.
//!
//! Ownership points strictly downward: caches hold strong child handles,
//! while `parent` is a weak back-link used only by the upward marking walks
//! and destroy tracking.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use crate::collections::map::HashMap;
use crate::context::TraversalContext;
use crate::controller::{Controller, ControllerInit, ControllerMethod};
use crate::error::EngineError;
use crate::output::{Output, RenderResult};
use crate::record::Record;
use crate::selector::BoundSelector;
use crate::session::SessionHandle;
use crate::store::Store;
use crate::value::Value;
use crate::widget::{CallbackSpec, PropertySetter, PropertySpec, Widget, WidgetId};

/// Session-unique instance identity, assigned at creation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstanceId(pub(crate) u64);

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "i{}", self.0)
    }
}

/// Where an instance stands within the current cycle's explore phase.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExploreState {
    Unvisited,
    Entered,
    Exited,
}

/// Cache key of a child within its parent: widget identity plus an optional
/// caller-supplied prefix disambiguating repeated mounts of one widget.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct InstanceKey {
    prefix: Option<Rc<str>>,
    widget: WidgetId,
}

impl InstanceKey {
    pub fn new(prefix: Option<&str>, widget: WidgetId) -> InstanceKey {
        InstanceKey {
            prefix: prefix.map(Rc::from),
            widget,
        }
    }

    pub fn prefix(&self) -> Option<&str> {
        self.prefix.as_deref()
    }

    pub fn widget_id(&self) -> WidgetId {
        self.widget
    }
}

impl fmt::Display for InstanceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.prefix {
            Some(prefix) => write!(f, "{}-{}", prefix, self.widget),
            None => write!(f, "{}", self.widget),
        }
    }
}

/// The four keys explore compares, as committed by the last render.
#[derive(Default)]
struct MemoKeys {
    raw_data: Option<Record>,
    state: Option<Record>,
    widget_version: Option<u32>,
    generation: Option<u64>,
}

/// Snapshot written by render; the comparison base for the next cycle.
#[derive(Default)]
struct CommittedCache {
    keys: MemoKeys,
    visible: bool,
    output: Option<RenderResult>,
    values: HashMap<String, Value>,
}

pub(crate) struct InstanceInner {
    id: InstanceId,
    key: InstanceKey,
    widget: Rc<Widget>,
    session: SessionHandle,
    store: RefCell<Store>,
    parent: RefCell<Weak<InstanceInner>>,

    initialized: Cell<bool>,
    visible: Cell<bool>,
    explore_state: Cell<ExploreState>,
    prepared: Cell<bool>,
    rendered: Cell<bool>,
    should_update: Cell<bool>,
    child_state_dirty: Cell<bool>,
    destroy_tracked: Cell<bool>,
    should_render_content: Cell<bool>,
    owns_controller: Cell<bool>,

    controller: RefCell<Option<Rc<Controller>>>,
    selector: RefCell<Option<BoundSelector>>,
    raw_data: RefCell<Option<Record>>,
    data: RefCell<Option<Record>>,
    state: RefCell<Option<Record>>,
    parent_options: RefCell<Option<Value>>,

    committed: RefCell<CommittedCache>,
    staged_values: RefCell<HashMap<String, Value>>,
    children_cache: RefCell<Option<InstanceCache>>,
    helpers: RefCell<HashMap<String, Instance>>,
    outer_layout: RefCell<Option<Instance>>,
    children: RefCell<Vec<Instance>>,
}

/// Cheap-clone handle to one mounted widget.
#[derive(Clone)]
pub struct Instance {
    inner: Rc<InstanceInner>,
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Instance({}, {})", self.id(), self.widget_type())
    }
}

impl Instance {
    pub(crate) fn create(
        id: InstanceId,
        key: InstanceKey,
        widget: Rc<Widget>,
        store: Store,
        session: SessionHandle,
        parent: Weak<InstanceInner>,
    ) -> Instance {
        Instance {
            inner: Rc::new(InstanceInner {
                id,
                key,
                widget,
                session,
                store: RefCell::new(store),
                parent: RefCell::new(parent),
                initialized: Cell::new(false),
                visible: Cell::new(false),
                explore_state: Cell::new(ExploreState::Unvisited),
                prepared: Cell::new(false),
                rendered: Cell::new(false),
                should_update: Cell::new(false),
                child_state_dirty: Cell::new(false),
                destroy_tracked: Cell::new(false),
                should_render_content: Cell::new(false),
                owns_controller: Cell::new(false),
                controller: RefCell::new(None),
                selector: RefCell::new(None),
                raw_data: RefCell::new(None),
                data: RefCell::new(None),
                state: RefCell::new(None),
                parent_options: RefCell::new(None),
                committed: RefCell::new(CommittedCache::default()),
                staged_values: RefCell::new(HashMap::default()),
                children_cache: RefCell::new(None),
                helpers: RefCell::new(HashMap::default()),
                outer_layout: RefCell::new(None),
                children: RefCell::new(Vec::new()),
            }),
        }
    }

    pub(crate) fn from_inner(inner: Rc<InstanceInner>) -> Instance {
        Instance { inner }
    }

    pub(crate) fn downgrade(&self) -> Weak<InstanceInner> {
        Rc::downgrade(&self.inner)
    }

    pub fn id(&self) -> InstanceId {
        self.inner.id
    }

    pub fn key(&self) -> &InstanceKey {
        &self.inner.key
    }

    pub fn widget(&self) -> &Rc<Widget> {
        &self.inner.widget
    }

    pub fn widget_type(&self) -> &str {
        self.inner.widget.type_name()
    }

    pub fn store(&self) -> Store {
        self.inner.store.borrow().clone()
    }

    pub fn parent(&self) -> Option<Instance> {
        self.inner.parent.borrow().upgrade().map(Instance::from_inner)
    }

    /// Handle identity.
    pub fn same(&self, other: &Instance) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    pub fn is_visible(&self) -> bool {
        self.inner.visible.get()
    }

    pub fn is_rendered(&self) -> bool {
        self.inner.rendered.get()
    }

    pub fn should_update(&self) -> bool {
        self.inner.should_update.get()
    }

    pub fn explore_state(&self) -> ExploreState {
        self.inner.explore_state.get()
    }

    pub fn controller(&self) -> Option<Rc<Controller>> {
        self.inner.controller.borrow().clone()
    }

    pub fn state(&self) -> Option<Record> {
        self.inner.state.borrow().clone()
    }

    pub fn raw_data(&self) -> Option<Record> {
        self.inner.raw_data.borrow().clone()
    }

    /// The prepared data record; falls back to raw data before the first
    /// `prepare_data` pass.
    pub fn data(&self) -> Record {
        if let Some(data) = &*self.inner.data.borrow() {
            return data.clone();
        }
        if let Some(raw) = &*self.inner.raw_data.borrow() {
            return raw.clone();
        }
        Record::empty()
    }

    /// Replace the prepared data record; the hook for `prepare_data`.
    pub fn update_data(&self, f: impl FnOnce(&Record) -> Record) {
        let current = self.data();
        *self.inner.data.borrow_mut() = Some(f(&current));
    }

    /// Layout options snapshotted from the context during explore.
    pub fn parent_options(&self) -> Option<Value> {
        self.inner.parent_options.borrow().clone()
    }

    pub fn should_render_content(&self) -> bool {
        self.inner.should_render_content.get()
    }

    /// Select a projected instance for rendering; placeholders set this
    /// before rendering adopted content.
    pub fn set_should_render_content(&self, value: bool) {
        self.inner.should_render_content.set(value);
    }

    /// Child instances published by the widget's explore hook for its own
    /// render pass.
    pub fn children(&self) -> Vec<Instance> {
        self.inner.children.borrow().clone()
    }

    pub fn set_children(&self, children: Vec<Instance>) {
        *self.inner.children.borrow_mut() = children;
    }

    pub fn helper(&self, name: &str) -> Option<Instance> {
        self.inner.helpers.borrow().get(name).cloned()
    }

    // ---- lifecycle -------------------------------------------------------

    fn init(&self, context: &mut TraversalContext) {
        let widget = Rc::clone(&self.inner.widget);
        if !widget.initialized.replace(true) {
            if let Some(init) = &widget.init {
                init(&widget);
            }
        }
        *self.inner.committed.borrow_mut() = CommittedCache::default();
        if self.inner.selector.borrow().is_none() {
            *self.inner.selector.borrow_mut() = Some(widget.selector.bind());
        }
        if let Some(factory) = &widget.controller {
            let controller = {
                let store = self.store();
                let init = ControllerInit {
                    widget: &widget,
                    instance: self,
                    store: &store,
                };
                Rc::new(factory(&init))
            };
            controller.bind_owner(self);
            *self.inner.controller.borrow_mut() = Some(controller);
            self.inner.owns_controller.set(true);
        }
        if let Some(hook) = &widget.init_instance {
            hook(context, self);
        }
        if let Some(hook) = &widget.init_state {
            if let Some(state) = hook(context, self) {
                *self.inner.state.borrow_mut() = Some(state);
            }
        }
        self.inner.initialized.set(true);
    }

    /// Re-select data, resolve visibility and reset the per-cycle flags.
    /// A visible-to-hidden transition destroys the subtree before returning.
    pub fn check_visible(&self, context: &mut TraversalContext) -> bool {
        if !self.inner.initialized.get() {
            self.init(context);
        }
        let was_visible = self.inner.visible.get();
        let data = self.store().get_data();
        let raw = {
            let selector = self.inner.selector.borrow();
            selector
                .as_ref()
                .expect("selector bound at init")
                .select(&data)
        };
        *self.inner.raw_data.borrow_mut() = Some(raw.clone());
        let widget = Rc::clone(&self.inner.widget);
        let visible = match &widget.check_visible {
            Some(hook) => hook(context, self, &raw),
            None => widget.default_visibility(&raw),
        };
        self.inner.visible.set(visible);
        self.inner.explore_state.set(ExploreState::Unvisited);
        self.inner.prepared.set(false);
        self.inner.rendered.set(false);
        if !visible && was_visible {
            self.destroy();
        }
        visible
    }

    /// Check visibility and, when visible, push onto the explore worklist.
    pub fn schedule_explore_if_visible(&self, context: &mut TraversalContext) -> bool {
        if self.check_visible(context) {
            context.push_explore(self.clone());
            true
        } else {
            false
        }
    }

    /// One explore visit. The first call enters the instance (scopes pushed,
    /// memo keys compared, children scheduled); the second exits it (scopes
    /// popped, cleanups queued). Further calls are no-ops.
    pub fn explore(&self, context: &mut TraversalContext) -> Result<(), EngineError> {
        if !self.inner.visible.get() {
            return Err(EngineError::ExploreInvisible {
                instance: self.id(),
                widget: self.widget_type().to_string(),
            });
        }
        match self.inner.explore_state.get() {
            ExploreState::Entered => {
                self.exit_explore(context);
                return Ok(());
            }
            ExploreState::Exited => return Ok(()),
            ExploreState::Unvisited => {}
        }

        let widget = Rc::clone(&self.inner.widget);
        let has_post_visit = widget.explore_cleanup.is_some()
            || widget.prepare_cleanup.is_some()
            || widget.outer_layout.is_some()
            || widget.controller.is_some();
        if has_post_visit {
            context.push_explore(self.clone());
        }
        if widget.prepare.is_some() {
            context.queue_prepare(self.clone());
        }
        if widget.cleanup.is_some() {
            context.queue_cleanup(self.clone());
        }
        self.inner.explore_state.set(ExploreState::Entered);
        self.inner.staged_values.borrow_mut().clear();
        if let Some(cache) = self.inner.children_cache.borrow_mut().as_mut() {
            cache.mark();
        }
        *self.inner.parent_options.borrow_mut() = context.parent_options().cloned();

        // widgets without a controller of their own inherit the ambient one
        if self.inner.controller.borrow().is_none() {
            let inherited = context
                .current_controller()
                .or_else(|| self.parent().and_then(|p| p.controller()));
            *self.inner.controller.borrow_mut() = inherited;
        }
        self.inner.destroy_tracked.set(false);
        if widget.controller.is_some() {
            if let Some(controller) = self.controller() {
                context.push_controller(Rc::clone(&controller));
                controller.run_explore(context, self);
                if controller.has_on_destroy() {
                    self.track_destroy();
                }
            }
        }
        if widget.on_destroy.is_some() {
            self.track_destroy();
        }

        self.inner.should_update.set(false);
        let keys_changed = self.compare_memo_keys(context.generation());
        if keys_changed {
            self.refresh_data(context);
        }
        if keys_changed || self.inner.child_state_dirty.get() || !widget.memoize {
            log::trace!(
                target: "weft::should-update",
                "{} {} (keys_changed={})",
                self.id(),
                self.widget_type(),
                keys_changed
            );
            self.mark_should_update();
        }

        if !widget.helpers.is_empty() {
            self.explore_helpers(context, &widget);
        }

        if let Some(explore) = &widget.explore {
            let data = self.data();
            explore(context, self, &data);
        }
        if let Some(hook) = &widget.on_explore {
            hook(context, self);
        }

        if widget.is_content {
            // stays false unless a placeholder adopts this instance
            self.inner.should_render_content.set(false);
            if let Some(name) = widget.put_into() {
                if let Some(hook) = context.placeholder(name) {
                    hook(self);
                }
                context.register_content(name, self.clone());
            }
        }

        if let Some(layout_widget) = &widget.outer_layout {
            self.enter_outer_layout(context, layout_widget);
        }
        Ok(())
    }

    fn exit_explore(&self, context: &mut TraversalContext) {
        let widget = Rc::clone(&self.inner.widget);
        if widget.prepare_cleanup.is_some() {
            context.queue_prepare(self.clone());
        }
        if let Some(hook) = &widget.explore_cleanup {
            hook(context, self);
        }
        if widget.outer_layout.is_some() {
            context.pop_content_scope();
        }
        if widget.controller.is_some() {
            context.pop_controller();
        }
        self.inner.explore_state.set(ExploreState::Exited);
    }

    fn compare_memo_keys(&self, generation: u64) -> bool {
        let committed = self.inner.committed.borrow();
        let keys = &committed.keys;
        let raw_changed = match (&*self.inner.raw_data.borrow(), &keys.raw_data) {
            (Some(live), Some(cached)) => !live.same(cached),
            (None, None) => false,
            _ => true,
        };
        let state_changed = match (&*self.inner.state.borrow(), &keys.state) {
            (Some(live), Some(cached)) => !live.same(cached),
            (None, None) => false,
            _ => true,
        };
        let version_changed = keys.widget_version != Some(self.inner.widget.version());
        let generation_changed = keys.generation != Some(generation);
        raw_changed || state_changed || version_changed || generation_changed
    }

    fn refresh_data(&self, context: &mut TraversalContext) {
        let raw = self.inner.raw_data.borrow().clone();
        if let Some(raw) = raw {
            *self.inner.data.borrow_mut() = Some(raw);
        }
        let widget = Rc::clone(&self.inner.widget);
        if let Some(hook) = &widget.prepare_data {
            hook(context, self);
        }
        log::trace!(
            target: "weft::process-data",
            "{} {}",
            self.id(),
            self.widget_type()
        );
    }

    /// Mark this instance and its ancestors for re-render this cycle.
    ///
    /// Widgets that embed output rendered at another tree position (content
    /// placeholders and similar hosts) call this when the embedded instance
    /// updated, so their own memoized output does not go stale.
    pub fn mark_updated(&self) {
        self.mark_should_update();
    }

    /// Walk ancestors marking them for re-render, stopping at the first one
    /// already marked.
    fn mark_should_update(&self) {
        let mut current = Some(Rc::clone(&self.inner));
        while let Some(node) = current {
            if node.should_update.replace(true) {
                break;
            }
            current = node.parent.borrow().upgrade();
        }
    }

    fn explore_helpers(&self, context: &mut TraversalContext, widget: &Rc<Widget>) {
        let mut live = HashMap::default();
        for (name, helper_widget) in &widget.helpers {
            let prefix = format!("helper-{}", name);
            let child = self.get_child(helper_widget, Some(&prefix), None);
            if child.schedule_explore_if_visible(context) {
                live.insert(name.clone(), child);
            }
        }
        *self.inner.helpers.borrow_mut() = live;
    }

    fn enter_outer_layout(&self, context: &mut TraversalContext, layout_widget: &Rc<Widget>) {
        let store = self.store();
        let layout = match self.parent() {
            Some(parent) => parent.get_child(layout_widget, None, Some(&store)),
            // a root instance hosts its own layout
            None => self.get_child(layout_widget, None, Some(&store)),
        };
        *self.inner.outer_layout.borrow_mut() = Some(layout.clone());
        self.inner.should_render_content.set(false);
        context.push_body_scope(self.clone());
        layout.schedule_explore_if_visible(context);
    }

    /// One prepare pass entry. The first call runs `prepare`; the second,
    /// queued by the explore post-visit, runs `prepare_cleanup`.
    pub fn prepare(&self, context: &mut TraversalContext) -> Result<(), EngineError> {
        if !self.inner.visible.get() {
            return Err(EngineError::PrepareInvisible {
                instance: self.id(),
                widget: self.widget_type().to_string(),
            });
        }
        let widget = Rc::clone(&self.inner.widget);
        if self.inner.prepared.replace(true) {
            if let Some(hook) = &widget.prepare_cleanup {
                hook(context, self);
            }
            return Ok(());
        }
        log::trace!(target: "weft::prepare", "{} {}", self.id(), self.widget_type());
        if let Some(hook) = &widget.prepare {
            hook(context, self);
        }
        Ok(())
    }

    /// Produce this cycle's output, reusing the committed output when the
    /// memoization keys were unchanged. Commits the comparison snapshot and
    /// sweeps the child cache.
    pub fn render(
        &self,
        context: &mut TraversalContext,
        key_prefix: Option<&str>,
    ) -> Result<RenderResult, EngineError> {
        if !self.inner.visible.get() {
            return Err(EngineError::RenderInvisible {
                instance: self.id(),
                widget: self.widget_type().to_string(),
            });
        }
        let widget = Rc::clone(&self.inner.widget);
        if widget.is_content && !self.inner.should_render_content.get() {
            // projected content renders only through its placeholder
            return Ok(RenderResult::empty());
        }
        if !self.inner.should_render_content.get() {
            let layout = self.inner.outer_layout.borrow().clone();
            if let Some(layout) = layout {
                // the layout embeds this instance's output; its memoized
                // output must not outlive ours
                if self.inner.should_update.get() {
                    layout.inner.should_update.set(true);
                }
                return layout.render(context, key_prefix);
            }
        }

        let key = match key_prefix {
            Some(prefix) => format!("{}-{}", prefix, widget.id()),
            None => widget.id().to_string(),
        };
        let cached = if widget.memoize && !self.inner.should_update.get() {
            self.inner.committed.borrow().output.clone()
        } else {
            None
        };
        let result = match cached {
            Some(result) => result,
            None => {
                log::trace!(target: "weft::render", "{} {}", self.id(), self.widget_type());
                match &widget.render {
                    Some(hook) => hook(context, self, &key)?,
                    None => RenderResult::empty(),
                }
            }
        };
        self.commit(context, &widget, &result);
        Ok(result)
    }

    fn commit(&self, context: &TraversalContext, widget: &Widget, result: &RenderResult) {
        {
            let mut committed = self.inner.committed.borrow_mut();
            committed.keys.raw_data = self.inner.raw_data.borrow().clone();
            committed.keys.state = self.inner.state.borrow().clone();
            committed.keys.widget_version = Some(widget.version());
            committed.keys.generation = Some(context.generation());
            committed.visible = true;
            if widget.memoize {
                committed.output = Some(result.clone());
            }
            let mut staged = self.inner.staged_values.borrow_mut();
            for (name, value) in staged.drain() {
                committed.values.insert(name, value);
            }
        }
        self.inner.child_state_dirty.set(false);
        self.inner.rendered.set(true);
        if let Some(cache) = self.inner.children_cache.borrow_mut().as_mut() {
            cache.sweep();
        }
    }

    /// Render the published child list, dropping empty results.
    pub fn render_children(
        &self,
        context: &mut TraversalContext,
    ) -> Result<Vec<Output>, EngineError> {
        let children = self.children();
        let mut rendered = Vec::with_capacity(children.len());
        for child in &children {
            let result = child.render(context, child.key().prefix())?;
            if !result.content.is_empty() {
                rendered.push(result.content);
            }
        }
        Ok(rendered)
    }

    /// Run the widget's cleanup hook; queued during explore, drained after
    /// render.
    pub fn cleanup(&self, context: &mut TraversalContext) {
        let widget = Rc::clone(&self.inner.widget);
        if let Some(hook) = &widget.cleanup {
            log::trace!(target: "weft::cleanup", "{} {}", self.id(), self.widget_type());
            hook(context, self);
        }
    }

    // ---- memoized custom values -----------------------------------------

    /// Stage a named value for this cycle and report whether it differs from
    /// the committed one. Staged values commit on render.
    pub fn cache(&self, name: &str, value: impl Into<Value>) -> bool {
        let value = value.into();
        let changed = {
            let committed = self.inner.committed.borrow();
            match committed.values.get(name) {
                Some(old) => !old.same(&value),
                None => true,
            }
        };
        self.inner
            .staged_values
            .borrow_mut()
            .insert(name.to_string(), value);
        changed
    }

    /// The committed value staged under `name` in an earlier cycle.
    pub fn cached(&self, name: &str) -> Option<Value> {
        self.inner.committed.borrow().values.get(name).cloned()
    }

    /// The committed render output, if this widget memoizes.
    pub fn cached_output(&self) -> Option<RenderResult> {
        self.inner.committed.borrow().output.clone()
    }

    // ---- state and property writes --------------------------------------

    /// Shallow-merge `partial` into the instance state. Writes where every
    /// field is identical to the current state are skipped entirely;
    /// otherwise ancestors are marked dirty and one batched store
    /// notification fires.
    pub fn set_state(&self, partial: Record) {
        let current = self.inner.state.borrow().clone();
        if let Some(current) = &current {
            let unchanged = partial
                .iter()
                .all(|(name, value)| current.get(name).is_some_and(|old| old.same(value)));
            if unchanged {
                return;
            }
        }
        let next = match &current {
            Some(current) => current.merged(&partial),
            None => partial,
        };
        self.apply_state(current, next);
    }

    /// Swap the whole state record. Identity-equal replacements are skipped.
    pub fn replace_state(&self, state: Record) {
        let current = self.inner.state.borrow().clone();
        if current.as_ref().is_some_and(|c| c.same(&state)) {
            return;
        }
        self.apply_state(current, state);
    }

    fn apply_state(&self, previous: Option<Record>, next: Record) {
        // the previous state becomes the comparison base for the next cycle
        self.inner.committed.borrow_mut().keys.state = previous;
        *self.inner.state.borrow_mut() = Some(next);
        let mut ancestor = self.parent();
        while let Some(node) = ancestor {
            node.inner.child_state_dirty.set(true);
            ancestor = node.parent();
        }
        let store = self.store();
        store.batch(|store| store.notify());
    }

    /// Write through a declared property. Deferred properties are routed to
    /// the session timer queue; the rest apply immediately, batched.
    /// Returns whether a write mode applied (for deferred writes: whether
    /// one was scheduled).
    pub fn set(&self, property: &str, value: impl Into<Value>) -> bool {
        let value = value.into();
        let widget = Rc::clone(&self.inner.widget);
        let spec = match widget.property(property) {
            Some(spec) => spec.clone(),
            None => return false,
        };
        if let Some(mode) = spec.defer {
            if self.inner.session.schedule_deferred(self, property, mode, value.clone()) {
                return true;
            }
        }
        self.do_set(property, &value, &spec)
    }

    /// Apply a property write immediately, ignoring any defer mode. The
    /// deferred-call adapter lands here when its deadline passes.
    pub(crate) fn do_set(&self, property: &str, value: &Value, spec: &PropertySpec) -> bool {
        let store = self.store();
        store.batch(|store| {
            if let Some(setter) = &spec.set {
                return match setter {
                    PropertySetter::Handler(f) => {
                        f(self, value);
                        true
                    }
                    PropertySetter::Method(method) => match self.resolve_method(method) {
                        Some((f, owner)) => {
                            f(&owner, std::slice::from_ref(value));
                            true
                        }
                        None => {
                            log::debug!(
                                target: "weft::set",
                                "setter method {:?} for {}.{} did not resolve",
                                method,
                                self.id(),
                                property
                            );
                            false
                        }
                    },
                };
            }
            if let Some(action) = &spec.action {
                let action = action(self, value);
                store.dispatch(action);
                return true;
            }
            if let Some(bind) = &spec.bind {
                return store.set(bind, value.clone());
            }
            false
        })
    }

    // ---- controllers and callbacks --------------------------------------

    fn resolve_method(&self, name: &str) -> Option<(ControllerMethod, Instance)> {
        let mut current = Some(self.clone());
        while let Some(at) = current {
            if let Some(controller) = at.controller() {
                if let Some(method) = controller.method(name) {
                    let owner = controller.owner().unwrap_or_else(|| at.clone());
                    return Some((method, owner));
                }
            }
            current = at.parent();
        }
        None
    }

    /// Resolve a controller method through the chain, innermost first.
    pub fn get_callback(&self, method: &str) -> Result<Callback, EngineError> {
        if self.controller().is_none() {
            return Err(EngineError::MissingController {
                method: method.to_string(),
            });
        }
        match self.resolve_method(method) {
            Some((f, owner)) => Ok(Callback { method: f, owner }),
            None => Err(EngineError::CallbackUnresolved {
                method: method.to_string(),
            }),
        }
    }

    /// Invoke a callback declared on the widget.
    pub fn invoke(&self, name: &str, args: &[Value]) -> Result<Value, EngineError> {
        let widget = Rc::clone(&self.inner.widget);
        match widget.callbacks.get(name) {
            Some(CallbackSpec::Handler(f)) => Ok(f(self, args)),
            Some(CallbackSpec::Method(method)) => {
                let callback = self.get_callback(method)?;
                Ok(callback.call(args))
            }
            None => Err(EngineError::CallbackNotInvokable {
                name: name.to_string(),
            }),
        }
    }

    /// Invokable handles for the widget's declared `on*` attributes, or
    /// `None` when it declares none at all.
    pub fn event_handlers(&self) -> Option<Vec<EventHandler>> {
        let widget = Rc::clone(&self.inner.widget);
        if widget.event_attributes.is_empty() {
            return None;
        }
        Some(
            widget
                .event_attributes
                .iter()
                .filter(|name| name.len() > 2 && name.starts_with("on"))
                .map(|name| EventHandler {
                    name: name.clone(),
                    instance: self.clone(),
                })
                .collect(),
        )
    }

    // ---- children and destruction ---------------------------------------

    /// Fetch or create the child for `widget` under this instance,
    /// rebinding a reused child to `store` or, absent one, to this
    /// instance's current store. The child is marked live for the current
    /// cycle.
    pub fn get_child(
        &self,
        widget: &Rc<Widget>,
        key_prefix: Option<&str>,
        store: Option<&Store>,
    ) -> Instance {
        let mut slot = self.inner.children_cache.borrow_mut();
        let cache = slot.get_or_insert_with(InstanceCache::default);
        cache.get_child(self, widget, key_prefix, store)
    }

    fn create_child(&self, key: InstanceKey, widget: Rc<Widget>, store: Store) -> Instance {
        let id = self.inner.session.allocate_instance_id();
        Instance::create(
            id,
            key,
            widget,
            store,
            self.inner.session.clone(),
            Rc::downgrade(&self.inner),
        )
    }

    pub(crate) fn rebind_store(&self, store: &Store) {
        let same = Store::same(&self.inner.store.borrow(), store);
        if !same {
            *self.inner.store.borrow_mut() = store.clone();
        }
    }

    /// Take on a destroy obligation and register with the parent chain so
    /// the mark-and-sweep pass can discharge it.
    pub fn track_destroy(&self) {
        if !self.inner.destroy_tracked.replace(true) {
            if let Some(parent) = self.parent() {
                parent.track_destroyable_child(self);
            }
        }
    }

    fn track_destroyable_child(&self, child: &Instance) {
        self.track_destroy();
        let mut slot = self.inner.children_cache.borrow_mut();
        let cache = slot.get_or_insert_with(InstanceCache::default);
        cache.monitor(child.key().clone(), child.clone());
    }

    pub(crate) fn is_destroy_tracked(&self) -> bool {
        self.inner.destroy_tracked.get()
    }

    /// Tear down this instance: destroy cached children, drop pending
    /// deferred writes, and discharge the destroy obligation exactly once.
    pub fn destroy(&self) {
        let cache = self.inner.children_cache.borrow_mut().take();
        if let Some(mut cache) = cache {
            cache.destroy_children();
        }
        self.inner.session.cancel_timers(self.id());
        if self.inner.destroy_tracked.replace(false) {
            log::debug!(target: "weft::destroy", "{} {}", self.id(), self.widget_type());
            let widget = Rc::clone(&self.inner.widget);
            if let Some(hook) = &widget.on_destroy {
                hook(self);
            }
            if widget.controller.is_some() {
                if let Some(controller) = self.controller() {
                    controller.run_on_destroy(self);
                }
            }
        }
    }

    /// Destroy all cached children and forget them; they will be recreated
    /// on the next explore.
    pub fn clear_children_cache(&self) {
        let cache = self.inner.children_cache.borrow_mut().take();
        if let Some(mut cache) = cache {
            cache.destroy_children();
        }
    }
}

/// A controller method resolved to its declaring instance.
#[derive(Clone)]
pub struct Callback {
    method: ControllerMethod,
    owner: Instance,
}

impl fmt::Debug for Callback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Callback({}, {})", self.owner.id(), self.owner.widget_type())
    }
}

impl Callback {
    pub fn call(&self, args: &[Value]) -> Value {
        (self.method)(&self.owner, args)
    }
}

/// An invokable handle for one declared `on*` attribute.
#[derive(Clone)]
pub struct EventHandler {
    name: String,
    instance: Instance,
}

impl EventHandler {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn emit(&self, args: &[Value]) -> Result<Value, EngineError> {
        self.instance.invoke(&self.name, args)
    }
}

/// Keyed cache of child instances with mark-and-sweep reconciliation.
///
/// `get_child` marks, `sweep` commits the marked set as the live one. The
/// monitored set holds destroy-tracked children; sweep destroys a monitored
/// child that went invisible or was replaced under its key.
#[derive(Default)]
pub(crate) struct InstanceCache {
    children: HashMap<InstanceKey, Instance>,
    marked: HashMap<InstanceKey, Instance>,
    monitored: HashMap<InstanceKey, Instance>,
}

impl InstanceCache {
    fn get_child(
        &mut self,
        owner: &Instance,
        widget: &Rc<Widget>,
        key_prefix: Option<&str>,
        store: Option<&Store>,
    ) -> Instance {
        let key = InstanceKey::new(key_prefix, widget.id());
        // children follow the owner's current store, so a reused child
        // rebinds even when the caller passes none; after a keyed reorder
        // the grandchildren would otherwise keep the old zoomed view
        let child_store = store.cloned().unwrap_or_else(|| owner.store());
        let reusable = self
            .children
            .get(&key)
            .filter(|child| Rc::ptr_eq(child.widget(), widget))
            .cloned();
        let instance = match reusable {
            Some(child) => {
                child.rebind_store(&child_store);
                child
            }
            None => {
                let child = owner.create_child(key.clone(), Rc::clone(widget), child_store);
                self.children.insert(key.clone(), child.clone());
                child
            }
        };
        self.marked.insert(key, instance.clone());
        instance
    }

    /// Begin a cycle: forget the previous mark set.
    fn mark(&mut self) {
        self.marked.clear();
    }

    /// Commit the marked set as the live children and discharge destroy
    /// obligations for monitored children that fell out or went invisible.
    fn sweep(&mut self) {
        self.children = std::mem::take(&mut self.marked);
        if self.monitored.is_empty() {
            return;
        }
        let keys: Vec<InstanceKey> = self.monitored.keys().cloned().collect();
        for key in keys {
            let monitored = match self.monitored.get(&key) {
                Some(instance) => instance.clone(),
                None => continue,
            };
            let survivor = self
                .children
                .get(&key)
                .is_some_and(|child| child.same(&monitored));
            if !survivor || !monitored.is_visible() {
                monitored.destroy();
                self.monitored.remove(&key);
                if survivor {
                    self.children.remove(&key);
                }
            }
        }
    }

    fn monitor(&mut self, key: InstanceKey, instance: Instance) {
        self.monitored.insert(key, instance);
    }

    /// Destroy everything monitored and drop all children.
    fn destroy_children(&mut self) {
        self.children.clear();
        self.marked.clear();
        for (_, monitored) in std::mem::take(&mut self.monitored) {
            monitored.destroy();
        }
    }
}
