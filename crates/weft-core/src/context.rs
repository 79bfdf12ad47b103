//! Per-cycle traversal state.
//!
//! A fresh context is created for every pipeline cycle. It carries the
//! explore worklist, the prepare and cleanup queues, and the scoped ambient
//! values: the active controller chain, the content registrations for
//! projection, placeholder rendezvous hooks and parent layout options.
//! Scopes are pushed on an instance's first explore visit and popped on its
//! post-visit, so they frame exactly the instance's subtree.

use std::rc::Rc;

use smallvec::SmallVec;

use crate::collections::map::HashMap;
use crate::controller::Controller;
use crate::instance::Instance;
use crate::value::Value;

/// Hook fired when content arrives for an already-explored placeholder.
pub type ContentHook = Rc<dyn Fn(&Instance)>;

/// Slot name an outer layout publishes its wrapped instance under.
pub const BODY_SLOT: &str = "body";

type ContentMap = HashMap<String, Instance>;

pub struct TraversalContext {
    generation: u64,
    pub(crate) explore_stack: Vec<Instance>,
    pub(crate) prepare_list: Vec<Instance>,
    pub(crate) cleanup_list: Vec<Instance>,
    controller_scope: SmallVec<[Rc<Controller>; 8]>,
    content_scope: SmallVec<[ContentMap; 4]>,
    placeholders: HashMap<String, ContentHook>,
    parent_options: Option<Value>,
}

impl TraversalContext {
    /// A fresh context for one cycle under the given cache generation.
    /// Sessions build one per cycle; drivers may build their own to run a
    /// phase against a single instance.
    pub fn new(generation: u64) -> TraversalContext {
        let mut content_scope = SmallVec::new();
        content_scope.push(ContentMap::default());
        TraversalContext {
            generation,
            explore_stack: Vec::new(),
            prepare_list: Vec::new(),
            cleanup_list: Vec::new(),
            controller_scope: SmallVec::new(),
            content_scope,
            placeholders: HashMap::default(),
            parent_options: None,
        }
    }

    /// The cache generation this cycle runs under.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub(crate) fn push_explore(&mut self, instance: Instance) {
        self.explore_stack.push(instance);
    }

    pub(crate) fn queue_prepare(&mut self, instance: Instance) {
        self.prepare_list.push(instance);
    }

    pub(crate) fn queue_cleanup(&mut self, instance: Instance) {
        self.cleanup_list.push(instance);
    }

    pub(crate) fn push_controller(&mut self, controller: Rc<Controller>) {
        self.controller_scope.push(controller);
    }

    pub(crate) fn pop_controller(&mut self) {
        self.controller_scope.pop();
    }

    /// The innermost controller in scope, inherited by explored instances
    /// that declare none of their own.
    pub fn current_controller(&self) -> Option<Rc<Controller>> {
        self.controller_scope.last().cloned()
    }

    /// Open a content scope framing an outer-layout subtree: the enclosing
    /// registrations carry over, with `body` bound to the wrapped instance.
    /// Content registered outside the layout stays adoptable inside it.
    pub(crate) fn push_body_scope(&mut self, body: Instance) {
        let mut map = self.current_content().clone();
        map.insert(BODY_SLOT.to_string(), body);
        self.content_scope.push(map);
    }

    pub(crate) fn pop_content_scope(&mut self) {
        // the root map stays; scopes above it frame outer-layout subtrees
        if self.content_scope.len() > 1 {
            self.content_scope.pop();
        }
    }

    pub(crate) fn current_content(&self) -> &ContentMap {
        // a root map is installed at construction and never popped
        self.content_scope.last().expect("content scope missing root map")
    }

    pub(crate) fn register_content(&mut self, name: &str, instance: Instance) {
        if let Some(map) = self.content_scope.last_mut() {
            map.insert(name.to_string(), instance);
        }
    }

    /// Content registered under `name` in the current scope, if any.
    pub fn content(&self, name: &str) -> Option<Instance> {
        self.current_content().get(name).cloned()
    }

    /// Register a rendezvous hook fired if content for `name` registers
    /// later this cycle. Last registration per name wins.
    pub fn register_placeholder(&mut self, name: impl Into<String>, hook: ContentHook) {
        self.placeholders.insert(name.into(), hook);
    }

    pub(crate) fn placeholder(&self, name: &str) -> Option<ContentHook> {
        self.placeholders.get(name).cloned()
    }

    /// Ambient layout options snapshotted by instances as they explore.
    pub fn parent_options(&self) -> Option<&Value> {
        self.parent_options.as_ref()
    }

    /// Replace the ambient layout options, returning the previous value so
    /// callers can restore it in their cleanup hook.
    pub fn set_parent_options(&mut self, options: Option<Value>) -> Option<Value> {
        std::mem::replace(&mut self.parent_options, options)
    }
}
