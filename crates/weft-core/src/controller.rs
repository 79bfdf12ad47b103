//! Behavior units attached to widget subtrees.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use crate::collections::map::HashMap;
use crate::context::TraversalContext;
use crate::instance::{Instance, InstanceInner};
use crate::store::Store;
use crate::value::Value;
use crate::widget::Widget;

pub type ControllerMethod = Rc<dyn Fn(&Instance, &[Value]) -> Value>;
pub type ControllerFactory = Rc<dyn Fn(&ControllerInit<'_>) -> Controller>;

/// Construction context a widget's controller factory receives.
pub struct ControllerInit<'a> {
    pub widget: &'a Rc<Widget>,
    pub instance: &'a Instance,
    pub store: &'a Store,
}

/// A controller created by the declaring instance and inherited by its
/// subtree through the traversal context.
///
/// Named methods are what `invoke`/`get_callback` resolve against, walking
/// the instance chain innermost-first. Methods run against the declaring
/// instance, not the invoking one.
pub struct Controller {
    explore: Option<Rc<dyn Fn(&mut TraversalContext, &Instance)>>,
    on_destroy: Option<Rc<dyn Fn(&Instance)>>,
    methods: HashMap<String, ControllerMethod>,
    owner: RefCell<Weak<InstanceInner>>,
}

impl Controller {
    pub fn builder() -> ControllerBuilder {
        ControllerBuilder {
            explore: None,
            on_destroy: None,
            methods: HashMap::default(),
        }
    }

    pub fn method(&self, name: &str) -> Option<ControllerMethod> {
        self.methods.get(name).cloned()
    }

    pub(crate) fn has_on_destroy(&self) -> bool {
        self.on_destroy.is_some()
    }

    pub(crate) fn bind_owner(&self, instance: &Instance) {
        *self.owner.borrow_mut() = instance.downgrade();
    }

    pub(crate) fn owner(&self) -> Option<Instance> {
        self.owner.borrow().upgrade().map(Instance::from_inner)
    }

    pub(crate) fn run_explore(&self, context: &mut TraversalContext, instance: &Instance) {
        if let Some(explore) = &self.explore {
            explore(context, instance);
        }
    }

    pub(crate) fn run_on_destroy(&self, instance: &Instance) {
        if let Some(on_destroy) = &self.on_destroy {
            on_destroy(instance);
        }
    }
}

pub struct ControllerBuilder {
    explore: Option<Rc<dyn Fn(&mut TraversalContext, &Instance)>>,
    on_destroy: Option<Rc<dyn Fn(&Instance)>>,
    methods: HashMap<String, ControllerMethod>,
}

impl ControllerBuilder {
    /// Hook run during the declaring instance's explore, before its children.
    pub fn on_explore(mut self, f: impl Fn(&mut TraversalContext, &Instance) + 'static) -> Self {
        self.explore = Some(Rc::new(f));
        self
    }

    /// Teardown hook; registering one makes the declaring instance carry a
    /// destroy obligation.
    pub fn on_destroy(mut self, f: impl Fn(&Instance) + 'static) -> Self {
        self.on_destroy = Some(Rc::new(f));
        self
    }

    /// Register a named method resolvable through the controller chain.
    pub fn method(
        mut self,
        name: impl Into<String>,
        f: impl Fn(&Instance, &[Value]) -> Value + 'static,
    ) -> Self {
        self.methods.insert(name.into(), Rc::new(f));
        self
    }

    pub fn build(self) -> Controller {
        Controller {
            explore: self.explore,
            on_destroy: self.on_destroy,
            methods: self.methods,
            owner: RefCell::new(Weak::new()),
        }
    }
}
