//! The driver-facing owner of one widget tree.
//!
//! A [`Session`] ties a root widget to a store and owns everything that must
//! outlive individual cycles: the root instance, the instance-id counter,
//! the cache generation, the driver clock and the deferred-write timer
//! queue. Instances carry a [`SessionHandle`] (a weak back-reference), so
//! ownership still points strictly downward.
//!
//! The engine schedules nothing itself. The driver calls
//! [`Session::run_cycle`] after store notifications and feeds time through
//! [`Session::advance_time`].

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use crate::context::TraversalContext;
use crate::defer::{DeferMode, TimerQueue};
use crate::error::EngineError;
use crate::instance::{Instance, InstanceId, InstanceKey};
use crate::output::RenderResult;
use crate::store::Store;
use crate::value::Value;
use crate::widget::Widget;

pub(crate) struct SessionInner {
    store: Store,
    root_widget: Rc<Widget>,
    root: RefCell<Option<Instance>>,
    next_instance_id: Cell<u64>,
    generation: Cell<u64>,
    now_ms: Cell<u64>,
    timers: RefCell<TimerQueue>,
}

impl SessionInner {
    fn allocate_instance_id(&self) -> InstanceId {
        let id = self.next_instance_id.get();
        self.next_instance_id.set(id + 1);
        InstanceId(id)
    }
}

pub struct Session {
    inner: Rc<SessionInner>,
}

impl Session {
    pub fn new(store: Store, root_widget: Rc<Widget>) -> Session {
        Session {
            inner: Rc::new(SessionInner {
                store,
                root_widget,
                root: RefCell::new(None),
                next_instance_id: Cell::new(1000),
                generation: Cell::new(1),
                now_ms: Cell::new(0),
                timers: RefCell::new(TimerQueue::default()),
            }),
        }
    }

    pub fn handle(&self) -> SessionHandle {
        SessionHandle {
            inner: Rc::downgrade(&self.inner),
        }
    }

    pub fn store(&self) -> Store {
        self.inner.store.clone()
    }

    /// The root instance, if a cycle has run.
    pub fn root(&self) -> Option<Instance> {
        self.inner.root.borrow().clone()
    }

    pub fn generation(&self) -> u64 {
        self.inner.generation.get()
    }

    /// Invalidate every memoized output; the next cycle re-renders the whole
    /// tree.
    pub fn bump_cache_generation(&self) -> u64 {
        let next = self.inner.generation.get() + 1;
        self.inner.generation.set(next);
        log::debug!(target: "weft::session", "cache generation bumped to {}", next);
        next
    }

    /// Run one full pipeline cycle and return the root output.
    ///
    /// Phases run to completion in order: visibility check and explore over
    /// the worklist, the prepare queue, the render pull from the root, then
    /// the cleanup queue. A contract violation aborts the cycle. An
    /// invisible root yields an empty result.
    pub fn run_cycle(&self) -> Result<RenderResult, EngineError> {
        let root = {
            let mut slot = self.inner.root.borrow_mut();
            slot.get_or_insert_with(|| {
                Instance::create(
                    self.inner.allocate_instance_id(),
                    InstanceKey::new(None, self.inner.root_widget.id()),
                    Rc::clone(&self.inner.root_widget),
                    self.inner.store.clone(),
                    self.handle(),
                    Weak::new(),
                )
            })
            .clone()
        };
        let mut context = TraversalContext::new(self.inner.generation.get());
        log::trace!(
            target: "weft::session",
            "cycle begin (generation {})",
            context.generation()
        );
        if !root.schedule_explore_if_visible(&mut context) {
            return Ok(RenderResult::empty());
        }
        while let Some(instance) = context.explore_stack.pop() {
            instance.explore(&mut context)?;
        }
        // hooks may append while these queues drain
        let mut index = 0;
        while index < context.prepare_list.len() {
            let instance = context.prepare_list[index].clone();
            instance.prepare(&mut context)?;
            index += 1;
        }
        let output = root.render(&mut context, None)?;
        let mut index = 0;
        while index < context.cleanup_list.len() {
            let instance = context.cleanup_list[index].clone();
            instance.cleanup(&mut context);
            index += 1;
        }
        Ok(output)
    }

    pub fn now_ms(&self) -> u64 {
        self.inner.now_ms.get()
    }

    /// Move the driver clock forward and fire due deferred writes, batched
    /// into at most one store notification. Non-monotonic times are ignored.
    pub fn advance_time(&self, now_ms: u64) {
        if now_ms < self.inner.now_ms.get() {
            log::debug!(
                target: "weft::session",
                "clock moved backwards ({} < {}), ignored",
                now_ms,
                self.inner.now_ms.get()
            );
            return;
        }
        self.inner.now_ms.set(now_ms);
        let due = self.inner.timers.borrow_mut().take_due(now_ms);
        if due.is_empty() {
            return;
        }
        self.inner.store.batch(|_| {
            for (instance, property, value) in due {
                let widget = Rc::clone(instance.widget());
                if let Some(spec) = widget.property(&property) {
                    instance.do_set(&property, &value, spec);
                }
            }
        });
    }

    pub fn has_pending_timers(&self) -> bool {
        !self.inner.timers.borrow().is_empty()
    }

    /// Earliest pending deferred-write deadline.
    pub fn next_timer_due(&self) -> Option<u64> {
        self.inner.timers.borrow().next_due()
    }

    /// Tear down the tree, discharging destroy obligations.
    pub fn destroy(&self) {
        let root = self.inner.root.borrow_mut().take();
        if let Some(root) = root {
            root.destroy();
        }
    }
}

/// Weak back-reference to a session, carried by every instance.
#[derive(Clone)]
pub struct SessionHandle {
    inner: Weak<SessionInner>,
}

impl SessionHandle {
    pub(crate) fn allocate_instance_id(&self) -> InstanceId {
        match self.inner.upgrade() {
            Some(inner) => inner.allocate_instance_id(),
            None => {
                log::debug!(
                    target: "weft::session",
                    "instance created after session teardown"
                );
                InstanceId(0)
            }
        }
    }

    pub(crate) fn schedule_deferred(
        &self,
        owner: &Instance,
        property: &str,
        mode: DeferMode,
        value: Value,
    ) -> bool {
        match self.inner.upgrade() {
            Some(inner) => {
                let now = inner.now_ms.get();
                inner
                    .timers
                    .borrow_mut()
                    .schedule(owner, property, mode, value, now);
                true
            }
            None => false,
        }
    }

    pub(crate) fn cancel_timers(&self, owner: InstanceId) {
        if let Some(inner) = self.inner.upgrade() {
            inner.timers.borrow_mut().cancel_owner(owner);
        }
    }
}
