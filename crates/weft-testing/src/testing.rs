use std::cell::Cell;
use std::rc::Rc;

use weft_core::{
    EngineError, Instance, RenderResult, Session, Store, Subscription, Value, Widget,
};
use weft_widgets::container;

/// Headless harness for exercising widget trees in tests.
///
/// `EngineTestRule` owns a store and a session and exposes helpers for
/// driving render cycles and the deferred-write clock without a host shell.
/// Store notifications are folded into a dirty flag so tests can pump the
/// session until it settles.
pub struct EngineTestRule {
    store: Store,
    session: Session,
    dirty: Rc<Cell<bool>>,
    _store_changes: Subscription,
}

impl EngineTestRule {
    pub fn new(root: Rc<Widget>, initial: Value) -> EngineTestRule {
        EngineTestRule::with_store(root, Store::new(initial))
    }

    /// Build a rule over an existing store, for tests that pre-wire a
    /// reducer or share the store with other fixtures.
    pub fn with_store(root: Rc<Widget>, store: Store) -> EngineTestRule {
        let dirty = Rc::new(Cell::new(false));
        let flag = Rc::clone(&dirty);
        let subscription = store.subscribe(move || flag.set(true));
        let session = Session::new(store.clone(), root);
        EngineTestRule {
            store,
            session,
            dirty,
            _store_changes: subscription,
        }
    }

    /// Wrap `children` in a container root.
    pub fn for_children(
        children: Vec<Rc<Widget>>,
        initial: Value,
    ) -> EngineTestRule {
        EngineTestRule::new(container(children), initial)
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// The mounted root instance.
    ///
    /// # Panics
    ///
    /// Panics when no cycle has run yet.
    pub fn root(&self) -> Instance {
        self.session
            .root()
            .expect("no root instance; run a cycle first")
    }

    pub fn run_cycle(&self) -> Result<RenderResult, EngineError> {
        self.dirty.set(false);
        self.session.run_cycle()
    }

    /// Whether a store write landed since the last `run_cycle`.
    pub fn store_changed(&self) -> bool {
        self.dirty.get()
    }

    /// Run cycles until no store notification arrives during a cycle.
    pub fn pump_until_idle(&self) -> Result<RenderResult, EngineError> {
        let mut i = 0;
        let mut last = self.run_cycle()?;
        while self.dirty.get() {
            i += 1;
            if i > 100 {
                panic!("pump_until_idle looped too many times!");
            }
            last = self.run_cycle()?;
        }
        Ok(last)
    }

    /// Advance the deferred-write clock, flush due timers and settle.
    pub fn advance_time(&self, now_ms: u64) -> Result<RenderResult, EngineError> {
        self.session.advance_time(now_ms);
        self.pump_until_idle()
    }

    /// Run one cycle and flatten the output for markup assertions.
    pub fn dump(&self) -> Result<String, EngineError> {
        Ok(self.run_cycle()?.content.dump())
    }
}
