//! The external data store the widget tree binds against.
//!
//! Deliberately small: a single root [`Value`], persistent path writes,
//! subscriber notification with batching, and an optional reducer for
//! dispatched actions. [`Store`] handles are cheap to clone; [`Store::zoom`]
//! produces a view over a subtree sharing the same backing data, which is how
//! list projections hand each child its own record scope.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use crate::value::{Path, Value};

pub type Reducer = Rc<dyn Fn(&Value, &Value) -> Value>;

struct Subscriber {
    id: u64,
    callback: Rc<dyn Fn()>,
}

struct StoreInner {
    data: RefCell<Value>,
    reducer: Option<Reducer>,
    subscribers: RefCell<Vec<Subscriber>>,
    next_subscriber: Cell<u64>,
    batch_depth: Cell<u32>,
    dirty: Cell<bool>,
    version: Cell<u64>,
}

/// Cheap-clone handle to a store, optionally scoped to a subtree.
#[derive(Clone)]
pub struct Store {
    inner: Rc<StoreInner>,
    base: Path,
}

impl Store {
    pub fn new(initial: Value) -> Store {
        Store::build(initial, None)
    }

    /// A store whose [`Store::dispatch`] routes actions through `reducer`,
    /// mapping `(root, action)` to the next root.
    pub fn with_reducer(
        initial: Value,
        reducer: impl Fn(&Value, &Value) -> Value + 'static,
    ) -> Store {
        Store::build(initial, Some(Rc::new(reducer)))
    }

    fn build(initial: Value, reducer: Option<Reducer>) -> Store {
        Store {
            inner: Rc::new(StoreInner {
                data: RefCell::new(initial),
                reducer,
                subscribers: RefCell::new(Vec::new()),
                next_subscriber: Cell::new(1),
                batch_depth: Cell::new(0),
                dirty: Cell::new(false),
                version: Cell::new(0),
            }),
            base: Path::root(),
        }
    }

    /// Same backing store and same view scope.
    pub fn same(a: &Store, b: &Store) -> bool {
        Rc::ptr_eq(&a.inner, &b.inner) && a.base == b.base
    }

    /// A view over the subtree at `path`, sharing the backing data.
    pub fn zoom(&self, path: impl Into<Path>) -> Store {
        Store {
            inner: Rc::clone(&self.inner),
            base: self.base.join(&path.into()),
        }
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    /// Bumped once per applied change; handy for drivers and tests.
    pub fn version(&self) -> u64 {
        self.inner.version.get()
    }

    /// Snapshot of this view's data (the whole root for an unscoped store).
    pub fn get_data(&self) -> Value {
        let data = self.inner.data.borrow();
        if self.base.is_root() {
            data.clone()
        } else {
            data.get_path(&self.base).cloned().unwrap_or(Value::Null)
        }
    }

    /// Read a value relative to this view. Absent paths yield `Null`.
    pub fn get(&self, path: impl Into<Path>) -> Value {
        let abs = self.base.join(&path.into());
        self.inner
            .data
            .borrow()
            .get_path(&abs)
            .cloned()
            .unwrap_or(Value::Null)
    }

    /// Write a value relative to this view. Returns whether anything changed;
    /// unchanged writes neither bump the version nor notify.
    pub fn set(&self, path: impl Into<Path>, value: impl Into<Value>) -> bool {
        let abs = self.base.join(&path.into());
        let next = {
            let data = self.inner.data.borrow();
            data.with_path_set(&abs, value.into())
        };
        match next {
            Some(next) => {
                *self.inner.data.borrow_mut() = next;
                let version = self.inner.version.get() + 1;
                self.inner.version.set(version);
                log::trace!(target: "weft::store", "set {} (version {})", abs, version);
                self.notify();
                true
            }
            None => false,
        }
    }

    /// Route an action through the reducer. Always applies at the store
    /// root, also for zoomed views. Stores without a reducer warn and ignore.
    pub fn dispatch(&self, action: Value) {
        let reducer = match &self.inner.reducer {
            Some(reducer) => Rc::clone(reducer),
            None => {
                log::warn!(
                    target: "weft::store",
                    "action dispatched to a store without a reducer, ignored"
                );
                return;
            }
        };
        let current = self.inner.data.borrow().clone();
        let next = reducer(&current, &action);
        if !next.same(&current) {
            *self.inner.data.borrow_mut() = next;
            let version = self.inner.version.get() + 1;
            self.inner.version.set(version);
            log::trace!(target: "weft::store", "dispatch applied (version {})", version);
            self.notify();
        }
    }

    /// Run subscribers, or mark the store dirty inside a batch scope.
    pub fn notify(&self) {
        if self.inner.batch_depth.get() > 0 {
            self.inner.dirty.set(true);
        } else {
            self.run_subscribers();
        }
    }

    fn run_subscribers(&self) {
        // clone out first so subscribers may subscribe or unsubscribe freely
        let callbacks: Vec<Rc<dyn Fn()>> = self
            .inner
            .subscribers
            .borrow()
            .iter()
            .map(|s| Rc::clone(&s.callback))
            .collect();
        for callback in callbacks {
            callback();
        }
    }

    /// Register a change listener. Dropping the returned guard unsubscribes.
    pub fn subscribe(&self, callback: impl Fn() + 'static) -> Subscription {
        let id = self.inner.next_subscriber.get();
        self.inner.next_subscriber.set(id + 1);
        self.inner.subscribers.borrow_mut().push(Subscriber {
            id,
            callback: Rc::new(callback),
        });
        Subscription {
            inner: Rc::downgrade(&self.inner),
            id,
        }
    }

    /// Suppress notifications for the duration of `f`; at most one fires when
    /// the outermost scope exits. Scopes nest.
    pub fn batch<R>(&self, f: impl FnOnce(&Store) -> R) -> R {
        self.inner.batch_depth.set(self.inner.batch_depth.get() + 1);
        let result = f(self);
        let depth = self.inner.batch_depth.get() - 1;
        self.inner.batch_depth.set(depth);
        if depth == 0 && self.inner.dirty.replace(false) {
            self.run_subscribers();
        }
        result
    }
}

/// Batch changes across `store`, coalescing notifications into one.
pub fn batch_updates<R>(store: &Store, f: impl FnOnce(&Store) -> R) -> R {
    store.batch(f)
}

/// Guard that removes the subscriber on drop.
#[must_use = "Subscription unsubscribes on drop"]
pub struct Subscription {
    inner: Weak<StoreInner>,
    id: u64,
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(inner) = self.inner.upgrade() {
            inner.subscribers.borrow_mut().retain(|s| s.id != self.id);
        }
    }
}
