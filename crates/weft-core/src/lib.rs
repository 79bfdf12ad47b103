#![doc = r"Retained-mode widget tree engine.

Widgets are shared immutable descriptors; per-mount state lives in an
instance tree reconciled against an external data store. Each cycle runs the
four-phase pipeline (visibility check, explore, prepare, render, plus a
trailing cleanup pass) with reference-identity memoization and
mark-and-sweep child caching. See the `session` module for the driver
surface."]

pub mod collections;
pub mod context;
pub mod controller;
pub mod defer;
pub mod error;
pub mod instance;
pub mod output;
pub mod record;
pub mod selector;
pub mod session;
pub mod store;
pub mod value;
pub mod widget;

pub use context::{ContentHook, TraversalContext, BODY_SLOT};
pub use controller::{
    Controller, ControllerBuilder, ControllerFactory, ControllerInit, ControllerMethod,
};
pub use defer::DeferMode;
pub use error::EngineError;
pub use instance::{
    Callback, EventHandler, ExploreState, Instance, InstanceId, InstanceKey,
};
pub use output::{ElementNode, Output, RenderResult};
pub use record::{Record, RecordBuilder};
pub use selector::{Binding, BoundSelector, ComputeFn, SelectorSpec, VISIBLE_FIELD};
pub use session::{Session, SessionHandle};
pub use store::{batch_updates, Reducer, Store, Subscription};
pub use value::{Path, PathSeg, Value};
pub use widget::{
    CallbackSpec, PropertySetter, PropertySpec, Widget, WidgetBuilder, WidgetId,
};

#[cfg(test)]
#[path = "tests/value_tests.rs"]
mod value_tests;

#[cfg(test)]
#[path = "tests/store_tests.rs"]
mod store_tests;

#[cfg(test)]
#[path = "tests/selector_tests.rs"]
mod selector_tests;
