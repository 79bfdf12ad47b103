//! Stock widget constructors built on top of the weft engine core.

mod container;
mod content;
mod element;
mod layout;
mod repeater;
mod text;

pub use container::container;
pub use content::{body_placeholder, content_placeholder};
pub use element::{element, ElementBuilder};
pub use layout::frame_layout;
pub use repeater::{repeater, repeater_keyed};
pub use text::{label, text};
