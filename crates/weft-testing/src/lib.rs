//! Headless testing harness and probe widgets for the weft engine.

mod probe;
mod testing;

pub use probe::{probe, ProbeBuilder, ProbeEvent, ProbeLog, ProbePhase};
pub use testing::EngineTestRule;
