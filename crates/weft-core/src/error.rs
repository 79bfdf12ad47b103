use std::fmt;

use crate::instance::InstanceId;

/// Contract violations surfaced by the engine.
///
/// Everything here means the caller broke the pipeline contract; expected
/// absences (a missing hook, helper or content) are skipped silently and
/// never reach this type. A violation aborts the current cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// `explore` was driven into an invisible instance.
    ExploreInvisible { instance: InstanceId, widget: String },
    /// `prepare` was driven into an invisible instance.
    PrepareInvisible { instance: InstanceId, widget: String },
    /// `render` was requested for an invisible instance.
    RenderInvisible { instance: InstanceId, widget: String },
    /// A controller method was invoked with no controller assigned.
    MissingController { method: String },
    /// No controller in the chain defines the invoked method.
    CallbackUnresolved { method: String },
    /// The widget declares no callback under this name.
    CallbackNotInvokable { name: String },
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::ExploreInvisible { instance, widget } => {
                write!(f, "explore called on invisible instance {} ({})", instance, widget)
            }
            EngineError::PrepareInvisible { instance, widget } => {
                write!(f, "prepare called on invisible instance {} ({})", instance, widget)
            }
            EngineError::RenderInvisible { instance, widget } => {
                write!(f, "render called on invisible instance {} ({})", instance, widget)
            }
            EngineError::MissingController { method } => write!(
                f,
                "cannot invoke controller method {:?} with no controller assigned to the widget",
                method
            ),
            EngineError::CallbackUnresolved { method } => write!(
                f,
                "controller method {:?} not found in any of the assigned controllers",
                method
            ),
            EngineError::CallbackNotInvokable { name } => {
                write!(f, "callback {:?} is not declared by the widget", name)
            }
        }
    }
}

impl std::error::Error for EngineError {}
