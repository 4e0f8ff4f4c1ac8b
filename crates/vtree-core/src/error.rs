use std::fmt;
use std::sync::Arc;

use crate::suspense::Pending;

/// Error value produced by user code: render functions, lifecycle methods and
/// ref callbacks. Cheap to clone so boundaries can keep a copy in state.
#[derive(Clone, Debug, thiserror::Error)]
pub enum ComponentError {
    #[error("{0}")]
    Message(String),
    #[error("{0}")]
    Source(Arc<dyn std::error::Error + Send + Sync>),
}

impl ComponentError {
    pub fn msg(message: impl Into<String>) -> Self {
        ComponentError::Message(message.into())
    }

    pub fn from_error(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        ComponentError::Source(Arc::new(err))
    }
}

impl From<String> for ComponentError {
    fn from(s: String) -> Self {
        ComponentError::Message(s)
    }
}

impl From<&str> for ComponentError {
    fn from(s: &str) -> Self {
        ComponentError::Message(s.to_string())
    }
}

/// What travels up the ancestor chain when a subtree cannot produce output.
#[derive(Clone)]
pub enum Thrown {
    Error(ComponentError),
    /// Not a failure: the subtree is waiting on `Pending` and a fallback
    /// boundary should take over until it resolves.
    Pending(Pending),
}

impl Thrown {
    pub fn is_pending(&self) -> bool {
        matches!(self, Thrown::Pending(_))
    }

    pub fn error(&self) -> Option<&ComponentError> {
        match self {
            Thrown::Error(e) => Some(e),
            Thrown::Pending(_) => None,
        }
    }
}

impl fmt::Debug for Thrown {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Thrown::Error(e) => f.debug_tuple("Error").field(e).finish(),
            Thrown::Pending(p) => f.debug_tuple("Pending").field(&p.id()).finish(),
        }
    }
}

impl From<ComponentError> for Thrown {
    fn from(e: ComponentError) -> Self {
        Thrown::Error(e)
    }
}

/// Extra information handed to `did_catch`.
#[derive(Clone, Debug, Default)]
pub struct ErrorInfo {
    /// Component names from the boundary outward, innermost first.
    pub component_stack: String,
}

/// Errors surfaced to whoever called into the renderer.
#[derive(Clone, Debug, thiserror::Error)]
pub enum RenderError {
    #[error("unhandled component error: {error}\n  at {component_stack}")]
    Unhandled {
        error: ComponentError,
        component_stack: String,
    },
    #[error("a component suspended but no ancestor renders fallback content")]
    UnhandledSuspend,
    #[error("renderer is busy; re-entrant {0} rejected")]
    Busy(&'static str),
}

impl RenderError {
    pub(crate) fn from_thrown(thrown: Thrown, component_stack: String) -> Self {
        match thrown {
            Thrown::Error(error) => RenderError::Unhandled {
                error,
                component_stack,
            },
            Thrown::Pending(_) => RenderError::UnhandledSuspend,
        }
    }
}
