//! Storage for middleware and context extensions.

use std::sync::Arc;

use super::context::{Context, ContextExtension};
use super::middleware::{compose, Composed, Middleware};

/// Ordered middleware plus the extensions applied to each new context.
///
/// The socket composes a fresh chain per dispatch, so middleware added
/// while a request is in flight only affects later requests.
#[derive(Default, Clone)]
pub struct PipelineRegistry {
    middleware: Vec<Arc<dyn Middleware>>,
    extensions: Vec<ContextExtension>,
}

impl PipelineRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a middleware.
    pub fn push<M: Middleware>(&mut self, middleware: M) {
        self.middleware.push(Arc::new(middleware));
    }

    /// Append an already shared middleware.
    pub fn push_arc(&mut self, middleware: Arc<dyn Middleware>) {
        self.middleware.push(middleware);
    }

    /// Register a context extension.
    pub fn extend<F>(&mut self, decorate: F)
    where
        F: Fn(&mut Context) + Send + Sync + 'static,
    {
        self.extensions.push(Arc::new(decorate));
    }

    /// Snapshot the current chain.
    pub fn compose(&self) -> Composed {
        compose(&self.middleware)
    }

    /// Registered extensions.
    pub fn extensions(&self) -> &[ContextExtension] {
        &self.extensions
    }

    /// Number of middleware.
    pub fn len(&self) -> usize {
        self.middleware.len()
    }

    pub fn is_empty(&self) -> bool {
        self.middleware.is_empty()
    }
}

impl std::fmt::Debug for PipelineRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineRegistry")
            .field("middleware", &self.middleware.len())
            .field("extensions", &self.extensions.len())
            .finish()
    }
}
