//! Onion-style middleware composition.
//!
//! Each middleware receives the [`Context`] by value plus a [`Next`] handle.
//! Calling [`Next::run`] runs the rest of the chain and resolves to the
//! context once everything downstream has settled, so code after the
//! `.await` runs on the way back out. Returning without calling `next`
//! short-circuits the chain.
//!
//! Because `Next` is consumed by `run`, a middleware cannot invoke the rest
//! of the chain twice.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use super::context::Context;
use super::error::PipelineError;
use crate::event::BoxFuture;

/// Outcome of a pipeline (or any suffix of one).
pub type PipelineResult = Result<Context, PipelineError>;

/// A unit of the request pipeline.
pub trait Middleware: Send + Sync + 'static {
    /// Handle `ctx`, optionally delegating to the rest of the chain.
    fn call(&self, ctx: Context, next: Next) -> BoxFuture<'static, PipelineResult>;
}

impl<F, Fut> Middleware for F
where
    F: Fn(Context, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = PipelineResult> + Send + 'static,
{
    fn call(&self, ctx: Context, next: Next) -> BoxFuture<'static, PipelineResult> {
        Box::pin((self)(ctx, next))
    }
}

/// The remainder of a composed chain.
pub struct Next {
    chain: Arc<[Arc<dyn Middleware>]>,
    index: usize,
}

impl Next {
    /// Run the remaining middleware. Past the end this resolves to `ctx`.
    pub fn run(self, ctx: Context) -> BoxFuture<'static, PipelineResult> {
        match self.chain.get(self.index).cloned() {
            Some(current) => {
                let next = Next {
                    chain: self.chain,
                    index: self.index + 1,
                };
                current.call(ctx, next)
            }
            None => Box::pin(async move { Ok(ctx) }),
        }
    }

    /// Number of middleware still to run.
    pub fn remaining(&self) -> usize {
        self.chain.len().saturating_sub(self.index)
    }
}

impl fmt::Debug for Next {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Next")
            .field("index", &self.index)
            .field("len", &self.chain.len())
            .finish()
    }
}

/// A frozen middleware chain.
#[derive(Clone)]
pub struct Composed {
    chain: Arc<[Arc<dyn Middleware>]>,
}

impl Composed {
    /// Run the chain against `ctx`.
    pub fn run(&self, ctx: Context) -> BoxFuture<'static, PipelineResult> {
        Next {
            chain: Arc::clone(&self.chain),
            index: 0,
        }
        .run(ctx)
    }

    pub fn len(&self) -> usize {
        self.chain.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chain.is_empty()
    }
}

impl fmt::Debug for Composed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Composed")
            .field("len", &self.chain.len())
            .finish()
    }
}

/// Freeze a list of middleware into a runnable chain.
pub fn compose(middleware: &[Arc<dyn Middleware>]) -> Composed {
    Composed {
        chain: middleware.iter().cloned().collect(),
    }
}
