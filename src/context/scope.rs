//! Per-execution-unit scope stack.
//!
//! # Responsibilities
//! - Hold the active trace context and contextual fields for the current unit
//! - Push on scope entry, restore the previous depth on every exit path
//! - Carry scopes across `.await` points without leaking between tasks
//!
//! # Design Decisions
//! - One stack per OS thread; guards are `!Send` so a frame can never be
//!   popped from a thread other than the one that pushed it
//! - Async work is scoped per poll: `Scoped` pushes its frame when polled and
//!   pops it before returning, so a task that migrates between workers only
//!   ever sees its own frames
//! - Guards truncate to the depth recorded at entry, which also unwinds any
//!   frame a panicking body left behind
//! - Handoff to another unit is explicit via `capture_scope()`

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::future::Future;
use std::marker::PhantomData;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use pin_project_lite::pin_project;
use thiserror::Error;

use crate::context::trace_context::TraceContext;

/// Contextual key/value fields attached to log events.
pub type Fields = BTreeMap<String, String>;

/// Errors raised by context lookups.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContextError {
    /// `current_context()` was called outside any scope.
    #[error("no trace context is active in this execution unit")]
    NoActiveContext,
}

#[derive(Debug, Clone, Default)]
struct Frame {
    context: Option<TraceContext>,
    fields: Vec<(String, String)>,
}

thread_local! {
    static STACK: RefCell<Vec<Arc<Frame>>> = const { RefCell::new(Vec::new()) };
}

/// A frame that can be entered on any unit: an optional trace context plus
/// contextual fields. Cloning is cheap.
#[derive(Debug, Clone)]
pub struct Scope {
    frame: Arc<Frame>,
}

impl Scope {
    /// A scope activating `context`.
    pub fn new(context: TraceContext) -> Self {
        Self {
            frame: Arc::new(Frame {
                context: Some(context),
                fields: Vec::new(),
            }),
        }
    }

    /// A scope that only adds fields; the enclosing context stays active.
    pub fn with_fields_only(fields: Fields) -> Self {
        Self {
            frame: Arc::new(Frame {
                context: None,
                fields: fields.into_iter().collect(),
            }),
        }
    }

    /// Add a contextual field to this scope.
    pub fn field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let frame = Arc::make_mut(&mut self.frame);
        frame.fields.push((key.into(), value.into()));
        self
    }

    pub fn context(&self) -> Option<&TraceContext> {
        self.frame.context.as_ref()
    }

    /// Push this scope on the current unit's stack until the guard drops.
    pub fn enter(&self) -> ScopeGuard {
        let depth = STACK.with(|stack| {
            let mut stack = stack.borrow_mut();
            let depth = stack.len();
            stack.push(Arc::clone(&self.frame));
            depth
        });
        ScopeGuard {
            depth,
            _unit_local: PhantomData,
        }
    }
}

/// Restores the unit's stack to its depth at entry when dropped.
#[must_use = "the scope is exited as soon as the guard is dropped"]
#[derive(Debug)]
pub struct ScopeGuard {
    depth: usize,
    _unit_local: PhantomData<*const ()>,
}

impl Drop for ScopeGuard {
    fn drop(&mut self) {
        // try_with: the thread may be tearing down its locals.
        let _ = STACK.try_with(|stack| {
            if let Ok(mut stack) = stack.try_borrow_mut() {
                stack.truncate(self.depth);
            }
        });
    }
}

/// The context active in the calling unit.
pub fn current_context() -> Result<TraceContext, ContextError> {
    STACK.with(|stack| {
        stack
            .borrow()
            .iter()
            .rev()
            .find_map(|frame| frame.context.clone())
            .ok_or(ContextError::NoActiveContext)
    })
}

/// Contextual fields of every active frame, inner frames winning on key collision.
pub fn current_fields() -> Fields {
    STACK.with(|stack| {
        let mut merged = Fields::new();
        for frame in stack.borrow().iter() {
            for (key, value) in &frame.fields {
                merged.insert(key.clone(), value.clone());
            }
        }
        merged
    })
}

/// Number of frames on the calling unit's stack.
pub fn depth() -> usize {
    STACK.with(|stack| stack.borrow().len())
}

/// Snapshot the active context and fields for handoff to another unit.
pub fn capture_scope() -> Scope {
    Scope {
        frame: Arc::new(Frame {
            context: current_context().ok(),
            fields: current_fields().into_iter().collect(),
        }),
    }
}

/// Run `body` with `context` active.
pub fn with_context<R>(context: TraceContext, body: impl FnOnce() -> R) -> R {
    let _guard = Scope::new(context).enter();
    body()
}

/// Run `body` with extra contextual fields attached.
pub fn with_fields<R>(fields: Fields, body: impl FnOnce() -> R) -> R {
    let _guard = Scope::with_fields_only(fields).enter();
    body()
}

/// Attach one field until the returned guard drops.
pub fn attach(key: impl Into<String>, value: impl Into<String>) -> ScopeGuard {
    Scope::with_fields_only(Fields::new()).field(key, value).enter()
}

pin_project! {
    /// A future that runs every poll inside a scope.
    #[must_use = "futures do nothing unless polled"]
    pub struct Scoped<F> {
        scope: Scope,
        #[pin]
        inner: F,
    }
}

impl<F: Future> Future for Scoped<F> {
    type Output = F::Output;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.project();
        let _guard = this.scope.enter();
        this.inner.poll(cx)
    }
}

/// Scope an async computation.
pub trait ScopeExt: Future + Sized {
    /// Run this future with `context` active.
    fn in_context(self, context: TraceContext) -> Scoped<Self> {
        self.in_scope(Scope::new(context))
    }

    /// Run this future inside `scope` (e.g. one taken with `capture_scope`).
    fn in_scope(self, scope: Scope) -> Scoped<Self> {
        Scoped { scope, inner: self }
    }
}

impl<F: Future> ScopeExt for F {}
