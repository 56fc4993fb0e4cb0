//! The pluggable routing unit — declaration, composition, and dispatch.
//!
//! A [`Plug`] owns a path prefix, a list of bound operations (route template →
//! async operation), and a list of error-handler bindings (error code → async
//! operation). Plugs compose: [`Plug::mount`] embeds an already-built child,
//! re-prefixing every one of its flattened routes under the parent's prefix.
//! A whole application is one tree of plugs, flattened at construction time
//! into an ordered route list.
//!
//! Routes are matched in declaration order against the full request path; the
//! first match wins — there is no specificity ranking, so declaration order is
//! part of the routing contract. Matching is anchored to the whole path, and
//! captured values from `{name:(pattern)}` segments are handed to the
//! operation as [`UrlParams`].
//!
//! ```rust
//! use plugweb::http::Response;
//! use plugweb::route::{Plug, UrlParams};
//!
//! # fn build() -> Result<Plug, plugweb::route::RouteError> {
//! let details = Plug::new("details")
//!     .bind("get/{id:([0-9]+)}", |params: UrlParams| async move {
//!         let id = params.get("id").unwrap_or("?").to_owned();
//!         Ok(Response::html(format!("chosen id: {id}")))
//!     })?;
//!
//! let scope = Plug::new("scope")
//!     .bind("get", || async { Ok(Response::html("scope index")) })?
//!     .mount(details)?;
//!
//! Plug::root().mount(scope)
//! # }
//! ```

use std::pin::Pin;
use std::sync::Arc;

use thiserror::Error;
use tracing::debug;

use crate::http::Response;

pub mod pattern;

pub use pattern::{RouteError, RoutePattern, UrlParams};

use pattern::{join, trim_prefix};

/// A failure raised by application-level operation logic.
///
/// The routing engine never catches these — they propagate untouched to the
/// server boundary, which classifies them against the vhost's registered
/// error handlers (`NotFound` → the 404 handler, `Forbidden` → 403,
/// `Failure` → 500) or turns them into redirect responses.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("resource not found")]
    NotFound,

    #[error("access forbidden")]
    Forbidden,

    #[error("redirect to {to}")]
    Redirect { to: String, permanent: bool },

    #[error("{0}")]
    Failure(String),
}

/// Boxed future returned by a bound operation.
pub type OperationFuture = Pin<Box<dyn Future<Output = Result<Response, HandlerError>> + Send>>;

/// Type-erased, heap-allocated async operation bound to a route.
///
/// Operations are stored behind `Arc<dyn Fn(…)>` so the flattened route list
/// can be cloned across mounts and shared between request tasks. You never
/// construct this type directly — [`Plug::bind`] accepts any async function
/// taking either no argument or one [`UrlParams`] argument.
pub type Operation = Arc<dyn Fn(UrlParams) -> OperationFuture + Send + Sync + 'static>;

/// Boxed future returned by an error-handling operation.
pub type ErrorFuture = Pin<Box<dyn Future<Output = Response> + Send>>;

/// Type-erased async operation bound to an error code. Error operations take
/// no arguments and must produce a response.
pub type ErrorOperation = Arc<dyn Fn() -> ErrorFuture + Send + Sync + 'static>;

/// Conversion trait for route-bindable async functions.
///
/// Two arities are accepted, selected statically by the `Args` marker:
///
/// - `Fn() -> impl Future<Output = Result<Response, HandlerError>>` — for
///   templates without captures; the operation is invoked with no arguments.
/// - `Fn(UrlParams) -> impl Future<…>` — the operation receives the capture
///   name → value mapping extracted from the matched path.
pub trait IntoOperation<Args>: Send + Sync + 'static {
    /// Erase the concrete function type into an [`Operation`].
    fn into_operation(self) -> Operation;
}

impl<T, F> IntoOperation<()> for T
where
    T: Fn() -> F + Send + Sync + 'static,
    F: Future<Output = Result<Response, HandlerError>> + Send + 'static,
{
    fn into_operation(self) -> Operation {
        Arc::new(move |_params| Box::pin(self()))
    }
}

impl<T, F> IntoOperation<(UrlParams,)> for T
where
    T: Fn(UrlParams) -> F + Send + Sync + 'static,
    F: Future<Output = Result<Response, HandlerError>> + Send + 'static,
{
    fn into_operation(self) -> Operation {
        Arc::new(move |params| Box::pin(self(params)))
    }
}

/// Conversion trait for error-handling async functions.
pub trait IntoErrorOperation: Send + Sync + 'static {
    /// Erase the concrete function type into an [`ErrorOperation`].
    fn into_error_operation(self) -> ErrorOperation;
}

impl<T, F> IntoErrorOperation for T
where
    T: Fn() -> F + Send + Sync + 'static,
    F: Future<Output = Response> + Send + 'static,
{
    fn into_error_operation(self) -> ErrorOperation {
        Arc::new(move || Box::pin(self()))
    }
}

/// A compiled full-path route paired with the operation it invokes.
///
/// Created once when the declaring plug is built; re-prefixing by a mount
/// produces a new `BoundOperation` sharing the same underlying operation.
#[derive(Clone)]
pub struct BoundOperation {
    template: String,
    pattern: RoutePattern,
    operation: Operation,
}

impl BoundOperation {
    fn new(template: String, operation: Operation) -> Result<Self, RouteError> {
        let pattern = RoutePattern::compile(&template)?;
        Ok(Self {
            template,
            pattern,
            operation,
        })
    }

    // Rebinds the same operation under `prefix`, recompiling the pattern.
    fn reprefixed(&self, prefix: &str) -> Result<Self, RouteError> {
        Self::new(join(prefix, &self.template), Arc::clone(&self.operation))
    }

    /// The full route template this operation is bound to.
    pub fn template(&self) -> &str {
        &self.template
    }

    /// The compiled pattern.
    pub fn pattern(&self) -> &RoutePattern {
        &self.pattern
    }
}

/// The capability pair that makes a value mountable and registrable: a
/// flattened, ordered operation list and a flattened error-handler list.
///
/// [`Plug`] is the standard implementation; anything exposing the pair can be
/// embedded in a plug tree or registered with the vhost dispatcher.
pub trait Routable {
    /// The flattened `(pattern, operation)` list, in declaration order.
    fn operations(&self) -> Vec<BoundOperation>;

    /// The flattened `(error code, operation)` list, in declaration order.
    /// Duplicate codes are resolved last-wins when a dispatcher builds its
    /// error-handler map.
    fn error_handlers(&self) -> Vec<(u16, ErrorOperation)>;
}

/// The composable routing unit.
///
/// Built once at load time with an explicit builder — no runtime
/// introspection. Immutable after construction; the dispatcher shares it
/// read-only across request tasks.
pub struct Plug {
    prefix: String,
    operations: Vec<BoundOperation>,
    error_handlers: Vec<(u16, ErrorOperation)>,
}

impl std::fmt::Debug for Plug {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Plug")
            .field("prefix", &self.prefix)
            .field("operations", &self.operations.len())
            .field("error_handlers", &self.error_handlers.len())
            .finish()
    }
}

impl Plug {
    /// Creates a plug rooted at the empty prefix.
    pub fn root() -> Self {
        Self::new("")
    }

    /// Creates a plug owning the given path prefix.
    ///
    /// A trailing separator is stripped; a leading separator is kept, so a
    /// top-level prefix like `/files` addresses absolute request paths
    /// directly, while a bare `files` prefix expects to be mounted under a
    /// parent.
    pub fn new(prefix: &str) -> Self {
        Self {
            prefix: trim_prefix(prefix).to_owned(),
            operations: Vec::new(),
            error_handlers: Vec::new(),
        }
    }

    /// The prefix this plug was created with.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Binds `operation` to `template`, prefixed by this plug's own prefix.
    ///
    /// The template is compiled immediately — a malformed template fails the
    /// whole construction rather than surfacing per request.
    ///
    /// # Errors
    ///
    /// [`RouteError::BadTemplate`] when the composed template does not
    /// compile.
    pub fn bind<Args>(
        mut self,
        template: &str,
        operation: impl IntoOperation<Args>,
    ) -> Result<Self, RouteError> {
        let full = join(&self.prefix, template);
        self.operations
            .push(BoundOperation::new(full, operation.into_operation())?);
        Ok(self)
    }

    /// Registers `operation` as the handler for each error code in `codes`.
    ///
    /// When several handlers claim the same code, the last registration wins
    /// at dispatcher level.
    pub fn on_error(mut self, codes: &[u16], operation: impl IntoErrorOperation) -> Self {
        let operation = operation.into_error_operation();
        for &code in codes {
            self.error_handlers.push((code, Arc::clone(&operation)));
        }
        self
    }

    /// Embeds an already-built child: every route in the child's flattened
    /// list is re-prefixed under this plug's prefix and appended after the
    /// routes declared so far, preserving the child's internal order. The
    /// child's error handlers are appended after this plug's own, so they
    /// override on conflicting codes.
    ///
    /// # Errors
    ///
    /// [`RouteError::BadTemplate`] when a re-prefixed template does not
    /// recompile (a prefix containing stray regex syntax).
    pub fn mount<R: Routable>(mut self, child: R) -> Result<Self, RouteError> {
        for bound in child.operations() {
            self.operations.push(bound.reprefixed(&self.prefix)?);
        }
        self.error_handlers.extend(child.error_handlers());
        Ok(self)
    }

    /// Returns the number of routes in the flattened list.
    pub fn len(&self) -> usize {
        self.operations.len()
    }

    /// Returns `true` if no routes are bound.
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Walks the flattened route list in order and invokes the first
    /// operation whose pattern matches `path`.
    ///
    /// Returns `Ok(Some(response))` on a match, `Ok(None)` when no pattern
    /// matches (a normal outcome, not an error), and propagates the
    /// operation's own [`HandlerError`] untouched.
    pub async fn dispatch(&self, path: &str) -> Result<Option<Response>, HandlerError> {
        match_and_invoke(&self.operations, path).await
    }
}

impl Routable for Plug {
    fn operations(&self) -> Vec<BoundOperation> {
        self.operations.clone()
    }

    fn error_handlers(&self) -> Vec<(u16, ErrorOperation)> {
        self.error_handlers
            .iter()
            .map(|(code, op)| (*code, Arc::clone(op)))
            .collect()
    }
}

/// First-match-wins invocation over a flattened route list.
pub(crate) async fn match_and_invoke(
    operations: &[BoundOperation],
    path: &str,
) -> Result<Option<Response>, HandlerError> {
    for bound in operations {
        if let Some(params) = bound.pattern.matches(path) {
            debug!(template = %bound.template, %path, "route matched");
            return (bound.operation)(params).await.map(Some);
        }
    }
    Ok(None)
}
