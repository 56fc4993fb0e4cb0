//! Virtual-host dispatch — one route table and one error-handler map per vhost.
//!
//! A [`VhostDispatcher`] owns the flattened route tables of every configured
//! virtual host. Tables are built once, at load time, by registering top-level
//! [`Routable`]s per vhost; after that the dispatcher is read-only and can be
//! shared (`Arc`) across request tasks without locking.
//!
//! Resolution walks the vhost's table in registration order and returns the
//! first match. Operation failures are never caught here — the server
//! boundary owns the mapping from [`HandlerError`] to error-handler
//! responses.

use std::collections::HashMap;

use tracing::{debug, info};

use crate::http::Response;
use crate::route::{BoundOperation, ErrorOperation, HandlerError, Routable, match_and_invoke};

/// Outcome of a [`VhostDispatcher::resolve`] call.
///
/// `NoRoute` and `UnknownHost` are ordinary values, not errors — the caller
/// decides how to answer an unmatched request.
#[derive(Debug)]
pub enum Resolved {
    /// A route matched and its operation produced this response.
    Response(Response),
    /// The vhost is registered but none of its patterns matched the path.
    NoRoute,
    /// No table is registered for the requested vhost.
    UnknownHost,
}

/// One virtual host's flattened route list and error-handler map.
#[derive(Default)]
struct VhostTable {
    routes: Vec<BoundOperation>,
    error_handlers: HashMap<u16, ErrorOperation>,
}

impl VhostTable {
    fn absorb<R: Routable>(&mut self, routable: &R) {
        self.routes.extend(routable.operations());
        // Insertion order resolves duplicate codes: last registration wins.
        for (code, operation) in routable.error_handlers() {
            self.error_handlers.insert(code, operation);
        }
    }
}

/// Routes `(vhost, path)` pairs to operations across virtual hosts.
///
/// # Examples
///
/// ```rust
/// use plugweb::dispatch::{Resolved, VhostDispatcher};
/// use plugweb::http::Response;
/// use plugweb::route::Plug;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let site = Plug::root().bind("hello", || async { Ok(Response::html("hi")) })?;
///
/// let mut dispatcher = VhostDispatcher::new();
/// dispatcher.register("example.com", &site);
///
/// match dispatcher.resolve("example.com", "/hello").await? {
///     Resolved::Response(response) => assert!(response.status().is_success()),
///     other => panic!("expected a response, got {other:?}"),
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Default)]
pub struct VhostDispatcher {
    vhosts: HashMap<String, VhostTable>,
}

impl std::fmt::Debug for VhostDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VhostDispatcher")
            .field("vhosts", &self.vhosts.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl VhostDispatcher {
    /// Creates a dispatcher with no registered vhosts.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a top-level routable's flattened routes and error handlers to
    /// the named vhost's table, creating the table on first registration.
    ///
    /// A vhost may receive several top-level routables; their routes are
    /// consulted in registration order, and later error-handler registrations
    /// override earlier ones on the same code.
    pub fn register<R: Routable>(&mut self, vhost: &str, routable: &R) {
        let table = self.vhosts.entry(vhost.to_owned()).or_default();
        table.absorb(routable);
        info!(
            %vhost,
            routes = table.routes.len(),
            error_handlers = table.error_handlers.len(),
            "vhost table updated"
        );
    }

    /// Returns `true` when a table exists for the named vhost.
    pub fn is_registered(&self, vhost: &str) -> bool {
        self.vhosts.contains_key(vhost)
    }

    /// Resolves a request path against the named vhost's table.
    ///
    /// Walks the flattened route list in order; the first full-string match
    /// invokes its operation. Returns [`Resolved::UnknownHost`] for an
    /// unregistered vhost and [`Resolved::NoRoute`] when nothing matches.
    ///
    /// # Errors
    ///
    /// Propagates the matched operation's [`HandlerError`] untouched.
    pub async fn resolve(&self, vhost: &str, path: &str) -> Result<Resolved, HandlerError> {
        let Some(table) = self.vhosts.get(vhost) else {
            debug!(%vhost, %path, "no table for vhost");
            return Ok(Resolved::UnknownHost);
        };
        match match_and_invoke(&table.routes, path).await? {
            Some(response) => Ok(Resolved::Response(response)),
            None => Ok(Resolved::NoRoute),
        }
    }

    /// Returns `true` when the named vhost has a handler registered for
    /// `code`. Existence check only — nothing is invoked.
    pub fn has_error_handler(&self, vhost: &str, code: u16) -> bool {
        self.vhosts
            .get(vhost)
            .is_some_and(|table| table.error_handlers.contains_key(&code))
    }

    /// Invokes the named vhost's handler for `code`, or returns `None` when
    /// no handler is registered (unknown vhost included).
    pub async fn resolve_error(&self, vhost: &str, code: u16) -> Option<Response> {
        let handler = self.vhosts.get(vhost)?.error_handlers.get(&code)?;
        Some(handler().await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::StatusCode;
    use crate::route::{HandlerError, Plug};

    fn ok(body: &'static str) -> Result<Response, HandlerError> {
        Ok(Response::new(StatusCode::Ok).body(body))
    }

    fn body_text(response: Response) -> String {
        let text = String::from_utf8(response.into_bytes().to_vec()).unwrap();
        let split = text.find("\r\n\r\n").unwrap();
        text[split + 4..].to_owned()
    }

    fn expect_response(resolved: Resolved) -> Response {
        match resolved {
            Resolved::Response(response) => response,
            other => panic!("expected a response, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn unknown_host_is_a_value() {
        let dispatcher = VhostDispatcher::new();
        let resolved = dispatcher.resolve("nowhere", "/x").await.unwrap();
        assert!(matches!(resolved, Resolved::UnknownHost));
    }

    #[tokio::test]
    async fn no_route_is_a_value() {
        let mut dispatcher = VhostDispatcher::new();
        dispatcher.register(
            "a.example",
            &Plug::root().bind("known", || async { ok("x") }).unwrap(),
        );
        let resolved = dispatcher.resolve("a.example", "/unknown").await.unwrap();
        assert!(matches!(resolved, Resolved::NoRoute));
    }

    #[tokio::test]
    async fn vhost_tables_are_disjoint() {
        let mut dispatcher = VhostDispatcher::new();
        dispatcher.register(
            "a.example",
            &Plug::root().bind("only-a", || async { ok("a") }).unwrap(),
        );
        dispatcher.register(
            "b.example",
            &Plug::root().bind("x", || async { ok("b") }).unwrap(),
        );

        // b declares /x; resolving against a must never see it.
        let resolved = dispatcher.resolve("a.example", "/x").await.unwrap();
        assert!(matches!(resolved, Resolved::NoRoute));

        let response = expect_response(dispatcher.resolve("b.example", "/x").await.unwrap());
        assert_eq!(body_text(response), "b");
    }

    #[tokio::test]
    async fn nested_scenario_resolves_with_captures() {
        let details = Plug::new("details")
            .bind("get/{id:([0-9]+)}", |params: crate::route::UrlParams| {
                let id = params.get("id").unwrap_or("?").to_owned();
                async move { Ok(Response::new(StatusCode::Ok).body(id)) }
            })
            .unwrap();
        let scope = Plug::new("scope").mount(details).unwrap();
        let site = Plug::root().mount(scope).unwrap();

        let mut dispatcher = VhostDispatcher::new();
        dispatcher.register("example.com", &site);

        let response = expect_response(
            dispatcher
                .resolve("example.com", "/scope/details/get/42")
                .await
                .unwrap(),
        );
        assert_eq!(body_text(response), "42");

        let miss = dispatcher
            .resolve("example.com", "/scope/details/get/abc")
            .await
            .unwrap();
        assert!(matches!(miss, Resolved::NoRoute));
    }

    #[tokio::test]
    async fn registration_order_decides_between_overlapping_plugs() {
        let mut dispatcher = VhostDispatcher::new();
        dispatcher.register(
            "a.example",
            &Plug::root()
                .bind("{any:(.*)}", || async { ok("first") })
                .unwrap(),
        );
        dispatcher.register(
            "a.example",
            &Plug::root().bind("page", || async { ok("second") }).unwrap(),
        );
        let response = expect_response(dispatcher.resolve("a.example", "/page").await.unwrap());
        assert_eq!(body_text(response), "first");
    }

    #[tokio::test]
    async fn operation_error_is_not_caught() {
        let mut dispatcher = VhostDispatcher::new();
        dispatcher.register(
            "a.example",
            &Plug::root()
                .bind("gone", || async { Err(HandlerError::NotFound) })
                .unwrap(),
        );
        let outcome = dispatcher.resolve("a.example", "/gone").await;
        assert!(matches!(outcome, Err(HandlerError::NotFound)));
    }

    #[tokio::test]
    async fn error_handler_lookup() {
        let mut dispatcher = VhostDispatcher::new();
        dispatcher.register(
            "a.example",
            &Plug::root().on_error(&[404], || async {
                Response::new(StatusCode::NotFound).body("custom 404")
            }),
        );

        assert!(dispatcher.has_error_handler("a.example", 404));
        assert!(!dispatcher.has_error_handler("a.example", 500));
        assert!(!dispatcher.has_error_handler("nowhere", 404));

        let response = dispatcher.resolve_error("a.example", 404).await.unwrap();
        assert_eq!(body_text(response), "custom 404");
        assert!(dispatcher.resolve_error("a.example", 500).await.is_none());
    }

    #[tokio::test]
    async fn error_handler_declared_in_nested_child_is_found() {
        let child = Plug::new("deep").on_error(&[500], || async {
            Response::new(StatusCode::InternalServerError).body("deep 500")
        });
        let site = Plug::root().mount(child).unwrap();

        let mut dispatcher = VhostDispatcher::new();
        dispatcher.register("a.example", &site);

        assert!(dispatcher.has_error_handler("a.example", 500));
        let response = dispatcher.resolve_error("a.example", 500).await.unwrap();
        assert_eq!(body_text(response), "deep 500");
    }

    #[tokio::test]
    async fn duplicate_error_code_last_registration_wins() {
        let mut dispatcher = VhostDispatcher::new();
        dispatcher.register(
            "a.example",
            &Plug::root().on_error(&[404], || async {
                Response::new(StatusCode::NotFound).body("earlier")
            }),
        );
        dispatcher.register(
            "a.example",
            &Plug::root().on_error(&[404], || async {
                Response::new(StatusCode::NotFound).body("later")
            }),
        );
        let response = dispatcher.resolve_error("a.example", 404).await.unwrap();
        assert_eq!(body_text(response), "later");
    }

    #[tokio::test]
    async fn duplicate_error_code_within_one_tree_child_overrides_parent() {
        let child = Plug::new("child").on_error(&[404], || async {
            Response::new(StatusCode::NotFound).body("child")
        });
        let site = Plug::root()
            .on_error(&[404], || async {
                Response::new(StatusCode::NotFound).body("parent")
            })
            .mount(child)
            .unwrap();

        let mut dispatcher = VhostDispatcher::new();
        dispatcher.register("a.example", &site);

        let response = dispatcher.resolve_error("a.example", 404).await.unwrap();
        assert_eq!(body_text(response), "child");
    }
}
