//! # plugweb
//!
//! A pluggable, virtual-host-aware request routing framework for async Rust.
//!
//! Applications are trees of [`Plug`]s: each plug owns a path prefix, binds
//! route templates (with `{name:(regex)}` dynamic segments) to async
//! operations, and may mount child plugs, whose routes are re-prefixed under
//! its own. The flattened tree becomes a per-virtual-host route table,
//! matched in declaration order — first match wins.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use plugweb::dispatch::VhostDispatcher;
//! use plugweb::http::Response;
//! use plugweb::route::{Plug, UrlParams};
//! use plugweb::server::Server;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let details = Plug::new("details")
//!         .bind("get/{id:([0-9]+)}", |params: UrlParams| async move {
//!             let id = params.get("id").unwrap_or("?").to_owned();
//!             Ok(Response::html(format!("Chosen id: {id}")))
//!         })?;
//!
//!     let site = Plug::root()
//!         .bind("hello", || async { Ok(Response::html("Hello, World!")) })?
//!         .mount(Plug::new("scope").mount(details)?)?
//!         .on_error(&[404], || async { Response::not_found("nothing here") });
//!
//!     let mut dispatcher = VhostDispatcher::new();
//!     dispatcher.register("localhost", &site);
//!
//!     let server = Server::bind("127.0.0.1:8080").await?;
//!     println!("Listening on http://127.0.0.1:8080");
//!     server.serve(dispatcher).await?;
//!     Ok(())
//! }
//! ```

// ── The routing engine ────────────────────────────────────────────────────────
pub mod dispatch;
pub mod route;

// ── Collaborators around the engine ───────────────────────────────────────────
pub mod config;
pub mod http;
pub mod server;
pub mod session;
pub mod tools;

// ── Convenience re-exports ────────────────────────────────────────────────────
pub use config::{ConfigError, PlugRegistry, Settings};
pub use dispatch::{Resolved, VhostDispatcher};
pub use http::{Headers, Method, Request, Response, StatusCode};
pub use route::{HandlerError, Plug, Routable, RouteError, UrlParams};
pub use server::{Server, ServerError};
