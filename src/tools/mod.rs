//! Bundled serving tools.
//!
//! These are ordinary plugs built on the routing engine, exposed as plug
//! factories so the config loader can activate them by name (`dirlist`,
//! `medias` — see [`crate::config::PlugRegistry::with_builtin_tools`]).

pub mod dirlist;
pub mod medias;

pub use dirlist::dir_listing;
pub use medias::media_server;
