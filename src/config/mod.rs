//! Settings file loading and vhost activation.
//!
//! The settings file is JSON: global session parameters plus, per virtual
//! host, the ordered list of plugs to activate with their route prefixes and
//! parameter maps.
//!
//! ```json
//! {
//!   "sessions": { "root": "/tmp/sessions", "timeout_secs": 86400 },
//!   "vhosts": {
//!     "files.example.com": [
//!       { "plug": "dirlist", "route": "/files", "params": { "root": "/var/www" } }
//!     ]
//!   }
//! }
//! ```
//!
//! Plug names resolve through an explicit [`PlugRegistry`] — a name → factory
//! map populated by the application (the bundled serving tools are
//! pre-registered by [`PlugRegistry::with_builtin_tools`]). Activation is
//! all-or-nothing: an unknown plug name or a failing factory aborts
//! [`build_dispatcher`] rather than serving a half-built table.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::dispatch::VhostDispatcher;
use crate::route::{Plug, RouteError};

/// Free-form string parameters handed to a plug factory.
pub type PlugParams = HashMap<String, String>;

/// Configuration-time failures. All of these are fatal to vhost activation.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("unknown plug `{name}`")]
    UnknownPlug { name: String },

    #[error("invalid route declaration: {0}")]
    Route(#[from] RouteError),

    #[error("plug `{plug}` requires param `{param}`")]
    MissingParam {
        plug: &'static str,
        param: &'static str,
    },
}

/// Global session parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSettings {
    /// Directory holding one file per live session.
    #[serde(default = "default_session_root")]
    pub root: PathBuf,

    /// Session lifetime in seconds.
    #[serde(default = "default_session_timeout")]
    pub timeout_secs: u64,

    /// Name of the session cookie.
    #[serde(default = "default_session_cookie")]
    pub cookie: String,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            root: default_session_root(),
            timeout_secs: default_session_timeout(),
            cookie: default_session_cookie(),
        }
    }
}

fn default_session_root() -> PathBuf {
    PathBuf::from("/tmp")
}

fn default_session_timeout() -> u64 {
    24 * 3600
}

fn default_session_cookie() -> String {
    "plugwebid".to_owned()
}

/// One plug activation: which factory, under which route prefix, with which
/// parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlugDecl {
    /// Registry name of the plug factory.
    pub plug: String,

    /// Route prefix handed to the factory. Empty means root.
    #[serde(default)]
    pub route: String,

    /// Factory parameters.
    #[serde(default)]
    pub params: PlugParams,
}

/// The parsed settings file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub sessions: SessionSettings,

    /// Vhost name → ordered plug declarations. Declaration order is the
    /// route-table registration order and therefore part of the routing
    /// contract.
    #[serde(default)]
    pub vhosts: HashMap<String, Vec<PlugDecl>>,
}

impl Settings {
    /// Parses settings from a JSON string.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Parse`] on malformed JSON.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Reads and parses the settings file at `path`.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Io`] when the file cannot be read,
    /// [`ConfigError::Parse`] when it is not valid JSON.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            source: e,
        })?;
        Self::from_json(&raw)
    }
}

/// A plug factory: builds a [`Plug`] from a route prefix and parameters.
pub type PlugFactory = Box<dyn Fn(&str, &PlugParams) -> Result<Plug, ConfigError> + Send + Sync>;

/// Explicit name → factory map used to resolve the `plug` field of a
/// [`PlugDecl`].
pub struct PlugRegistry {
    factories: HashMap<String, PlugFactory>,
}

impl PlugRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Creates a registry pre-populated with the bundled serving tools:
    /// `dirlist` ([`crate::tools::dir_listing`]) and `medias`
    /// ([`crate::tools::media_server`]).
    pub fn with_builtin_tools() -> Self {
        let mut registry = Self::new();
        registry.register("dirlist", crate::tools::dir_listing);
        registry.register("medias", crate::tools::media_server);
        registry
    }

    /// Registers a factory under `name`, replacing any previous registration.
    pub fn register<F>(&mut self, name: &str, factory: F)
    where
        F: Fn(&str, &PlugParams) -> Result<Plug, ConfigError> + Send + Sync + 'static,
    {
        self.factories.insert(name.to_owned(), Box::new(factory));
    }

    /// Returns `true` when a factory is registered under `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Builds a plug through the named factory.
    ///
    /// # Errors
    ///
    /// [`ConfigError::UnknownPlug`] for an unregistered name; otherwise
    /// whatever the factory reports.
    pub fn build(&self, name: &str, route: &str, params: &PlugParams) -> Result<Plug, ConfigError> {
        let factory = self
            .factories
            .get(name)
            .ok_or_else(|| ConfigError::UnknownPlug {
                name: name.to_owned(),
            })?;
        factory(route, params)
    }
}

impl Default for PlugRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Activates every vhost declared in `settings`, resolving plug names through
/// `registry`.
///
/// # Errors
///
/// Any [`ConfigError`] aborts the whole activation — a vhost is never served
/// from a partially built table.
pub fn build_dispatcher(
    settings: &Settings,
    registry: &PlugRegistry,
) -> Result<VhostDispatcher, ConfigError> {
    let mut dispatcher = VhostDispatcher::new();
    for (vhost, decls) in &settings.vhosts {
        for decl in decls {
            let plug = registry.build(&decl.plug, &decl.route, &decl.params)?;
            dispatcher.register(vhost, &plug);
        }
        info!(%vhost, plugs = decls.len(), "vhost activated");
    }
    Ok(dispatcher)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::Resolved;
    use crate::http::Response;

    const SAMPLE: &str = r#"{
        "sessions": { "root": "/tmp/sessions", "timeout_secs": 3600, "cookie": "sid" },
        "vhosts": {
            "a.example": [
                { "plug": "hello", "route": "/greet", "params": { "name": "world" } }
            ]
        }
    }"#;

    fn hello_factory(route: &str, params: &PlugParams) -> Result<Plug, ConfigError> {
        let name = params.get("name").cloned().unwrap_or_default();
        Ok(Plug::new(route).bind("hi", move || {
            let name = name.clone();
            async move { Ok(Response::html(format!("hi {name}"))) }
        })?)
    }

    #[test]
    fn parses_full_settings() {
        let settings = Settings::from_json(SAMPLE).unwrap();
        assert_eq!(settings.sessions.timeout_secs, 3600);
        assert_eq!(settings.sessions.cookie, "sid");
        let decls = &settings.vhosts["a.example"];
        assert_eq!(decls.len(), 1);
        assert_eq!(decls[0].plug, "hello");
        assert_eq!(decls[0].route, "/greet");
        assert_eq!(decls[0].params["name"], "world");
    }

    #[test]
    fn missing_sections_fall_back_to_defaults() {
        let settings = Settings::from_json("{}").unwrap();
        assert_eq!(settings.sessions.cookie, "plugwebid");
        assert_eq!(settings.sessions.timeout_secs, 24 * 3600);
        assert!(settings.vhosts.is_empty());
    }

    #[test]
    fn malformed_json_is_a_parse_error() {
        let err = Settings::from_json("{ nope").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = Settings::from_file("/definitely/not/here.json").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[tokio::test]
    async fn build_dispatcher_activates_declared_vhosts() {
        let settings = Settings::from_json(SAMPLE).unwrap();
        let mut registry = PlugRegistry::new();
        registry.register("hello", hello_factory);

        let dispatcher = build_dispatcher(&settings, &registry).unwrap();
        assert!(dispatcher.is_registered("a.example"));

        let resolved = dispatcher.resolve("a.example", "/greet/hi").await.unwrap();
        assert!(matches!(resolved, Resolved::Response(_)));
    }

    #[test]
    fn unknown_plug_aborts_activation() {
        let settings = Settings::from_json(SAMPLE).unwrap();
        let registry = PlugRegistry::new();
        let err = build_dispatcher(&settings, &registry).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownPlug { name } if name == "hello"));
    }

    #[test]
    fn builtin_tools_are_preregistered() {
        let registry = PlugRegistry::with_builtin_tools();
        assert!(registry.contains("dirlist"));
        assert!(registry.contains("medias"));
    }
}
