//! Runnable demo: a two-vhost site mixing hand-written plugs with the
//! bundled directory-listing tool.
//!
//! ```sh
//! cargo run --example serve
//! curl -H 'Host: localhost' http://127.0.0.1:8080/scope/details/get/42
//! curl -H 'Host: files.localhost' http://127.0.0.1:8080/files/
//! ```

use plugweb::config::{PlugRegistry, Settings};
use plugweb::http::Response;
use plugweb::route::{Plug, UrlParams};
use plugweb::server::Server;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    // A hand-written plug tree for the main vhost.
    let details = Plug::new("details").bind(
        "get/{id:([0-9]+)}",
        |params: UrlParams| async move {
            let id = params.get("id").unwrap_or("?").to_owned();
            Ok(Response::html(format!("Chosen id: {id}")))
        },
    )?;

    let site = Plug::root()
        .bind("hello", || async { Ok(Response::html("Hello, World!")) })?
        .mount(Plug::new("scope").mount(details)?)?
        .on_error(&[404], || async {
            Response::not_found("<h1>Nothing here</h1>").content_type("text/html")
        });

    // A second vhost activated from a settings document through the
    // registry, the way a deployment would load config.json.
    let settings = Settings::from_json(
        r#"{
            "vhosts": {
                "files.localhost": [
                    { "plug": "dirlist", "route": "/files", "params": { "root": "." } }
                ]
            }
        }"#,
    )?;
    let registry = PlugRegistry::with_builtin_tools();
    let mut dispatcher = plugweb::config::build_dispatcher(&settings, &registry)?;

    dispatcher.register("localhost", &site);

    let server = Server::bind("127.0.0.1:8080").await?;
    println!("Listening on http://{}", server.local_addr());
    server.serve(dispatcher).await?;
    Ok(())
}
