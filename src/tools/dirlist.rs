//! Directory listing — HTML index pages plus plain file serving.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::{ConfigError, PlugParams};
use crate::http::{Response, StatusCode};
use crate::route::{HandlerError, Plug, UrlParams};

/// Builds the `dirlist` plug: an HTML index of the directory named by the
/// `root` param, served under `route`. Requests naming a file inside the
/// tree get the file itself with a guessed content type; anything else gets
/// a listing with parent navigation.
///
/// # Errors
///
/// [`ConfigError::MissingParam`] when `root` is absent, or a route error
/// from plug construction.
pub fn dir_listing(route: &str, params: &PlugParams) -> Result<Plug, ConfigError> {
    let root = PathBuf::from(params.get("root").ok_or(ConfigError::MissingParam {
        plug: "dirlist",
        param: "root",
    })?);

    let plug = Plug::new(route);
    let link_base = plug.prefix().to_owned();

    let index_root = root.clone();
    let index_base = link_base.clone();
    let plug = plug.bind("/", move || {
        let root = index_root.clone();
        let base = index_base.clone();
        async move { Ok(Response::html(render_index(&root, "", &base))) }
    })?;

    let plug = plug.bind(
        "/{target:([0-9a-zA-Z._/-]+)}?",
        move |url: UrlParams| {
            let root = root.clone();
            let base = link_base.clone();
            let target = url.get("target").unwrap_or("").to_owned();
            async move { serve_target(&root, &target, &base) }
        },
    )?;

    Ok(plug)
}

fn serve_target(root: &Path, target: &str, base: &str) -> Result<Response, HandlerError> {
    if target.split('/').any(|segment| segment == "..") {
        return Err(HandlerError::Forbidden);
    }
    let candidate = root.join(target);
    if candidate.is_file() {
        debug!(path = %candidate.display(), "serving file");
        let Ok(bytes) = std::fs::read(&candidate) else {
            return Ok(Response::html("<b>Cannot read file</b>"));
        };
        let mime = mime_guess::from_path(&candidate).first_or_octet_stream();
        Ok(Response::new(StatusCode::Ok)
            .content_type(mime.essence_str())
            .body_bytes(bytes))
    } else {
        Ok(Response::html(render_index(root, target, base)))
    }
}

/// Renders the index page for `rel` (a path relative to `root`).
fn render_index(root: &Path, rel: &str, base: &str) -> String {
    let shown = format!("/{}", rel.trim_end_matches('/'));
    let mut out = format!(
        "<html><head><title>Index of {shown}</title></head><body><h2>Index of {shown}</h2><hr/>"
    );
    let parent = parent_of(rel);
    out.push_str(&format!(
        "<a href=\"{base}/{parent}\"><b>[+] Parent directory</b></a><br/>"
    ));

    match list_entries(&root.join(rel)) {
        Ok((dirs, files)) => {
            for dir in dirs {
                out.push_str(&format!("<a href=\"{dir}/\"><b>[+]</b> {dir}</a><br/>"));
            }
            for file in files {
                out.push_str(&format!("<a href=\"{file}\">{file}</a><br/>"));
            }
            out.push_str("</body></html>");
        }
        Err(_) => {
            out.push_str("<b>Cannot access file or directory</b><br/></body></html>");
        }
    }
    out
}

fn parent_of(rel: &str) -> &str {
    let rel = rel.trim_end_matches('/');
    rel.rsplit_once('/').map(|(parent, _)| parent).unwrap_or("")
}

/// Sorted directory and file names under `path`.
fn list_entries(path: &Path) -> std::io::Result<(Vec<String>, Vec<String>)> {
    let mut dirs = Vec::new();
    let mut files = Vec::new();
    for entry in std::fs::read_dir(path)? {
        let entry = entry?;
        let Ok(name) = entry.file_name().into_string() else {
            continue;
        };
        if entry.path().is_dir() {
            dirs.push(name);
        } else if entry.path().is_file() {
            files.push(name);
        }
    }
    dirs.sort();
    files.sort();
    Ok((dirs, files))
}
