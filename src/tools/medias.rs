//! Media serving — static files with an optional extension allow-list.

use std::path::{Path, PathBuf};

use crate::config::{ConfigError, PlugParams};
use crate::http::{Response, StatusCode};
use crate::route::{HandlerError, Plug, UrlParams};

/// Builds the `medias` plug: serves files from the directory named by the
/// `directory` param. When an `allow` param is present (a comma-separated
/// extension list, case-insensitive), anything else delegates to the vhost's
/// 404 handler by failing with [`HandlerError::NotFound`] — misses are never
/// answered here.
///
/// # Errors
///
/// [`ConfigError::MissingParam`] when `directory` is absent, or a route
/// error from plug construction.
pub fn media_server(route: &str, params: &PlugParams) -> Result<Plug, ConfigError> {
    let directory = PathBuf::from(params.get("directory").ok_or(ConfigError::MissingParam {
        plug: "medias",
        param: "directory",
    })?);
    let allowed: Option<Vec<String>> = params.get("allow").map(|list| {
        list.split(',')
            .map(|ext| ext.trim().to_ascii_uppercase())
            .collect()
    });

    let plug = Plug::new(route).bind(
        "/{media:([0-9a-zA-Z._/-]+)}",
        move |url: UrlParams| {
            let directory = directory.clone();
            let allowed = allowed.clone();
            let media = url.get("media").unwrap_or("").to_owned();
            async move { serve_media(&directory, &media, allowed.as_deref()) }
        },
    )?;
    Ok(plug)
}

fn serve_media(
    directory: &Path,
    media: &str,
    allowed: Option<&[String]>,
) -> Result<Response, HandlerError> {
    if media.split('/').any(|segment| segment == "..") {
        return Err(HandlerError::Forbidden);
    }
    let file = directory.join(media);
    if !file.is_file() {
        return Err(HandlerError::NotFound);
    }
    if let Some(allowed) = allowed {
        let ext = file
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_uppercase)
            .unwrap_or_default();
        if !allowed.contains(&ext) {
            return Err(HandlerError::NotFound);
        }
    }
    let bytes = std::fs::read(&file)
        .map_err(|e| HandlerError::Failure(format!("cannot read {}: {e}", file.display())))?;
    let mime = mime_guess::from_path(&file).first_or_octet_stream();
    Ok(Response::new(StatusCode::Ok)
        .content_type(mime.essence_str())
        .body_bytes(bytes))
}
