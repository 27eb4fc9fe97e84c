//! Static page serving from the configured directory.

use std::path::{Component, Path, PathBuf};

use axum::{
    body::Body,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use mime_guess::Mime;
use tracing::error;

use crate::application::error::ErrorReport;

const SOURCE: &str = "infra::assets::StaticFiles";

#[derive(Debug, Clone)]
pub struct StaticFiles {
    root: PathBuf,
}

impl StaticFiles {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Read a file below the root. `None` for missing files, directories
    /// and paths that try to leave the root.
    pub async fn load(&self, request_path: &str) -> Option<Asset> {
        let candidate = request_path.trim_start_matches('/');
        if candidate.is_empty() || candidate.ends_with('/') {
            return None;
        }
        let relative = Path::new(candidate);
        if relative
            .components()
            .any(|component| !matches!(component, Component::Normal(_)))
        {
            return None;
        }

        let absolute = self.root.join(relative);
        match tokio::fs::read(&absolute).await {
            Ok(bytes) => Some(Asset {
                contents: Bytes::from(bytes),
                mime: mime_guess::from_path(candidate).first_or_octet_stream(),
            }),
            Err(err)
                if matches!(
                    err.kind(),
                    std::io::ErrorKind::NotFound | std::io::ErrorKind::IsADirectory
                ) =>
            {
                None
            }
            Err(err) => {
                error!(
                    target: SOURCE,
                    path = %absolute.display(),
                    error = %err,
                    "failed to read static file"
                );
                None
            }
        }
    }

    /// Serve `path`, or a bare 404 with a diagnostic report.
    pub async fn serve(&self, path: &str) -> Response {
        match self.load(path).await {
            Some(asset) => asset.into_response(),
            None => not_found_response(),
        }
    }

    /// Serve `path` with an overridden status, used for the HTML 404 page.
    pub async fn serve_with_status(&self, path: &str, status: StatusCode) -> Response {
        let mut response = self.serve(path).await;
        if response.status().is_success() {
            *response.status_mut() = status;
            ErrorReport::from_message(SOURCE, status, "page not found").attach(&mut response);
        }
        response
    }
}

fn not_found_response() -> Response {
    let mut response = StatusCode::NOT_FOUND.into_response();
    ErrorReport::from_message(SOURCE, StatusCode::NOT_FOUND, "Static file not found")
        .attach(&mut response);
    response
}

#[derive(Debug)]
pub struct Asset {
    pub contents: Bytes,
    pub mime: Mime,
}

impl IntoResponse for Asset {
    fn into_response(self) -> Response {
        let cache_control = if self.mime.subtype() == mime_guess::mime::HTML {
            "no-cache"
        } else {
            "public, max-age=3600"
        };
        build_response(self.contents, &self.mime, cache_control)
    }
}

pub(crate) fn build_response(bytes: Bytes, mime: &Mime, cache_control: &'static str) -> Response {
    let len = bytes.len();
    let mut response = Response::new(Body::from(bytes));
    *response.status_mut() = StatusCode::OK;

    let headers = response.headers_mut();
    if let Ok(value) = HeaderValue::from_str(mime.as_ref()) {
        headers.insert(header::CONTENT_TYPE, value);
    }
    if let Ok(value) = HeaderValue::from_str(&len.to_string()) {
        headers.insert(header::CONTENT_LENGTH, value);
    }
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static(cache_control));

    response
}
