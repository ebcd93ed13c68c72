//! Route table and request handlers.
//!
//! Handlers only translate between HTTP and [`FilesService`]: they pull form
//! fields and query parameters out of the request, run the service call on the
//! blocking pool, and turn the outcome into a page, a redirect, a file stream or
//! a plain-text error. Handlers are the only place errors are logged.

use axum::{
    body::{Body, Bytes},
    extract::{multipart::Field, DefaultBodyLimit, FromRequest, Multipart, Query, Request, State},
    http::{header, HeaderValue, StatusCode},
    middleware::{self, Next},
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
    Form, Router,
};
use docdir_files::{DocumentName, FilesError, FilesService};
use futures_util::stream;
use percent_encoding::{percent_decode_str, utf8_percent_encode, NON_ALPHANUMERIC};
use serde::Deserialize;
use std::io;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::io::{ReaderStream, StreamReader, SyncIoBridge};
use tower::Layer;
use tower_http::services::ServeDir;
use utoipa::{IntoParams, OpenApi, ToSchema};
use utoipa_swagger_ui::SwaggerUi;

use crate::logging::log_request;
use crate::pages::Pages;

type HandlerError = (StatusCode, &'static str);

/// Upload chunks buffered between the request body and the file write
const UPLOAD_CHUNK_BACKLOG: usize = 8;

/// Application state shared across request handlers
///
/// Built once at startup and cloned into each handler invocation.
#[derive(Clone)]
pub struct AppState {
    pub files: Arc<FilesService>,
    pub pages: Arc<Pages>,
}

impl AppState {
    pub fn new(files: FilesService, pages: Pages) -> Self {
        Self {
            files: Arc::new(files),
            pages: Arc::new(pages),
        }
    }
}

/// Multipart body accepted by `POST /upload`
#[derive(Deserialize, ToSchema)]
#[allow(dead_code)]
pub struct UploadForm {
    /// The file to store
    #[schema(value_type = String, format = Binary)]
    file: Vec<u8>,
    /// Target name; the uploaded filename is used when empty
    #[serde(rename = "newFileName")]
    new_file_name: Option<String>,
}

/// Form body accepted by `POST /rename`
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct RenameForm {
    #[serde(rename = "oldFileName", default)]
    old_file_name: String,
    #[serde(rename = "newFileName", default)]
    new_file_name: String,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct DownloadQuery {
    /// Name of the document to download
    file: Option<String>,
}

#[derive(OpenApi)]
#[openapi(
    paths(home, documents, upload, rename, download),
    components(schemas(UploadForm, RenameForm))
)]
pub struct ApiDoc;

/// Builds the router for the whole HTTP surface
///
/// `/public` serves documents from the store directory; each request path is
/// checked like a download name first. Bodies are not size-limited.
pub fn router(state: AppState) -> Router {
    let public = middleware::from_fn_with_state(state.clone(), guard_public)
        .layer(ServeDir::new(state.files.store().root()));

    Router::new()
        .route("/", get(home))
        .route("/documents", get(documents))
        .route("/upload", post(upload).fallback(method_not_allowed))
        .route("/rename", post(rename).fallback(method_not_allowed))
        .route("/download", get(download))
        .nest_service("/public", public)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(DefaultBodyLimit::disable())
        .layer(middleware::from_fn(log_request))
        .with_state(state)
}

#[utoipa::path(
    get,
    path = "/",
    responses(
        (status = 200, description = "Home page", content_type = "text/html", body = String),
        (status = 500, description = "Template could not be loaded")
    )
)]
/// Renders the home page
async fn home(State(state): State<AppState>) -> Result<Html<String>, HandlerError> {
    state.pages.home().await.map(Html).map_err(|e| {
        tracing::error!("Error rendering home page: {}", e);
        (StatusCode::INTERNAL_SERVER_ERROR, "Unable to load template")
    })
}

#[utoipa::path(
    get,
    path = "/documents",
    responses(
        (status = 200, description = "List of stored documents", content_type = "text/html", body = String),
        (status = 500, description = "Store or template failure")
    )
)]
/// Lists the stored documents
///
/// The directory is read on every request; nothing is cached.
async fn documents(State(state): State<AppState>) -> Result<Html<String>, HandlerError> {
    let files = state.files.clone();
    let names = run_blocking(move || files.list_documents())
        .await?
        .map_err(|e| {
            tracing::error!("Error listing files for documents page: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Unable to list files")
        })?;

    state.pages.documents(&names).await.map(Html).map_err(|e| {
        tracing::error!("Error rendering documents page: {}", e);
        (StatusCode::INTERNAL_SERVER_ERROR, "Unable to load template")
    })
}

#[utoipa::path(
    post,
    path = "/upload",
    request_body(content = UploadForm, content_type = "multipart/form-data"),
    responses(
        (status = 303, description = "Stored; redirects to /documents"),
        (status = 400, description = "No file in the request or unsafe file name"),
        (status = 405, description = "Method other than POST"),
        (status = 500, description = "File could not be written")
    )
)]
/// Stores an uploaded file
///
/// The `file` part is required. A part with neither a filename nor content is
/// what browsers send when no file was chosen, and counts as missing.
///
/// The file is streamed to disk as it arrives, so `newFileName` only applies
/// when it comes before `file` in the body.
async fn upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Redirect, HandlerError> {
    let mut new_file_name: Option<String> = None;
    let mut stored: Option<DocumentName> = None;

    while let Some(mut field) = multipart.next_field().await.map_err(bad_multipart)? {
        let field_name = field.name().map(str::to_owned);
        match field_name.as_deref() {
            Some("file") if stored.is_none() => {
                let supplied = field.file_name().unwrap_or_default().to_owned();
                let first = field.chunk().await.map_err(bad_multipart)?;
                if supplied.is_empty() && first.is_none() {
                    continue;
                }
                let files = state.files.clone();
                let requested = new_file_name.clone();
                stored = Some(stream_upload(files, field, first, supplied, requested).await?);
            }
            Some("newFileName") => {
                let value = field.text().await.map_err(bad_multipart)?;
                if stored.is_some() {
                    tracing::warn!("Ignoring newFileName {:?} sent after the file", value);
                } else {
                    new_file_name = Some(value);
                }
            }
            _ => {}
        }
    }

    let stored = match stored {
        Some(name) => name,
        None => {
            let files = state.files.clone();
            run_blocking(move || {
                files.upload_document(None::<&[u8]>, "", new_file_name.as_deref())
            })
            .await?
            .map_err(|e| {
                tracing::error!("Error saving uploaded file: {}", e);
                files_error_response(&e)
            })?
        }
    };

    tracing::info!("File uploaded successfully: {}", stored);
    Ok(Redirect::to("/documents"))
}

/// Feeds a multipart file part into [`FilesService::upload_document`]
///
/// Chunks go through a bounded channel to the blocking writer, which reads
/// them as a plain [`std::io::Read`]. A body read error is passed on to the
/// writer so it discards the partial file, then reported as a bad request.
async fn stream_upload(
    files: Arc<FilesService>,
    mut field: Field<'_>,
    first: Option<Bytes>,
    supplied: String,
    requested: Option<String>,
) -> Result<DocumentName, HandlerError> {
    let (tx, rx) = mpsc::channel::<io::Result<Bytes>>(UPLOAD_CHUNK_BACKLOG);
    let chunks = stream::unfold(rx, |mut rx| async move {
        rx.recv().await.map(|chunk| (chunk, rx))
    });
    let reader = SyncIoBridge::new(StreamReader::new(Box::pin(chunks)));
    let writer = tokio::task::spawn_blocking(move || {
        files.upload_document(Some(reader), &supplied, requested.as_deref())
    });

    let mut next = first;
    let mut read_error = None;
    while let Some(chunk) = next {
        // Closed when the writer has already given up.
        if tx.send(Ok(chunk)).await.is_err() {
            break;
        }
        match field.chunk().await {
            Ok(chunk) => next = chunk,
            Err(e) => {
                let _ = tx.send(Err(io::Error::other(e.to_string()))).await;
                read_error = Some(e);
                break;
            }
        }
    }
    drop(tx);

    let outcome = writer.await.map_err(|e| {
        tracing::error!("Blocking file task failed: {}", e);
        (StatusCode::INTERNAL_SERVER_ERROR, "Internal error")
    })?;
    if let Some(e) = read_error {
        return Err(bad_multipart(e));
    }
    outcome.map_err(|e| {
        tracing::error!("Error saving uploaded file: {}", e);
        files_error_response(&e)
    })
}

#[utoipa::path(
    post,
    path = "/rename",
    request_body(content = RenameForm, content_type = "application/x-www-form-urlencoded",
        description = "Also accepted as multipart/form-data"),
    responses(
        (status = 303, description = "Renamed; redirects to /documents"),
        (status = 400, description = "Empty or unsafe file names, or unreadable body"),
        (status = 404, description = "No document under the old name"),
        (status = 405, description = "Method other than POST"),
        (status = 500, description = "Rename failed")
    )
)]
/// Renames a stored document
///
/// The two names may arrive urlencoded or as `multipart/form-data`, whichever
/// encoding the submitting form uses.
async fn rename(State(state): State<AppState>, request: Request) -> Result<Redirect, HandlerError> {
    let RenameForm {
        old_file_name,
        new_file_name,
    } = rename_form(&state, request).await?;

    let files = state.files.clone();
    let (old, new) = (old_file_name.clone(), new_file_name.clone());
    run_blocking(move || files.rename_document(&old, &new))
        .await?
        .map_err(|e| {
            tracing::error!(
                "Failed to rename file from {:?} to {:?}: {}",
                old_file_name,
                new_file_name,
                e
            );
            files_error_response(&e)
        })?;

    tracing::info!("File renamed from {} to {}", old_file_name, new_file_name);
    Ok(Redirect::to("/documents"))
}

/// Reads the rename fields from either form encoding
async fn rename_form(state: &AppState, request: Request) -> Result<RenameForm, HandlerError> {
    let is_multipart = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.starts_with("multipart/form-data"));

    if !is_multipart {
        let Form(form) = Form::<RenameForm>::from_request(request, state)
            .await
            .map_err(|e| {
                tracing::warn!("Error reading rename form: {}", e);
                (e.status(), "Invalid form body")
            })?;
        return Ok(form);
    }

    let mut multipart = Multipart::from_request(request, state).await.map_err(|e| {
        tracing::warn!("Error reading rename form: {}", e);
        (e.status(), "Invalid form body")
    })?;

    let invalid_field = |e: axum::extract::multipart::MultipartError| {
        tracing::warn!("Error reading rename form field: {}", e);
        (StatusCode::BAD_REQUEST, "Invalid form body")
    };
    let mut form = RenameForm::default();
    while let Some(field) = multipart.next_field().await.map_err(invalid_field)? {
        let field_name = field.name().map(str::to_owned);
        match field_name.as_deref() {
            Some("oldFileName") => form.old_file_name = field.text().await.map_err(invalid_field)?,
            Some("newFileName") => form.new_file_name = field.text().await.map_err(invalid_field)?,
            _ => {}
        }
    }
    Ok(form)
}

#[utoipa::path(
    get,
    path = "/download",
    params(DownloadQuery),
    responses(
        (status = 200, description = "Document bytes as an attachment"),
        (status = 400, description = "File not specified or unsafe name"),
        (status = 404, description = "Document not found")
    )
)]
/// Streams a stored document as an attachment
async fn download(
    State(state): State<AppState>,
    Query(query): Query<DownloadQuery>,
) -> Result<Response, HandlerError> {
    let requested = query.file.unwrap_or_default();
    if requested.is_empty() {
        tracing::warn!("Download request without file specified");
        return Err((StatusCode::BAD_REQUEST, "File not specified"));
    }

    let files = state.files.clone();
    let name = requested.clone();
    let download = run_blocking(move || files.download_document(&name))
        .await?
        .map_err(|e| {
            tracing::error!("Error downloading file {:?}: {}", requested, e);
            files_error_response(&e)
        })?;

    let mime = mime_guess::from_path(download.name.as_str()).first_or_octet_stream();
    let disposition = content_disposition(download.name.as_str());
    tracing::info!("File downloaded: {}", download.name);

    let stream = ReaderStream::new(tokio::fs::File::from_std(download.file));
    Ok((
        [
            (header::CONTENT_TYPE, header_value(mime.essence_str())?),
            (header::CONTENT_DISPOSITION, header_value(&disposition)?),
            (header::CONTENT_LENGTH, header_value(&download.size_bytes.to_string())?),
        ],
        Body::from_stream(stream),
    )
        .into_response())
}

/// Lets a `/public` request through only if its path names a document
///
/// The path gets the same name validation and store resolution as a download,
/// so nested paths and symlinks leading out of the store are not served.
async fn guard_public(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let path = request.uri().path();
    let raw = path.strip_prefix('/').unwrap_or(path);
    let decoded = percent_decode_str(raw).decode_utf8_lossy().into_owned();

    let Ok(name) = DocumentName::new(&decoded) else {
        tracing::warn!("Refusing public path {:?}", decoded);
        return (StatusCode::NOT_FOUND, "File not found").into_response();
    };

    let files = state.files.clone();
    let resolved = match run_blocking(move || files.store().resolve(&name)).await {
        Ok(resolved) => resolved,
        Err(rejection) => return rejection.into_response(),
    };
    if let Err(e) = resolved {
        tracing::warn!("Refusing public path {:?}: {}", decoded, e);
        return (StatusCode::NOT_FOUND, "File not found").into_response();
    }

    next.run(request).await
}

async fn method_not_allowed() -> HandlerError {
    (StatusCode::METHOD_NOT_ALLOWED, "Invalid request method")
}

/// Maps a service error to the status and message sent to the client
fn files_error_response(err: &FilesError) -> HandlerError {
    match err {
        FilesError::InvalidInput(_) => (StatusCode::BAD_REQUEST, "Invalid request"),
        FilesError::NotFound(_) => (StatusCode::NOT_FOUND, "File not found"),
        FilesError::StoreUnavailable(_) => {
            (StatusCode::INTERNAL_SERVER_ERROR, "Document store unavailable")
        }
        FilesError::WriteFailure(_) | FilesError::CleanupAfterWriteFailed { .. } => {
            (StatusCode::INTERNAL_SERVER_ERROR, "Unable to save the file")
        }
        FilesError::OperationFailed(_) => {
            (StatusCode::INTERNAL_SERVER_ERROR, "File operation failed")
        }
    }
}

fn bad_multipart(err: axum::extract::multipart::MultipartError) -> HandlerError {
    tracing::warn!("Error reading multipart upload: {}", err);
    (StatusCode::BAD_REQUEST, "Failed to get uploaded file")
}

/// Runs a blocking filesystem call off the async workers
async fn run_blocking<T, F>(f: F) -> Result<T, HandlerError>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f).await.map_err(|e| {
        tracing::error!("Blocking file task failed: {}", e);
        (StatusCode::INTERNAL_SERVER_ERROR, "Internal error")
    })
}

/// Builds an attachment disposition carrying both an ASCII fallback and the
/// RFC 5987 encoded name.
fn content_disposition(name: &str) -> String {
    let fallback: String = name
        .chars()
        .map(|c| match c {
            '"' | '\\' => '_',
            c if c.is_ascii() && !c.is_ascii_control() => c,
            _ => '_',
        })
        .collect();

    if fallback == name {
        format!("attachment; filename=\"{}\"", name)
    } else {
        format!(
            "attachment; filename=\"{}\"; filename*=UTF-8''{}",
            fallback,
            utf8_percent_encode(name, NON_ALPHANUMERIC)
        )
    }
}

fn header_value(value: &str) -> Result<HeaderValue, HandlerError> {
    HeaderValue::from_str(value).map_err(|e| {
        tracing::error!("Invalid response header value {:?}: {}", value, e);
        (StatusCode::INTERNAL_SERVER_ERROR, "Internal error")
    })
}
