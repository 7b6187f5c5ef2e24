//! HTTP client wrapper - snapshots requests, executes them and formats responses

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use reqwest::multipart::{Form, Part};
use tokio_util::io::ReaderStream;
use tokio_util::sync::CancellationToken;

use crate::constants::{APP_NAME, APP_VERSION};
use crate::messages::ExecutionOutcome;
use crate::models::{FieldKind, HttpMethod, RequestBody, RequestDescriptor, Response};
use crate::settings::CancelStrategy;

/// Body resolved from a descriptor, enabled entries only
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PreparedBody {
    None,
    Raw {
        content: String,
        content_type: &'static str,
    },
    UrlEncoded(Vec<(String, String)>),
    Multipart(Vec<PreparedPart>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PreparedPart {
    Text { key: String, value: String },
    /// Opened on the worker, right before dispatch
    File { key: String, path: PathBuf },
}

/// Immutable snapshot of what gets sent
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedRequest {
    pub method: HttpMethod,
    pub url: String,
    pub params: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub body: PreparedBody,
}

impl PreparedRequest {
    pub fn snapshot(descriptor: &RequestDescriptor) -> Self {
        let body = match &descriptor.body {
            RequestBody::None => PreparedBody::None,
            RequestBody::Raw { content, raw_type } => PreparedBody::Raw {
                content: content.clone(),
                content_type: raw_type.content_type(),
            },
            RequestBody::UrlEncoded(fields) => PreparedBody::UrlEncoded(
                fields
                    .iter()
                    .filter(|f| f.enabled)
                    .map(|f| (f.key.clone(), f.value.clone()))
                    .collect(),
            ),
            RequestBody::FormData(fields) => PreparedBody::Multipart(
                fields
                    .iter()
                    .filter(|f| f.enabled)
                    .map(|f| match f.kind {
                        FieldKind::Text => PreparedPart::Text {
                            key: f.key.clone(),
                            value: f.value.clone(),
                        },
                        FieldKind::File => PreparedPart::File {
                            key: f.key.clone(),
                            path: PathBuf::from(&f.value),
                        },
                    })
                    .collect(),
            ),
        };

        PreparedRequest {
            method: descriptor.method,
            url: descriptor.url.trim().to_string(),
            params: descriptor
                .enabled_params()
                .map(|p| (p.key.clone(), p.value.clone()))
                .collect(),
            headers: descriptor
                .enabled_headers()
                .map(|h| (h.key.clone(), h.value.clone()))
                .collect(),
            body,
        }
    }

    fn has_header(&self, name: &str) -> bool {
        self.headers.iter().any(|(k, _)| k.eq_ignore_ascii_case(name))
    }

    pub fn open_file_count(&self) -> usize {
        match &self.body {
            PreparedBody::Multipart(parts) => parts
                .iter()
                .filter(|p| matches!(p, PreparedPart::File { .. }))
                .count(),
            _ => 0,
        }
    }
}

fn to_reqwest_method(method: HttpMethod) -> reqwest::Method {
    match method {
        HttpMethod::GET => reqwest::Method::GET,
        HttpMethod::POST => reqwest::Method::POST,
        HttpMethod::PUT => reqwest::Method::PUT,
        HttpMethod::DELETE => reqwest::Method::DELETE,
        HttpMethod::PATCH => reqwest::Method::PATCH,
    }
}

/// Opens an upload file as a streaming multipart part
async fn file_part(path: &Path) -> Result<Part, String> {
    let file = tokio::fs::File::open(path)
        .await
        .map_err(|e| format!("Cannot open upload {}: {}", path.display(), e))?;
    let length = file
        .metadata()
        .await
        .map_err(|e| format!("Cannot stat upload {}: {}", path.display(), e))?
        .len();
    let body = reqwest::Body::wrap_stream(ReaderStream::new(file));
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| String::from("upload"));
    let mime = mime_guess::from_path(path).first_or_octet_stream();

    Part::stream_with_length(body, length)
        .file_name(file_name)
        .mime_str(mime.as_ref())
        .map_err(|e| format!("Invalid mime type for {}: {}", path.display(), e))
}

/// Build a request from the snapshot. Upload files are opened here and
/// owned by the returned builder.
async fn build_request(
    client: &reqwest::Client,
    request: &PreparedRequest,
) -> Result<reqwest::RequestBuilder, String> {
    let mut req_builder = client.request(to_reqwest_method(request.method), &request.url);

    if !request.params.is_empty() {
        req_builder = req_builder.query(&request.params);
    }

    for (key, value) in &request.headers {
        req_builder = req_builder.header(key, value);
    }

    req_builder = match &request.body {
        PreparedBody::None => req_builder,
        PreparedBody::Raw {
            content,
            content_type,
        } => {
            if !request.has_header("content-type") {
                req_builder = req_builder.header(reqwest::header::CONTENT_TYPE, *content_type);
            }
            req_builder.body(content.clone())
        }
        PreparedBody::UrlEncoded(fields) => req_builder.form(fields),
        PreparedBody::Multipart(parts) => {
            let mut form = Form::new();
            for part in parts {
                form = match part {
                    PreparedPart::Text { key, value } => form.text(key.clone(), value.clone()),
                    PreparedPart::File { key, path } => form.part(key.clone(), file_part(path).await?),
                };
            }
            req_builder.multipart(form)
        }
    };

    Ok(req_builder)
}

fn describe_error(e: &reqwest::Error, timeout: Duration) -> String {
    if e.is_timeout() {
        format!("Request timed out ({}s)", timeout.as_secs())
    } else if e.is_connect() {
        format!("Connection failed: {}", e)
    } else if e.is_builder() {
        format!("Invalid request: {}", e)
    } else {
        format!("Request failed: {}", e)
    }
}

/// Sends the request and reads the whole response
async fn call(
    req_builder: reqwest::RequestBuilder,
    start: Instant,
    timeout: Duration,
) -> Result<Response, String> {
    let resp = req_builder
        .send()
        .await
        .map_err(|e| describe_error(&e, timeout))?;

    let status = resp.status();
    let headers = resp
        .headers()
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_str().unwrap_or("<binary>").to_string()))
        .collect();
    let body = resp
        .text()
        .await
        .map_err(|e| format!("Error reading body: {}", e))?;

    let formatted = if let Ok(json) = serde_json::from_str::<serde_json::Value>(&body) {
        serde_json::to_string_pretty(&json).unwrap_or(body)
    } else {
        body
    };

    Ok(Response {
        status: status.as_u16(),
        status_text: status.canonical_reason().unwrap_or("").to_string(),
        headers,
        body: formatted,
        elapsed_ms: start.elapsed().as_millis() as u64,
    })
}

/// Execute a prepared request and produce its terminal outcome.
///
/// Everything opened for the call, upload files included, is dropped
/// before this returns.
pub async fn execute_request(
    client: &reqwest::Client,
    request: PreparedRequest,
    cancel: &CancellationToken,
    strategy: CancelStrategy,
    timeout: Duration,
) -> ExecutionOutcome {
    if cancel.is_cancelled() {
        return ExecutionOutcome::Cancelled;
    }

    let start = Instant::now();
    let uploads = request.open_file_count();

    let result = {
        let req_builder = match build_request(client, &request).await {
            Ok(builder) => builder,
            Err(message) => {
                return ExecutionOutcome::Failed {
                    message,
                    elapsed_ms: start.elapsed().as_millis() as u64,
                }
            }
        };

        match strategy {
            CancelStrategy::Preemptive => {
                tokio::select! {
                    biased;

                    _ = cancel.cancelled() => None,
                    result = call(req_builder, start, timeout) => Some(result),
                }
            }
            CancelStrategy::Cooperative => {
                // Checkpoint before dispatch
                if cancel.is_cancelled() {
                    None
                } else {
                    Some(call(req_builder, start, timeout).await)
                }
            }
        }
    };

    if uploads > 0 {
        tracing::debug!(uploads, "Upload files released");
    }

    match result {
        None => ExecutionOutcome::Cancelled,
        // Checkpoint after the call returns
        Some(_) if cancel.is_cancelled() => ExecutionOutcome::Cancelled,
        Some(Ok(response)) => ExecutionOutcome::Completed(response),
        Some(Err(message)) => ExecutionOutcome::Failed {
            message,
            elapsed_ms: start.elapsed().as_millis() as u64,
        },
    }
}

/// Create an HTTP client with default configuration
pub fn create_client(timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(format!("{}/{}", APP_NAME, APP_VERSION))
        .build()
        .unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Falling back to default HTTP client");
            reqwest::Client::new()
        })
}
