use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// HTTP Method enum
#[allow(clippy::upper_case_acronyms)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum HttpMethod {
    #[default]
    GET,
    POST,
    PUT,
    DELETE,
    PATCH,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::GET => "GET",
            HttpMethod::POST => "POST",
            HttpMethod::PUT => "PUT",
            HttpMethod::DELETE => "DELETE",
            HttpMethod::PATCH => "PATCH",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HttpMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "GET" => Ok(HttpMethod::GET),
            "POST" => Ok(HttpMethod::POST),
            "PUT" => Ok(HttpMethod::PUT),
            "DELETE" => Ok(HttpMethod::DELETE),
            "PATCH" => Ok(HttpMethod::PATCH),
            other => Err(format!("unsupported method '{}'", other)),
        }
    }
}

/// A query parameter, header or url-encoded field
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeyValue {
    pub key: String,
    pub value: String,
    pub enabled: bool,
}

impl KeyValue {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        KeyValue {
            key: key.into(),
            value: value.into(),
            enabled: true,
        }
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}

/// Kind of a multipart form field
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum FieldKind {
    #[default]
    Text,
    /// The field value is a path on the local filesystem
    File,
}

impl FieldKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldKind::Text => "Text",
            FieldKind::File => "File",
        }
    }
}

/// A multipart form-data field
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FormField {
    pub key: String,
    pub value: String,
    pub kind: FieldKind,
    pub enabled: bool,
}

impl FormField {
    pub fn text(key: impl Into<String>, value: impl Into<String>) -> Self {
        FormField {
            key: key.into(),
            value: value.into(),
            kind: FieldKind::Text,
            enabled: true,
        }
    }

    pub fn file(key: impl Into<String>, path: impl Into<String>) -> Self {
        FormField {
            key: key.into(),
            value: path.into(),
            kind: FieldKind::File,
            enabled: true,
        }
    }
}

/// Subtype of a raw body
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum RawType {
    #[default]
    Json,
    Text,
}

impl RawType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RawType::Json => "JSON",
            RawType::Text => "TEXT",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            RawType::Json => "application/json",
            RawType::Text => "text/plain",
        }
    }
}

/// Discriminant of [`RequestBody`], as written to disk
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BodyType {
    None,
    FormData,
    UrlEncoded,
    Raw,
}

impl BodyType {
    pub fn as_str(&self) -> &'static str {
        match self {
            BodyType::None => "none",
            BodyType::FormData => "form-data",
            BodyType::UrlEncoded => "x-www-form-urlencoded",
            BodyType::Raw => "raw",
        }
    }
}

impl FromStr for BodyType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(BodyType::None),
            "form-data" => Ok(BodyType::FormData),
            "x-www-form-urlencoded" | "url-encoded" => Ok(BodyType::UrlEncoded),
            "raw" => Ok(BodyType::Raw),
            other => Err(format!("unknown body type '{}'", other)),
        }
    }
}

/// Request body, shaped by its body type
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub enum RequestBody {
    #[default]
    None,
    FormData(Vec<FormField>),
    UrlEncoded(Vec<KeyValue>),
    Raw { content: String, raw_type: RawType },
}

impl RequestBody {
    pub fn body_type(&self) -> BodyType {
        match self {
            RequestBody::None => BodyType::None,
            RequestBody::FormData(_) => BodyType::FormData,
            RequestBody::UrlEncoded(_) => BodyType::UrlEncoded,
            RequestBody::Raw { .. } => BodyType::Raw,
        }
    }

    pub fn json(content: impl Into<String>) -> Self {
        RequestBody::Raw {
            content: content.into(),
            raw_type: RawType::Json,
        }
    }
}

/// Everything needed to issue one HTTP request.
///
/// Stored on Request nodes once saved, snapshotted into tabs while editing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RequestDescriptor {
    pub method: HttpMethod,
    pub url: String,
    pub params: Vec<KeyValue>,
    pub headers: Vec<KeyValue>,
    pub body: RequestBody,
}

impl RequestDescriptor {
    pub fn new(method: HttpMethod, url: impl Into<String>) -> Self {
        RequestDescriptor {
            method,
            url: url.into(),
            params: Vec::new(),
            headers: Vec::new(),
            body: RequestBody::None,
        }
    }

    pub fn body_type(&self) -> BodyType {
        self.body.body_type()
    }

    pub fn enabled_params(&self) -> impl Iterator<Item = &KeyValue> {
        self.params.iter().filter(|p| p.enabled)
    }

    pub fn enabled_headers(&self) -> impl Iterator<Item = &KeyValue> {
        self.headers.iter().filter(|h| h.enabled)
    }
}

impl Default for RequestDescriptor {
    fn default() -> Self {
        use crate::constants::DEFAULT_HTTP_URL;
        RequestDescriptor::new(HttpMethod::GET, DEFAULT_HTTP_URL)
    }
}

/// Node kind in the workspace tree
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Collection,
    Request,
}

impl NodeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::Collection => "collection",
            NodeKind::Request => "request",
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Response from HTTP request
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    pub status_text: String,
    pub headers: Vec<(String, String)>,
    pub body: String,
    pub elapsed_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_parse_is_case_insensitive() {
        assert_eq!("patch".parse::<HttpMethod>().unwrap(), HttpMethod::PATCH);
        assert!("HEAD".parse::<HttpMethod>().is_err());
    }

    #[test]
    fn test_enabled_filters() {
        let mut req = RequestDescriptor::new(HttpMethod::GET, "https://example.com");
        req.headers.push(KeyValue::new("Accept", "application/json"));
        req.headers.push(KeyValue::new("X-Debug", "1").disabled());
        req.params.push(KeyValue::new("page", "2").disabled());

        let headers: Vec<_> = req.enabled_headers().map(|h| h.key.as_str()).collect();
        assert_eq!(headers, vec!["Accept"]);
        assert_eq!(req.enabled_params().count(), 0);
    }

    #[test]
    fn test_body_type_names() {
        assert_eq!(RequestBody::json("{}").body_type().as_str(), "raw");
        assert_eq!(
            "x-www-form-urlencoded".parse::<BodyType>().unwrap(),
            BodyType::UrlEncoded
        );
    }
}
