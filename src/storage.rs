//! Collections file persistence
//!
//! The tree is mirrored into a single JSON array. The file is derived data:
//! read once at startup, rewritten after every mutation.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, WorkspaceError};
use crate::models::{
    BodyType, FieldKind, FormField, HttpMethod, KeyValue, NodeKind, RawType, RequestBody,
    RequestDescriptor,
};
use crate::tree::{join_path, MergeReport, NodeId, Tree};

/// On-disk node
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum StoredNode {
    Collection {
        name: String,
        #[serde(default)]
        children: Vec<StoredNode>,
    },
    Request {
        name: String,
        request: StoredRequest,
    },
}

fn enabled_by_default() -> bool {
    true
}

fn body_type_none() -> String {
    BodyType::None.as_str().to_string()
}

#[derive(Clone, Debug, Serialize, Deserialize)]
struct StoredPair {
    key: String,
    #[serde(default)]
    value: String,
    #[serde(default = "enabled_by_default")]
    enabled: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
struct StoredField {
    key: String,
    #[serde(default)]
    value: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    kind: Option<String>,
    #[serde(default = "enabled_by_default")]
    enabled: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(untagged)]
enum StoredBody {
    Fields(Vec<StoredField>),
    Text(String),
}

impl Default for StoredBody {
    fn default() -> Self {
        StoredBody::Text(String::new())
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
struct StoredRequest {
    #[serde(default)]
    method: HttpMethod,
    #[serde(default)]
    url: String,
    #[serde(default)]
    params: Vec<StoredPair>,
    #[serde(default)]
    headers: Vec<StoredPair>,
    #[serde(default = "body_type_none")]
    body_type: String,
    #[serde(default)]
    body: StoredBody,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    raw_type: Option<String>,
}

impl From<&KeyValue> for StoredPair {
    fn from(kv: &KeyValue) -> Self {
        StoredPair {
            key: kv.key.clone(),
            value: kv.value.clone(),
            enabled: kv.enabled,
        }
    }
}

impl From<StoredPair> for KeyValue {
    fn from(pair: StoredPair) -> Self {
        KeyValue {
            key: pair.key,
            value: pair.value,
            enabled: pair.enabled,
        }
    }
}

impl From<&RequestDescriptor> for StoredRequest {
    fn from(req: &RequestDescriptor) -> Self {
        let (body, raw_type) = match &req.body {
            RequestBody::None => (StoredBody::default(), None),
            RequestBody::FormData(fields) => (
                StoredBody::Fields(
                    fields
                        .iter()
                        .map(|f| StoredField {
                            key: f.key.clone(),
                            value: f.value.clone(),
                            kind: Some(f.kind.as_str().to_string()),
                            enabled: f.enabled,
                        })
                        .collect(),
                ),
                None,
            ),
            RequestBody::UrlEncoded(pairs) => (
                StoredBody::Fields(
                    pairs
                        .iter()
                        .map(|p| StoredField {
                            key: p.key.clone(),
                            value: p.value.clone(),
                            kind: None,
                            enabled: p.enabled,
                        })
                        .collect(),
                ),
                None,
            ),
            RequestBody::Raw { content, raw_type } => (
                StoredBody::Text(content.clone()),
                Some(raw_type.as_str().to_string()),
            ),
        };

        StoredRequest {
            method: req.method,
            url: req.url.clone(),
            params: req.params.iter().map(StoredPair::from).collect(),
            headers: req.headers.iter().map(StoredPair::from).collect(),
            body_type: req.body_type().as_str().to_string(),
            body,
            raw_type,
        }
    }
}

fn parse_field_kind(kind: Option<&str>) -> std::result::Result<FieldKind, String> {
    match kind.map(str::to_ascii_lowercase).as_deref() {
        None | Some("text") => Ok(FieldKind::Text),
        Some("file") => Ok(FieldKind::File),
        Some(other) => Err(format!("unknown form field type '{}'", other)),
    }
}

fn parse_raw_type(raw_type: Option<&str>) -> std::result::Result<RawType, String> {
    match raw_type.map(str::to_ascii_uppercase).as_deref() {
        None | Some("JSON") => Ok(RawType::Json),
        Some("TEXT") => Ok(RawType::Text),
        Some(other) => Err(format!("unknown raw type '{}'", other)),
    }
}

impl TryFrom<StoredRequest> for RequestDescriptor {
    type Error = String;

    fn try_from(stored: StoredRequest) -> std::result::Result<Self, Self::Error> {
        let body_type: BodyType = stored.body_type.parse()?;
        let body = match (body_type, stored.body) {
            (BodyType::None, _) => RequestBody::None,
            (BodyType::FormData, StoredBody::Fields(fields)) => RequestBody::FormData(
                fields
                    .into_iter()
                    .map(|f| {
                        Ok(FormField {
                            kind: parse_field_kind(f.kind.as_deref())?,
                            key: f.key,
                            value: f.value,
                            enabled: f.enabled,
                        })
                    })
                    .collect::<std::result::Result<_, String>>()?,
            ),
            (BodyType::UrlEncoded, StoredBody::Fields(fields)) => RequestBody::UrlEncoded(
                fields
                    .into_iter()
                    .map(|f| KeyValue {
                        key: f.key,
                        value: f.value,
                        enabled: f.enabled,
                    })
                    .collect(),
            ),
            (BodyType::FormData, StoredBody::Text(text)) if text.is_empty() => {
                RequestBody::FormData(Vec::new())
            }
            (BodyType::UrlEncoded, StoredBody::Text(text)) if text.is_empty() => {
                RequestBody::UrlEncoded(Vec::new())
            }
            (BodyType::Raw, StoredBody::Text(content)) => RequestBody::Raw {
                content,
                raw_type: parse_raw_type(stored.raw_type.as_deref())?,
            },
            (body_type, _) => {
                return Err(format!(
                    "body does not match body_type '{}'",
                    body_type.as_str()
                ))
            }
        };

        Ok(RequestDescriptor {
            method: stored.method,
            url: stored.url,
            params: stored.params.into_iter().map(KeyValue::from).collect(),
            headers: stored.headers.into_iter().map(KeyValue::from).collect(),
            body,
        })
    }
}

/// How an imported document combines with the current tree
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ImportMode {
    /// Graft imported nodes under the existing roots
    Merge,
    /// Clear the tree first
    Replace,
}

/// Outcome of a successful save
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SaveReport {
    pub requests_written: usize,
    pub requests_omitted: usize,
    pub bytes: u64,
}

/// Parses a collections document into a fresh tree.
///
/// Nothing is returned unless the whole document is valid.
pub fn parse_document(text: &str) -> Result<Tree> {
    let value: serde_json::Value = serde_json::from_str(text)
        .map_err(|e| WorkspaceError::ImportFormat(format!("invalid JSON: {}", e)))?;
    if !value.is_array() {
        return Err(WorkspaceError::ImportFormat(
            "document root must be an array of nodes".to_string(),
        ));
    }
    let nodes: Vec<StoredNode> =
        serde_json::from_value(value).map_err(|e| WorkspaceError::ImportFormat(e.to_string()))?;

    let mut tree = Tree::new();
    graft(&mut tree, &[], nodes)?;
    Ok(tree)
}

fn graft(tree: &mut Tree, parent: &[String], nodes: Vec<StoredNode>) -> Result<()> {
    let parent_path = (!parent.is_empty()).then(|| join_path(parent));
    for node in nodes {
        let created = match node {
            StoredNode::Collection { name, children } => tree
                .create_collection(parent_path.as_deref(), &name)
                .map(|_| Some((name, children))),
            StoredNode::Request { name, request } => {
                let descriptor = RequestDescriptor::try_from(request).map_err(|e| {
                    WorkspaceError::ImportFormat(format!("request '{}': {}", name, e))
                })?;
                tree.create_request(parent_path.as_deref(), &name, Some(descriptor))
                    .map(|_| None)
            }
        }
        .map_err(|e| match e {
            WorkspaceError::ImportFormat(_) => e,
            other => WorkspaceError::ImportFormat(other.to_string()),
        })?;

        if let Some((name, children)) = created {
            let mut path = parent.to_vec();
            path.push(name.trim().to_string());
            graft(tree, &path, children)?;
        }
    }
    Ok(())
}

/// Serializes the tree depth-first, skipping requests without a descriptor.
fn to_document(tree: &Tree) -> (Vec<StoredNode>, usize, usize) {
    let mut written = 0;
    let mut omitted = 0;
    let nodes = stored_children(tree, tree.roots(), &mut written, &mut omitted);
    (nodes, written, omitted)
}

fn stored_children(
    tree: &Tree,
    ids: &[NodeId],
    written: &mut usize,
    omitted: &mut usize,
) -> Vec<StoredNode> {
    let mut out = Vec::with_capacity(ids.len());
    for &id in ids {
        let Some(node) = tree.get(id) else {
            continue;
        };
        match node.kind {
            NodeKind::Collection => out.push(StoredNode::Collection {
                name: node.name.clone(),
                children: stored_children(tree, node.children(), written, omitted),
            }),
            NodeKind::Request => match &node.descriptor {
                Some(descriptor) => {
                    *written += 1;
                    out.push(StoredNode::Request {
                        name: node.name.clone(),
                        request: StoredRequest::from(descriptor),
                    });
                }
                None => *omitted += 1,
            },
        }
    }
    out
}

/// Reads and writes the collections file
#[derive(Clone, Debug)]
pub struct Storage {
    collections_file: PathBuf,
}

impl Storage {
    pub fn new(collections_file: impl Into<PathBuf>) -> Self {
        Storage {
            collections_file: collections_file.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.collections_file
    }

    /// Loads the tree; a missing file is an empty workspace.
    pub fn load(&self) -> Result<Tree> {
        let text = match fs::read_to_string(&self.collections_file) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::info!(path = %self.collections_file.display(), "No collections file yet, starting empty");
                return Ok(Tree::new());
            }
            Err(e) => return Err(WorkspaceError::persistence(&self.collections_file, e)),
        };
        let tree = parse_document(&text)?;
        tracing::info!(path = %self.collections_file.display(), nodes = tree.len(), "Loaded collections");
        Ok(tree)
    }

    /// Writes the tree atomically: temp file, length check, rename.
    pub fn save(&self, tree: &Tree) -> Result<SaveReport> {
        let (document, requests_written, requests_omitted) = to_document(tree);
        let mut json = serde_json::to_string_pretty(&document)
            .map_err(|e| WorkspaceError::persistence(&self.collections_file, e.into()))?;
        json.push('\n');

        let bytes = self.write_atomically(json.as_bytes())?;
        self.verify(&json);

        tracing::info!(
            path = %self.collections_file.display(),
            requests_written,
            requests_omitted,
            bytes,
            "Saved collections"
        );
        Ok(SaveReport {
            requests_written,
            requests_omitted,
            bytes,
        })
    }

    fn write_atomically(&self, contents: &[u8]) -> Result<u64> {
        let path = &self.collections_file;
        let fail = |e: io::Error| WorkspaceError::persistence(path, e);

        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir).map_err(fail)?;
        }

        let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
        tmp_name.push(".tmp");
        let tmp = path.with_file_name(tmp_name);

        let result = (|| -> io::Result<u64> {
            let mut file = fs::File::create(&tmp)?;
            file.write_all(contents)?;
            file.sync_all()?;
            let written = fs::metadata(&tmp)?.len();
            if written != contents.len() as u64 {
                return Err(io::Error::new(
                    io::ErrorKind::WriteZero,
                    format!("short write: {} of {} bytes", written, contents.len()),
                ));
            }
            fs::rename(&tmp, path)?;
            Ok(written)
        })();

        if result.is_err() {
            let _ = fs::remove_file(&tmp);
        }
        result.map_err(fail)
    }

    fn verify(&self, expected: &str) {
        match fs::read_to_string(&self.collections_file) {
            Ok(actual) if actual == expected => {
                tracing::debug!(path = %self.collections_file.display(), bytes = actual.len(), "Verified collections file");
            }
            Ok(actual) => {
                tracing::warn!(
                    path = %self.collections_file.display(),
                    expected = expected.len(),
                    actual = actual.len(),
                    "Collections file differs from what was written"
                );
            }
            Err(e) => {
                tracing::warn!(path = %self.collections_file.display(), error = %e, "Could not read back collections file");
            }
        }
    }

    /// Imports a document into `tree`. The tree is untouched on error.
    pub fn import_file(&self, tree: &mut Tree, source: &Path, mode: ImportMode) -> Result<MergeReport> {
        let text = fs::read_to_string(source).map_err(|e| WorkspaceError::persistence(source, e))?;
        let incoming = parse_document(&text)?;

        if mode == ImportMode::Replace {
            tree.clear();
        }
        let report = tree.merge_from(&incoming);
        tracing::info!(
            source = %source.display(),
            ?mode,
            added = report.added,
            updated = report.updated,
            skipped = report.skipped,
            "Imported collections"
        );
        Ok(report)
    }

    /// Moves an unreadable collections file aside so a fresh save cannot clobber it
    pub fn quarantine(&self) -> Result<PathBuf> {
        let stamp = chrono::Utc::now().format("%Y%m%dT%H%M%SZ");
        let mut name = self
            .collections_file
            .file_name()
            .unwrap_or_default()
            .to_os_string();
        name.push(format!(".corrupt-{}", stamp));
        let target = self.collections_file.with_file_name(name);
        fs::rename(&self.collections_file, &target)
            .map_err(|e| WorkspaceError::persistence(&self.collections_file, e))?;
        tracing::warn!(
            from = %self.collections_file.display(),
            to = %target.display(),
            "Moved unreadable collections file aside"
        );
        Ok(target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    fn descriptor_with_everything() -> RequestDescriptor {
        let mut req = RequestDescriptor::new(HttpMethod::POST, "https://api.example.com/upload");
        req.params.push(KeyValue::new("page", "1"));
        req.headers.push(KeyValue::new("X-Trace", "on").disabled());
        req.body = RequestBody::FormData(vec![
            FormField::text("title", "report"),
            FormField::file("attachment", "/tmp/report.pdf"),
        ]);
        req
    }

    fn populated() -> Tree {
        let mut tree = Tree::new();
        tree.create_collection(None, "Auth").unwrap();
        tree.create_request(
            Some("Auth"),
            "Login",
            Some(RequestDescriptor {
                body: RequestBody::json(r#"{"user":"me"}"#),
                ..RequestDescriptor::new(HttpMethod::POST, "https://api.example.com/login")
            }),
        )
        .unwrap();
        tree.create_request(Some("Auth"), "Unsaved", None).unwrap();
        tree.create_collection(Some("Auth"), "Empty").unwrap();
        tree.create_request(None, "Upload", Some(descriptor_with_everything()))
            .unwrap();
        tree
    }

    fn requests(tree: &Tree) -> Vec<(String, RequestDescriptor)> {
        tree.paths()
            .into_iter()
            .filter_map(|p| {
                let id = tree.resolve(&p)?;
                Some((p, tree.descriptor(id)?.clone()))
            })
            .collect()
    }

    #[test]
    fn test_missing_file_is_empty_tree() {
        let dir = tempdir().unwrap();
        let storage = Storage::new(dir.path().join("collections.json"));
        assert!(storage.load().unwrap().is_empty());
    }

    #[test]
    fn test_save_then_load_round_trip() {
        let dir = tempdir().unwrap();
        let storage = Storage::new(dir.path().join("nested").join("collections.json"));
        let tree = populated();

        let report = storage.save(&tree).unwrap();
        assert_eq!(report.requests_written, 2);
        assert_eq!(report.requests_omitted, 1);
        assert!(!dir.path().join("nested").join("collections.json.tmp").exists());

        let loaded = storage.load().unwrap();
        assert_eq!(loaded.paths(), vec!["Auth", "Auth/Login", "Auth/Empty", "Upload"]);
        assert_eq!(requests(&loaded), requests(&tree));
    }

    #[test]
    fn test_on_disk_shape() {
        let dir = tempdir().unwrap();
        let storage = Storage::new(dir.path().join("collections.json"));
        storage.save(&populated()).unwrap();

        let text = fs::read_to_string(storage.path()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        let login = &value[0]["children"][0];
        assert_eq!(value[0]["type"], "collection");
        assert_eq!(login["type"], "request");
        assert_eq!(login["request"]["method"], "POST");
        assert_eq!(login["request"]["body_type"], "raw");
        assert_eq!(login["request"]["raw_type"], "JSON");
        assert_eq!(login["request"]["body"], r#"{"user":"me"}"#);
        let upload = &value[1]["request"];
        assert_eq!(upload["body_type"], "form-data");
        assert_eq!(upload["body"][1]["type"], "File");
    }

    #[test]
    fn test_malformed_documents_rejected() {
        for doc in [
            r#"{"name": "Auth"}"#,
            r#"[{"name": "Auth", "type": "folder"}]"#,
            r#"[{"type": "collection"}]"#,
            r#"[{"name": "a/b", "type": "collection"}]"#,
            r#"[{"name": "A", "type": "collection"}, {"name": "A", "type": "collection"}]"#,
            r#"[{"name": "R", "type": "request", "request": {"body_type": "raw", "body": []}}]"#,
            "not json",
        ] {
            let err = parse_document(doc).unwrap_err();
            assert!(matches!(err, WorkspaceError::ImportFormat(_)), "{doc}");
        }
    }

    #[test]
    fn test_minimal_request_uses_defaults() {
        let tree = parse_document(
            r#"[{"name": "Ping", "type": "request", "request": {"url": "https://example.com",
                "headers": [{"key": "Accept", "value": "*/*"}]}}]"#,
        )
        .unwrap();
        let id = tree.resolve("Ping").unwrap();
        let req = tree.descriptor(id).unwrap();
        assert_eq!(req.method, HttpMethod::GET);
        assert_eq!(req.body, RequestBody::None);
        assert!(req.headers[0].enabled);
    }

    #[test]
    fn test_import_merge_and_replace() {
        let dir = tempdir().unwrap();
        let storage = Storage::new(dir.path().join("collections.json"));
        let source = dir.path().join("import.json");
        fs::write(
            &source,
            r#"[{"name": "Auth", "type": "collection", "children": [
                   {"name": "Logout", "type": "request", "request": {"url": "https://x/logout"}}]},
                {"name": "Billing", "type": "collection"}]"#,
        )
        .unwrap();

        let mut tree = populated();
        let report = storage
            .import_file(&mut tree, &source, ImportMode::Merge)
            .unwrap();
        assert_eq!(report.added, 2);
        assert!(tree.resolve("Auth/Login").is_some());
        assert!(tree.resolve("Auth/Logout").is_some());

        storage
            .import_file(&mut tree, &source, ImportMode::Replace)
            .unwrap();
        assert_eq!(tree.paths(), vec!["Auth", "Auth/Logout", "Billing"]);
    }

    #[test]
    fn test_bad_import_leaves_tree_untouched() {
        let dir = tempdir().unwrap();
        let storage = Storage::new(dir.path().join("collections.json"));
        let source = dir.path().join("import.json");
        fs::write(&source, r#"[{"name": "Ok", "type": "collection"}, {"name": "Bad"}]"#).unwrap();

        let mut tree = populated();
        let before = tree.paths();
        let err = storage
            .import_file(&mut tree, &source, ImportMode::Replace)
            .unwrap_err();
        assert!(matches!(err, WorkspaceError::ImportFormat(_)));
        assert_eq!(tree.paths(), before);
    }

    #[test]
    fn test_quarantine_moves_file_aside() {
        let dir = tempdir().unwrap();
        let storage = Storage::new(dir.path().join("collections.json"));
        fs::write(storage.path(), "{ broken").unwrap();
        assert!(matches!(storage.load(), Err(WorkspaceError::ImportFormat(_))));

        let moved = storage.quarantine().unwrap();
        assert!(moved.exists());
        assert!(!storage.path().exists());
        assert!(storage.load().unwrap().is_empty());
    }
}
