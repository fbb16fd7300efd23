use super::uri;
use super::CompileOptions;
use crate::error::SchemaCompileError;
use futures::future::join_all;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};
use url::Url;

/// Where a document comes from.
#[derive(Debug, Clone)]
pub enum SchemaSource {
    /// Already parsed document.
    Value(Value),
    /// Filesystem path or `file://`/`http(s)://` URL.
    Location(String),
}

impl From<Value> for SchemaSource {
    fn from(value: Value) -> Self {
        SchemaSource::Value(value)
    }
}

impl From<&str> for SchemaSource {
    fn from(location: &str) -> Self {
        SchemaSource::Location(location.to_string())
    }
}

impl From<String> for SchemaSource {
    fn from(location: String) -> Self {
        SchemaSource::Location(location)
    }
}

impl From<&Path> for SchemaSource {
    fn from(path: &Path) -> Self {
        SchemaSource::Location(path.to_string_lossy().into_owned())
    }
}

impl From<PathBuf> for SchemaSource {
    fn from(path: PathBuf) -> Self {
        SchemaSource::Location(path.to_string_lossy().into_owned())
    }
}

/// A loaded document and the base URI its relative refs resolve against.
#[derive(Debug, Clone)]
pub struct Document {
    pub base: Url,
    pub value: Arc<Value>,
}

/// Every document reachable from a root, keyed by URL without fragment.
///
/// A document with an absolute `$id` is stored under both its fetch URL and
/// its id.
#[derive(Debug, Clone, Default)]
pub struct DocumentStore {
    documents: HashMap<String, Document>,
}

impl DocumentStore {
    #[must_use]
    pub fn get(&self, doc: &str) -> Option<&Document> {
        self.documents.get(doc)
    }

    #[must_use]
    pub fn contains(&self, doc: &str) -> bool {
        self.documents.contains_key(doc)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Look up the raw value a canonical URI points at, together with the
    /// base URI of its document.
    #[must_use]
    pub fn resolve(&self, canonical: &str) -> Option<(&Value, &Url)> {
        let (doc, fragment) = uri::split(canonical);
        let document = self.documents.get(doc)?;
        let fragment = urlencoding::decode(fragment).ok()?;
        let value = if fragment.is_empty() {
            document.value.as_ref()
        } else if fragment.starts_with('/') {
            document.value.pointer(&fragment)?
        } else {
            // plain-name anchors are not supported
            return None;
        };
        Some((value, &document.base))
    }

    /// Insert a document fetched from `url`; returns the base URI its refs
    /// resolve against.
    pub fn insert(&mut self, url: &Url, value: Value) -> Url {
        let value = Arc::new(value);
        let base = document_id(&value, url).unwrap_or_else(|| url.clone());
        let document = Document {
            base: base.clone(),
            value,
        };
        let key = uri::canonical(url.clone());
        let id_key = uri::canonical(base.clone());
        if id_key != key {
            debug!(url = %key, id = %id_key, "Document rebased by $id");
            self.documents.insert(id_key, document.clone());
        }
        self.documents.insert(key, document);
        base
    }
}

/// Root `$id` (or draft-04 `id`) when it is a usable absolute or relative URI.
fn document_id(value: &Value, fetched_from: &Url) -> Option<Url> {
    let id = value
        .get("$id")
        .or_else(|| value.get("id"))
        .and_then(Value::as_str)?;
    let mut url = fetched_from.join(id).ok()?;
    url.set_fragment(None);
    Some(url)
}

/// Result of loading a root document and everything it references.
#[derive(Debug, Clone)]
pub struct LoadedDocuments {
    /// Base URI of the root document.
    pub base: Url,
    /// The root document.
    pub root: Arc<Value>,
    pub store: DocumentStore,
}

/// Load `source` and, transitively, every external document referenced by a
/// `$ref` anywhere inside it.
///
/// Fetches run concurrently, one wave per reference depth. URIs already
/// loaded or in flight are never requested twice, so circular references
/// between documents terminate.
pub async fn load_documents(
    source: SchemaSource,
    options: &CompileOptions,
) -> Result<LoadedDocuments, SchemaCompileError> {
    let loader = Loader::new(options)?;
    let mut store = DocumentStore::default();

    let (root_url, root_value) = match source {
        SchemaSource::Value(value) => (uri::memory_root(), value),
        SchemaSource::Location(location) => {
            let url = uri::from_location(&location)?;
            let value = loader.fetch(&url).await?;
            (url, value)
        }
    };
    let base = store.insert(&root_url, root_value);

    let mut requested: HashSet<String> = HashSet::new();
    requested.insert(uri::canonical(root_url.clone()));
    requested.insert(uri::canonical(base.clone()));

    let mut pending = external_documents(&store, &base, &mut requested);
    while !pending.is_empty() {
        debug!(count = pending.len(), "Fetching referenced documents");
        let fetched = join_all(pending.iter().map(|url| loader.fetch(url))).await;

        let mut next = Vec::new();
        for (url, result) in pending.into_iter().zip(fetched) {
            let doc_base = store.insert(&url, result?);
            requested.insert(uri::canonical(doc_base.clone()));
            next.extend(external_documents(&store, &doc_base, &mut requested));
        }
        pending = next;
    }

    let root = store
        .get(&uri::canonical(base.clone()))
        .map(|doc| Arc::clone(&doc.value))
        .ok_or_else(|| SchemaCompileError::UnresolvedRef {
            reference: base.to_string(),
            canonical: base.to_string(),
        })?;

    info!(
        root = %base,
        documents = store.len(),
        "Schema documents loaded"
    );

    Ok(LoadedDocuments { base, root, store })
}

/// Document URLs referenced from the document at `base` that have not been
/// requested yet.
fn external_documents(
    store: &DocumentStore,
    base: &Url,
    requested: &mut HashSet<String>,
) -> Vec<Url> {
    let Some(document) = store.get(&uri::canonical(base.clone())) else {
        return Vec::new();
    };
    let mut refs = Vec::new();
    collect_refs(&document.value, &mut refs);

    let mut out = Vec::new();
    for reference in refs {
        let Ok(mut url) = base.join(reference) else {
            warn!(reference = %reference, base = %base, "Skipping unparseable $ref");
            continue;
        };
        url.set_fragment(None);
        let key = uri::canonical(url.clone());
        if store.contains(&key) || !requested.insert(key) {
            continue;
        }
        out.push(url);
    }
    out
}

/// Every `$ref` string anywhere in a JSON tree.
fn collect_refs<'a>(value: &'a Value, out: &mut Vec<&'a str>) {
    match value {
        Value::Object(obj) => {
            if let Some(reference) = obj.get("$ref").and_then(Value::as_str) {
                out.push(reference);
            }
            for v in obj.values() {
                collect_refs(v, out);
            }
        }
        Value::Array(items) => {
            for v in items {
                collect_refs(v, out);
            }
        }
        _ => {}
    }
}

struct Loader {
    client: Option<reqwest::Client>,
    allow_remote: bool,
}

impl Loader {
    fn new(options: &CompileOptions) -> Result<Self, SchemaCompileError> {
        let client = if options.allow_remote_refs {
            Some(
                reqwest::Client::builder()
                    .timeout(options.fetch_timeout)
                    .build()
                    .map_err(|e| SchemaCompileError::Fetch {
                        url: String::new(),
                        message: e.to_string(),
                    })?,
            )
        } else {
            None
        };
        Ok(Self {
            client,
            allow_remote: options.allow_remote_refs,
        })
    }

    async fn fetch(&self, url: &Url) -> Result<Value, SchemaCompileError> {
        let text = match url.scheme() {
            "file" => {
                let path = url
                    .to_file_path()
                    .map_err(|_| SchemaCompileError::InvalidUri {
                        uri: url.to_string(),
                        message: "not a local file".to_string(),
                    })?;
                read_file(&path).await?
            }
            "http" | "https" => self.fetch_remote(url).await?,
            _ => {
                return Err(SchemaCompileError::UnsupportedScheme {
                    url: url.to_string(),
                })
            }
        };
        parse_document(url, &text)
    }

    async fn fetch_remote(&self, url: &Url) -> Result<String, SchemaCompileError> {
        let client = match (&self.client, self.allow_remote) {
            (Some(client), true) => client,
            _ => {
                return Err(SchemaCompileError::RemoteDisabled {
                    url: url.to_string(),
                })
            }
        };
        let fetch_err = |e: reqwest::Error| SchemaCompileError::Fetch {
            url: url.to_string(),
            message: e.to_string(),
        };

        let start = std::time::Instant::now();
        let response = client
            .get(url.clone())
            .send()
            .await
            .map_err(fetch_err)?
            .error_for_status()
            .map_err(fetch_err)?;
        let text = response.text().await.map_err(fetch_err)?;

        info!(
            url = %url,
            bytes = text.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Remote schema document fetched"
        );
        Ok(text)
    }
}

async fn read_file(path: &Path) -> Result<String, SchemaCompileError> {
    match tokio::fs::read_to_string(path).await {
        Ok(text) => Ok(text),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(SchemaCompileError::FileNotFound {
                path: path.to_path_buf(),
            })
        }
        Err(source) => Err(SchemaCompileError::ReadError {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Parse document text as YAML when the URL says so, JSON otherwise.
pub fn parse_document(url: &Url, text: &str) -> Result<Value, SchemaCompileError> {
    let path = url.path();
    if path.ends_with(".yaml") || path.ends_with(".yml") {
        serde_yaml::from_str(text).map_err(|source| SchemaCompileError::InvalidYaml {
            uri: url.to_string(),
            source,
        })
    } else {
        serde_json::from_str(text).map_err(|source| SchemaCompileError::InvalidJson {
            uri: url.to_string(),
            source,
        })
    }
}
