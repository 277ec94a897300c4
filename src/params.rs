use crate::error::{Result, SnsError};
use indexmap::IndexMap;
use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Everything except the RFC 3986 unreserved characters is escaped, `/` included.
const ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

const OCTET_STREAM: &str = "application/octet-stream";

/// Filename sent for every file part; the real name never leaves the client.
const MULTIPART_FILENAME: &str = "hidden";

/// Percent-encode a string the way both the query codec and the OAuth signer expect.
pub fn percent_encode(s: &str) -> String {
    utf8_percent_encode(s, ENCODE_SET).to_string()
}

/// File payload for an upload parameter.
///
/// The source is read exactly once, when the value is built.
#[derive(Clone, PartialEq, Eq)]
pub struct FileParam {
    name: Option<String>,
    content: Vec<u8>,
}

impl FileParam {
    /// Read the whole payload from `reader`; `name` only drives the MIME guess
    pub fn from_reader<R: Read>(name: Option<&str>, mut reader: R) -> Result<Self> {
        let mut content = Vec::new();
        reader.read_to_end(&mut content)?;
        Ok(FileParam {
            name: name.map(str::to_string),
            content,
        })
    }

    /// Wrap an in-memory payload
    pub fn from_bytes(name: Option<&str>, content: impl Into<Vec<u8>>) -> Self {
        FileParam {
            name: name.map(str::to_string),
            content: content.into(),
        }
    }

    /// Read a file from disk, naming the payload after it
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let name = path.file_name().and_then(|n| n.to_str());
        Self::from_reader(name, file)
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn content(&self) -> &[u8] {
        &self.content
    }

    /// MIME type guessed from the name's extension
    pub fn content_type(&self) -> String {
        guess_content_type(self.name.as_deref().unwrap_or(""))
    }
}

impl fmt::Debug for FileParam {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileParam")
            .field("name", &self.name)
            .field("len", &self.content.len())
            .finish()
    }
}

/// Guess a content type from the extension of `name`.
///
/// Anything after the last `.` is treated as the extension, compared
/// case-insensitively; unknown or missing extensions fall back to
/// `application/octet-stream`.
pub fn guess_content_type(name: &str) -> String {
    match name.rfind('.') {
        Some(n) => {
            let ext = name[n + 1..].to_ascii_lowercase();
            if ext.is_empty() || ext.contains('/') {
                return OCTET_STREAM.to_string();
            }
            mime_guess::from_ext(&ext)
                .first_raw()
                .unwrap_or(OCTET_STREAM)
                .to_string()
        }
        None => OCTET_STREAM.to_string(),
    }
}

/// A single parameter value
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Text(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    /// Expands to one `k=v` pair per element
    List(Vec<ParamValue>),
    File(FileParam),
}

impl ParamValue {
    pub fn is_file(&self) -> bool {
        match self {
            ParamValue::File(_) => true,
            ParamValue::List(items) => items.iter().any(ParamValue::is_file),
            _ => false,
        }
    }

    /// Append the stringified scalar(s) of this value to `out`
    fn collect_text(&self, key: &str, out: &mut Vec<(String, String)>) -> Result<()> {
        match self {
            ParamValue::Text(s) => out.push((key.to_string(), s.clone())),
            ParamValue::Int(i) => out.push((key.to_string(), i.to_string())),
            ParamValue::Float(f) => out.push((key.to_string(), f.to_string())),
            ParamValue::Bool(b) => out.push((key.to_string(), b.to_string())),
            ParamValue::List(items) => {
                for item in items {
                    item.collect_text(key, out)?;
                }
            }
            ParamValue::File(_) => {
                return Err(SnsError::configuration(
                    format!("file parameter '{}' requires a multipart upload", key),
                    key,
                ))
            }
        }
        Ok(())
    }
}

macro_rules! impl_from_int {
    ($($t:ty),*) => {
        $(impl From<$t> for ParamValue {
            fn from(v: $t) -> Self {
                ParamValue::Int(v as i64)
            }
        })*
    };
}

impl_from_int!(i8, i16, i32, i64, u8, u16, u32);

impl From<u64> for ParamValue {
    fn from(v: u64) -> Self {
        match i64::try_from(v) {
            Ok(i) => ParamValue::Int(i),
            Err(_) => ParamValue::Text(v.to_string()),
        }
    }
}

impl From<f32> for ParamValue {
    fn from(v: f32) -> Self {
        ParamValue::Float(v as f64)
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        ParamValue::Float(v)
    }
}

impl From<bool> for ParamValue {
    fn from(v: bool) -> Self {
        ParamValue::Bool(v)
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        ParamValue::Text(v.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(v: String) -> Self {
        ParamValue::Text(v)
    }
}

impl From<&String> for ParamValue {
    fn from(v: &String) -> Self {
        ParamValue::Text(v.clone())
    }
}

impl From<FileParam> for ParamValue {
    fn from(v: FileParam) -> Self {
        ParamValue::File(v)
    }
}

impl<T: Into<ParamValue>> From<Vec<T>> for ParamValue {
    fn from(v: Vec<T>) -> Self {
        ParamValue::List(v.into_iter().map(Into::into).collect())
    }
}

/// Insertion-ordered parameter map for one API call
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Params {
    entries: IndexMap<String, ParamValue>,
}

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn set(mut self, key: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.insert(key, value);
        self
    }

    /// Insert or replace a value, keeping the original position on replace
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<ParamValue>) -> Option<ParamValue> {
        self.entries.insert(key.into(), value.into())
    }

    pub fn get(&self, key: &str) -> Option<&ParamValue> {
        self.entries.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<ParamValue> {
        self.entries.shift_remove(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Whether any value carries a file payload
    pub fn has_file(&self) -> bool {
        self.entries.values().any(ParamValue::is_file)
    }

    /// Move every entry of `other` into `self`
    pub fn extend(&mut self, other: Params) {
        self.entries.extend(other.entries);
    }

    /// Convert a serializable object into parameters.
    ///
    /// Nulls are skipped; nested objects are sent as JSON text.
    pub fn from_serialize<T: Serialize>(value: &T) -> Result<Self> {
        match serde_json::to_value(value)? {
            Value::Object(map) => {
                let mut params = Params::new();
                for (k, v) in map {
                    if let Some(pv) = json_to_param(v) {
                        params.insert(k, pv);
                    }
                }
                Ok(params)
            }
            Value::Null => Ok(Params::new()),
            other => Err(SnsError::configuration(
                format!("parameters must serialize to an object, got {}", other),
                "params",
            )),
        }
    }

    /// Flatten into stringified `(key, value)` pairs; fails on file values
    pub fn pairs(&self) -> Result<Vec<(String, String)>> {
        let mut out = Vec::with_capacity(self.entries.len());
        for (k, v) in &self.entries {
            v.collect_text(k, &mut out)?;
        }
        Ok(out)
    }
}

fn json_to_param(value: Value) -> Option<ParamValue> {
    match value {
        Value::Null => None,
        Value::Bool(b) => Some(ParamValue::Bool(b)),
        Value::Number(n) => Some(match n.as_i64() {
            Some(i) => ParamValue::Int(i),
            None => ParamValue::Text(n.to_string()),
        }),
        Value::String(s) => Some(ParamValue::Text(s)),
        Value::Array(items) => Some(ParamValue::List(
            items.into_iter().filter_map(json_to_param).collect(),
        )),
        obj @ Value::Object(_) => Some(ParamValue::Text(obj.to_string())),
    }
}

impl<K, V> FromIterator<(K, V)> for Params
where
    K: Into<String>,
    V: Into<ParamValue>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut params = Params::new();
        for (k, v) in iter {
            params.insert(k, v);
        }
        params
    }
}

/// Encode pairs as `k=v&k=v` with keys and values percent-encoded
pub fn encode_pairs(pairs: &[(String, String)]) -> String {
    pairs
        .iter()
        .map(|(k, v)| format!("{}={}", percent_encode(k), percent_encode(v)))
        .collect::<Vec<_>>()
        .join("&")
}

/// Encode parameters as a query string
pub fn encode_query(params: &Params) -> Result<String> {
    Ok(encode_pairs(&params.pairs()?))
}

/// Decode a `k=v&k=v` body. Entries without a key are ignored; later
/// duplicates win.
pub fn parse_query(text: &str) -> IndexMap<String, String> {
    let mut out = IndexMap::new();
    for part in text.trim().split('&') {
        let Some((k, v)) = part.split_once('=') else {
            continue;
        };
        if k.is_empty() {
            continue;
        }
        let key = percent_decode_str(k).decode_utf8_lossy().into_owned();
        let value = percent_decode_str(&v.replace('+', " "))
            .decode_utf8_lossy()
            .into_owned();
        out.insert(key, value);
    }
    out
}

/// A built `multipart/form-data` body
#[derive(Debug, Clone)]
pub struct Multipart {
    pub boundary: String,
    pub body: Vec<u8>,
}

impl Multipart {
    /// Value for the `Content-Type` request header
    pub fn content_type(&self) -> String {
        format!("multipart/form-data; boundary={}", self.boundary)
    }
}

fn new_boundary() -> String {
    format!("----------{}", uuid::Uuid::new_v4().simple())
}

/// Encode parameters as a multipart body with a fresh boundary
pub fn encode_multipart(params: &Params) -> Multipart {
    encode_multipart_with_boundary(params, new_boundary())
}

/// Encode parameters as a multipart body delimited by `boundary`.
///
/// Lines are joined with CRLF; each file part carries a synthetic filename,
/// its byte length and a guessed content type.
pub fn encode_multipart_with_boundary(params: &Params, boundary: String) -> Multipart {
    let mut lines: Vec<Vec<u8>> = Vec::new();
    for (key, value) in params.iter() {
        push_parts(&mut lines, &boundary, key, value);
    }
    lines.push(format!("--{}--\r\n", boundary).into_bytes());

    let body = lines.join(&b"\r\n"[..]);
    Multipart { boundary, body }
}

fn push_parts(lines: &mut Vec<Vec<u8>>, boundary: &str, key: &str, value: &ParamValue) {
    match value {
        ParamValue::List(items) => {
            for item in items {
                push_parts(lines, boundary, key, item);
            }
        }
        ParamValue::File(file) => {
            lines.push(format!("--{}", boundary).into_bytes());
            lines.push(
                format!(
                    "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"",
                    key, MULTIPART_FILENAME
                )
                .into_bytes(),
            );
            lines.push(format!("Content-Length: {}", file.content.len()).into_bytes());
            lines.push(format!("Content-Type: {}\r\n", file.content_type()).into_bytes());
            lines.push(file.content.clone());
        }
        scalar => {
            let mut text = Vec::with_capacity(1);
            // Scalars never fail to stringify.
            let _ = scalar.collect_text(key, &mut text);
            for (_, v) in text {
                lines.push(format!("--{}", boundary).into_bytes());
                lines.push(format!("Content-Disposition: form-data; name=\"{}\"\r\n", key).into_bytes());
                lines.push(v.into_bytes());
            }
        }
    }
}
