//! Minimal HTTP/1.1 request parsing and response encoding.
//!
//! One request per connection: the server reads a single request, writes a
//! single response with `Connection: close`, and drops the socket.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::config::{Config, REDACTED};
use crate::error::DebuggerError;
use crate::model::{now_secs, RequestRecord};

const MAX_HEADERS: usize = 64;
const MAX_HEAD_BYTES: usize = 64 * 1024;

// ---------------------------------------------------------------------------
// Query-string helpers
// ---------------------------------------------------------------------------

/// Percent-decoding for query strings and form bodies; `+` is a space.
pub fn url_decode(s: &str) -> String {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'+' => out.push(b' '),
            b'%' if i + 2 < bytes.len() => {
                let hex = std::str::from_utf8(&bytes[i + 1..i + 3]).ok();
                match hex.and_then(|h| u8::from_str_radix(h, 16).ok()) {
                    Some(byte) => {
                        out.push(byte);
                        i += 2;
                    }
                    None => out.push(b'%'),
                }
            }
            b => out.push(b),
        }
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

/// Parse `a=1&b=2` into key-value pairs.  Later duplicates win.
pub fn parse_query(query: &str) -> BTreeMap<String, String> {
    query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .filter_map(|pair| {
            let mut parts = pair.splitn(2, '=');
            let key = parts.next()?;
            let val = parts.next().unwrap_or("");
            Some((url_decode(key), url_decode(val)))
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Request
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct HttpRequest {
    pub method: String,
    pub path: String,
    pub query: BTreeMap<String, String>,
    /// Header names as sent; repeated headers are joined with `", "`.
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
    pub peer: Option<String>,
}

impl HttpRequest {
    /// Build a request directly, splitting any query string off `target`.
    pub fn new(method: &str, target: &str) -> Self {
        let (path, query) = match target.split_once('?') {
            Some((p, q)) => (p, parse_query(q)),
            None => (target, BTreeMap::new()),
        };
        Self {
            method: method.to_ascii_uppercase(),
            path: path.to_string(),
            query,
            ..Self::default()
        }
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    pub fn with_json(mut self, body: &Value) -> Self {
        self.body = serde_json::to_vec(body).unwrap_or_default();
        self.with_header("Content-Type", "application/json")
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    fn content_type_is(&self, needle: &str) -> bool {
        self.header("content-type")
            .is_some_and(|ct| ct.to_ascii_lowercase().contains(needle))
    }

    /// Deserialize a required JSON body.  The body must be a JSON object.
    pub fn json_body<T: DeserializeOwned>(&self) -> Result<T, DebuggerError> {
        if self.body.iter().all(u8::is_ascii_whitespace) {
            return Err(DebuggerError::malformed("request body must be a JSON object"));
        }
        self.object_body()
    }

    /// Deserialize an optional JSON body; an empty body yields `T::default()`.
    pub fn optional_json_body<T: DeserializeOwned + Default>(&self) -> Result<T, DebuggerError> {
        if self.body.iter().all(u8::is_ascii_whitespace) {
            return Ok(T::default());
        }
        self.object_body()
    }

    // Derived struct deserializers also accept the positional array form,
    // so the object check runs before the typed parse.
    fn object_body<T: DeserializeOwned>(&self) -> Result<T, DebuggerError> {
        let value: Value = serde_json::from_slice(&self.body).map_err(DebuggerError::from_body)?;
        if !value.is_object() {
            return Err(DebuggerError::malformed("request body must be a JSON object"));
        }
        serde_json::from_value(value).map_err(DebuggerError::from_body)
    }

    /// Snapshot of this request for the request log, with deny-listed
    /// header values redacted.
    pub fn to_record(&self, config: &Config) -> RequestRecord {
        let headers = self
            .headers
            .iter()
            .map(|(k, v)| {
                let value = if config.is_redacted_header(k) {
                    REDACTED.to_string()
                } else {
                    v.clone()
                };
                (k.clone(), value)
            })
            .collect();
        let form = if self.content_type_is("application/x-www-form-urlencoded") {
            parse_query(&String::from_utf8_lossy(&self.body))
        } else {
            BTreeMap::new()
        };
        let json = if self.content_type_is("json") {
            serde_json::from_slice(&self.body).unwrap_or(Value::Null)
        } else {
            Value::Null
        };
        RequestRecord {
            timestamp: Some(now_secs()),
            path: self.path.clone(),
            method: self.method.clone(),
            headers,
            args: self.query.clone(),
            form,
            json,
            ip: Some(self.peer.clone().unwrap_or_default()),
            user_agent: Some(self.header("user-agent").unwrap_or("").to_string()),
        }
    }
}

/// Read exactly one request from `stream`.
///
/// Returns `Ok(None)` when the peer closes the connection before sending
/// anything.
pub async fn read_request<S>(
    stream: &mut S,
    peer: Option<String>,
    max_body_bytes: usize,
) -> Result<Option<HttpRequest>, DebuggerError>
where
    S: AsyncRead + Unpin,
{
    let mut buf: Vec<u8> = Vec::with_capacity(8192);
    let mut chunk = [0u8; 8192];

    let (mut request, head_len, content_length) = loop {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            if buf.is_empty() {
                return Ok(None);
            }
            return Err(DebuggerError::malformed("connection closed mid-request"));
        }
        buf.extend_from_slice(&chunk[..n]);

        let mut headers = [httparse::EMPTY_HEADER; MAX_HEADERS];
        let mut parsed = httparse::Request::new(&mut headers);
        match parsed.parse(&buf) {
            Ok(httparse::Status::Complete(head_len)) => {
                let request = head_to_request(&parsed, peer.clone())?;
                let content_length = match request.header("content-length") {
                    Some(v) => v
                        .trim()
                        .parse::<usize>()
                        .map_err(|_| DebuggerError::malformed("invalid Content-Length"))?,
                    None => 0,
                };
                break (request, head_len, content_length);
            }
            Ok(httparse::Status::Partial) => {
                if buf.len() > MAX_HEAD_BYTES {
                    return Err(DebuggerError::malformed("request head too large"));
                }
            }
            Err(e) => return Err(DebuggerError::malformed(format!("bad request: {e}"))),
        }
    };

    if content_length > max_body_bytes {
        return Err(DebuggerError::PayloadTooLarge {
            limit: max_body_bytes,
        });
    }

    let mut body = buf.split_off(head_len);
    while body.len() < content_length {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            return Err(DebuggerError::malformed("connection closed mid-body"));
        }
        body.extend_from_slice(&chunk[..n]);
    }
    body.truncate(content_length);
    request.body = body;
    Ok(Some(request))
}

fn head_to_request(
    parsed: &httparse::Request<'_, '_>,
    peer: Option<String>,
) -> Result<HttpRequest, DebuggerError> {
    let method = parsed
        .method
        .ok_or_else(|| DebuggerError::malformed("missing method"))?;
    let target = parsed
        .path
        .ok_or_else(|| DebuggerError::malformed("missing request target"))?;

    let mut request = HttpRequest::new(method, target);
    request.path = url_decode_path(&request.path);
    request.peer = peer;
    for h in parsed.headers.iter() {
        let value = String::from_utf8_lossy(h.value).into_owned();
        match request
            .headers
            .iter_mut()
            .find(|(k, _)| k.eq_ignore_ascii_case(h.name))
        {
            Some((_, existing)) => {
                existing.push_str(", ");
                existing.push_str(&value);
            }
            None => request.headers.push((h.name.to_string(), value)),
        }
    }
    Ok(request)
}

/// Percent-decode a path without treating `+` as a space.
fn url_decode_path(path: &str) -> String {
    url_decode(&path.replace('+', "%2B"))
}

// ---------------------------------------------------------------------------
// Response
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn new(status: u16, content_type: &str, body: Vec<u8>) -> Self {
        Self {
            status,
            headers: vec![("Content-Type".to_string(), content_type.to_string())],
            body,
        }
    }

    pub fn json<T: Serialize + ?Sized>(status: u16, value: &T) -> Result<Self, DebuggerError> {
        Ok(Self::new(status, "application/json", serde_json::to_vec(value)?))
    }

    pub fn html(body: &str) -> Self {
        Self::new(200, "text/html; charset=utf-8", body.as_bytes().to_vec())
    }

    /// JSON `{ "error": message }` with the given status.
    pub fn error(status: u16, message: &str) -> Self {
        let body = serde_json::json!({ "error": message });
        Self::new(status, "application/json", body.to_string().into_bytes())
    }

    /// A downloadable body with `Content-Disposition: attachment`.
    pub fn attachment(content_type: &str, filename: &str, body: Vec<u8>) -> Self {
        Self::new(200, content_type, body).with_header(
            "Content-Disposition",
            &format!("attachment; filename={filename}"),
        )
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn body_json(&self) -> Option<Value> {
        serde_json::from_slice(&self.body).ok()
    }

    /// Full wire encoding: status line, headers, blank line, body.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut head = format!("HTTP/1.1 {} {}\r\n", self.status, reason_phrase(self.status));
        for (k, v) in &self.headers {
            head.push_str(&format!("{k}: {v}\r\n"));
        }
        head.push_str(&format!(
            "Content-Length: {}\r\nConnection: close\r\n\r\n",
            self.body.len()
        ));
        let mut out = head.into_bytes();
        out.extend_from_slice(&self.body);
        out
    }
}

pub fn reason_phrase(status: u16) -> &'static str {
    match status {
        200 => "OK",
        400 => "Bad Request",
        404 => "Not Found",
        405 => "Method Not Allowed",
        413 => "Payload Too Large",
        500 => "Internal Server Error",
        _ => "Unknown",
    }
}
