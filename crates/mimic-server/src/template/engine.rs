//! Compiled response templates and the per-request render context.
//!
//! Template sources are plain text with `${request.*}` variables that are
//! substituted from the incoming request at render time.
//!
//! # Supported Template Variables
//!
//! - `${request.method}` - The HTTP method
//! - `${request.path}` - The request path
//! - `${request.uri}` - The full request URI
//! - `${request.body}` - The raw request body
//! - `${request.remoteAddr}` - The peer socket address
//! - `${request.id}` - The server-assigned request id
//! - `${request.query.<name>}` - Query parameter value
//! - `${request.headers.<name>}` - Header value (case-insensitive)
//!
//! Rendering is strict: a variable that does not resolve against the
//! request is a [`RenderError`], not an empty substitution.

use regex::Regex;
use std::collections::HashMap;
use std::sync::OnceLock;
use thiserror::Error;

/// Regex for the variable path inside `${...}`: `request.<attr>` with an
/// optional second segment for query parameter and header names.
static VARIABLE_REGEX: OnceLock<Regex> = OnceLock::new();

fn variable_regex() -> &'static Regex {
    VARIABLE_REGEX.get_or_init(|| {
        Regex::new(r"^request\.([a-zA-Z_][a-zA-Z0-9_]*(?:\.[a-zA-Z_][a-zA-Z0-9_-]*)?)$").unwrap()
    })
}

/// Error compiling a template source.
#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("unterminated variable at byte {0}: missing closing '}}'")]
    Unterminated(usize),
    #[error("invalid template variable '${{{0}}}'")]
    InvalidVariable(String),
}

/// Error rendering a template against a request.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("no template named '{0}'")]
    UnknownTemplate(String),
    #[error("unresolved template variable 'request.{path}'")]
    UnresolvedVariable { path: String },
}

#[derive(Debug, Clone, PartialEq)]
enum Segment {
    Literal(String),
    /// Variable path with the `request.` prefix stripped.
    Variable(String),
}

/// A template compiled into literal and variable segments.
#[derive(Debug, Clone)]
pub struct Template {
    segments: Vec<Segment>,
}

impl Template {
    /// Compile a template source.
    ///
    /// An unterminated `${` or a variable outside the `request.*` grammar
    /// is a compile error; whether a variable resolves is checked per
    /// request at render time.
    pub fn parse(source: &str) -> Result<Self, TemplateError> {
        let mut segments = Vec::new();
        let mut rest = source;
        let mut offset = 0;

        while let Some(start) = rest.find("${") {
            if start > 0 {
                segments.push(Segment::Literal(rest[..start].to_string()));
            }
            let after = &rest[start + 2..];
            let end = after
                .find('}')
                .ok_or(TemplateError::Unterminated(offset + start))?;
            let variable = &after[..end];
            let captures = variable_regex()
                .captures(variable)
                .ok_or_else(|| TemplateError::InvalidVariable(variable.to_string()))?;
            segments.push(Segment::Variable(captures[1].to_string()));
            offset += start + 2 + end + 1;
            rest = &after[end + 1..];
        }
        if !rest.is_empty() {
            segments.push(Segment::Literal(rest.to_string()));
        }

        Ok(Self { segments })
    }

    /// Render the template, resolving every variable against `request`.
    pub fn render(&self, request: &RequestData) -> Result<String, RenderError> {
        let mut output = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => output.push_str(text),
                Segment::Variable(path) => {
                    let value = request.get(path).ok_or_else(|| {
                        RenderError::UnresolvedVariable { path: path.clone() }
                    })?;
                    output.push_str(&value);
                }
            }
        }
        Ok(output)
    }
}

/// Parsed request data exposed to templates.
#[derive(Debug, Clone, Default)]
pub struct RequestData {
    /// Server-assigned request id
    pub id: String,
    /// HTTP method (GET, POST, etc.)
    pub method: String,
    /// Request path (without query string)
    pub path: String,
    /// Full request URI as received
    pub uri: String,
    /// Query parameters parsed from the URL
    pub query: HashMap<String, String>,
    /// Request headers (keys lowercased)
    pub headers: HashMap<String, String>,
    /// Raw request body
    pub body: String,
    /// Peer socket address
    pub remote_addr: String,
}

impl RequestData {
    /// Create RequestData from request components.
    pub fn new(
        id: &str,
        method: &str,
        uri: &hyper::Uri,
        headers: &hyper::HeaderMap,
        body: Option<&str>,
        remote_addr: &str,
    ) -> Self {
        let query = parse_query_string(uri.query());
        let headers_map = headers
            .iter()
            .filter_map(|(k, v)| {
                v.to_str()
                    .ok()
                    .map(|val| (k.as_str().to_lowercase(), val.to_string()))
            })
            .collect();

        Self {
            id: id.to_string(),
            method: method.to_string(),
            path: uri.path().to_string(),
            uri: uri.to_string(),
            query,
            headers: headers_map,
            body: body.unwrap_or("").to_string(),
            remote_addr: remote_addr.to_string(),
        }
    }

    /// Get a value by dotted path (e.g. "query.name", "headers.content-type").
    ///
    /// Returns `None` for paths outside the exposed attributes and for
    /// query parameters or headers the request does not carry.
    pub fn get(&self, path: &str) -> Option<String> {
        let parts: Vec<&str> = path.splitn(2, '.').collect();

        match parts.as_slice() {
            ["id"] => Some(self.id.clone()),
            ["method"] => Some(self.method.clone()),
            ["path"] => Some(self.path.clone()),
            ["uri"] => Some(self.uri.clone()),
            ["body"] => Some(self.body.clone()),
            ["remoteAddr"] => Some(self.remote_addr.clone()),
            ["query", name] => self.query.get(*name).cloned(),
            ["headers", name] => self.headers.get(&name.to_lowercase()).cloned(),
            _ => None,
        }
    }
}

/// Parse a query string into a map, percent-decoding values.
pub fn parse_query_string(query: Option<&str>) -> HashMap<String, String> {
    let mut params = HashMap::new();
    if let Some(q) = query {
        for pair in q.split('&') {
            if let Some((key, value)) = pair.split_once('=') {
                let decoded = urlencoding::decode(value).unwrap_or_default().to_string();
                params.insert(key.to_string(), decoded);
            } else if !pair.is_empty() {
                params.insert(pair.to_string(), String::new());
            }
        }
    }
    params
}
