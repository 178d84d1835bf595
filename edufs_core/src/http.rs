//! HTTP binding for IPFS/Kubo-compatible RPC nodes.
//!
//! Every call is a `POST /api/v0/<command>`. Uploads are streamed as
//! multipart bodies; `cat` hands back the response body as a stream.

use crate::cid::{ContentId, IPFS_PATH_PREFIX};
use crate::error::{Error, NodeError, Result};
use crate::node::{ByteStream, CasNode, NameRecord, NodeInfo, NodeResult};
use crate::walk::FileEntry;
use reqwest::blocking::multipart::{Form, Part};
use reqwest::blocking::{Client, RequestBuilder, Response};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::collections::BTreeSet;
use std::fs::File;
use std::path::Path;
use std::time::Duration;
use tracing::debug;

/// Default RPC endpoint of a local node.
pub const DEFAULT_ENDPOINT: &str = "http://127.0.0.1:5001";

/// Connection settings for an [`HttpNode`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpNodeConfig {
    /// Base URL of the RPC API, without the `/api/v0` suffix.
    pub base_url: String,
    /// Per-request timeout. `None` waits indefinitely.
    pub timeout: Option<Duration>,
}

impl HttpNodeConfig {
    /// Build a config from a URL, `host:port`, or multiaddress.
    pub fn from_endpoint(endpoint: &str) -> Result<Self> {
        Ok(Self {
            base_url: endpoint_url(endpoint)?,
            timeout: None,
        })
    }

    /// Set the per-request timeout.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }
}

impl Default for HttpNodeConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_ENDPOINT.to_string(),
            timeout: None,
        }
    }
}

/// Convert a node endpoint into an HTTP base URL.
///
/// Accepts `http(s)://` URLs, bare `host:port`, and multiaddresses such as
/// `/ip4/127.0.0.1/tcp/5001` or `/dns4/node.example/tcp/443/https`.
pub fn endpoint_url(endpoint: &str) -> Result<String> {
    let endpoint = endpoint.trim();

    if endpoint.is_empty() {
        return Err(Error::invalid_endpoint(endpoint, "endpoint is empty"));
    }

    if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
        return Ok(endpoint.trim_end_matches('/').to_string());
    }

    if !endpoint.starts_with('/') {
        return Ok(format!("http://{}", endpoint.trim_end_matches('/')));
    }

    let mut parts = endpoint.split('/').filter(|p| !p.is_empty());
    let mut host = None;
    let mut port = None;
    let mut scheme = "http";

    while let Some(protocol) = parts.next() {
        match protocol {
            "ip4" | "dns" | "dns4" | "dns6" => {
                let value = parts
                    .next()
                    .ok_or_else(|| Error::invalid_endpoint(endpoint, "missing host"))?;
                host = Some(value.to_string());
            }
            "ip6" => {
                let value = parts
                    .next()
                    .ok_or_else(|| Error::invalid_endpoint(endpoint, "missing host"))?;
                host = Some(format!("[{}]", value));
            }
            "tcp" => {
                let value = parts
                    .next()
                    .ok_or_else(|| Error::invalid_endpoint(endpoint, "missing port"))?;
                let parsed = value
                    .parse::<u16>()
                    .map_err(|_| Error::invalid_endpoint(endpoint, "invalid port"))?;
                port = Some(parsed);
            }
            "http" => scheme = "http",
            "https" | "tls" => scheme = "https",
            other => {
                return Err(Error::invalid_endpoint(
                    endpoint,
                    format!("unsupported protocol {}", other),
                ));
            }
        }
    }

    match (host, port) {
        (Some(host), Some(port)) => Ok(format!("{}://{}:{}", scheme, host, port)),
        (None, _) => Err(Error::invalid_endpoint(endpoint, "missing host")),
        (_, None) => Err(Error::invalid_endpoint(endpoint, "missing tcp port")),
    }
}

#[derive(Deserialize)]
struct IdResponse {
    #[serde(rename = "ID")]
    id: String,
    #[serde(rename = "AgentVersion", default)]
    agent_version: String,
    #[serde(rename = "ProtocolVersion", default)]
    protocol_version: String,
}

#[derive(Deserialize)]
struct AddResponse {
    #[serde(rename = "Name", default)]
    name: String,
    #[serde(rename = "Hash")]
    hash: String,
}

#[derive(Deserialize)]
struct NameResponse {
    #[serde(rename = "Name")]
    name: String,
    #[serde(rename = "Value")]
    value: String,
}

#[derive(Deserialize)]
struct ResolveResponse {
    #[serde(rename = "Path")]
    path: String,
}

#[derive(Deserialize)]
struct ErrorResponse {
    #[serde(rename = "Message")]
    message: String,
}

/// A node reached over its HTTP RPC API.
#[derive(Debug, Clone)]
pub struct HttpNode {
    client: Client,
    base_url: String,
}

impl HttpNode {
    /// Create a client for the node described by `config`.
    pub fn new(config: HttpNodeConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("edufs/", env!("CARGO_PKG_VERSION")))
            .timeout(config.timeout)
            .build()
            .map_err(|e| NodeError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.base_url,
        })
    }

    /// The base URL requests are sent to.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, command: &str) -> RequestBuilder {
        let url = format!("{}/api/v0/{}", self.base_url, command);
        debug!(%url, "node request");
        self.client.post(url)
    }

    /// Send a request, turning non-success statuses into errors.
    fn call(&self, request: RequestBuilder) -> NodeResult<Response> {
        let response = request
            .send()
            .map_err(|e| NodeError::Transport(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().unwrap_or_default();
        Err(api_error(status.as_u16(), &body))
    }

    /// Send a request and decode a single JSON object.
    fn call_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> NodeResult<T> {
        self.call(request)?
            .json::<T>()
            .map_err(|e| NodeError::Decode(e.to_string()))
    }

    /// Send a request whose answer is newline-delimited JSON.
    fn call_ndjson<T: DeserializeOwned>(&self, request: RequestBuilder) -> NodeResult<Vec<T>> {
        let body = self
            .call(request)?
            .text()
            .map_err(|e| NodeError::Transport(e.to_string()))?;
        parse_ndjson(&body)
    }
}

impl CasNode for HttpNode {
    fn id(&self) -> NodeResult<NodeInfo> {
        let response: IdResponse = self.call_json(self.request("id"))?;
        Ok(NodeInfo {
            id: response.id,
            agent_version: response.agent_version,
            protocol_version: response.protocol_version,
        })
    }

    fn add(&self, name: &str, content: ByteStream) -> NodeResult<ContentId> {
        let part = Part::reader(content).file_name(urlencoding::encode(name).into_owned());
        let form = Form::new().part("file", part);

        let request = self
            .request("add")
            .query(&[("pin", "false"), ("quieter", "true")])
            .multipart(form);

        let added: Vec<AddResponse> = self.call_ndjson(request)?;
        let last = added
            .last()
            .ok_or_else(|| NodeError::Decode("empty add response".to_string()))?;
        decode_cid(&last.hash)
    }

    fn add_directory(&self, root: &Path, entries: &[FileEntry]) -> NodeResult<ContentId> {
        let dir_name = root
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("root")
            .to_string();

        let mut form = Form::new().part("file", directory_part(&dir_name)?);
        let mut dirs = BTreeSet::new();

        for entry in entries {
            // Parent directories must precede their contents
            let mut prefix = dir_name.clone();
            if let Some((parents, _)) = entry.relative_path.rsplit_once('/') {
                for component in parents.split('/') {
                    prefix = format!("{}/{}", prefix, component);
                    if dirs.insert(prefix.clone()) {
                        form = form.part("file", directory_part(&prefix)?);
                    }
                }
            }

            let file = File::open(&entry.absolute_path)
                .map_err(|e| NodeError::Transport(format!("{}: {}", entry.relative_path, e)))?;
            let full_name = format!("{}/{}", dir_name, entry.relative_path);
            let part = Part::reader_with_length(file, entry.size_bytes)
                .file_name(urlencoding::encode(&full_name).into_owned());
            form = form.part("file", part);
        }

        let request = self
            .request("add")
            .query(&[("pin", "false"), ("wrap-with-directory", "false")])
            .multipart(form);

        let added: Vec<AddResponse> = self.call_ndjson(request)?;
        let root_entry = added
            .iter()
            .find(|a| a.name == dir_name)
            .ok_or_else(|| NodeError::Decode(format!("no entry for directory {}", dir_name)))?;
        decode_cid(&root_entry.hash)
    }

    fn pin(&self, cid: &ContentId) -> NodeResult<()> {
        let request = self.request("pin/add").query(&[("arg", cid.as_str())]);
        self.call(request).map_err(|e| not_found_for(cid, e))?;
        Ok(())
    }

    fn cat(&self, cid: &ContentId) -> NodeResult<ByteStream> {
        let request = self.request("cat").query(&[("arg", cid.as_str())]);
        let response = self.call(request).map_err(|e| not_found_for(cid, e))?;
        Ok(Box::new(response))
    }

    fn publish_name(&self, key: &str, cid: &ContentId) -> NodeResult<NameRecord> {
        let path = cid.to_ipfs_path();
        let request = self
            .request("name/publish")
            .query(&[("arg", path.as_str()), ("key", key)]);
        let response: NameResponse = self.call_json(request)?;
        Ok(NameRecord {
            name: response.name,
            value: response.value,
        })
    }

    fn resolve_name(&self, name: &str) -> NodeResult<ContentId> {
        let request = self.request("name/resolve").query(&[("arg", name)]);
        let response: ResolveResponse = self.call_json(request)?;
        cid_from_path(&response.path)
    }
}

fn directory_part(name: &str) -> NodeResult<Part> {
    Part::bytes(Vec::new())
        .file_name(urlencoding::encode(name).into_owned())
        .mime_str("application/x-directory")
        .map_err(|e| NodeError::Transport(e.to_string()))
}

fn decode_cid(s: &str) -> NodeResult<ContentId> {
    ContentId::parse(s).map_err(|e| NodeError::Decode(e.to_string()))
}

/// Take the identifier out of `/ipfs/<cid>[/sub/path]`.
fn cid_from_path(path: &str) -> NodeResult<ContentId> {
    let rest = path
        .strip_prefix(IPFS_PATH_PREFIX)
        .ok_or_else(|| NodeError::Decode(format!("not an immutable path: {}", path)))?;
    decode_cid(rest.split('/').next().unwrap_or(rest))
}

/// Parse newline-delimited JSON, skipping blank lines.
fn parse_ndjson<T: DeserializeOwned>(body: &str) -> NodeResult<Vec<T>> {
    body.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| serde_json::from_str(line).map_err(|e| NodeError::Decode(e.to_string())))
        .collect()
}

/// Build an error from a failed response, using the node's message if present.
fn api_error(status: u16, body: &str) -> NodeError {
    let message = serde_json::from_str::<ErrorResponse>(body)
        .map(|e| e.message)
        .unwrap_or_else(|_| body.trim().to_string());

    NodeError::Api { status, message }
}

/// Recognise the node's ways of saying it does not have `cid`.
fn not_found_for(cid: &ContentId, err: NodeError) -> NodeError {
    match &err {
        NodeError::Api { status: 404, .. } => NodeError::NotFound {
            cid: cid.to_string(),
        },
        NodeError::Api { message, .. } => {
            let message = message.to_lowercase();
            if message.contains("not found") || message.contains("could not find") {
                NodeError::NotFound {
                    cid: cid.to_string(),
                }
            } else {
                err
            }
        }
        _ => err,
    }
}
