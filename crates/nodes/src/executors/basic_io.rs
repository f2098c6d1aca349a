//! Source nodes: literals and outbound HTTP.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::net::IpAddr;
use std::time::Duration;

use super::util::{f64_field, opt_str_field, str_field};
use crate::traits::{ExecutableNode, ExecutionContext, Node};
use crate::NodeError;

/// Emits a literal number. `data: { "value": <number> }`.
pub struct NumberNode;

#[async_trait]
impl ExecutableNode for NumberNode {
    fn kind(&self) -> &'static str {
        "number"
    }

    async fn execute(&self, _ctx: &dyn ExecutionContext, node: &Node) -> Result<Value, NodeError> {
        let value = f64_field(&node.id, &node.data, "value")?;
        Ok(json!(value))
    }
}

/// Emits literal text. `data: { "text": <string> }`.
///
/// The engine interpolates `{{ variable.* }}` / `{{ const.* }}` placeholders
/// in `text` before this executor ever sees the node, so by the time we get
/// here the string is already resolved.
pub struct TextInputNode;

#[async_trait]
impl ExecutableNode for TextInputNode {
    fn kind(&self) -> &'static str {
        "text_input"
    }

    async fn execute(&self, _ctx: &dyn ExecutionContext, node: &Node) -> Result<Value, NodeError> {
        let text = str_field(&node.id, &node.data, "text")?;
        Ok(json!(text))
    }
}

/// Outbound HTTP call. `data: { "url", "method"?, "headers"?, "body"? }`.
///
/// Subject to `Config::allow_http` and the localhost/private/link-local/
/// cloud-metadata/allowlist rules. Only literal IP hosts are checked against
/// those rules directly; a hostname is checked against `allowed_domains`
/// only — this executor does not perform DNS resolution to catch a hostname
/// that resolves to a blocked IP (a known simplification, see `DESIGN.md`).
pub struct HttpNode {
    client: reqwest::Client,
}

impl Default for HttpNode {
    fn default() -> Self {
        Self { client: reqwest::Client::new() }
    }
}

#[async_trait]
impl ExecutableNode for HttpNode {
    fn kind(&self) -> &'static str {
        "http"
    }

    async fn execute(&self, ctx: &dyn ExecutionContext, node: &Node) -> Result<Value, NodeError> {
        let config = ctx.config();
        if !config.allow_http {
            return Err(NodeError::fatal(&node.id, "outbound HTTP is disabled by policy"));
        }
        ctx.increment_http_call()?;

        let url_str = str_field(&node.id, &node.data, "url")?;
        let url = reqwest::Url::parse(&url_str)
            .map_err(|e| NodeError::fatal(&node.id, format!("invalid url '{url_str}': {e}")))?;

        check_host_policy(&node.id, &url, config)?;

        let method = opt_str_field(&node.data, "method").unwrap_or_else(|| "GET".to_string());
        let method = reqwest::Method::from_bytes(method.to_uppercase().as_bytes())
            .map_err(|_| NodeError::fatal(&node.id, format!("invalid HTTP method '{method}'")))?;

        let mut builder = self
            .client
            .request(method, url)
            .timeout(config.max_http_timeout.min(Duration::from_secs(300)));

        if let Some(headers) = node.data.get("headers").and_then(|h| h.as_object()) {
            for (k, v) in headers {
                if let Some(v) = v.as_str() {
                    builder = builder.header(k, v);
                }
            }
        }
        if let Some(body) = node.data.get("body") {
            builder = builder.json(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| NodeError::fatal(&node.id, format!("http request failed: {e}")))?;

        let status = response.status().as_u16();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| NodeError::fatal(&node.id, format!("failed to read response body: {e}")))?;

        let body = serde_json::from_slice::<Value>(&bytes)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()));

        Ok(json!({ "status": status, "body": body }))
    }
}

fn check_host_policy(node_id: &str, url: &reqwest::Url, config: &crate::Config) -> Result<(), NodeError> {
    let host = url
        .host_str()
        .ok_or_else(|| NodeError::fatal(node_id, "url has no host"))?;

    if !config.allowed_domains.is_empty() && !config.allowed_domains.iter().any(|d| d == host) {
        return Err(NodeError::fatal(node_id, format!("host '{host}' is not in the allowed domain list")));
    }

    let lower = host.to_ascii_lowercase();
    if !config.allow_localhost && (lower == "localhost" || lower == "127.0.0.1" || lower == "::1") {
        return Err(NodeError::fatal(node_id, "requests to localhost are blocked by policy"));
    }

    if let Ok(ip) = host.parse::<IpAddr>() {
        if !config.allow_cloud_metadata && ip.to_string() == "169.254.169.254" {
            return Err(NodeError::fatal(node_id, "requests to the cloud metadata address are blocked"));
        }
        if !config.allow_link_local && is_link_local(ip) {
            return Err(NodeError::fatal(node_id, format!("requests to link-local address '{ip}' are blocked")));
        }
        if !config.allow_private_ips && is_private(ip) {
            return Err(NodeError::fatal(node_id, format!("requests to private address '{ip}' are blocked")));
        }
        if !config.allow_localhost && ip.is_loopback() {
            return Err(NodeError::fatal(node_id, "requests to loopback addresses are blocked by policy"));
        }
    }

    Ok(())
}

fn is_link_local(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => v4.is_link_local(),
        IpAddr::V6(v6) => (v6.segments()[0] & 0xffc0) == 0xfe80,
    }
}

fn is_private(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => v4.is_private(),
        IpAddr::V6(v6) => (v6.segments()[0] & 0xfe00) == 0xfc00,
    }
}
