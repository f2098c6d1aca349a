//! Engine configuration.
//!
//! Lives in the `nodes` crate (rather than `engine`) because both the
//! engine and individual executors (notably `http`) need to read it, and
//! `nodes` must never depend on `engine` — see [`crate::traits`].

use std::time::Duration;

/// Tuning knobs and security policy for a single engine run.
#[derive(Debug, Clone)]
pub struct Config {
    /// Total workflow timeout.
    pub max_execution_time: Duration,
    /// Upper bound on node dispatches per execution (0 = unlimited).
    pub max_node_executions: u64,
    /// Upper bound on outbound HTTP calls (0 = unlimited).
    pub max_http_calls_per_exec: u64,
    /// Ceiling on `while_loop` iterations (0 = unlimited).
    pub max_iterations: u64,
    /// Ceiling on `for_each` iterations (0 = unlimited).
    pub max_for_each_iterations: u64,
    /// Payload-size ceiling on node count (0 = unlimited).
    pub max_nodes: usize,
    /// Payload-size ceiling on edge count (0 = unlimited).
    pub max_edges: usize,
    /// Ceiling on the length of any stored string (0 = unlimited).
    pub max_string_length: usize,
    /// Ceiling on the length of any stored array (0 = unlimited).
    pub max_array_length: usize,
    /// Ceiling on JSON nesting depth for context values (0 = unlimited).
    pub max_context_depth: usize,
    /// Ceiling on the number of distinct workflow variables (0 = unlimited).
    pub max_variables: usize,
    /// If false, the `http` executor fails unconditionally.
    pub allow_http: bool,
    /// If false, a target resolving to `127.0.0.1`/`::1` is blocked.
    pub allow_localhost: bool,
    /// If false, RFC1918 / unique-local targets are blocked.
    pub allow_private_ips: bool,
    /// If false, `169.254.0.0/16` / `fe80::/10` targets are blocked.
    pub allow_link_local: bool,
    /// If false, the cloud metadata address `169.254.169.254` is blocked
    /// even when `allow_link_local` is true.
    pub allow_cloud_metadata: bool,
    /// Empty = all domains allowed (subject to IP rules); non-empty = allowlist.
    pub allowed_domains: Vec<String>,
    /// Default retry attempts for `retry` nodes that don't specify one.
    pub default_max_attempts: u32,
    /// Default backoff strategy for `retry` nodes that don't specify one.
    pub default_backoff: BackoffStrategy,
    /// Per-request HTTP timeout cap.
    pub max_http_timeout: Duration,
}

/// Back-off strategy used between `retry` node attempts.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackoffStrategy {
    Constant,
    Linear,
    Exponential,
}

impl BackoffStrategy {
    /// Delay before the `attempt`-th retry (1-indexed), given a base delay.
    pub fn delay(self, base: Duration, attempt: u32) -> Duration {
        match self {
            BackoffStrategy::Constant => base,
            BackoffStrategy::Linear => base * attempt.max(1),
            BackoffStrategy::Exponential => base * 2u32.saturating_pow(attempt.saturating_sub(1)),
        }
    }
}

impl Config {
    /// Zero-trust preset: HTTP disabled, private/localhost/metadata blocked,
    /// restrictive counts. The default for untrusted workflow definitions.
    pub fn default_profile() -> Self {
        Self {
            max_execution_time: Duration::from_secs(30),
            max_node_executions: 1_000,
            max_http_calls_per_exec: 0,
            max_iterations: 10_000,
            max_for_each_iterations: 10_000,
            max_nodes: 500,
            max_edges: 2_000,
            max_string_length: 1_000_000,
            max_array_length: 100_000,
            max_context_depth: 32,
            max_variables: 10_000,
            allow_http: false,
            allow_localhost: false,
            allow_private_ips: false,
            allow_link_local: false,
            allow_cloud_metadata: false,
            allowed_domains: Vec::new(),
            default_max_attempts: 3,
            default_backoff: BackoffStrategy::Exponential,
            max_http_timeout: Duration::from_secs(10),
        }
    }

    /// HTTP enabled for external validation/testing against real services,
    /// localhost still blocked, counts kept restrictive.
    pub fn validation() -> Self {
        Self { allow_http: true, ..Self::default_profile() }
    }

    /// Permissive preset for local development: HTTP and localhost allowed,
    /// generous counts.
    pub fn development() -> Self {
        Self {
            max_execution_time: Duration::from_secs(300),
            max_node_executions: 0,
            max_http_calls_per_exec: 0,
            max_iterations: 0,
            max_for_each_iterations: 0,
            max_nodes: 0,
            max_edges: 0,
            allow_http: true,
            allow_localhost: true,
            allow_private_ips: true,
            allow_link_local: true,
            allow_cloud_metadata: false,
            ..Self::default_profile()
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::default_profile()
    }
}
