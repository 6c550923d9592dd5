//! The load-balancing client.
//!
//! # Responsibilities
//! - Own the backend registry, selection state, and rule program
//! - Select a backend per request and forward through its pooled client
//! - Maintain pending counters and passive health scores

use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use http::header::HOST;
use http::request::Parts;
use http::uri::{Authority, PathAndQuery, Scheme};
use http::{HeaderValue, Request, Response, Uri};
use hyper::body::Incoming;
use serde::{Deserialize, Serialize};
use url::form_urlencoded;

use super::backend::{Backend, HealthCheck};
use super::body::DispatchBody;
use super::error::{DispatchError, DispatchResult};
use super::registry::Registry;
use super::select::{self, Selector};
use crate::config::schema::DispatcherConfig;
use crate::expr::{Context, Dictionary, EvalContext, ExprError, Object, RuleSet, Value};
use crate::observability::metrics;

pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(3);
pub const DEFAULT_RESPONSE_HEADER_TIMEOUT: Duration = Duration::from_secs(1);

/// Group a rule program must define for rule-based selection.
pub const RULE_GROUP_TARGET: &str = "LB_TARGET";
/// Variable the rule group must set to a registered alias.
pub const RULE_VAR_TARGET_SERVER: &str = "$LB_TARGET_SERVER";
/// Object exposing the request URI to rule programs.
pub const RULE_OBJECT_URI: &str = "$REQUEST_URI";
/// Property of [`RULE_OBJECT_URI`] holding the URL path.
pub const RULE_URI_PATH: &str = "__PATH__";

/// Backend selection policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LbMethod {
    RoundRobin,
    Random,
    MinPending,
    IpHash,
    UrlParam,
    RuleBased,
}

/// Load-balancing HTTP dispatcher.
pub struct LbClient {
    method: LbMethod,
    url_param_key: String,
    max_idle_per_host: usize,
    connect_timeout: Duration,
    response_header_timeout: Duration,
    registry: Registry,
    selector: Selector,
    rules: RwLock<Option<Arc<RuleSet>>>,
    dict: Arc<Dictionary>,
}

impl LbClient {
    /// Create a dispatcher. Zero timeouts fall back to the 3s connect / 1s
    /// response-header defaults. `url_param_key` names the query parameter
    /// hashed under [`LbMethod::UrlParam`].
    pub fn new(
        method: LbMethod,
        max_idle_per_host: usize,
        url_param_key: impl Into<String>,
        connect_timeout: Duration,
        response_header_timeout: Duration,
    ) -> LbClient {
        let connect_timeout = if connect_timeout.is_zero() {
            DEFAULT_CONNECT_TIMEOUT
        } else {
            connect_timeout
        };
        let response_header_timeout = if response_header_timeout.is_zero() {
            DEFAULT_RESPONSE_HEADER_TIMEOUT
        } else {
            response_header_timeout
        };
        LbClient {
            method,
            url_param_key: url_param_key.into(),
            max_idle_per_host,
            connect_timeout,
            response_header_timeout,
            registry: Registry::new(),
            selector: Selector::new(),
            rules: RwLock::new(None),
            dict: Arc::new(Dictionary::new()),
        }
    }

    /// Build a dispatcher from a validated configuration: registers every
    /// configured backend and installs inline rules when present.
    pub fn from_config(config: &DispatcherConfig) -> DispatchResult<LbClient> {
        let client = LbClient::new(
            config.method,
            config.max_idle_per_host,
            config.url_param_key.clone(),
            Duration::from_millis(config.connect_timeout_ms),
            Duration::from_millis(config.response_header_timeout_ms),
        );
        for entry in &config.backends {
            client.register(&entry.address, &entry.alias, None)?;
        }
        if let Some(rules) = &config.rules {
            client.set_rules(rules.as_bytes())?;
        }
        Ok(client)
    }

    /// Replace the operator dictionary. Call before traffic starts when
    /// rule programs need extra variables, operators, or pipeline
    /// functions.
    pub fn set_dictionary(&mut self, dict: Dictionary) {
        self.dict = Arc::new(dict);
    }

    /// Register a backend under a unique alias. `health_check` defaults to
    /// "healthy unless the transport errored".
    pub fn register(
        &self,
        address: &str,
        alias: &str,
        health_check: Option<HealthCheck>,
    ) -> DispatchResult<()> {
        let backend = Backend::connect(
            address,
            alias,
            self.max_idle_per_host,
            self.connect_timeout,
            health_check,
        )?;
        self.registry.insert(backend)?;
        tracing::info!(alias = %alias, address = %address, "backend registered");
        Ok(())
    }

    /// Remove a backend. Requests already in flight to it drain normally.
    pub fn unregister(&self, alias: &str) -> DispatchResult<()> {
        self.registry.remove(alias)?;
        tracing::info!(alias = %alias, "backend unregistered");
        Ok(())
    }

    /// Parse and install a rule program. On parse failure the previously
    /// installed rules stay active.
    pub fn set_rules(&self, json: &[u8]) -> Result<(), ExprError> {
        let rules = RuleSet::parse(json)?;
        *self.rules.write().expect("rules lock poisoned") = Some(Arc::new(rules));
        Ok(())
    }

    /// Registered aliases in registration order.
    pub fn backend_aliases(&self) -> Vec<String> {
        self.registry.aliases()
    }

    pub fn backend_count(&self) -> usize {
        self.registry.len()
    }

    /// Look up a backend for inspection (pending count, health score).
    pub fn backend(&self, alias: &str) -> Option<Arc<Backend>> {
        self.registry.get(alias)
    }

    /// Select a backend, forward the request to it, and return the upstream
    /// response. The request's URI authority and `Host` header are
    /// rewritten to the selected backend; everything else is forwarded
    /// verbatim.
    pub async fn dispatch(
        &self,
        client_ip: &str,
        request: Request<DispatchBody>,
    ) -> DispatchResult<Response<Incoming>> {
        let backend = self.select_backend(client_ip, &request)?;
        tracing::debug!(
            alias = %backend.alias(),
            addr = %backend.addr(),
            path = %request.uri().path(),
            "backend selected"
        );

        let (mut parts, body) = request.into_parts();
        rewrite_target(&mut parts, &backend)?;
        let head = head_snapshot(&parts);
        let request = Request::from_parts(parts, body);

        let started = Instant::now();
        let outcome = {
            let _guard = backend.track_pending();
            let budget = self.connect_timeout + self.response_header_timeout;
            match tokio::time::timeout(budget, backend.transport.request(request)).await {
                Ok(Ok(response)) => Ok(response),
                Ok(Err(e)) => Err(DispatchError::Upstream(e)),
                Err(_) => Err(DispatchError::UpstreamTimeout),
            }
        };

        let healthy = (backend.health_check)(&head, outcome.as_ref().ok(), outcome.as_ref().err());
        backend.record_health(healthy);
        if !healthy {
            tracing::warn!(
                alias = %backend.alias(),
                fail_score = backend.health_fail_score(),
                "backend health check failed"
            );
        }
        metrics::record_backend_health(backend.alias(), backend.health_fail_score());

        match &outcome {
            Ok(response) => {
                metrics::record_dispatch(backend.alias(), response.status().as_u16(), started);
            }
            Err(e) => {
                tracing::error!(
                    alias = %backend.alias(),
                    error = %e,
                    "upstream request failed"
                );
                metrics::record_dispatch_error(backend.alias());
            }
        }
        outcome
    }

    fn select_backend(
        &self,
        client_ip: &str,
        request: &Request<DispatchBody>,
    ) -> DispatchResult<Arc<Backend>> {
        let backends = self.registry.snapshot();
        if backends.is_empty() {
            return Err(DispatchError::NoBackends);
        }
        match self.method {
            LbMethod::RoundRobin => Ok(self.selector.round_robin(&backends)),
            LbMethod::Random => Ok(self.selector.random(&backends)),
            LbMethod::MinPending => Ok(self.selector.min_pending(&backends)),
            LbMethod::IpHash => Ok(select::ip_hash(&backends, client_ip)),
            LbMethod::UrlParam => {
                let value = query_param(request.uri(), &self.url_param_key).unwrap_or_default();
                Ok(select::url_param(&backends, &value))
            }
            LbMethod::RuleBased => self.select_rule_based(request),
        }
    }

    /// Evaluate the installed rule program with the request URI exposed as
    /// a context-scoped object, then look up the alias it chose.
    fn select_rule_based(&self, request: &Request<DispatchBody>) -> DispatchResult<Arc<Backend>> {
        let rules = self
            .rules
            .read()
            .expect("rules lock poisoned")
            .clone()
            .ok_or_else(|| DispatchError::RuleSelectionFailed("no rules installed".into()))?;
        let group = rules.group(RULE_GROUP_TARGET).ok_or_else(|| {
            DispatchError::RuleSelectionFailed(format!("rule group {RULE_GROUP_TARGET} not found"))
        })?;

        let ctx = EvalContext::new();
        ctx.register_object(RULE_OBJECT_URI, Arc::new(RequestUri::from_uri(request.uri())));
        group
            .execute(&self.dict, &ctx)
            .map_err(|e| DispatchError::RuleSelectionFailed(e.to_string()))?;

        let alias = ctx
            .get_ctx_data(RULE_VAR_TARGET_SERVER)
            .and_then(|v| v.as_str())
            .ok_or_else(|| {
                DispatchError::RuleSelectionFailed(format!("{RULE_VAR_TARGET_SERVER} not set"))
            })?;
        self.registry.get(&alias).ok_or_else(|| {
            DispatchError::RuleSelectionFailed(format!("alias {alias:?} is not registered"))
        })
    }
}

/// Copy of the forwarded request head for health checks, taken before the
/// body is handed to the transport. Extensions are not carried over.
fn head_snapshot(parts: &Parts) -> Parts {
    let (mut head, _) = Request::new(()).into_parts();
    head.method = parts.method.clone();
    head.uri = parts.uri.clone();
    head.version = parts.version;
    head.headers = parts.headers.clone();
    head
}

/// Point the request at the backend: http scheme, backend authority, and a
/// matching `Host` header.
fn rewrite_target(parts: &mut Parts, backend: &Backend) -> DispatchResult<()> {
    let addr = backend.addr().to_string();
    let mut uri_parts = std::mem::take(&mut parts.uri).into_parts();
    uri_parts.scheme = Some(Scheme::HTTP);
    uri_parts.authority = Some(
        Authority::try_from(addr.as_str())
            .map_err(|_| DispatchError::InvalidAddress(addr.clone()))?,
    );
    if uri_parts.path_and_query.is_none() {
        uri_parts.path_and_query = Some(PathAndQuery::from_static("/"));
    }
    parts.uri =
        Uri::from_parts(uri_parts).map_err(|_| DispatchError::InvalidAddress(addr.clone()))?;
    parts.headers.insert(
        HOST,
        HeaderValue::from_str(&addr).map_err(|_| DispatchError::InvalidAddress(addr.clone()))?,
    );
    Ok(())
}

fn query_param(uri: &Uri, key: &str) -> Option<String> {
    form_urlencoded::parse(uri.query().unwrap_or_default().as_bytes())
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.into_owned())
}

/// Read-only view of the request URI for rule programs: `__PATH__` plus
/// every query parameter (first value wins).
struct RequestUri {
    path: String,
    query: Vec<(String, String)>,
}

impl RequestUri {
    fn from_uri(uri: &Uri) -> RequestUri {
        RequestUri {
            path: uri.path().to_string(),
            query: form_urlencoded::parse(uri.query().unwrap_or_default().as_bytes())
                .into_owned()
                .collect(),
        }
    }
}

impl Object for RequestUri {
    fn get_property(&self, property: &str, _ctx: &EvalContext) -> Option<Value> {
        if property == RULE_URI_PATH {
            return Some(Value::Str(self.path.clone()));
        }
        Some(Value::Str(
            self.query
                .iter()
                .find(|(k, _)| k == property)
                .map(|(_, v)| v.clone())
                .unwrap_or_default(),
        ))
    }

    fn set_property(&self, _property: &str, _value: Value, _ctx: &EvalContext) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatcher::body;

    fn request(uri: &str) -> Request<DispatchBody> {
        Request::builder().uri(uri).body(body::empty()).unwrap()
    }

    #[test]
    fn test_no_backends() {
        let client = LbClient::new(
            LbMethod::RoundRobin,
            10,
            "",
            Duration::ZERO,
            Duration::ZERO,
        );
        let err = client
            .select_backend("127.0.0.1", &request("http://h/"))
            .unwrap_err();
        assert!(matches!(err, DispatchError::NoBackends));
    }

    #[test]
    fn test_default_timeouts() {
        let client = LbClient::new(LbMethod::Random, 10, "", Duration::ZERO, Duration::ZERO);
        assert_eq!(client.connect_timeout, DEFAULT_CONNECT_TIMEOUT);
        assert_eq!(
            client.response_header_timeout,
            DEFAULT_RESPONSE_HEADER_TIMEOUT
        );
    }

    #[test]
    fn test_url_param_extraction() {
        let req = request("http://h/p?a=1&hashkey=value&b=2");
        assert_eq!(
            query_param(req.uri(), "hashkey"),
            Some("value".to_string())
        );
        assert_eq!(query_param(req.uri(), "missing"), None);
    }

    #[test]
    fn test_rule_selection_paths() {
        let client = LbClient::new(
            LbMethod::RuleBased,
            10,
            "",
            Duration::ZERO,
            Duration::ZERO,
        );
        client.register("127.0.0.1:8081", "a1", None).unwrap();
        client.register("127.0.0.1:8082", "a2", None).unwrap();

        // No rules installed yet.
        let err = client
            .select_backend("127.0.0.1", &request("http://h/status"))
            .unwrap_err();
        assert!(matches!(err, DispatchError::RuleSelectionFailed(_)));

        client
            .set_rules(
                br#"{
                "LB_TARGET": [
                    [
                        ["$REQUEST_URI.__PATH__", "=", "/status"],
                        [["$LB_TARGET_SERVER", "=", "a1"], ["$break", "=", 1]]
                    ],
                    [
                        ["$REQUEST_URI.__PATH__", "<>", "/status"],
                        ["$LB_TARGET_SERVER", "=", "a2"]
                    ]
                ]
            }"#,
            )
            .unwrap();

        let picked = client
            .select_backend("127.0.0.1", &request("http://h/status"))
            .unwrap();
        assert_eq!(picked.alias(), "a1");
        let picked = client
            .select_backend("127.0.0.1", &request("http://h/foo"))
            .unwrap();
        assert_eq!(picked.alias(), "a2");
    }

    #[test]
    fn test_rule_selection_unknown_alias() {
        let client = LbClient::new(
            LbMethod::RuleBased,
            10,
            "",
            Duration::ZERO,
            Duration::ZERO,
        );
        client.register("127.0.0.1:8081", "a1", None).unwrap();
        client
            .set_rules(br#"{"LB_TARGET": [[["$LB_TARGET_SERVER", "=", "ghost"]]]}"#)
            .unwrap();
        let err = client
            .select_backend("127.0.0.1", &request("http://h/"))
            .unwrap_err();
        assert!(matches!(err, DispatchError::RuleSelectionFailed(_)));
    }

    #[test]
    fn test_set_rules_parse_failure_keeps_previous() {
        let client = LbClient::new(
            LbMethod::RuleBased,
            10,
            "",
            Duration::ZERO,
            Duration::ZERO,
        );
        client.register("127.0.0.1:8081", "a1", None).unwrap();
        client
            .set_rules(br#"{"LB_TARGET": [[["$LB_TARGET_SERVER", "=", "a1"]]]}"#)
            .unwrap();
        assert!(client.set_rules(b"{ not json").is_err());
        // Previous rules still select a1.
        let picked = client
            .select_backend("127.0.0.1", &request("http://h/"))
            .unwrap();
        assert_eq!(picked.alias(), "a1");
    }

    #[test]
    fn test_rewrite_target() {
        let backend =
            Backend::connect("127.0.0.1:9000", "b", 10, Duration::from_secs(3), None).unwrap();
        let (mut parts, _) = request("http://original:1/path?q=1").into_parts();
        rewrite_target(&mut parts, &backend).unwrap();
        assert_eq!(parts.uri.to_string(), "http://127.0.0.1:9000/path?q=1");
        assert_eq!(parts.headers.get(HOST).unwrap(), "127.0.0.1:9000");
    }
}
