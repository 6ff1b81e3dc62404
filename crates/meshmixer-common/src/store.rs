//! Config store contract for per-destination API and quota specs
//!
//! Filter generation asks the store which HTTP API specs and quota specs
//! are bound to a destination. The builder sorts whatever comes back by
//! [`ConfigMeta::key`] so output is reproducible across rebuilds.
//!
//! [`MemoryConfigStore`] is a concurrent in-memory implementation backed by
//! DashMap, safe to query from many listener builds at once.

use std::collections::{BTreeMap, BTreeSet};

use dashmap::DashMap;
#[cfg(any(test, feature = "mock"))]
use mockall::automock;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{Attributes, ServiceInstance};

/// Config kind of HTTP API specs
pub const HTTP_API_SPEC_KIND: &str = "http-api-spec";
/// Config kind of HTTP API spec bindings
pub const HTTP_API_SPEC_BINDING_KIND: &str = "http-api-spec-binding";
/// Config kind of quota specs
pub const QUOTA_SPEC_KIND: &str = "quota-spec";
/// Config kind of quota spec bindings
pub const QUOTA_SPEC_BINDING_KIND: &str = "quota-spec-binding";

/// Default DNS domain used to resolve short service references
pub const DEFAULT_DOMAIN: &str = "cluster.local";

// =============================================================================
// Config Envelope
// =============================================================================

/// Identity of a stored config object
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConfigMeta {
    /// Config kind (e.g., "quota-spec")
    pub kind: String,
    /// Object name
    pub name: String,
    /// Object namespace
    #[serde(default)]
    pub namespace: String,
}

impl ConfigMeta {
    /// Create config metadata
    pub fn new(kind: impl Into<String>, name: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            name: name.into(),
            namespace: namespace.into(),
        }
    }

    /// Unique key: `{kind}/{namespace}/{name}`
    pub fn key(&self) -> String {
        format!("{}/{}/{}", self.kind, self.namespace, self.name)
    }
}

/// A stored config object
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Config<T> {
    /// Identity
    pub meta: ConfigMeta,
    /// Payload
    pub spec: T,
}

impl<T> Config<T> {
    /// Wrap a payload with its identity
    pub fn new(meta: ConfigMeta, spec: T) -> Self {
        Self { meta, spec }
    }
}

/// Sort configs by key, stable for equal keys
pub fn sort_configs<T>(configs: &mut [Config<T>]) {
    configs.sort_by_cached_key(|c| c.meta.key());
}

// =============================================================================
// Spec Payloads
// =============================================================================

/// HTTP API description used by mixer to derive API attributes
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpApiSpec {
    /// Attributes added to every request matching this API
    #[serde(default, skip_serializing_if = "Attributes::is_empty")]
    pub attributes: Attributes,
    /// Operation patterns
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub patterns: Vec<HttpApiSpecPattern>,
    /// Where to find API keys in requests
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub api_keys: Vec<ApiKey>,
}

/// A single API operation pattern
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpApiSpecPattern {
    /// Attributes added when this pattern matches
    #[serde(default, skip_serializing_if = "Attributes::is_empty")]
    pub attributes: Attributes,
    /// HTTP method (GET, POST, ...)
    #[serde(default)]
    pub http_method: String,
    /// URI template (`/shelves/{shelf}`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri_template: Option<String>,
    /// Regex alternative to `uri_template`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub regex: Option<String>,
}

/// Location of an API key in a request
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ApiKey {
    /// Query parameter name
    Query(String),
    /// Header name
    Header(String),
    /// Cookie name
    Cookie(String),
}

/// Quota charges applied to matching requests
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct QuotaSpec {
    /// Rules evaluated in order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rules: Vec<QuotaRule>,
}

/// A quota rule: any matching clause set charges the listed quotas
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct QuotaRule {
    /// Disjunction of attribute match clauses
    #[serde(default, rename = "match", skip_serializing_if = "Vec::is_empty")]
    pub match_: Vec<AttributeMatch>,
    /// Quotas charged on match
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub quotas: Vec<Quota>,
}

/// Conjunction of per-attribute string matches
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeMatch {
    /// Attribute name to match
    #[serde(default)]
    pub clause: BTreeMap<String, StringMatch>,
}

/// String matcher
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StringMatch {
    /// Exact match
    Exact(String),
    /// Prefix match
    Prefix(String),
    /// Regex match
    Regex(String),
}

/// A named quota and its charge
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quota {
    /// Quota name
    pub quota: String,
    /// Amount charged
    pub charge: i64,
}

// =============================================================================
// Bindings
// =============================================================================

/// Reference to a destination service from a binding
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceRef {
    /// Short service name
    #[serde(default)]
    pub name: String,
    /// Namespace, defaults to the binding's namespace
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    /// DNS domain, defaults to `cluster.local`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    /// Fully qualified hostname, takes precedence over the other fields
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service: Option<String>,
}

impl ServiceRef {
    /// Resolve to a fully qualified hostname
    pub fn fqdn(&self, binding_namespace: &str) -> String {
        if let Some(service) = self.service.as_deref().filter(|s| !s.is_empty()) {
            return service.to_string();
        }
        format!(
            "{}.{}.svc.{}",
            self.name,
            self.namespace.as_deref().unwrap_or(binding_namespace),
            self.domain.as_deref().unwrap_or(DEFAULT_DOMAIN)
        )
    }
}

/// Reference to a spec from a binding
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpecRef {
    /// Spec name
    pub name: String,
    /// Spec namespace, defaults to the binding's namespace
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

/// Binds specs to destination services
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpecBinding {
    /// Destinations the specs apply to
    #[serde(default)]
    pub services: Vec<ServiceRef>,
    /// Specs applied
    #[serde(default)]
    pub specs: Vec<SpecRef>,
}

// =============================================================================
// Store
// =============================================================================

/// Resolves specs bound to a destination service
///
/// Implementations must tolerate concurrent reads.
#[cfg_attr(any(test, feature = "mock"), automock)]
pub trait ConfigStore: Send + Sync {
    /// HTTP API specs bound to the destination
    fn http_api_specs_by_destination(&self, instance: &ServiceInstance) -> Vec<Config<HttpApiSpec>>;

    /// Quota specs bound to the destination
    fn quota_specs_by_destination(&self, instance: &ServiceInstance) -> Vec<Config<QuotaSpec>>;
}

/// In-memory config store keyed by [`ConfigMeta::key`]
#[derive(Debug, Default)]
pub struct MemoryConfigStore {
    api_specs: DashMap<String, Config<HttpApiSpec>>,
    api_spec_bindings: DashMap<String, Config<SpecBinding>>,
    quota_specs: DashMap<String, Config<QuotaSpec>>,
    quota_spec_bindings: DashMap<String, Config<SpecBinding>>,
}

impl MemoryConfigStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace an HTTP API spec
    pub fn put_http_api_spec(&self, name: &str, namespace: &str, spec: HttpApiSpec) {
        let meta = ConfigMeta::new(HTTP_API_SPEC_KIND, name, namespace);
        self.api_specs.insert(meta.key(), Config::new(meta, spec));
    }

    /// Insert or replace an HTTP API spec binding
    pub fn put_http_api_spec_binding(&self, name: &str, namespace: &str, binding: SpecBinding) {
        let meta = ConfigMeta::new(HTTP_API_SPEC_BINDING_KIND, name, namespace);
        self.api_spec_bindings.insert(meta.key(), Config::new(meta, binding));
    }

    /// Insert or replace a quota spec
    pub fn put_quota_spec(&self, name: &str, namespace: &str, spec: QuotaSpec) {
        let meta = ConfigMeta::new(QUOTA_SPEC_KIND, name, namespace);
        self.quota_specs.insert(meta.key(), Config::new(meta, spec));
    }

    /// Insert or replace a quota spec binding
    pub fn put_quota_spec_binding(&self, name: &str, namespace: &str, binding: SpecBinding) {
        let meta = ConfigMeta::new(QUOTA_SPEC_BINDING_KIND, name, namespace);
        self.quota_spec_bindings.insert(meta.key(), Config::new(meta, binding));
    }

    /// Remove an HTTP API spec; bindings referencing it resolve to nothing
    pub fn delete_http_api_spec(&self, name: &str, namespace: &str) -> bool {
        let key = ConfigMeta::new(HTTP_API_SPEC_KIND, name, namespace).key();
        self.api_specs.remove(&key).is_some()
    }

    /// Remove a quota spec; bindings referencing it resolve to nothing
    pub fn delete_quota_spec(&self, name: &str, namespace: &str) -> bool {
        let key = ConfigMeta::new(QUOTA_SPEC_KIND, name, namespace).key();
        self.quota_specs.remove(&key).is_some()
    }
}

/// Spec keys referenced by bindings that select the destination
fn bound_spec_keys(
    bindings: &DashMap<String, Config<SpecBinding>>,
    spec_kind: &str,
    hostname: &str,
) -> BTreeSet<String> {
    let mut keys = BTreeSet::new();
    for entry in bindings.iter() {
        let binding = entry.value();
        let namespace = binding.meta.namespace.as_str();
        let selected = binding
            .spec
            .services
            .iter()
            .any(|svc| svc.fqdn(namespace) == hostname);
        if !selected {
            continue;
        }
        for spec in &binding.spec.specs {
            let spec_namespace = spec.namespace.as_deref().unwrap_or(namespace);
            keys.insert(ConfigMeta::new(spec_kind, &spec.name, spec_namespace).key());
        }
    }
    keys
}

fn lookup<T: Clone>(specs: &DashMap<String, Config<T>>, keys: BTreeSet<String>) -> Vec<Config<T>> {
    keys.iter()
        .filter_map(|key| specs.get(key).map(|entry| entry.value().clone()))
        .collect()
}

impl ConfigStore for MemoryConfigStore {
    fn http_api_specs_by_destination(&self, instance: &ServiceInstance) -> Vec<Config<HttpApiSpec>> {
        let keys = bound_spec_keys(&self.api_spec_bindings, HTTP_API_SPEC_KIND, &instance.hostname);
        let specs = lookup(&self.api_specs, keys);
        debug!(hostname = %instance.hostname, count = specs.len(), "resolved http api specs");
        specs
    }

    fn quota_specs_by_destination(&self, instance: &ServiceInstance) -> Vec<Config<QuotaSpec>> {
        let keys = bound_spec_keys(&self.quota_spec_bindings, QUOTA_SPEC_KIND, &instance.hostname);
        let specs = lookup(&self.quota_specs, keys);
        debug!(hostname = %instance.hostname, count = specs.len(), "resolved quota specs");
        specs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reviews() -> ServiceInstance {
        ServiceInstance::new("reviews.default.svc.cluster.local")
    }

    fn binding(services: Vec<ServiceRef>, specs: &[&str]) -> SpecBinding {
        SpecBinding {
            services,
            specs: specs
                .iter()
                .map(|name| SpecRef {
                    name: name.to_string(),
                    namespace: None,
                })
                .collect(),
        }
    }

    fn short_ref(name: &str) -> ServiceRef {
        ServiceRef {
            name: name.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn config_key_format() {
        let meta = ConfigMeta::new(QUOTA_SPEC_KIND, "request-count", "istio-system");
        assert_eq!(meta.key(), "quota-spec/istio-system/request-count");
    }

    #[test]
    fn sort_configs_orders_by_key() {
        let mut configs = vec![
            Config::new(ConfigMeta::new("k", "b", "ns2"), 1),
            Config::new(ConfigMeta::new("k", "z", "ns1"), 2),
            Config::new(ConfigMeta::new("k", "a", "ns2"), 3),
        ];
        sort_configs(&mut configs);
        let order: Vec<i32> = configs.iter().map(|c| c.spec).collect();
        assert_eq!(order, vec![2, 3, 1]);
    }

    #[test]
    fn service_ref_fqdn_resolution() {
        assert_eq!(short_ref("reviews").fqdn("default"), "reviews.default.svc.cluster.local");

        let explicit = ServiceRef {
            name: "ignored".to_string(),
            service: Some("ratings.prod.svc.example.org".to_string()),
            ..Default::default()
        };
        assert_eq!(explicit.fqdn("default"), "ratings.prod.svc.example.org");

        let scoped = ServiceRef {
            name: "reviews".to_string(),
            namespace: Some("prod".to_string()),
            domain: Some("example.org".to_string()),
            service: Some(String::new()),
        };
        assert_eq!(scoped.fqdn("default"), "reviews.prod.svc.example.org");
    }

    #[test]
    fn specs_resolve_through_bindings() {
        let store = MemoryConfigStore::new();
        store.put_http_api_spec("reviews-api", "default", HttpApiSpec::default());
        store.put_http_api_spec("other-api", "default", HttpApiSpec::default());
        store.put_http_api_spec_binding(
            "reviews-binding",
            "default",
            binding(vec![short_ref("reviews")], &["reviews-api"]),
        );
        store.put_http_api_spec_binding(
            "other-binding",
            "default",
            binding(vec![short_ref("ratings")], &["other-api"]),
        );

        let specs = store.http_api_specs_by_destination(&reviews());
        assert_eq!(specs.len(), 1);
        assert_eq!(specs[0].meta.name, "reviews-api");
    }

    #[test]
    fn spec_selected_by_two_bindings_is_returned_once() {
        let store = MemoryConfigStore::new();
        store.put_quota_spec("request-count", "default", QuotaSpec::default());
        for name in ["b1", "b2"] {
            store.put_quota_spec_binding(
                name,
                "default",
                binding(vec![short_ref("reviews")], &["request-count"]),
            );
        }

        assert_eq!(store.quota_specs_by_destination(&reviews()).len(), 1);
    }

    #[test]
    fn dangling_spec_reference_resolves_to_nothing() {
        let store = MemoryConfigStore::new();
        store.put_quota_spec("request-count", "default", QuotaSpec::default());
        store.put_quota_spec_binding(
            "b",
            "default",
            binding(vec![short_ref("reviews")], &["request-count"]),
        );
        assert!(store.delete_quota_spec("request-count", "default"));
        assert!(!store.delete_quota_spec("request-count", "default"));

        assert!(store.quota_specs_by_destination(&reviews()).is_empty());
    }

    #[test]
    fn spec_reference_honors_explicit_namespace() {
        let store = MemoryConfigStore::new();
        store.put_http_api_spec("shared", "istio-system", HttpApiSpec::default());
        store.put_http_api_spec_binding(
            "b",
            "default",
            SpecBinding {
                services: vec![short_ref("reviews")],
                specs: vec![SpecRef {
                    name: "shared".to_string(),
                    namespace: Some("istio-system".to_string()),
                }],
            },
        );

        let specs = store.http_api_specs_by_destination(&reviews());
        assert_eq!(specs[0].meta.namespace, "istio-system");
        assert!(store.delete_http_api_spec("shared", "istio-system"));
    }

    #[test]
    fn quota_spec_json_names() {
        let spec = QuotaSpec {
            rules: vec![QuotaRule {
                match_: vec![AttributeMatch {
                    clause: BTreeMap::from([(
                        "request.path".to_string(),
                        StringMatch::Prefix("/api".to_string()),
                    )]),
                }],
                quotas: vec![Quota {
                    quota: "requestcount".to_string(),
                    charge: 1,
                }],
            }],
        };

        let json = serde_json::to_value(&spec).unwrap();
        assert_eq!(json["rules"][0]["match"][0]["clause"]["request.path"]["prefix"], "/api");
        assert_eq!(json["rules"][0]["quotas"][0]["charge"], 1);
    }
}
