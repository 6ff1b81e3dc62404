//! HTTP mixer filter configuration

use std::collections::BTreeMap;

use tracing::debug;

use meshmixer_common::mesh::{self, TrafficDirection};
use meshmixer_common::model::NodeType;
use meshmixer_common::{AttributeValue, Attributes};

use super::FilterConfigBuilder;
use crate::config::HttpClientConfig;

impl<'a> FilterConfigBuilder<'a> {
    /// Build the HTTP filter config for a listener in `direction`.
    ///
    /// Outbound sidecar listeners get no default destination attributes;
    /// their routes carry per-route attributes instead. Inbound sidecar
    /// listeners do not forward attributes to the application.
    pub fn build_http_filter_config(&self, direction: TrafficDirection) -> HttpClientConfig {
        let outbound = direction == TrafficDirection::Outbound;
        let labels = self.node_labels();

        let mut mixer_attributes = Attributes::new();
        mixer_attributes.insert_string(mesh::ATTR_REPORTER_UID, mesh::workload_uid(&self.proxy.id));

        if !outbound || self.proxy.is_router() {
            self.add_node_attributes(&mut mixer_attributes, mesh::ATTR_DESTINATION_PREFIX, labels);
            mixer_attributes.insert(mesh::ATTR_REPORTER_LOCAL, AttributeValue::bool(true));
        }

        let forward_attributes = if self.proxy.node_type == NodeType::Sidecar && !outbound {
            None
        } else {
            let mut forward = Attributes::new();
            self.add_node_attributes(&mut forward, mesh::ATTR_SOURCE_PREFIX, labels);
            Some(forward)
        };

        let disable_check = self.checks_disabled(direction);
        let disable_report = self.reports_disabled(direction);

        let service_configs: BTreeMap<_, _> = self
            .proxy_instances
            .iter()
            .map(|instance| {
                (
                    instance.hostname.clone(),
                    self.service_config(&instance.hostname, instance, disable_check, disable_report),
                )
            })
            .collect();

        debug!(
            node = %self.proxy.id,
            node_type = %self.proxy.node_type,
            direction = %direction,
            services = service_configs.len(),
            disable_check,
            disable_report,
            "built http mixer filter config"
        );

        HttpClientConfig {
            mixer_attributes,
            forward_attributes,
            service_configs,
            default_destination_service: self
                .proxy_instances
                .first()
                .map(|i| i.hostname.clone())
                .unwrap_or_default(),
            transport: self.transport_config(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meshmixer_common::store::{Config, ConfigMeta, HttpApiSpec, MockConfigStore};
    use meshmixer_common::{AuthPolicy, MeshConfig, Proxy, ServiceInstance};

    const DOMAIN: &str = "default.svc.cluster.local";
    const DIRECTIONS: [TrafficDirection; 2] = [TrafficDirection::Inbound, TrafficDirection::Outbound];
    const NODE_TYPES: [NodeType; 3] = [NodeType::Sidecar, NodeType::Ingress, NodeType::Router];

    fn make_mesh() -> MeshConfig {
        MeshConfig {
            mixer_check_server: "istio-policy.istio-system.svc.cluster.local:15004".to_string(),
            mixer_report_server: "istio-telemetry.istio-system.svc.cluster.local:15004".to_string(),
            ..Default::default()
        }
    }

    fn make_proxy(node_type: NodeType) -> Proxy {
        Proxy::new(node_type, "10.1.1.1", "reviews-v1-abc.default", DOMAIN)
    }

    fn make_instances() -> Vec<ServiceInstance> {
        vec![
            ServiceInstance::new("reviews.default.svc.cluster.local")
                .with_labels([("app", "reviews"), ("version", "v1")]),
            ServiceInstance::new("reviews-admin.default.svc.cluster.local"),
        ]
    }

    fn empty_store() -> MockConfigStore {
        let mut store = MockConfigStore::new();
        store.expect_http_api_specs_by_destination().returning(|_| vec![]);
        store.expect_quota_specs_by_destination().returning(|_| vec![]);
        store
    }

    #[test]
    fn inbound_sidecar_config() {
        let mesh = make_mesh();
        let proxy = make_proxy(NodeType::Sidecar);
        let instances = make_instances();
        let store = empty_store();
        let builder = FilterConfigBuilder::new(&mesh, &proxy, &instances, &store);

        let config = builder.build_http_filter_config(TrafficDirection::Inbound);
        let attrs = &config.mixer_attributes;

        assert_eq!(
            attrs.get_str("context.reporter.uid"),
            Some("kubernetes://reviews-v1-abc.default")
        );
        assert_eq!(
            attrs.get("context.reporter.local").and_then(AttributeValue::as_bool),
            Some(true)
        );
        assert_eq!(attrs.get("destination.ip"), Some(&AttributeValue::ip("10.1.1.1")));
        assert_eq!(
            attrs.get_str("destination.uid"),
            Some("kubernetes://reviews-v1-abc.default")
        );
        assert_eq!(
            attrs.get("destination.labels").and_then(AttributeValue::as_string_map),
            Some(&instances[0].labels)
        );
        assert_eq!(attrs.len(), 5);

        assert!(config.forward_attributes.is_none());
        assert_eq!(config.default_destination_service, "reviews.default.svc.cluster.local");
        assert_eq!(config.service_configs.len(), 2);
        for sc in config.service_configs.values() {
            assert!(!sc.disable_check_calls);
            assert!(!sc.disable_report_calls);
        }
    }

    #[test]
    fn outbound_sidecar_omits_destination_attributes() {
        let mesh = make_mesh();
        let proxy = make_proxy(NodeType::Sidecar);
        let instances = make_instances();
        let store = empty_store();
        let builder = FilterConfigBuilder::new(&mesh, &proxy, &instances, &store);

        let config = builder.build_http_filter_config(TrafficDirection::Outbound);

        assert_eq!(config.mixer_attributes.len(), 1);
        assert!(config.mixer_attributes.contains("context.reporter.uid"));

        let forward = config.forward_attributes.expect("outbound sidecar forwards");
        assert_eq!(forward.get_str("source.uid"), Some("kubernetes://reviews-v1-abc.default"));
        assert_eq!(forward.get("source.ip"), Some(&AttributeValue::ip("10.1.1.1")));
        assert!(forward.contains("source.labels"));

        for sc in config.service_configs.values() {
            assert!(sc.disable_check_calls);
            assert!(sc.disable_report_calls);
        }
    }

    #[test]
    fn outbound_router_is_enforced() {
        let mesh = make_mesh();
        let proxy = make_proxy(NodeType::Router);
        let instances = make_instances();
        let store = empty_store();
        let builder = FilterConfigBuilder::new(&mesh, &proxy, &instances, &store);

        let config = builder.build_http_filter_config(TrafficDirection::Outbound);

        assert!(config.mixer_attributes.contains("destination.uid"));
        assert!(config.mixer_attributes.contains("context.reporter.local"));
        assert!(config.forward_attributes.is_some());
        for sc in config.service_configs.values() {
            assert!(!sc.disable_check_calls);
            assert!(!sc.disable_report_calls);
        }
    }

    #[test]
    fn global_disable_turns_off_checks_everywhere() {
        let mesh = MeshConfig {
            disable_policy_checks: true,
            ..make_mesh()
        };
        let instances = make_instances();
        let store = empty_store();

        for node_type in NODE_TYPES {
            let proxy = make_proxy(node_type);
            let builder = FilterConfigBuilder::new(&mesh, &proxy, &instances, &store);
            for direction in DIRECTIONS {
                let config = builder.build_http_filter_config(direction);
                for sc in config.service_configs.values() {
                    assert!(sc.disable_check_calls, "{} {}", node_type, direction);
                }
            }
        }
    }

    #[test]
    fn forwarding_suppressed_only_for_inbound_sidecar() {
        let mesh = make_mesh();
        let instances = make_instances();
        let store = empty_store();

        for node_type in NODE_TYPES {
            let proxy = make_proxy(node_type);
            let builder = FilterConfigBuilder::new(&mesh, &proxy, &instances, &store);
            for direction in DIRECTIONS {
                let config = builder.build_http_filter_config(direction);
                let suppressed =
                    node_type == NodeType::Sidecar && direction == TrafficDirection::Inbound;
                match config.forward_attributes {
                    None => assert!(suppressed, "{} {}", node_type, direction),
                    Some(forward) => {
                        assert!(!suppressed);
                        assert_eq!(
                            forward.get_str("source.uid"),
                            Some("kubernetes://reviews-v1-abc.default")
                        );
                    }
                }
            }
        }
    }

    #[test]
    fn service_configs_keyed_by_hostname() {
        let mesh = make_mesh();
        let proxy = make_proxy(NodeType::Sidecar);
        let instances = make_instances();
        let mut store = MockConfigStore::new();
        store
            .expect_http_api_specs_by_destination()
            .times(2)
            .returning(|instance| {
                if instance.hostname.starts_with("reviews-admin") {
                    vec![]
                } else {
                    vec![Config::new(
                        ConfigMeta::new("http-api-spec", "reviews", "default"),
                        HttpApiSpec::default(),
                    )]
                }
            });
        store.expect_quota_specs_by_destination().times(2).returning(|_| vec![]);
        let builder = FilterConfigBuilder::new(&mesh, &proxy, &instances, &store);

        let config = builder.build_http_filter_config(TrafficDirection::Inbound);

        let reviews = &config.service_configs["reviews.default.svc.cluster.local"];
        assert_eq!(reviews.http_api_spec.len(), 1);
        assert_eq!(
            reviews.mixer_attributes.get_str("destination.service.name"),
            Some("reviews")
        );
        assert!(reviews.mixer_attributes.contains("destination.labels"));

        let admin = &config.service_configs["reviews-admin.default.svc.cluster.local"];
        assert!(admin.http_api_spec.is_empty());
        assert!(!admin.mixer_attributes.contains("destination.labels"));
    }

    #[test]
    fn no_instances_yields_no_service_configs() {
        let mesh = make_mesh();
        let proxy = Proxy::new(NodeType::Router, "", "gateway.istio-system", "istio-system.svc.cluster.local");
        let store = empty_store();
        let builder = FilterConfigBuilder::new(&mesh, &proxy, &[], &store);

        let config = builder.build_http_filter_config(TrafficDirection::Outbound);

        assert!(config.service_configs.is_empty());
        assert!(config.default_destination_service.is_empty());
        assert!(!config.mixer_attributes.contains("destination.ip"));
        assert!(!config.mixer_attributes.contains("destination.labels"));
        assert_eq!(
            config.mixer_attributes.get_str("destination.uid"),
            Some("kubernetes://gateway.istio-system")
        );
    }

    #[test]
    fn transport_follows_auth_policy() {
        let mesh = MeshConfig {
            auth_policy: AuthPolicy::MutualTls,
            ..make_mesh()
        };
        let proxy = make_proxy(NodeType::Sidecar);
        let store = empty_store();
        let builder = FilterConfigBuilder::new(&mesh, &proxy, &[], &store);

        let config = builder.build_http_filter_config(TrafficDirection::Inbound);
        assert_eq!(
            config.transport.report_cluster,
            "outbound|15004||istio-telemetry.istio-system.svc.cluster.local"
        );
    }

    #[test]
    fn serializes_with_client_config_names() {
        let mesh = make_mesh();
        let proxy = make_proxy(NodeType::Sidecar);
        let instances = make_instances();
        let store = empty_store();
        let builder = FilterConfigBuilder::new(&mesh, &proxy, &instances, &store);

        let json = serde_json::to_value(builder.build_http_filter_config(TrafficDirection::Outbound))
            .unwrap();

        assert_eq!(
            json["mixerAttributes"]["attributes"]["context.reporter.uid"]["stringValue"],
            "kubernetes://reviews-v1-abc.default"
        );
        assert!(json["forwardAttributes"]["attributes"]["source.uid"].is_object());
        assert_eq!(
            json["serviceConfigs"]["reviews.default.svc.cluster.local"]["disableCheckCalls"],
            true
        );
        assert_eq!(
            json["transport"]["checkCluster"],
            "outbound|9091||istio-policy.istio-system.svc.cluster.local"
        );
    }
}
