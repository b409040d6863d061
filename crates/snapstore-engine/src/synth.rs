//! Payload synthesis for Add and Update.
//!
//! Add and Update requests name a resource but carry no payload. The
//! engine asks a [`PayloadSynthesizer`] to produce one. Synthesis must be a
//! pure function of its inputs: the same request against the same snapshot
//! always yields the same payload bytes.

use std::fmt;

use prost_types::Duration;

use snapstore_core::payload::{
    Address, AssignmentPolicy, ClusterPayload, ConfigSource, DataSource, DiscoveryType,
    EdsClusterConfig, Endpoint, EndpointPayload, GenericSecret, KeyFragment, LbEndpoint,
    ListenerPayload, LocalityLbEndpoints, RouteAction, RouteEntry, RouteMatch, RoutePayload,
    ScopeKey, ScopedRoutePayload, SecretPayload, TypedPayload, VirtualHost,
};
use snapstore_core::{NodeKey, Resource, ResourceType, StoreError};

/// Entry of a generic secret's `secrets` map counting rotations.
pub const ROTATION_KEY: &str = "rotation";

/// Produces payloads for resources added or updated by name.
pub trait PayloadSynthesizer: Send + Sync + fmt::Debug {
    /// Build a fresh resource of `resource_type` called `name` for `node`.
    fn synthesize(
        &self,
        node: &NodeKey,
        resource_type: ResourceType,
        name: &str,
    ) -> Result<Resource, StoreError>;

    /// Build the refreshed version of an existing resource.
    ///
    /// The result must keep the resource's type and name.
    /// [`TemplateSynthesizer`] re-encodes the typed subset of the payload, so
    /// fields outside it are not carried over.
    fn refresh(&self, current: &Resource) -> Result<Resource, StoreError>;
}

/// Default synthesizer producing small, deterministic Envoy payloads.
///
/// Refresh tweaks one knob per type: clusters and listeners grow their DNS
/// refresh rate and backlog by `refresh_step`, endpoints their stale-after
/// window. Routes gain the internal-only header, secrets count a rotation,
/// and scoped routes flip on-demand loading.
#[derive(Debug, Clone)]
pub struct TemplateSynthesizer {
    /// Port for synthesized listeners.
    pub listener_port: u32,
    /// Port for synthesized endpoints.
    pub endpoint_port: u32,
    /// Cluster connect timeout in seconds.
    pub connect_timeout_secs: u64,
    /// Initial cluster DNS refresh rate in seconds.
    pub dns_refresh_rate_secs: u64,
    /// Initial listener TCP backlog.
    pub tcp_backlog_size: u32,
    /// Initial endpoint stale-after in seconds.
    pub stale_after_secs: u64,
    /// Amount numeric knobs grow by on each refresh.
    pub refresh_step: u32,
    /// Header a refreshed route marks as internal only.
    pub internal_only_header: String,
}

impl Default for TemplateSynthesizer {
    fn default() -> Self {
        Self {
            listener_port: 11223,
            endpoint_port: 10000,
            connect_timeout_secs: 5,
            dns_refresh_rate_secs: 5,
            tcp_backlog_size: 5,
            stale_after_secs: 5,
            refresh_step: 5,
            internal_only_header: "x-snapstore-internal".to_string(),
        }
    }
}

impl TemplateSynthesizer {
    /// Check the template for values that would produce unusable payloads.
    pub fn validate(&self) -> Result<(), StoreError> {
        if self.listener_port == 0 || self.listener_port > u32::from(u16::MAX) {
            return Err(StoreError::Configuration(format!(
                "listener port {} out of range",
                self.listener_port
            )));
        }
        if self.endpoint_port == 0 || self.endpoint_port > u32::from(u16::MAX) {
            return Err(StoreError::Configuration(format!(
                "endpoint port {} out of range",
                self.endpoint_port
            )));
        }
        if self.refresh_step == 0 {
            return Err(StoreError::Configuration(
                "refresh step must be non-zero".into(),
            ));
        }
        if self.internal_only_header.is_empty() {
            return Err(StoreError::Configuration(
                "internal-only header must not be empty".into(),
            ));
        }
        Ok(())
    }
}

impl PayloadSynthesizer for TemplateSynthesizer {
    fn synthesize(
        &self,
        node: &NodeKey,
        resource_type: ResourceType,
        name: &str,
    ) -> Result<Resource, StoreError> {
        if name.is_empty() {
            return Err(StoreError::malformed(
                resource_type.type_url(),
                name,
                "resource name is empty",
            ));
        }

        let name = name.to_string();
        let resource = match resource_type {
            ResourceType::Cluster => Resource::from_payload(&ClusterPayload {
                r#type: DiscoveryType::Eds as i32,
                eds_cluster_config: Some(EdsClusterConfig {
                    eds_config: Some(ConfigSource::grpc(node.as_str())),
                    service_name: String::new(),
                }),
                connect_timeout: Some(seconds(self.connect_timeout_secs)),
                dns_refresh_rate: Some(seconds(self.dns_refresh_rate_secs)),
                name,
            }),
            ResourceType::Listener => Resource::from_payload(&ListenerPayload {
                name,
                address: Some(Address::tcp(LISTENER_ADDRESS, self.listener_port)),
                filter_chains: Vec::new(),
                tcp_backlog_size: Some(self.tcp_backlog_size),
            }),
            ResourceType::Route => Resource::from_payload(&RoutePayload {
                virtual_hosts: vec![VirtualHost {
                    name: name.clone(),
                    domains: vec!["*".to_string()],
                    routes: vec![RouteEntry {
                        r#match: Some(RouteMatch {
                            prefix: "/".to_string(),
                        }),
                        route: Some(RouteAction {
                            cluster: name.clone(),
                        }),
                    }],
                }],
                name,
                internal_only_headers: Vec::new(),
            }),
            ResourceType::Endpoint => Resource::from_payload(&EndpointPayload {
                cluster_name: name,
                endpoints: vec![LocalityLbEndpoints {
                    lb_endpoints: vec![LbEndpoint {
                        endpoint: Some(Endpoint {
                            address: Some(Address::tcp(ENDPOINT_ADDRESS, self.endpoint_port)),
                        }),
                    }],
                }],
                policy: Some(AssignmentPolicy {
                    endpoint_stale_after: Some(seconds(self.stale_after_secs)),
                }),
            }),
            ResourceType::Secret => Resource::from_payload(&SecretPayload {
                name,
                generic_secret: Some(GenericSecret {
                    secret: Some(DataSource {
                        inline_bytes: Some(Vec::new()),
                        inline_string: None,
                    }),
                    secrets: Default::default(),
                }),
            }),
            ResourceType::ScopedRoute => Resource::from_payload(&ScopedRoutePayload {
                route_configuration_name: name.clone(),
                key: Some(ScopeKey {
                    fragments: vec![KeyFragment {
                        string_key: name.clone(),
                    }],
                }),
                name,
                on_demand: false,
            }),
        };
        Ok(resource)
    }

    fn refresh(&self, current: &Resource) -> Result<Resource, StoreError> {
        let step = self.refresh_step;
        match current.resource_type() {
            ResourceType::Cluster => retouch::<ClusterPayload>(current, |p| {
                grow(p.dns_refresh_rate.get_or_insert_with(Default::default), step);
            }),
            ResourceType::Listener => retouch::<ListenerPayload>(current, |p| {
                let backlog = p.tcp_backlog_size.get_or_insert(0);
                *backlog = backlog.saturating_add(step);
            }),
            ResourceType::Route => retouch::<RoutePayload>(current, |p| {
                if !p.internal_only_headers.contains(&self.internal_only_header) {
                    p.internal_only_headers.push(self.internal_only_header.clone());
                }
            }),
            ResourceType::Endpoint => retouch::<EndpointPayload>(current, |p| {
                let policy = p.policy.get_or_insert_with(Default::default);
                grow(policy.endpoint_stale_after.get_or_insert_with(Default::default), step);
            }),
            ResourceType::Secret => retouch::<SecretPayload>(current, |p| {
                let generic = p.generic_secret.get_or_insert_with(Default::default);
                let rotation = generic.secrets.entry(ROTATION_KEY.to_string()).or_default();
                let count = rotation
                    .inline_string
                    .as_deref()
                    .and_then(|n| n.parse::<u64>().ok())
                    .unwrap_or(0);
                rotation.inline_string = Some(count.saturating_add(1).to_string());
            }),
            ResourceType::ScopedRoute => retouch::<ScopedRoutePayload>(current, |p| {
                p.on_demand = !p.on_demand;
            }),
        }
    }
}

const LISTENER_ADDRESS: &str = "0.0.0.0";
const ENDPOINT_ADDRESS: &str = "127.0.0.1";

fn seconds(secs: u64) -> Duration {
    Duration {
        seconds: i64::try_from(secs).unwrap_or(i64::MAX),
        nanos: 0,
    }
}

fn grow(duration: &mut Duration, step: u32) {
    duration.seconds = duration.seconds.saturating_add(i64::from(step));
}

/// Decode, tweak and re-encode under the same identity.
fn retouch<P>(current: &Resource, tweak: impl FnOnce(&mut P)) -> Result<Resource, StoreError>
where
    P: TypedPayload,
{
    let mut payload = current.typed::<P>()?;
    tweak(&mut payload);
    Ok(Resource::new(
        current.resource_type(),
        current.name(),
        payload.to_any(),
    ))
}
