//! Typed resource payloads.
//!
//! Each payload message is a wire-compatible subset of the Envoy v3 message
//! its type URL names. Declared fields carry Envoy's field numbers and wire
//! types; everything else is skipped on decode. A resource produced by any
//! Envoy control plane decodes cleanly, and a payload built here decodes as
//! the genuine Envoy message. Re-encoding keeps only the declared subset.
//!
//! Incoming payloads are validated through their identity field alone: tag 1
//! is the name in every supported type (`cluster_name` for load assignments).

#![allow(missing_docs)] // Field docs live in the Envoy protos

use std::collections::BTreeMap;

use prost::Message;
use prost_types::{Any, Duration};

use crate::{ResourceType, StoreError};

/// A prost message that is the payload of one [`ResourceType`].
pub trait TypedPayload: Message + Default + Sized {
    /// The resource type this payload belongs to.
    const RESOURCE_TYPE: ResourceType;

    /// The resource name carried by the payload.
    fn resource_name(&self) -> &str;

    /// Wrap the payload in an `Any` tagged with its type URL.
    fn to_any(&self) -> Any {
        Any {
            type_url: Self::RESOURCE_TYPE.type_url().to_string(),
            value: self.encode_to_vec(),
        }
    }

    /// Decode a payload from an `Any`, checking the type tag first.
    fn from_any(any: &Any) -> Result<Self, StoreError> {
        let expected = Self::RESOURCE_TYPE.type_url();
        if any.type_url != expected {
            return Err(StoreError::MalformedResource {
                type_url: expected.to_string(),
                name: String::new(),
                reason: format!("payload is tagged {}", any.type_url),
            });
        }
        Self::decode(any.value.as_slice()).map_err(|e| StoreError::malformed(expected, "", e))
    }
}

/// `envoy.config.core.v3.ApiVersion`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
#[repr(i32)]
pub enum ApiVersion {
    Auto = 0,
    V2 = 1,
    V3 = 2,
}

/// `envoy.config.core.v3.ApiConfigSource.ApiType`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
#[repr(i32)]
pub enum ApiType {
    DeprecatedAndUnavailable = 0,
    Rest = 1,
    Grpc = 2,
    DeltaGrpc = 3,
}

/// `envoy.config.cluster.v3.Cluster.DiscoveryType`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
#[repr(i32)]
pub enum DiscoveryType {
    Static = 0,
    StrictDns = 1,
    LogicalDns = 2,
    Eds = 3,
    OriginalDst = 4,
}

/// `envoy.config.core.v3.SocketAddress`, TCP with a numeric port.
#[derive(Clone, PartialEq, Message)]
pub struct SocketAddress {
    #[prost(string, tag = "2")]
    pub address: String,
    #[prost(uint32, tag = "3")]
    pub port_value: u32,
}

/// `envoy.config.core.v3.Address`.
#[derive(Clone, PartialEq, Message)]
pub struct Address {
    #[prost(message, optional, tag = "1")]
    pub socket_address: Option<SocketAddress>,
}

impl Address {
    /// A TCP socket address.
    pub fn tcp(address: impl Into<String>, port_value: u32) -> Self {
        Self {
            socket_address: Some(SocketAddress {
                address: address.into(),
                port_value,
            }),
        }
    }
}

/// `envoy.config.core.v3.GrpcService.EnvoyGrpc`.
#[derive(Clone, PartialEq, Message)]
pub struct EnvoyGrpc {
    #[prost(string, tag = "1")]
    pub cluster_name: String,
}

/// `envoy.config.core.v3.GrpcService`.
#[derive(Clone, PartialEq, Message)]
pub struct GrpcService {
    #[prost(message, optional, tag = "1")]
    pub envoy_grpc: Option<EnvoyGrpc>,
}

/// `envoy.config.core.v3.ApiConfigSource`.
#[derive(Clone, PartialEq, Message)]
pub struct ApiConfigSource {
    #[prost(enumeration = "ApiType", tag = "1")]
    pub api_type: i32,
    #[prost(message, repeated, tag = "4")]
    pub grpc_services: Vec<GrpcService>,
    #[prost(bool, tag = "7")]
    pub set_node_on_first_message_only: bool,
    #[prost(enumeration = "ApiVersion", tag = "8")]
    pub transport_api_version: i32,
}

/// `envoy.config.core.v3.ConfigSource`.
#[derive(Clone, PartialEq, Message)]
pub struct ConfigSource {
    #[prost(message, optional, tag = "2")]
    pub api_config_source: Option<ApiConfigSource>,
    #[prost(enumeration = "ApiVersion", tag = "6")]
    pub resource_api_version: i32,
}

impl ConfigSource {
    /// A v3 gRPC config source served by the Envoy cluster `cluster_name`.
    pub fn grpc(cluster_name: impl Into<String>) -> Self {
        Self {
            api_config_source: Some(ApiConfigSource {
                api_type: ApiType::Grpc as i32,
                grpc_services: vec![GrpcService {
                    envoy_grpc: Some(EnvoyGrpc {
                        cluster_name: cluster_name.into(),
                    }),
                }],
                set_node_on_first_message_only: true,
                transport_api_version: ApiVersion::V3 as i32,
            }),
            resource_api_version: ApiVersion::V3 as i32,
        }
    }
}

/// `envoy.config.cluster.v3.Cluster.EdsClusterConfig`.
#[derive(Clone, PartialEq, Message)]
pub struct EdsClusterConfig {
    #[prost(message, optional, tag = "1")]
    pub eds_config: Option<ConfigSource>,
    #[prost(string, tag = "2")]
    pub service_name: String,
}

/// `envoy.config.cluster.v3.Cluster`.
#[derive(Clone, PartialEq, Message)]
pub struct ClusterPayload {
    #[prost(string, tag = "1")]
    pub name: String,
    #[prost(enumeration = "DiscoveryType", tag = "2")]
    pub r#type: i32,
    #[prost(message, optional, tag = "3")]
    pub eds_cluster_config: Option<EdsClusterConfig>,
    #[prost(message, optional, tag = "4")]
    pub connect_timeout: Option<Duration>,
    #[prost(message, optional, tag = "16")]
    pub dns_refresh_rate: Option<Duration>,
}

/// `envoy.config.listener.v3.Listener`.
///
/// Filter chains are kept as their encoded bytes.
#[derive(Clone, PartialEq, Message)]
pub struct ListenerPayload {
    #[prost(string, tag = "1")]
    pub name: String,
    #[prost(message, optional, tag = "2")]
    pub address: Option<Address>,
    #[prost(bytes = "vec", repeated, tag = "3")]
    pub filter_chains: Vec<Vec<u8>>,
    #[prost(message, optional, tag = "24")]
    pub tcp_backlog_size: Option<u32>,
}

/// `envoy.config.route.v3.RouteMatch`, prefix matching only.
#[derive(Clone, PartialEq, Message)]
pub struct RouteMatch {
    #[prost(string, tag = "1")]
    pub prefix: String,
}

/// `envoy.config.route.v3.RouteAction`, single-cluster only.
#[derive(Clone, PartialEq, Message)]
pub struct RouteAction {
    #[prost(string, tag = "1")]
    pub cluster: String,
}

/// `envoy.config.route.v3.Route`.
#[derive(Clone, PartialEq, Message)]
pub struct RouteEntry {
    #[prost(message, optional, tag = "1")]
    pub r#match: Option<RouteMatch>,
    #[prost(message, optional, tag = "2")]
    pub route: Option<RouteAction>,
}

/// `envoy.config.route.v3.VirtualHost`.
#[derive(Clone, PartialEq, Message)]
pub struct VirtualHost {
    #[prost(string, tag = "1")]
    pub name: String,
    #[prost(string, repeated, tag = "2")]
    pub domains: Vec<String>,
    #[prost(message, repeated, tag = "3")]
    pub routes: Vec<RouteEntry>,
}

/// `envoy.config.route.v3.RouteConfiguration`.
#[derive(Clone, PartialEq, Message)]
pub struct RoutePayload {
    #[prost(string, tag = "1")]
    pub name: String,
    #[prost(message, repeated, tag = "2")]
    pub virtual_hosts: Vec<VirtualHost>,
    #[prost(string, repeated, tag = "3")]
    pub internal_only_headers: Vec<String>,
}

/// `envoy.config.endpoint.v3.Endpoint`.
#[derive(Clone, PartialEq, Message)]
pub struct Endpoint {
    #[prost(message, optional, tag = "1")]
    pub address: Option<Address>,
}

/// `envoy.config.endpoint.v3.LbEndpoint`.
#[derive(Clone, PartialEq, Message)]
pub struct LbEndpoint {
    #[prost(message, optional, tag = "1")]
    pub endpoint: Option<Endpoint>,
}

/// `envoy.config.endpoint.v3.LocalityLbEndpoints`.
#[derive(Clone, PartialEq, Message)]
pub struct LocalityLbEndpoints {
    #[prost(message, repeated, tag = "2")]
    pub lb_endpoints: Vec<LbEndpoint>,
}

/// `envoy.config.endpoint.v3.ClusterLoadAssignment.Policy`.
#[derive(Clone, PartialEq, Message)]
pub struct AssignmentPolicy {
    #[prost(message, optional, tag = "4")]
    pub endpoint_stale_after: Option<Duration>,
}

/// `envoy.config.endpoint.v3.ClusterLoadAssignment`. Named by its cluster.
#[derive(Clone, PartialEq, Message)]
pub struct EndpointPayload {
    #[prost(string, tag = "1")]
    pub cluster_name: String,
    #[prost(message, repeated, tag = "2")]
    pub endpoints: Vec<LocalityLbEndpoints>,
    #[prost(message, optional, tag = "4")]
    pub policy: Option<AssignmentPolicy>,
}

/// `envoy.config.core.v3.DataSource`, inline variants only.
#[derive(Clone, PartialEq, Message)]
pub struct DataSource {
    #[prost(bytes = "vec", optional, tag = "2")]
    pub inline_bytes: Option<Vec<u8>>,
    #[prost(string, optional, tag = "3")]
    pub inline_string: Option<String>,
}

/// `envoy.extensions.transport_sockets.tls.v3.GenericSecret`.
#[derive(Clone, PartialEq, Message)]
pub struct GenericSecret {
    #[prost(message, optional, tag = "1")]
    pub secret: Option<DataSource>,
    #[prost(btree_map = "string, message", tag = "2")]
    pub secrets: BTreeMap<String, DataSource>,
}

/// `envoy.extensions.transport_sockets.tls.v3.Secret`, generic secrets only.
#[derive(Clone, PartialEq, Message)]
pub struct SecretPayload {
    #[prost(string, tag = "1")]
    pub name: String,
    #[prost(message, optional, tag = "5")]
    pub generic_secret: Option<GenericSecret>,
}

/// `envoy.config.route.v3.ScopedRouteConfiguration.Key.Fragment`.
#[derive(Clone, PartialEq, Message)]
pub struct KeyFragment {
    #[prost(string, tag = "1")]
    pub string_key: String,
}

/// `envoy.config.route.v3.ScopedRouteConfiguration.Key`.
#[derive(Clone, PartialEq, Message)]
pub struct ScopeKey {
    #[prost(message, repeated, tag = "1")]
    pub fragments: Vec<KeyFragment>,
}

/// `envoy.config.route.v3.ScopedRouteConfiguration`.
#[derive(Clone, PartialEq, Message)]
pub struct ScopedRoutePayload {
    #[prost(string, tag = "1")]
    pub name: String,
    #[prost(string, tag = "2")]
    pub route_configuration_name: String,
    #[prost(message, optional, tag = "3")]
    pub key: Option<ScopeKey>,
    #[prost(bool, tag = "4")]
    pub on_demand: bool,
}

macro_rules! impl_typed_payload {
    ($ty:ty, $resource_type:expr, $name:ident) => {
        impl TypedPayload for $ty {
            const RESOURCE_TYPE: ResourceType = $resource_type;

            fn resource_name(&self) -> &str {
                &self.$name
            }
        }
    };
}

impl_typed_payload!(ClusterPayload, ResourceType::Cluster, name);
impl_typed_payload!(ListenerPayload, ResourceType::Listener, name);
impl_typed_payload!(RoutePayload, ResourceType::Route, name);
impl_typed_payload!(EndpointPayload, ResourceType::Endpoint, cluster_name);
impl_typed_payload!(SecretPayload, ResourceType::Secret, name);
impl_typed_payload!(ScopedRoutePayload, ResourceType::ScopedRoute, name);

/// Field 1 of every supported resource type.
#[derive(Clone, PartialEq, Message)]
struct ResourceIdentity {
    #[prost(string, tag = "1")]
    name: String,
}

/// Decode the resource name out of a wire payload.
///
/// Only the identity field is interpreted; the rest of the message must be
/// well-formed protobuf but is otherwise skipped.
pub(crate) fn decode_name(any: &Any) -> Result<String, StoreError> {
    ResourceIdentity::decode(any.value.as_slice())
        .map(|identity| identity.name)
        .map_err(|e| StoreError::malformed(any.type_url.as_str(), "", e))
}
