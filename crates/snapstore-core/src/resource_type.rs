//! Resource type tags.
//!
//! This module provides [`ResourceType`], the fixed set of resource
//! categories a snapshot carries, and the type URL constants the wire layer
//! uses to discriminate them.

use std::fmt;
use std::str::FromStr;

use crate::StoreError;

/// Type URL constants for the known resource types.
pub struct TypeUrl;

impl TypeUrl {
    /// Type URL for Cluster (CDS).
    pub const CLUSTER: &'static str = "type.googleapis.com/envoy.config.cluster.v3.Cluster";

    /// Type URL for ClusterLoadAssignment (EDS).
    pub const ENDPOINT: &'static str =
        "type.googleapis.com/envoy.config.endpoint.v3.ClusterLoadAssignment";

    /// Type URL for Listener (LDS).
    pub const LISTENER: &'static str = "type.googleapis.com/envoy.config.listener.v3.Listener";

    /// Type URL for RouteConfiguration (RDS).
    pub const ROUTE: &'static str =
        "type.googleapis.com/envoy.config.route.v3.RouteConfiguration";

    /// Type URL for Secret (SDS).
    pub const SECRET: &'static str =
        "type.googleapis.com/envoy.extensions.transport_sockets.tls.v3.Secret";

    /// Type URL for ScopedRouteConfiguration (SRDS).
    pub const SCOPED_ROUTE: &'static str =
        "type.googleapis.com/envoy.config.route.v3.ScopedRouteConfiguration";
}

/// A category of configuration resource.
///
/// Every snapshot holds exactly one collection per variant, possibly empty.
///
/// # Example
///
/// ```rust
/// use snapstore_core::{ResourceType, TypeUrl};
///
/// let ty = ResourceType::from_type_url(TypeUrl::CLUSTER).unwrap();
/// assert_eq!(ty, ResourceType::Cluster);
/// assert_eq!(ty.short_name(), "Cluster");
/// assert!(ResourceType::from_type_url("type.googleapis.com/unknown").is_none());
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResourceType {
    /// Upstream cluster.
    Cluster,
    /// Listener.
    Listener,
    /// Route configuration.
    Route,
    /// Cluster load assignment.
    Endpoint,
    /// TLS secret.
    Secret,
    /// Scoped route configuration.
    ScopedRoute,
}

impl ResourceType {
    /// Number of known resource types.
    pub const COUNT: usize = 6;

    /// All known resource types, in snapshot order.
    pub const ALL: [ResourceType; Self::COUNT] = [
        ResourceType::Cluster,
        ResourceType::Listener,
        ResourceType::Route,
        ResourceType::Endpoint,
        ResourceType::Secret,
        ResourceType::ScopedRoute,
    ];

    /// The protocol type URL for this type.
    #[must_use]
    pub const fn type_url(self) -> &'static str {
        match self {
            Self::Cluster => TypeUrl::CLUSTER,
            Self::Listener => TypeUrl::LISTENER,
            Self::Route => TypeUrl::ROUTE,
            Self::Endpoint => TypeUrl::ENDPOINT,
            Self::Secret => TypeUrl::SECRET,
            Self::ScopedRoute => TypeUrl::SCOPED_ROUTE,
        }
    }

    /// Human-readable short name, the last segment of the type URL.
    #[must_use]
    pub fn short_name(self) -> &'static str {
        let url = self.type_url();
        url.rsplit('.').next().unwrap_or(url)
    }

    /// Resolve a type URL. Returns `None` for tags outside the enumeration.
    #[must_use]
    pub fn from_type_url(type_url: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|ty| ty.type_url() == type_url)
    }

    /// Position of this type in [`ResourceType::ALL`].
    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.short_name())
    }
}

impl FromStr for ResourceType {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_type_url(s).ok_or_else(|| StoreError::unknown_type(s))
    }
}
