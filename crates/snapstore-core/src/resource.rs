//! Named, typed resources.
//!
//! A [`Resource`] pairs a [`ResourceType`] and a name with an opaque payload.
//! Identity for update and removal is the `(type, name)` pair; decoding reads
//! the payload's name and checks that the rest is well-formed protobuf.

use prost_types::Any;

use crate::payload::{decode_name, TypedPayload};
use crate::{ResourceType, StoreError};

/// A named, typed, opaque payload.
///
/// # Example
///
/// ```rust
/// use snapstore_core::payload::{ClusterPayload, TypedPayload};
/// use snapstore_core::{Resource, ResourceType};
///
/// let payload = ClusterPayload { name: "c1".into(), ..Default::default() };
/// let resource = Resource::decode(&payload.to_any()).unwrap();
///
/// assert_eq!(resource.resource_type(), ResourceType::Cluster);
/// assert_eq!(resource.name(), "c1");
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Resource {
    resource_type: ResourceType,
    name: String,
    payload: Any,
}

impl Resource {
    /// Build a resource from already validated parts.
    ///
    /// The payload tag is rewritten to match `resource_type`.
    #[must_use]
    pub fn new(resource_type: ResourceType, name: impl Into<String>, mut payload: Any) -> Self {
        resource_type.type_url().clone_into(&mut payload.type_url);
        Self {
            resource_type,
            name: name.into(),
            payload,
        }
    }

    /// Build a resource from a typed payload.
    #[must_use]
    pub fn from_payload<P: TypedPayload>(payload: &P) -> Self {
        Self {
            resource_type: P::RESOURCE_TYPE,
            name: payload.resource_name().to_string(),
            payload: payload.to_any(),
        }
    }

    /// Decode a wire payload into a resource.
    ///
    /// The type is taken from the `Any` tag. Unknown tags fail with
    /// [`StoreError::UnknownResourceType`]; payloads that are not valid
    /// protobuf, or that carry no name, fail with
    /// [`StoreError::MalformedResource`].
    pub fn decode(any: &Any) -> Result<Self, StoreError> {
        let resource_type = ResourceType::from_type_url(&any.type_url)
            .ok_or_else(|| StoreError::unknown_type(&any.type_url))?;
        let name = decode_name(any)?;
        if name.is_empty() {
            return Err(StoreError::MalformedResource {
                type_url: any.type_url.clone(),
                name,
                reason: "resource name cannot be empty".to_string(),
            });
        }
        Ok(Self {
            resource_type,
            name,
            payload: any.clone(),
        })
    }

    /// Decode the payload as its typed message.
    pub fn typed<P: TypedPayload>(&self) -> Result<P, StoreError> {
        P::from_any(&self.payload).map_err(|e| match e {
            StoreError::MalformedResource {
                type_url, reason, ..
            } => StoreError::MalformedResource {
                type_url,
                name: self.name.clone(),
                reason,
            },
            other => other,
        })
    }

    /// The resource type.
    #[inline]
    pub fn resource_type(&self) -> ResourceType {
        self.resource_type
    }

    /// The resource name, unique within its type.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The opaque payload.
    #[inline]
    pub fn payload(&self) -> &Any {
        &self.payload
    }
}
