//! # snapstore-engine
//!
//! Mutation protocol over the snapstore snapshot store.
//!
//! - [`MutationEngine`] - applies Replace, Add, Update and Remove requests
//! - [`PayloadSynthesizer`] - produces payloads for resources added or
//!   updated by name
//! - [`MutationRequest`] / [`MutationResponse`] - the inbound contract
//!
//! Each mutation runs read, compute and publish inside the target node's
//! critical section. A failed mutation leaves the previous snapshot current.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(unsafe_code)]
#![warn(missing_docs)]

mod builder;
mod config;
mod engine;
pub mod metrics;
mod request;
mod synth;

pub use builder::MutationEngineBuilder;
pub use config::{AddPolicy, EngineConfig, UnknownTypePolicy};
pub use engine::MutationEngine;
pub use crate::metrics::EngineMetrics;
pub use request::{
    ClearRequest, Mutation, MutationFailure, MutationReceipt, MutationRequest, MutationResponse,
    WatchRequest,
};
pub use synth::{PayloadSynthesizer, TemplateSynthesizer, ROTATION_KEY};
