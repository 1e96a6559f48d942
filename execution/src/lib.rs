#![forbid(unsafe_code)]
#![warn(
    unused,
    clippy::cognitive_complexity,
    unused_crate_dependencies,
    unused_extern_crates,
    clippy::unused_self,
    clippy::useless_let_if_seq,
    missing_debug_implementations,
    rust_2018_idioms,
    rust_2024_compatibility
)]
#![allow(clippy::type_complexity, clippy::too_many_arguments, type_alias_bounds)]

//! # Meridian Execution
//! Multi-broker equity trading gateway: a single normalised [`adapter::BrokerAdapter`] interface
//! spans several venue dialects, with authentication lifecycle management ([`auth`]), multi-broker
//! fan-out ([`orchestrator`]), order routing strategies ([`router`]), a plugin pipeline that can
//! intercept or observe order flow ([`plugin`]), and a streaming tick aggregator ([`streaming`]).
//!
//! Communicate with a broker through its concrete [`adapter::BrokerAdapter`] implementation under
//! [`broker`], or through the gateway-wide [`router::OrderRouter`]/[`orchestrator::Orchestrator`]
//! for multi-broker operations.

pub mod adapter;
pub mod auth;
pub mod broker;
pub mod config;
pub mod error;
pub mod orchestrator;
pub mod plugin;
pub mod ports;
pub mod rate_limit;
pub mod router;
pub mod session;
pub mod streaming;
pub mod stream_worker;

pub type FnvIndexMap<K, V> = indexmap::IndexMap<K, V, fnv::FnvBuildHasher>;
pub type FnvIndexSet<T> = indexmap::IndexSet<T, fnv::FnvBuildHasher>;
