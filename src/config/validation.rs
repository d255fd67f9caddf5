//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check referential integrity (links reference declared nodes)
//! - Validate value ranges (intervals and timeouts > 0)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GraphConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::GraphConfig;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },

    #[error("node id must not be empty")]
    EmptyNodeId,

    #[error("node {0} is declared more than once")]
    DuplicateNode(String),

    #[error("node {node} links to undeclared node {target}")]
    UnknownLink { node: String, target: String },

    #[error("node {0} links to itself")]
    SelfLink(String),

    #[error("policy.max_peers must be greater than zero")]
    ZeroMaxPeers,

    #[error("invalid metrics address {0}")]
    MetricsAddress(String),
}

/// Check a parsed configuration for semantic errors.
pub fn validate_config(config: &GraphConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.liveness.interval_ms == 0 {
        errors.push(ValidationError::Zero { field: "liveness.interval_ms" });
    }
    if config.liveness.timeout_ms == 0 {
        errors.push(ValidationError::Zero { field: "liveness.timeout_ms" });
    }
    if config.transport.call_timeout_ms == 0 {
        errors.push(ValidationError::Zero { field: "transport.call_timeout_ms" });
    }
    if config.policy.max_peers == Some(0) {
        errors.push(ValidationError::ZeroMaxPeers);
    }
    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::MetricsAddress(
            config.observability.metrics_address.clone(),
        ));
    }

    let mut declared = HashSet::new();
    for node in &config.nodes {
        if node.id.is_empty() {
            errors.push(ValidationError::EmptyNodeId);
        } else if !declared.insert(node.id.as_str()) {
            errors.push(ValidationError::DuplicateNode(node.id.clone()));
        }
    }

    for node in &config.nodes {
        for target in &node.links {
            if target == &node.id {
                errors.push(ValidationError::SelfLink(node.id.clone()));
            } else if !declared.contains(target.as_str()) {
                errors.push(ValidationError::UnknownLink {
                    node: node.id.clone(),
                    target: target.clone(),
                });
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
