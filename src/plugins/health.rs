// src/plugins/health.rs
use std::fmt;

use serde::Serialize;

/// Optional readiness capability, exposed through `Plugin::health`.
///
/// Reflects the outcome of plugin initialization only; individual task
/// failures never change it.
pub trait HealthCheck: Send + Sync {
    fn is_healthy(&self) -> bool;

    fn status(&self) -> String;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    Active(String),
    Disabled(String),
    Error(String),
}

impl HealthStatus {
    pub fn is_active(&self) -> bool {
        matches!(self, HealthStatus::Active(_))
    }

    pub fn reason(&self) -> &str {
        match self {
            HealthStatus::Active(detail)
            | HealthStatus::Disabled(detail)
            | HealthStatus::Error(detail) => detail,
        }
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HealthStatus::Active(detail) => write!(f, "active: {}", detail),
            HealthStatus::Disabled(reason) => write!(f, "disabled: {}", reason),
            HealthStatus::Error(reason) => write!(f, "error: {}", reason),
        }
    }
}

/// Health line for one loaded plugin, as reported to the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PluginHealth {
    pub name: String,
    pub version: String,
    pub healthy: bool,
    pub status: String,
}

pub const NO_HEALTH_CAPABILITY: &str = "active: no health capability";
