//! Read access to the service registry
//!
//! The registry itself lives outside this crate. The composer only needs the
//! current service listing, in the registry's own order.

use crate::error::ConfigError;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::path::Path;
use weft_types::ServiceDescriptor;

/// Pull accessor over the currently known services
pub trait ServiceRegistry: Send + Sync {
    /// Services in listing order. The order is the merge precedence order.
    fn services(&self) -> Vec<ServiceDescriptor>;
}

/// Registry manifest as written on disk
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegistryManifest {
    #[serde(default)]
    pub services: Vec<ServiceDescriptor>,
}

impl RegistryManifest {
    /// Load a manifest; `.json` files are read as JSON, everything else as YAML
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        let is_json = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("json"));

        if is_json {
            Ok(serde_json::from_str(&contents)?)
        } else {
            Ok(serde_yaml::from_str(&contents)?)
        }
    }
}

/// An in-memory registry whose listing can be replaced at runtime
#[derive(Debug, Default)]
pub struct StaticRegistry {
    services: RwLock<Vec<ServiceDescriptor>>,
}

impl StaticRegistry {
    pub fn new(services: Vec<ServiceDescriptor>) -> Self {
        Self {
            services: RwLock::new(services),
        }
    }

    pub fn from_manifest(manifest: RegistryManifest) -> Self {
        Self::new(manifest.services)
    }

    /// Add a service or replace the one with the same name in place
    pub fn upsert(&self, service: ServiceDescriptor) {
        let mut services = self.services.write();
        match services.iter_mut().find(|s| s.name == service.name) {
            Some(existing) => *existing = service,
            None => services.push(service),
        }
    }

    pub fn remove(&self, name: &str) -> Option<ServiceDescriptor> {
        let mut services = self.services.write();
        let index = services.iter().position(|s| s.name == name)?;
        Some(services.remove(index))
    }

    pub fn len(&self) -> usize {
        self.services.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.read().is_empty()
    }
}

impl ServiceRegistry for StaticRegistry {
    fn services(&self) -> Vec<ServiceDescriptor> {
        self.services.read().clone()
    }
}
