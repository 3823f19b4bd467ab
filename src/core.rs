//! Registry of named engine configurations
//!
//! Readers take whole snapshots; updates build a replacement map and swap it
//! in. A render therefore observes exactly one registry state.

use std::collections::HashMap;
use std::sync::Arc;

use arc_swap::ArcSwap;
use log::info;
use serde_json::Value;

use crate::error::ConfigError;
use crate::xray::{InboundDescriptor, XrayConfig};

/// One published registry state: named cores in insertion order.
#[derive(Debug, Default)]
pub struct CoreMap {
    cores: Vec<(String, Arc<XrayConfig>)>,
}

impl CoreMap {
    pub fn get(&self, name: &str) -> Option<&Arc<XrayConfig>> {
        self.cores.iter().find(|(n, _)| n == name).map(|(_, c)| c)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Arc<XrayConfig>)> {
        self.cores.iter().map(|(n, c)| (n.as_str(), c))
    }

    pub fn len(&self) -> usize {
        self.cores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cores.is_empty()
    }

    /// Look up an inbound tag across all cores, first match wins.
    pub fn get_inbound(&self, tag: &str) -> Option<&InboundDescriptor> {
        self.cores.iter().find_map(|(_, c)| c.get_inbound(tag))
    }
}

#[derive(Debug, Default)]
pub struct CoreRegistry {
    snapshot: ArcSwap<CoreMap>,
}

impl CoreRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> Arc<CoreMap> {
        self.snapshot.load_full()
    }

    /// Parse and validate a config, then publish a registry state carrying
    /// it. An invalid config leaves the registry untouched.
    pub fn update(
        &self,
        name: &str,
        config: Value,
        exclude_tags: &[String],
        fallback_tags: &[String],
    ) -> Result<Arc<XrayConfig>, ConfigError> {
        let parsed = Arc::new(XrayConfig::from_value(config, exclude_tags, fallback_tags)?);

        let current = self.snapshot.load();
        let mut cores: Vec<(String, Arc<XrayConfig>)> = current
            .cores
            .iter()
            .filter(|(n, _)| n != name)
            .cloned()
            .collect();
        cores.push((name.to_string(), Arc::clone(&parsed)));

        self.snapshot.store(Arc::new(CoreMap { cores }));
        info!(
            "core '{}' updated, {} inbound(s) resolved",
            name,
            parsed.inbounds().len()
        );
        Ok(parsed)
    }

    /// Drop a named core. Long-lived references held by in-flight renders
    /// stay valid until dropped.
    pub fn evict(&self, name: &str) {
        let current = self.snapshot.load();
        let cores: Vec<(String, Arc<XrayConfig>)> = current
            .cores
            .iter()
            .filter(|(n, _)| n != name)
            .cloned()
            .collect();
        self.snapshot.store(Arc::new(CoreMap { cores }));
    }
}
