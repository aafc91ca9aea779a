//! # Size Tables
//!
//! Resolves a named deployment tier into per sub-component replica counts and
//! container bounds for Black Duck and OpsSight. Tier names are matched without regard to
//! case, and both `x-large` and `xlarge` select the largest tier.

use crate::error::{OperatorError, Result};
use crate::types::names::*;
use crate::types::{ContainerSize, Size};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;

/// Deployment tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Tier {
    Small,
    Medium,
    Large,
    XLarge,
}

impl Tier {
    pub const ALL: [Tier; 4] = [Tier::Small, Tier::Medium, Tier::Large, Tier::XLarge];

    pub fn parse(name: &str) -> Option<Tier> {
        match name.trim().to_ascii_lowercase().as_str() {
            "small" => Some(Tier::Small),
            "medium" => Some(Tier::Medium),
            "large" => Some(Tier::Large),
            "x-large" | "xlarge" => Some(Tier::XLarge),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Small => "small",
            Tier::Medium => "medium",
            Tier::Large => "large",
            Tier::XLarge => "x-large",
        }
    }

    fn pick<T>(&self, small: T, medium: T, large: T, xlarge: T) -> T {
        match self {
            Tier::Small => small,
            Tier::Medium => medium,
            Tier::Large => large,
            Tier::XLarge => xlarge,
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sub-component keys every Black Duck tier defines
pub const BLACKDUCK_SIZE_KEYS: [&str; 14] = [
    "authentication",
    "binaryscanner",
    "cfssl",
    "documentation",
    "jobrunner",
    "rabbitmq",
    "registration",
    "scan",
    "solr",
    "uploadcache",
    "webapp-logstash",
    "webserver",
    "zookeeper",
    "postgres",
];

/// Black Duck size table for a tier name, `None` when the tier is unknown
pub fn get_size(tier: &str) -> Option<HashMap<String, Size>> {
    Tier::parse(tier).map(blackduck_sizes)
}

/// Black Duck size table for a tier name, failing on unknown tiers
pub fn get_default_size(tier: &str) -> Result<HashMap<String, Size>> {
    get_size(tier).ok_or_else(|| OperatorError::SizeNotFound(tier.to_string()))
}

/// All tiers keyed by their canonical name
pub fn get_all_default_sizes() -> HashMap<&'static str, HashMap<String, Size>> {
    Tier::ALL
        .iter()
        .map(|tier| (tier.as_str(), blackduck_sizes(*tier)))
        .collect()
}

fn mem_only(mem: i32) -> ContainerSize {
    ContainerSize::fixed(None, Some(mem))
}

fn cpu_mem(cpu: i32, mem: i32) -> ContainerSize {
    ContainerSize::fixed(Some(cpu), Some(mem))
}

fn blackduck_sizes(tier: Tier) -> HashMap<String, Size> {
    let entries = [
        (
            "authentication",
            Size::new(1).with_container(BLACKDUCK_AUTHENTICATION_CONTAINER, mem_only(1024)),
        ),
        (
            "binaryscanner",
            Size::new(1).with_container(BLACKDUCK_BINARYSCANNER_CONTAINER, cpu_mem(1, 2048)),
        ),
        (
            "cfssl",
            Size::new(1).with_container(BLACKDUCK_CFSSL_CONTAINER, mem_only(640)),
        ),
        (
            "documentation",
            Size::new(1).with_container(BLACKDUCK_DOCUMENTATION_CONTAINER, mem_only(512)),
        ),
        (
            "jobrunner",
            Size::new(tier.pick(1, 4, 6, 10)).with_container(
                BLACKDUCK_JOBRUNNER_CONTAINER,
                cpu_mem(tier.pick(1, 4, 1, 1), tier.pick(4608, 7168, 13824, 13824)),
            ),
        ),
        (
            "rabbitmq",
            Size::new(1).with_container(BLACKDUCK_RABBITMQ_CONTAINER, mem_only(1024)),
        ),
        (
            "registration",
            Size::new(1).with_container(BLACKDUCK_REGISTRATION_CONTAINER, mem_only(1024)),
        ),
        (
            "scan",
            Size::new(tier.pick(1, 2, 3, 5)).with_container(
                BLACKDUCK_SCAN_CONTAINER,
                mem_only(tier.pick(2560, 5120, 9728, 9728)),
            ),
        ),
        (
            "solr",
            Size::new(1).with_container(BLACKDUCK_SOLR_CONTAINER, mem_only(640)),
        ),
        (
            "uploadcache",
            Size::new(1).with_container(BLACKDUCK_UPLOADCACHE_CONTAINER, mem_only(512)),
        ),
        (
            "webapp-logstash",
            Size::new(1)
                .with_container(
                    BLACKDUCK_WEBAPP_CONTAINER,
                    cpu_mem(tier.pick(1, 2, 2, 3), tier.pick(2560, 5120, 9728, 9728)),
                )
                .with_container(BLACKDUCK_LOGSTASH_CONTAINER, mem_only(1024)),
        ),
        (
            "webserver",
            Size::new(1).with_container(
                BLACKDUCK_WEBSERVER_CONTAINER,
                mem_only(tier.pick(512, 2048, 2048, 2048)),
            ),
        ),
        (
            "zookeeper",
            Size::new(1).with_container(BLACKDUCK_ZOOKEEPER_CONTAINER, mem_only(640)),
        ),
        (
            "postgres",
            Size::new(1).with_container(
                BLACKDUCK_POSTGRES_CONTAINER,
                cpu_mem(tier.pick(1, 2, 2, 3), tier.pick(3072, 8192, 12288, 12288)),
            ),
        ),
    ];

    entries
        .into_iter()
        .map(|(key, size)| (key.to_string(), size))
        .collect()
}

/// Sub-component keys of the OpsSight size table
pub const OPSSIGHT_SIZE_KEYS: [&str; 6] = [
    "opssight-core",
    "opssight-pod-processor",
    "opssight-image-processor",
    "opssight-scanner",
    "skyfire",
    "prometheus",
];

/// OpsSight size table. Only the scanner scales with the tier; container
/// bounds come from the custom resource.
pub fn get_opssight_size(tier: &str) -> Option<HashMap<String, Size>> {
    let tier = Tier::parse(tier)?;
    Some(
        OPSSIGHT_SIZE_KEYS
            .iter()
            .map(|key| {
                let replica = if *key == "opssight-scanner" {
                    tier.pick(1, 2, 3, 5)
                } else {
                    1
                };
                (key.to_string(), Size::new(replica))
            })
            .collect(),
    )
}
