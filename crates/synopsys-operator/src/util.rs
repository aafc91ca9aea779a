//! Helpers shared by the product generators

use crate::crds::RegistryConfiguration;
use crate::error::{OperatorError, Result};
use crate::types::Container;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use k8s_openapi::api::core::v1::{
    ConfigMapEnvSource, ConfigMapVolumeSource, EmptyDirVolumeSource, EnvFromSource, EnvVar,
    LocalObjectReference, PersistentVolumeClaimVolumeSource, ResourceRequirements, SecretEnvSource,
    SecretVolumeSource, ServicePort, Volume, VolumeMount,
};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use std::collections::BTreeMap;

/// Joins the non-empty parts with `-`
pub fn get_resource_name(name: &str, app_name: &str, default_name: &str) -> String {
    [name, app_name, default_name]
        .iter()
        .filter(|part| !part.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join("-")
}

pub fn labels<I, K, V>(pairs: I) -> BTreeMap<String, String>
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<String>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}

pub fn object_meta(name: &str, namespace: &str, labels: BTreeMap<String, String>) -> ObjectMeta {
    ObjectMeta {
        name: Some(name.to_string()),
        namespace: if namespace.is_empty() {
            None
        } else {
            Some(namespace.to_string())
        },
        labels: Some(labels),
        ..Default::default()
    }
}

/// Metadata for cluster scoped objects
pub fn cluster_meta(name: &str, labels: BTreeMap<String, String>) -> ObjectMeta {
    object_meta(name, "", labels)
}

/// Requests from the minimum bounds and limits from the maximum bounds.
/// CPU is counted in cores and memory in MiB.
pub fn resource_requirements(container: &Container) -> Option<ResourceRequirements> {
    let bounds = |cpu: Option<i32>, mem: Option<i32>| {
        let mut map = BTreeMap::new();
        if let Some(cpu) = cpu {
            map.insert("cpu".to_string(), Quantity(cpu.to_string()));
        }
        if let Some(mem) = mem {
            map.insert("memory".to_string(), Quantity(format!("{}Mi", mem)));
        }
        if map.is_empty() {
            None
        } else {
            Some(map)
        }
    };

    let requests = bounds(container.min_cpu, container.min_mem);
    let limits = bounds(container.max_cpu, container.max_mem);
    if requests.is_none() && limits.is_none() {
        return None;
    }

    Some(ResourceRequirements {
        requests,
        limits,
        ..Default::default()
    })
}

const QUANTITY_SUFFIXES: [&str; 14] = [
    "", "m", "k", "M", "G", "T", "P", "E", "Ki", "Mi", "Gi", "Ti", "Pi", "Ei",
];

/// `e3`, `E-2`: the decimal exponent form of a quantity suffix
fn is_decimal_exponent(suffix: &str) -> bool {
    let Some(exponent) = suffix.strip_prefix(['e', 'E']) else {
        return false;
    };
    let digits = exponent.strip_prefix(['+', '-']).unwrap_or(exponent);
    !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit())
}

/// Validates a resource quantity such as `150Gi`, `0.5` or `1e3`
pub fn parse_quantity(value: &str) -> Result<Quantity> {
    let value = value.trim();
    let split = value
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(value.len());
    let (number, suffix) = value.split_at(split);

    let valid_number = !number.is_empty()
        && number.matches('.').count() <= 1
        && number.chars().any(|c| c.is_ascii_digit());
    let valid_suffix = QUANTITY_SUFFIXES.contains(&suffix) || is_decimal_exponent(suffix);
    if !valid_number || !valid_suffix {
        return Err(OperatorError::InvalidSpec(format!(
            "invalid resource quantity '{}'",
            value
        )));
    }
    Ok(Quantity(value.to_string()))
}

pub fn env_from_config_map(name: &str) -> EnvFromSource {
    EnvFromSource {
        config_map_ref: Some(ConfigMapEnvSource {
            name: Some(name.to_string()),
            optional: None,
        }),
        ..Default::default()
    }
}

pub fn env_from_secret(name: &str) -> EnvFromSource {
    EnvFromSource {
        secret_ref: Some(SecretEnvSource {
            name: Some(name.to_string()),
            optional: None,
        }),
        ..Default::default()
    }
}

pub fn env_var(name: &str, value: &str) -> EnvVar {
    EnvVar {
        name: name.to_string(),
        value: Some(value.to_string()),
        value_from: None,
    }
}

pub fn tcp_port(name: &str, port: i32) -> ServicePort {
    ServicePort {
        name: Some(name.to_string()),
        port,
        target_port: Some(IntOrString::Int(port)),
        protocol: Some("TCP".to_string()),
        ..Default::default()
    }
}

pub fn volume_mount(name: &str, mount_path: &str) -> VolumeMount {
    VolumeMount {
        name: name.to_string(),
        mount_path: mount_path.to_string(),
        ..Default::default()
    }
}

pub fn empty_dir_volume(name: &str) -> Volume {
    Volume {
        name: name.to_string(),
        empty_dir: Some(EmptyDirVolumeSource::default()),
        ..Default::default()
    }
}

pub fn pvc_volume(name: &str, claim_name: &str) -> Volume {
    Volume {
        name: name.to_string(),
        persistent_volume_claim: Some(PersistentVolumeClaimVolumeSource {
            claim_name: claim_name.to_string(),
            read_only: None,
        }),
        ..Default::default()
    }
}

pub fn config_map_volume(name: &str, config_map: &str) -> Volume {
    Volume {
        name: name.to_string(),
        config_map: Some(ConfigMapVolumeSource {
            name: Some(config_map.to_string()),
            default_mode: Some(0o644),
            ..Default::default()
        }),
        ..Default::default()
    }
}

pub fn secret_volume(name: &str, secret: &str) -> Volume {
    Volume {
        name: name.to_string(),
        secret: Some(SecretVolumeSource {
            secret_name: Some(secret.to_string()),
            default_mode: Some(0o644),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Pull secrets of the mirror registry, `None` when there are none
pub fn image_pull_secrets(
    config: Option<&RegistryConfiguration>,
) -> Option<Vec<LocalObjectReference>> {
    let secrets: Vec<LocalObjectReference> = config?
        .pull_secrets
        .iter()
        .map(|secret| LocalObjectReference {
            name: Some(secret.clone()),
        })
        .collect();
    if secrets.is_empty() {
        None
    } else {
        Some(secrets)
    }
}

/// Splits `KEY:VALUE` entries on the first `:`; entries without one are skipped
pub fn parse_environs(environs: &[String]) -> BTreeMap<String, String> {
    environs
        .iter()
        .filter_map(|entry| entry.split_once(':'))
        .map(|(key, value)| (key.trim().to_string(), value.trim().to_string()))
        .filter(|(key, _)| !key.is_empty())
        .collect()
}

/// Decodes base64 encoded secret material
pub fn decode_base64(value: &str, what: &str) -> Result<Vec<u8>> {
    STANDARD
        .decode(value.trim())
        .map_err(|e| OperatorError::Decode(format!("unable to decode the {}: {}", what, e)))
}
