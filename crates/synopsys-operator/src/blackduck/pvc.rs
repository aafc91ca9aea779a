//! Persistent volume claims

use super::{get_label, get_pvc_name, is_binary_analysis_enabled, BLACKDUCK_NAME};
use crate::crds::{Blackduck, Pvc};
use crate::error::Result;
use crate::orchestrator::CustomResourceSpec;
use crate::store::{ComponentStore, GenerationContext};
use crate::types::names::{BLACKDUCK_PVC_V1, BLACKDUCK_PVC_V2};
use crate::util::{object_meta, parse_quantity};
use k8s_openapi::api::core::v1::{
    PersistentVolumeClaim, PersistentVolumeClaimSpec, ResourceRequirements,
};
use kube::ResourceExt;
use std::collections::BTreeMap;
use tracing::debug;

pub(super) fn register(store: &mut ComponentStore<Blackduck>) -> Result<()> {
    store.register_pvc(BLACKDUCK_PVC_V1, |ctx| pvcs(ctx, true))?;
    store.register_pvc(BLACKDUCK_PVC_V2, |ctx| pvcs(ctx, false))?;
    Ok(())
}

/// Default claims as `(short name, size)`.
///
/// Solr only exists in the first API revision; rabbitmq and the upload cache
/// only keep data when binary analysis is on.
pub fn default_pvcs(with_solr: bool, binary_analysis: bool) -> Vec<(&'static str, &'static str)> {
    let mut claims = vec![
        ("postgres", "150Gi"),
        ("authentication", "2Gi"),
        ("cfssl", "2Gi"),
        ("registration", "2Gi"),
        ("webapp", "2Gi"),
        ("logstash", "20Gi"),
        ("zookeeper-data", "2Gi"),
        ("zookeeper-datalog", "2Gi"),
    ];
    if with_solr {
        claims.push(("solr", "2Gi"));
    }
    if binary_analysis {
        claims.push(("rabbitmq", "5Gi"));
        claims.push(("uploadcache-data", "100Gi"));
    }
    claims
}

/// Override for a default claim, named either `postgres` or `blackduck-postgres`
fn find_override<'a>(overrides: &'a [Pvc], short_name: &str) -> Option<&'a Pvc> {
    let prefixed = format!("{}-{}", BLACKDUCK_NAME, short_name);
    overrides
        .iter()
        .find(|pvc| pvc.name == short_name || pvc.name == prefixed)
}

fn claim(cr: &Blackduck, short_name: &str, default_size: &str) -> Result<PersistentVolumeClaim> {
    let overridden = find_override(&cr.spec.pvc, short_name);

    let size = overridden
        .map(|pvc| pvc.size.as_str())
        .filter(|size| !size.is_empty())
        .unwrap_or(default_size);
    let storage = parse_quantity(size)?;

    let volume_name = overridden
        .map(|pvc| pvc.volume_name.clone())
        .filter(|name| !name.is_empty());
    let storage_class = if volume_name.is_some() {
        Some(String::new())
    } else {
        overridden
            .map(|pvc| pvc.storage_class.as_str())
            .filter(|class| !class.is_empty())
            .or(Some(cr.spec.pvc_storage_class.as_str()))
            .filter(|class| !class.is_empty())
            .map(str::to_string)
    };

    Ok(PersistentVolumeClaim {
        metadata: object_meta(
            &get_pvc_name(short_name, cr),
            &cr.target_namespace(),
            get_label("pvc", &cr.name_any()),
        ),
        spec: Some(PersistentVolumeClaimSpec {
            access_modes: Some(vec!["ReadWriteOnce".to_string()]),
            resources: Some(ResourceRequirements {
                requests: Some(BTreeMap::from([("storage".to_string(), storage)])),
                ..Default::default()
            }),
            storage_class_name: storage_class,
            volume_name,
            ..Default::default()
        }),
        ..Default::default()
    })
}

/// Claims of every default volume; none when storage is not persistent
fn pvcs(ctx: &GenerationContext<'_, Blackduck>, with_solr: bool) -> Result<Vec<PersistentVolumeClaim>> {
    let cr = ctx.cr;
    if !cr.spec.persistent_storage {
        return Ok(Vec::new());
    }

    for pvc in &cr.spec.pvc {
        let known = default_pvcs(with_solr, true)
            .iter()
            .any(|(name, _)| find_override(std::slice::from_ref(pvc), name).is_some());
        if !known {
            debug!("Ignoring claim override {} of {}", pvc.name, cr.name_any());
        }
    }

    default_pvcs(with_solr, is_binary_analysis_enabled(cr))
        .into_iter()
        .map(|(name, size)| claim(cr, name, size))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::super::test_support::blackduck;
    use super::*;
    use crate::OperatorConfig;
    use k8s_openapi::apimachinery::pkg::api::resource::Quantity;

    fn storage(pvc: &PersistentVolumeClaim) -> Quantity {
        pvc.spec
            .as_ref()
            .and_then(|s| s.resources.as_ref())
            .and_then(|r| r.requests.as_ref())
            .map(|r| r["storage"].clone())
            .unwrap()
    }

    #[test]
    fn test_no_claims_without_persistent_storage() {
        let config = OperatorConfig::default();
        let cr = blackduck("hub", "2019.6.0");
        let ctx = GenerationContext::new(&config, None, &cr);
        assert!(pvcs(&ctx, false).unwrap().is_empty());
    }

    #[test]
    fn test_default_claims() {
        let config = OperatorConfig::default();
        let mut cr = blackduck("hub", "2019.6.0");
        cr.spec.persistent_storage = true;
        let ctx = GenerationContext::new(&config, None, &cr);

        let claims = pvcs(&ctx, false).unwrap();
        assert_eq!(claims.len(), 8);
        assert_eq!(claims[0].metadata.name.as_deref(), Some("hub-blackduck-postgres"));
        assert_eq!(storage(&claims[0]), Quantity("150Gi".to_string()));
        assert!(claims[0].spec.as_ref().unwrap().storage_class_name.is_none());

        assert_eq!(pvcs(&ctx, true).unwrap().len(), 9);

        cr.spec.environs = vec!["USE_BINARY_UPLOADS:1".to_string()];
        let ctx = GenerationContext::new(&config, None, &cr);
        assert_eq!(pvcs(&ctx, false).unwrap().len(), 10);
    }

    #[test]
    fn test_overrides() {
        let config = OperatorConfig::default();
        let mut cr = blackduck("hub", "2019.6.0");
        cr.spec.persistent_storage = true;
        cr.spec.pvc_storage_class = "standard".to_string();
        cr.spec.pvc = vec![
            Pvc {
                name: "blackduck-postgres".to_string(),
                size: "200Gi".to_string(),
                storage_class: "fast".to_string(),
                ..Default::default()
            },
            Pvc {
                name: "cfssl".to_string(),
                volume_name: "pv-cfssl".to_string(),
                ..Default::default()
            },
            Pvc {
                name: "unknown".to_string(),
                size: "1Gi".to_string(),
                ..Default::default()
            },
        ];
        let ctx = GenerationContext::new(&config, None, &cr);

        let claims = pvcs(&ctx, false).unwrap();
        assert_eq!(claims.len(), 8);
        let by_name = |name: &str| {
            claims
                .iter()
                .find(|c| c.metadata.name.as_deref() == Some(name))
                .and_then(|c| c.spec.clone())
                .unwrap()
        };

        let postgres = by_name("hub-blackduck-postgres");
        assert_eq!(postgres.storage_class_name.as_deref(), Some("fast"));

        let cfssl = by_name("hub-blackduck-cfssl");
        assert_eq!(cfssl.storage_class_name.as_deref(), Some(""));
        assert_eq!(cfssl.volume_name.as_deref(), Some("pv-cfssl"));

        let webapp = by_name("hub-blackduck-webapp");
        assert_eq!(webapp.storage_class_name.as_deref(), Some("standard"));
    }

    #[test]
    fn test_invalid_size_rejected() {
        let config = OperatorConfig::default();
        let mut cr = blackduck("hub", "2019.6.0");
        cr.spec.persistent_storage = true;
        cr.spec.pvc = vec![Pvc {
            name: "postgres".to_string(),
            size: "lots".to_string(),
            ..Default::default()
        }];
        let ctx = GenerationContext::new(&config, None, &cr);
        assert!(pvcs(&ctx, false).is_err());
    }
}
