//! Service accounts, cluster roles and bindings of the OpsSight processes

use super::{get_label, resource_name};
use crate::crds::OpsSight;
use crate::error::Result;
use crate::orchestrator::CustomResourceSpec;
use crate::store::{ComponentStore, GenerationContext};
use crate::types::names::*;
use crate::util::{cluster_meta, object_meta};
use k8s_openapi::api::core::v1::ServiceAccount;
use k8s_openapi::api::rbac::v1::{ClusterRole, ClusterRoleBinding, PolicyRule, RoleRef, Subject};
use kube::ResourceExt;

/// Cluster role the scanner binds to; installed with the operator
pub(super) const SCANNER_CLUSTER_ROLE: &str = "synopsys-operator-admin";

pub(super) fn register(store: &mut ComponentStore<OpsSight>) -> Result<()> {
    store.register_service_account(OPSSIGHT_POD_PROCESSOR_SERVICE_ACCOUNT_V1, |ctx| {
        let cr = ctx.cr;
        Ok(service_account(
            cr,
            &processor_service_account(cr),
            cr.spec.perceiver.enable_pod_perceiver,
        ))
    })?;
    // Both processors share one account; the image processor only creates it
    // when the pod processor is off
    store.register_service_account(OPSSIGHT_IMAGE_PROCESSOR_SERVICE_ACCOUNT_V1, |ctx| {
        let cr = ctx.cr;
        let perceiver = &cr.spec.perceiver;
        Ok(service_account(
            cr,
            &processor_service_account(cr),
            perceiver.enable_image_perceiver && !perceiver.enable_pod_perceiver,
        ))
    })?;
    store.register_service_account(OPSSIGHT_SCANNER_SERVICE_ACCOUNT_V1, |ctx| {
        Ok(service_account(ctx.cr, &scanner_service_account(ctx.cr), true))
    })?;
    store.register_service_account(SKYFIRE_SERVICE_ACCOUNT_V1, |ctx| {
        let cr = ctx.cr;
        Ok(service_account(cr, &skyfire_service_account(cr), cr.spec.enable_skyfire))
    })?;

    store.register_cluster_role(OPSSIGHT_POD_PROCESSOR_CLUSTER_ROLE_V1, pod_processor_role)?;
    store.register_cluster_role(OPSSIGHT_IMAGE_PROCESSOR_CLUSTER_ROLE_V1, image_processor_role)?;
    store.register_cluster_role(SKYFIRE_CLUSTER_ROLE_V1, skyfire_role)?;

    store.register_cluster_role_binding(
        OPSSIGHT_POD_PROCESSOR_CLUSTER_ROLE_BINDING_V1,
        pod_processor_binding,
    )?;
    store.register_cluster_role_binding(
        OPSSIGHT_IMAGE_PROCESSOR_CLUSTER_ROLE_BINDING_V1,
        image_processor_binding,
    )?;
    store.register_cluster_role_binding(OPSSIGHT_SCANNER_CLUSTER_ROLE_BINDING_V1, scanner_binding)?;
    store.register_cluster_role_binding(SKYFIRE_CLUSTER_ROLE_BINDING_V1, skyfire_binding)?;
    Ok(())
}

pub(super) fn processor_service_account(cr: &OpsSight) -> String {
    resource_name(cr, &cr.spec.perceiver.service_account)
}

pub(super) fn scanner_service_account(cr: &OpsSight) -> String {
    resource_name(cr, &cr.spec.scanner_pod.image_facade.service_account)
}

pub(super) fn skyfire_service_account(cr: &OpsSight) -> String {
    resource_name(cr, &cr.spec.skyfire.service_account)
}

fn service_account(cr: &OpsSight, name: &str, enabled: bool) -> Vec<ServiceAccount> {
    if !enabled {
        return Vec::new();
    }
    vec![ServiceAccount {
        metadata: object_meta(name, &cr.target_namespace(), get_label(name, &cr.name_any())),
        ..Default::default()
    }]
}

fn rule(api_group: &str, resources: &[&str], verbs: &[&str]) -> PolicyRule {
    let owned = |values: &[&str]| values.iter().map(|v| v.to_string()).collect::<Vec<_>>();
    PolicyRule {
        api_groups: Some(vec![api_group.to_string()]),
        resources: Some(owned(resources)),
        verbs: owned(verbs),
        ..Default::default()
    }
}

fn cluster_role(cr: &OpsSight, component: &str, rules: Vec<PolicyRule>) -> ClusterRole {
    ClusterRole {
        metadata: cluster_meta(
            &resource_name(cr, component),
            get_label(component, &cr.name_any()),
        ),
        rules: Some(rules),
        ..Default::default()
    }
}

fn pod_processor_role(ctx: &GenerationContext<'_, OpsSight>) -> Result<Vec<ClusterRole>> {
    let cr = ctx.cr;
    if !cr.spec.perceiver.enable_pod_perceiver {
        return Ok(Vec::new());
    }
    Ok(vec![cluster_role(
        cr,
        &cr.spec.perceiver.pod_perceiver_name,
        vec![rule("", &["pods"], &["get", "watch", "list", "update"])],
    )])
}

fn image_processor_role(ctx: &GenerationContext<'_, OpsSight>) -> Result<Vec<ClusterRole>> {
    let cr = ctx.cr;
    if !cr.spec.perceiver.enable_image_perceiver {
        return Ok(Vec::new());
    }
    Ok(vec![cluster_role(
        cr,
        &cr.spec.perceiver.image_perceiver_name,
        vec![rule(
            "image.openshift.io",
            &["images"],
            &["get", "watch", "list", "update"],
        )],
    )])
}

fn skyfire_role(ctx: &GenerationContext<'_, OpsSight>) -> Result<Vec<ClusterRole>> {
    let cr = ctx.cr;
    if !cr.spec.enable_skyfire {
        return Ok(Vec::new());
    }
    Ok(vec![cluster_role(
        cr,
        &cr.spec.skyfire.name,
        vec![rule("*", &["*"], &["get", "watch", "list"])],
    )])
}

fn binding(cr: &OpsSight, component: &str, role: &str, account: &str) -> ClusterRoleBinding {
    ClusterRoleBinding {
        metadata: cluster_meta(
            &resource_name(cr, component),
            get_label(component, &cr.name_any()),
        ),
        role_ref: RoleRef {
            api_group: "rbac.authorization.k8s.io".to_string(),
            kind: "ClusterRole".to_string(),
            name: role.to_string(),
        },
        subjects: Some(vec![Subject {
            kind: "ServiceAccount".to_string(),
            name: account.to_string(),
            namespace: Some(cr.target_namespace()),
            ..Default::default()
        }]),
    }
}

fn pod_processor_binding(
    ctx: &GenerationContext<'_, OpsSight>,
) -> Result<Vec<ClusterRoleBinding>> {
    let cr = ctx.cr;
    if !cr.spec.perceiver.enable_pod_perceiver {
        return Ok(Vec::new());
    }
    let name = &cr.spec.perceiver.pod_perceiver_name;
    Ok(vec![binding(
        cr,
        name,
        &resource_name(cr, name),
        &processor_service_account(cr),
    )])
}

fn image_processor_binding(
    ctx: &GenerationContext<'_, OpsSight>,
) -> Result<Vec<ClusterRoleBinding>> {
    let cr = ctx.cr;
    if !cr.spec.perceiver.enable_image_perceiver {
        return Ok(Vec::new());
    }
    let name = &cr.spec.perceiver.image_perceiver_name;
    Ok(vec![binding(
        cr,
        name,
        &resource_name(cr, name),
        &processor_service_account(cr),
    )])
}

fn scanner_binding(ctx: &GenerationContext<'_, OpsSight>) -> Result<Vec<ClusterRoleBinding>> {
    let cr = ctx.cr;
    Ok(vec![binding(
        cr,
        &cr.spec.scanner_pod.name,
        SCANNER_CLUSTER_ROLE,
        &scanner_service_account(cr),
    )])
}

fn skyfire_binding(ctx: &GenerationContext<'_, OpsSight>) -> Result<Vec<ClusterRoleBinding>> {
    let cr = ctx.cr;
    if !cr.spec.enable_skyfire {
        return Ok(Vec::new());
    }
    let name = &cr.spec.skyfire.name;
    Ok(vec![binding(
        cr,
        name,
        &resource_name(cr, name),
        &skyfire_service_account(cr),
    )])
}

#[cfg(test)]
mod tests {
    use super::super::test_support::opssight;
    use super::*;
    use crate::OperatorConfig;

    fn store() -> ComponentStore<OpsSight> {
        let mut store = ComponentStore::new();
        register(&mut store).unwrap();
        store
    }

    #[test]
    fn test_processor_account_created_once() {
        let config = OperatorConfig::default();
        let store = store();
        let mut cr = opssight("ops", "2.2.4");
        cr.spec.perceiver.enable_image_perceiver = true;

        let count = |cr: &OpsSight| {
            let ctx = GenerationContext::new(&config, None, cr);
            [
                OPSSIGHT_POD_PROCESSOR_SERVICE_ACCOUNT_V1,
                OPSSIGHT_IMAGE_PROCESSOR_SERVICE_ACCOUNT_V1,
            ]
            .iter()
            .map(|name| store.service_account(*name).unwrap()(&ctx).unwrap().len())
            .sum::<usize>()
        };
        assert_eq!(count(&cr), 1);

        cr.spec.perceiver.enable_pod_perceiver = false;
        assert_eq!(count(&cr), 1);

        cr.spec.perceiver.enable_image_perceiver = false;
        assert_eq!(count(&cr), 0);
    }

    #[test]
    fn test_pod_processor_role_and_binding() {
        let config = OperatorConfig::default();
        let cr = opssight("ops", "2.2.4");
        let ctx = GenerationContext::new(&config, None, &cr);

        let roles = pod_processor_role(&ctx).unwrap();
        assert_eq!(
            roles[0].metadata.name.as_deref(),
            Some("ops-opssight-opssight-pod-processor")
        );
        assert!(roles[0].metadata.namespace.is_none());
        let rules = roles[0].rules.as_ref().unwrap();
        assert_eq!(rules[0].resources, Some(vec!["pods".to_string()]));

        let bindings = pod_processor_binding(&ctx).unwrap();
        let binding = &bindings[0];
        assert_eq!(binding.role_ref.name, "ops-opssight-opssight-pod-processor");
        let subject = &binding.subjects.as_ref().unwrap()[0];
        assert_eq!(subject.name, "ops-opssight-opssight-processor");
        assert_eq!(subject.namespace.as_deref(), Some("ops"));

        assert!(image_processor_role(&ctx).unwrap().is_empty());
        assert!(skyfire_binding(&ctx).unwrap().is_empty());
    }

    #[test]
    fn test_scanner_binds_operator_role() {
        let config = OperatorConfig::default();
        let cr = opssight("ops", "2.2.4");
        let ctx = GenerationContext::new(&config, None, &cr);

        let bindings = scanner_binding(&ctx).unwrap();
        assert_eq!(bindings[0].role_ref.name, SCANNER_CLUSTER_ROLE);
        assert_eq!(
            bindings[0].subjects.as_ref().unwrap()[0].name,
            "ops-opssight-opssight-scanner"
        );
    }
}
