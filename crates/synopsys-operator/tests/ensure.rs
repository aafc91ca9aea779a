//! End-to-end generation through the public product apps

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use synopsys_operator::blackduck::BlackduckApp;
use synopsys_operator::opssight::OpsSightApp;
use synopsys_operator::reconciler::{reconcile_opssight, DryRunApplier, StatusTarget};
use synopsys_operator::size::Tier;
use synopsys_operator::{
    Blackduck, BlackduckSpec, ComponentType, OperatorConfig, OperatorError, OpsSight, OpsSightSpec,
};

fn blackduck(version: &str, size: &str) -> Blackduck {
    let mut cr = Blackduck::new(
        "hub",
        BlackduckSpec {
            namespace: "bd".to_string(),
            size: size.to_string(),
            version: version.to_string(),
            admin_password: STANDARD.encode("admin"),
            user_password: STANDARD.encode("user"),
            postgres_password: STANDARD.encode("postgres"),
            seal_key: STANDARD.encode("0123456789abcdef0123456789abcdef"),
            ..Default::default()
        },
    );
    cr.metadata.namespace = Some("bd".to_string());
    cr
}

fn opssight(version: &str, size: &str) -> OpsSight {
    let mut cr = OpsSight::new(
        "ops",
        OpsSightSpec {
            namespace: "ops".to_string(),
            version: version.to_string(),
            size: size.to_string(),
            ..Default::default()
        },
    );
    cr.metadata.namespace = Some("ops".to_string());
    cr
}

fn rc_names(list: &synopsys_operator::ComponentList) -> Vec<String> {
    list.replication_controllers
        .iter()
        .filter_map(|rc| rc.metadata.name.clone())
        .collect()
}

#[test]
fn test_every_blackduck_version_and_tier() {
    let app = BlackduckApp::offline(OperatorConfig::default()).unwrap();
    let versions = app.versions();
    assert!(!versions.is_empty());

    for version in &versions {
        for tier in Tier::ALL {
            let list = app.ensure(&blackduck(version, tier.as_str())).unwrap();
            assert!(
                !list.replication_controllers.is_empty(),
                "{} {} produced no replication controllers",
                version,
                tier
            );
            let manifests = list.to_manifests().unwrap();
            assert_eq!(manifests.len(), list.len());
            assert!(manifests
                .iter()
                .all(|m| m["metadata"]["namespace"] == "bd"));
        }
    }
}

#[test]
fn test_blackduck_empty_version_selects_latest() {
    let app = BlackduckApp::offline(OperatorConfig::default()).unwrap();
    let resolved = app.ensure_version(&blackduck("", "small")).unwrap();
    assert_eq!(resolved.spec.version, app.versions()[0]);
}

#[test]
fn test_blackduck_unknown_version_and_size() {
    let app = BlackduckApp::offline(OperatorConfig::default()).unwrap();

    let err = app.ensure(&blackduck("2017.1.0", "small")).unwrap_err();
    assert!(matches!(err, OperatorError::UnsupportedVersion { .. }));
    assert!(err.to_string().starts_with("version '2017.1.0' is not supported."));

    let err = app.ensure(&blackduck("2019.6.0", "tiny")).unwrap_err();
    assert!(matches!(err, OperatorError::SizeNotFound(ref s) if s == "tiny"));
}

#[test]
fn test_blackduck_desired_states() {
    let app = BlackduckApp::offline(OperatorConfig::default()).unwrap();
    let mut cr = blackduck("2019.6.0", "small");
    cr.spec.persistent_storage = true;

    let running = app.ensure(&cr).unwrap();
    assert!(!running.pvcs.is_empty());
    assert!(rc_names(&running).contains(&"hub-blackduck-webserver".to_string()));

    cr.spec.desired_state = "stop".to_string();
    let stopped = app.ensure(&cr).unwrap();
    assert_eq!(stopped, running.filter(ComponentType::Pvc));
    assert!(stopped.replication_controllers.is_empty());

    cr.spec.desired_state = "DbMigrate".to_string();
    let migrating = app.ensure(&cr).unwrap();
    assert_eq!(rc_names(&migrating), vec!["hub-blackduck-postgres".to_string()]);
    assert_eq!(migrating.pvcs.len(), running.pvcs.len());
}

#[test]
fn test_every_opssight_version_and_tier() {
    let app = OpsSightApp::offline(OperatorConfig::default()).unwrap();
    for version in app.versions() {
        for tier in Tier::ALL {
            let list = app.ensure(&opssight(&version, tier.as_str())).unwrap();
            assert!(rc_names(&list).contains(&"ops-opssight-opssight-core".to_string()));
            assert_eq!(list.to_manifests().unwrap().len(), list.len());
        }
    }
}

#[tokio::test]
async fn test_opssight_dry_run_reconcile() {
    let app = OpsSightApp::offline(OperatorConfig::default()).unwrap();
    let applier = DryRunApplier::new();
    let cr = opssight("2.2.4", "small");

    let applied = reconcile_opssight(&cr, &app, &applier).await.unwrap();
    assert_eq!(applied, applier.applied().len());

    let statuses = applier.statuses();
    assert_eq!(statuses.len(), 1);
    assert_eq!(
        statuses[0].0,
        StatusTarget::OpsSight {
            namespace: "ops".to_string(),
            name: "ops".to_string(),
        }
    );
    assert_eq!(statuses[0].1["state"], "Running");
}
