//! Public OpsSight versions.
//!
//! Every release shares one layout. `latest` and the empty version point at
//! the newest release and `upstream` runs the development images.

use crate::types::names::*;
use crate::types::{PublicPodResource, PublicVersion};
use std::collections::BTreeMap;

const RELEASES: [&str; 2] = ["2.2.3", "2.2.4"];
const LATEST: &str = "2.2.4";
const PROMETHEUS_IMAGE: &str = "docker.io/prom/prometheus:v2.1.0";
const SKYFIRE_IMAGE: &str = "gcr.io/saas-hub-stg/blackducksoftware/pyfire:master";

/// Where the images of one version come from
struct Images {
    repository: &'static str,
    tag: String,
}

impl Images {
    fn release(tag: &str) -> Self {
        Self {
            repository: "docker.io/blackducksoftware",
            tag: tag.to_string(),
        }
    }

    fn upstream() -> Self {
        Self {
            repository: "gcr.io/saas-hub-stg/blackducksoftware",
            tag: "master".to_string(),
        }
    }

    fn image(&self, name: &str) -> String {
        format!("{}/{}:{}", self.repository, name, self.tag)
    }
}

fn public_version(images: &Images) -> PublicVersion {
    let mut public = PublicVersion::new(OPSSIGHT_SIZE_V1);

    public.rcs = BTreeMap::from([
        (
            "opssight-core".to_string(),
            PublicPodResource::new(
                OPSSIGHT_CORE_RC_V1,
                [(OPSSIGHT_CORE_CONTAINER, images.image("opssight-core"))],
            ),
        ),
        (
            "opssight-pod-processor".to_string(),
            PublicPodResource::new(
                OPSSIGHT_POD_PROCESSOR_RC_V1,
                [(OPSSIGHT_POD_PROCESSOR_CONTAINER, images.image("opssight-pod-processor"))],
            ),
        ),
        (
            "opssight-image-processor".to_string(),
            PublicPodResource::new(
                OPSSIGHT_IMAGE_PROCESSOR_RC_V1,
                [(OPSSIGHT_IMAGE_PROCESSOR_CONTAINER, images.image("opssight-image-processor"))],
            ),
        ),
        (
            "opssight-scanner".to_string(),
            PublicPodResource::new(
                OPSSIGHT_SCANNER_RC_V1,
                [
                    (OPSSIGHT_SCANNER_CONTAINER, images.image("opssight-scanner")),
                    (OPSSIGHT_IMAGE_GETTER_CONTAINER, images.image("opssight-image-getter")),
                ],
            ),
        ),
        (
            "skyfire".to_string(),
            PublicPodResource::new(SKYFIRE_RC_V1, [(SKYFIRE_CONTAINER, SKYFIRE_IMAGE.to_string())]),
        ),
    ]);

    public.deployments = BTreeMap::from([(
        "prometheus".to_string(),
        PublicPodResource::new(
            OPSSIGHT_METRICS_DEPLOYMENT_V1,
            [(OPSSIGHT_METRICS_CONTAINER, PROMETHEUS_IMAGE.to_string())],
        ),
    )]);

    public.services = vec![
        OPSSIGHT_CORE_SERVICE_V1,
        OPSSIGHT_EXPOSE_CORE_SERVICE_V1,
        OPSSIGHT_POD_PROCESSOR_SERVICE_V1,
        OPSSIGHT_IMAGE_PROCESSOR_SERVICE_V1,
        OPSSIGHT_IMAGE_GETTER_SERVICE_V1,
        OPSSIGHT_SCANNER_SERVICE_V1,
        OPSSIGHT_METRICS_SERVICE_V1,
        OPSSIGHT_EXPOSE_METRICS_SERVICE_V1,
        SKYFIRE_SERVICE_V1,
    ];
    public.config_maps = vec![OPSSIGHT_CONFIGMAP_V1, OPSSIGHT_METRICS_CONFIGMAP_V1];
    public.secrets = vec![OPSSIGHT_SECRET_V1];
    public.service_accounts = vec![
        OPSSIGHT_POD_PROCESSOR_SERVICE_ACCOUNT_V1,
        OPSSIGHT_IMAGE_PROCESSOR_SERVICE_ACCOUNT_V1,
        OPSSIGHT_SCANNER_SERVICE_ACCOUNT_V1,
        SKYFIRE_SERVICE_ACCOUNT_V1,
    ];
    public.cluster_roles = vec![
        OPSSIGHT_POD_PROCESSOR_CLUSTER_ROLE_V1,
        OPSSIGHT_IMAGE_PROCESSOR_CLUSTER_ROLE_V1,
        SKYFIRE_CLUSTER_ROLE_V1,
    ];
    public.cluster_role_bindings = vec![
        OPSSIGHT_POD_PROCESSOR_CLUSTER_ROLE_BINDING_V1,
        OPSSIGHT_IMAGE_PROCESSOR_CLUSTER_ROLE_BINDING_V1,
        OPSSIGHT_SCANNER_CLUSTER_ROLE_BINDING_V1,
        SKYFIRE_CLUSTER_ROLE_BINDING_V1,
    ];

    public
}

/// Releases plus the `latest`, empty and `upstream` aliases
pub fn public_versions() -> BTreeMap<String, PublicVersion> {
    let mut versions: BTreeMap<String, PublicVersion> = RELEASES
        .iter()
        .map(|release| (release.to_string(), public_version(&Images::release(release))))
        .collect();
    let latest = public_version(&Images::release(LATEST));
    versions.insert("latest".to_string(), latest.clone());
    versions.insert(String::new(), latest);
    versions.insert("upstream".to_string(), public_version(&Images::upstream()));
    versions
}
