//! Public Black Duck versions.
//!
//! Releases up to 2019.2.x run solr and use the first claim layout; later
//! releases dropped solr and use the second.

use crate::types::names::*;
use crate::types::{ComponentName, ContainerName, PublicPodResource, PublicVersion};
use std::collections::BTreeMap;

const REPOSITORY: &str = "blackducksoftware";
const POSTGRES_IMAGE: &str = "registry.access.redhat.com/rhscl/postgresql-96-rhel7:1";

/// Tags of the images that are not released with the product version
struct ImageTags {
    appcheck: &'static str,
    upload_cache: &'static str,
    logstash: &'static str,
    nginx: &'static str,
}

const TAGS_2018_12: ImageTags = ImageTags {
    appcheck: "2019.01",
    upload_cache: "1.0.3",
    logstash: "1.0.2",
    nginx: "1.0.0",
};

const TAGS_2019_2: ImageTags = ImageTags {
    nginx: "1.0.2",
    ..TAGS_2018_12
};

const TAGS_2019_4: ImageTags = ImageTags {
    appcheck: "2019.01",
    upload_cache: "1.0.8",
    logstash: "1.0.4",
    nginx: "1.0.7",
};

const TAGS_2019_6: ImageTags = ImageTags {
    appcheck: "2019.03",
    ..TAGS_2019_4
};

fn image(name: &str, tag: &str) -> String {
    format!("{}/{}:{}", REPOSITORY, name, tag)
}

fn pod(identifier: ComponentName, containers: &[(ContainerName, String)]) -> PublicPodResource {
    PublicPodResource::new(identifier, containers.iter().cloned())
}

fn public_version(version: &str, tags: &ImageTags, with_solr: bool) -> PublicVersion {
    let mut public = PublicVersion::new(BLACKDUCK_SIZE_V1);

    let mut rcs = vec![
        (
            "authentication",
            pod(
                BLACKDUCK_AUTHENTICATION_RC_V1,
                &[(BLACKDUCK_AUTHENTICATION_CONTAINER, image("blackduck-authentication", version))],
            ),
        ),
        (
            "binaryscanner",
            pod(
                BLACKDUCK_BINARYSCANNER_RC_V1,
                &[(BLACKDUCK_BINARYSCANNER_CONTAINER, image("appcheck-worker", tags.appcheck))],
            ),
        ),
        (
            "cfssl",
            pod(
                BLACKDUCK_CFSSL_RC_V1,
                &[(BLACKDUCK_CFSSL_CONTAINER, image("blackduck-cfssl", "1.0.0"))],
            ),
        ),
        (
            "documentation",
            pod(
                BLACKDUCK_DOCUMENTATION_RC_V1,
                &[(BLACKDUCK_DOCUMENTATION_CONTAINER, image("blackduck-documentation", version))],
            ),
        ),
        (
            "jobrunner",
            pod(
                BLACKDUCK_JOBRUNNER_RC_V1,
                &[(BLACKDUCK_JOBRUNNER_CONTAINER, image("blackduck-jobrunner", version))],
            ),
        ),
        (
            "rabbitmq",
            pod(
                BLACKDUCK_RABBITMQ_RC_V1,
                &[(BLACKDUCK_RABBITMQ_CONTAINER, image("rabbitmq", "1.0.0"))],
            ),
        ),
        (
            "registration",
            pod(
                BLACKDUCK_REGISTRATION_RC_V1,
                &[(BLACKDUCK_REGISTRATION_CONTAINER, image("blackduck-registration", version))],
            ),
        ),
        (
            "scan",
            pod(
                BLACKDUCK_SCAN_RC_V1,
                &[(BLACKDUCK_SCAN_CONTAINER, image("blackduck-scan", version))],
            ),
        ),
        (
            "uploadcache",
            pod(
                BLACKDUCK_UPLOADCACHE_RC_V1,
                &[(BLACKDUCK_UPLOADCACHE_CONTAINER, image("blackduck-upload-cache", tags.upload_cache))],
            ),
        ),
        (
            "webapp-logstash",
            pod(
                BLACKDUCK_WEBAPP_LOGSTASH_RC_V1,
                &[
                    (BLACKDUCK_WEBAPP_CONTAINER, image("blackduck-webapp", version)),
                    (BLACKDUCK_LOGSTASH_CONTAINER, image("blackduck-logstash", tags.logstash)),
                ],
            ),
        ),
        (
            "webserver",
            pod(
                BLACKDUCK_WEBSERVER_RC_V1,
                &[(BLACKDUCK_WEBSERVER_CONTAINER, image("blackduck-nginx", tags.nginx))],
            ),
        ),
        (
            "zookeeper",
            pod(
                BLACKDUCK_ZOOKEEPER_RC_V1,
                &[(BLACKDUCK_ZOOKEEPER_CONTAINER, image("blackduck-zookeeper", "1.0.0"))],
            ),
        ),
        (
            "postgres",
            pod(
                BLACKDUCK_POSTGRES_RC_V1,
                &[(BLACKDUCK_POSTGRES_CONTAINER, POSTGRES_IMAGE.to_string())],
            ),
        ),
    ];
    if with_solr {
        rcs.push((
            "solr",
            pod(
                BLACKDUCK_SOLR_RC_V1,
                &[(BLACKDUCK_SOLR_CONTAINER, image("blackduck-solr", "1.0.0"))],
            ),
        ));
    }
    public.rcs = rcs
        .into_iter()
        .map(|(key, pod)| (key.to_string(), pod))
        .collect();

    public.secrets = vec![
        BLACKDUCK_UPLOADCACHE_SECRET_V1,
        BLACKDUCK_PROXY_CERTIFICATE_SECRET_V1,
        BLACKDUCK_AUTH_CERTIFICATE_SECRET_V1,
        BLACKDUCK_WEB_CERTIFICATE_SECRET_V1,
        BLACKDUCK_POSTGRES_SECRET_V1,
    ];
    public.config_maps = vec![BLACKDUCK_GLOBAL_CONFIGMAP_V1, BLACKDUCK_DATABASE_CONFIGMAP_V1];

    public.services = vec![
        BLACKDUCK_AUTHENTICATION_SERVICE_V1,
        BLACKDUCK_CFSSL_SERVICE_V1,
        BLACKDUCK_DOCUMENTATION_SERVICE_V1,
        BLACKDUCK_RABBITMQ_SERVICE_V1,
        BLACKDUCK_REGISTRATION_SERVICE_V1,
        BLACKDUCK_SCAN_SERVICE_V1,
        BLACKDUCK_UPLOADCACHE_SERVICE_V1,
        BLACKDUCK_WEBAPP_SERVICE_V1,
        BLACKDUCK_LOGSTASH_SERVICE_V1,
        BLACKDUCK_WEBSERVER_SERVICE_V1,
        BLACKDUCK_ZOOKEEPER_SERVICE_V1,
        BLACKDUCK_POSTGRES_SERVICE_V1,
    ];
    if with_solr {
        public.services.push(BLACKDUCK_SOLR_SERVICE_V1);
    }
    public.services.push(BLACKDUCK_EXPOSE_SERVICE_V1);

    public.pvcs = vec![if with_solr {
        BLACKDUCK_PVC_V1
    } else {
        BLACKDUCK_PVC_V2
    }];

    public
}

fn versions_of(releases: &[(&str, &ImageTags)], with_solr: bool) -> BTreeMap<String, PublicVersion> {
    releases
        .iter()
        .map(|(version, tags)| (version.to_string(), public_version(version, tags, with_solr)))
        .collect()
}

/// 2018.12.0 through 2019.2.2
pub fn v1_versions() -> BTreeMap<String, PublicVersion> {
    versions_of(
        &[
            ("2018.12.0", &TAGS_2018_12),
            ("2018.12.1", &TAGS_2018_12),
            ("2018.12.2", &TAGS_2018_12),
            ("2018.12.3", &TAGS_2018_12),
            ("2018.12.4", &TAGS_2018_12),
            ("2019.2.0", &TAGS_2019_2),
            ("2019.2.1", &TAGS_2019_2),
            ("2019.2.2", &TAGS_2019_2),
        ],
        true,
    )
}

/// 2019.4.0 through 2019.6.1
pub fn v2_versions() -> BTreeMap<String, PublicVersion> {
    versions_of(
        &[
            ("2019.4.0", &TAGS_2019_4),
            ("2019.4.1", &TAGS_2019_4),
            ("2019.4.2", &TAGS_2019_4),
            ("2019.4.3", &TAGS_2019_4),
            ("2019.6.0", &TAGS_2019_6),
            ("2019.6.1", &TAGS_2019_6),
        ],
        false,
    )
}

/// Every public version
pub fn public_versions() -> BTreeMap<String, PublicVersion> {
    let mut versions = v1_versions();
    versions.extend(v2_versions());
    versions
}
