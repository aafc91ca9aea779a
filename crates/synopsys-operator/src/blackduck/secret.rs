//! Database credentials, certificates and the upload cache seal key

use super::{get_version_label, resource_name};
use crate::crds::Blackduck;
use crate::error::{OperatorError, Result};
use crate::orchestrator::{CustomResourceSpec, DATABASE_COMPONENT};
use crate::store::{ComponentStore, GenerationContext};
use crate::types::names::*;
use crate::util::{decode_base64, object_meta};
use crate::OperatorConfig;
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::ByteString;
use kube::ResourceExt;
use std::collections::BTreeMap;

pub(super) const DB_CREDS: &str = "db-creds";
pub(super) const PROXY_CERTIFICATE: &str = "proxy-certificate";
pub(super) const PROXY_CERTIFICATE_KEY: &str = "HUB_PROXY_CERT_FILE";
pub(super) const AUTH_CUSTOM_CA: &str = "auth-custom-ca";
pub(super) const AUTH_CUSTOM_CA_KEY: &str = "AUTH_CUSTOM_CA";
pub(super) const UPLOAD_CACHE: &str = "upload-cache";
pub(super) const UPLOAD_CACHE_SEAL_KEY: &str = "SEAL_KEY";
pub(super) const WEB_CERTIFICATE: &str = "webserver-certificate";
pub(super) const WEB_CERTIFICATE_CERT_KEY: &str = "WEBSERVER_CUSTOM_CERT_FILE";
pub(super) const WEB_CERTIFICATE_KEY_KEY: &str = "WEBSERVER_CUSTOM_KEY_FILE";

const SEAL_KEY_LEN: usize = 32;

pub(super) fn register(store: &mut ComponentStore<Blackduck>) -> Result<()> {
    store.register_secret(BLACKDUCK_POSTGRES_SECRET_V1, db_creds)?;
    store.register_secret(BLACKDUCK_WEB_CERTIFICATE_SECRET_V1, web_certificate)?;
    store.register_secret(BLACKDUCK_PROXY_CERTIFICATE_SECRET_V1, proxy_certificate)?;
    store.register_secret(BLACKDUCK_AUTH_CERTIFICATE_SECRET_V1, auth_custom_ca)?;
    store.register_secret(BLACKDUCK_UPLOADCACHE_SECRET_V1, upload_cache)?;
    Ok(())
}

fn opaque(
    cr: &Blackduck,
    suffix: &str,
    component: &str,
    data: BTreeMap<String, ByteString>,
) -> Secret {
    let labels = get_version_label(component, &cr.name_any(), &cr.spec.version);
    Secret {
        metadata: object_meta(&resource_name(cr, suffix), &cr.target_namespace(), labels),
        data: Some(data),
        type_: Some("Opaque".to_string()),
        ..Default::default()
    }
}

fn entry(key: &str, value: Vec<u8>) -> (String, ByteString) {
    (key.to_string(), ByteString(value))
}

/// Decoded postgres passwords, bundled or external
fn db_creds(ctx: &GenerationContext<'_, Blackduck>) -> Result<Vec<Secret>> {
    let cr = ctx.cr;
    let data: BTreeMap<String, ByteString> = match &cr.spec.external_postgres {
        Some(external) => BTreeMap::from([
            entry(
                "HUB_POSTGRES_ADMIN_PASSWORD_FILE",
                decode_base64(
                    &external.postgres_admin_password,
                    "external postgres Admin user password",
                )?,
            ),
            entry(
                "HUB_POSTGRES_USER_PASSWORD_FILE",
                decode_base64(
                    &external.postgres_user_password,
                    "external postgres Black Duck user password",
                )?,
            ),
        ]),
        None => BTreeMap::from([
            entry(
                "HUB_POSTGRES_ADMIN_PASSWORD_FILE",
                decode_base64(&cr.spec.admin_password, "postgres Admin user password")?,
            ),
            entry(
                "HUB_POSTGRES_USER_PASSWORD_FILE",
                decode_base64(&cr.spec.user_password, "postgres Black Duck user password")?,
            ),
            entry(
                "HUB_POSTGRES_POSTGRES_PASSWORD_FILE",
                decode_base64(&cr.spec.postgres_password, "postgres Postgres user password")?,
            ),
        ]),
    };

    Ok(vec![opaque(cr, DB_CREDS, DATABASE_COMPONENT, data)])
}

/// Custom web server certificate; requires both the certificate and its key
fn web_certificate(ctx: &GenerationContext<'_, Blackduck>) -> Result<Vec<Secret>> {
    let cr = ctx.cr;
    if cr.spec.certificate.is_empty() || cr.spec.certificate_key.is_empty() {
        return Ok(Vec::new());
    }
    let data = BTreeMap::from([
        entry(WEB_CERTIFICATE_CERT_KEY, cr.spec.certificate.clone().into_bytes()),
        entry(WEB_CERTIFICATE_KEY_KEY, cr.spec.certificate_key.clone().into_bytes()),
    ]);
    Ok(vec![opaque(cr, WEB_CERTIFICATE, "webserver", data)])
}

fn single_file(
    cr: &Blackduck,
    value: &str,
    suffix: &str,
    key: &str,
    component: &str,
) -> Vec<Secret> {
    if value.is_empty() {
        return Vec::new();
    }
    let data = BTreeMap::from([entry(key, value.as_bytes().to_vec())]);
    vec![opaque(cr, suffix, component, data)]
}

fn proxy_certificate(ctx: &GenerationContext<'_, Blackduck>) -> Result<Vec<Secret>> {
    let cr = ctx.cr;
    Ok(single_file(
        cr,
        &cr.spec.proxy_certificate,
        PROXY_CERTIFICATE,
        PROXY_CERTIFICATE_KEY,
        "proxy-certificate",
    ))
}

fn auth_custom_ca(ctx: &GenerationContext<'_, Blackduck>) -> Result<Vec<Secret>> {
    let cr = ctx.cr;
    Ok(single_file(
        cr,
        &cr.spec.auth_custom_ca,
        AUTH_CUSTOM_CA,
        AUTH_CUSTOM_CA_KEY,
        "authentication",
    ))
}

/// Key sealing the upload cache master key.
///
/// The resource's base64 `sealKey` takes precedence over the operator's
/// `SEAL_KEY`. Either must hold exactly 32 bytes.
pub(super) fn seal_key(cr: &Blackduck, config: &OperatorConfig) -> Result<Vec<u8>> {
    let key = if !cr.spec.seal_key.is_empty() {
        decode_base64(&cr.spec.seal_key, "seal key")?
    } else if !config.seal_key.is_empty() {
        config.seal_key.as_bytes().to_vec()
    } else {
        return Err(OperatorError::InvalidSpec(format!(
            "{} has no seal key; set spec.sealKey or the operator's SEAL_KEY",
            cr.name_any()
        )));
    };
    if key.len() != SEAL_KEY_LEN {
        return Err(OperatorError::InvalidSpec(format!(
            "seal key of {} must be {} bytes, got {}",
            cr.name_any(),
            SEAL_KEY_LEN,
            key.len()
        )));
    }
    Ok(key)
}

fn upload_cache(ctx: &GenerationContext<'_, Blackduck>) -> Result<Vec<Secret>> {
    let cr = ctx.cr;
    let data = BTreeMap::from([entry(UPLOAD_CACHE_SEAL_KEY, seal_key(cr, ctx.config)?)]);
    Ok(vec![opaque(cr, UPLOAD_CACHE, "uploadcache", data)])
}

#[cfg(test)]
mod tests {
    use super::super::test_support::blackduck;
    use super::*;
    use crate::crds::PostgresExternalDbConfig;
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;

    fn value(secret: &Secret, key: &str) -> Vec<u8> {
        secret.data.as_ref().unwrap()[key].0.clone()
    }

    #[test]
    fn test_db_creds_decoded() {
        let config = OperatorConfig::default();
        let cr = blackduck("hub", "2019.6.0");
        let ctx = GenerationContext::new(&config, None, &cr);

        let secrets = db_creds(&ctx).unwrap();
        let secret = &secrets[0];
        assert_eq!(secret.metadata.name.as_deref(), Some("hub-blackduck-db-creds"));
        assert_eq!(secret.type_.as_deref(), Some("Opaque"));
        assert_eq!(secret.metadata.labels.as_ref().unwrap()["component"], "postgres");
        assert_eq!(value(secret, "HUB_POSTGRES_ADMIN_PASSWORD_FILE"), b"admin");
        assert_eq!(value(secret, "HUB_POSTGRES_USER_PASSWORD_FILE"), b"user");
        assert_eq!(value(secret, "HUB_POSTGRES_POSTGRES_PASSWORD_FILE"), b"postgres");
    }

    #[test]
    fn test_db_creds_invalid_password() {
        let config = OperatorConfig::default();
        let mut cr = blackduck("hub", "2019.6.0");
        cr.spec.admin_password = "%%%".to_string();
        let ctx = GenerationContext::new(&config, None, &cr);

        let err = db_creds(&ctx).unwrap_err();
        assert!(err
            .to_string()
            .starts_with("unable to decode the postgres Admin user password"));
    }

    #[test]
    fn test_db_creds_external() {
        let config = OperatorConfig::default();
        let mut cr = blackduck("hub", "2019.6.0");
        cr.spec.external_postgres = Some(PostgresExternalDbConfig {
            postgres_admin_password: "YQ==".to_string(),
            postgres_user_password: "dQ==".to_string(),
            ..Default::default()
        });
        let ctx = GenerationContext::new(&config, None, &cr);

        let secrets = db_creds(&ctx).unwrap();
        let data = secrets[0].data.as_ref().unwrap();
        assert_eq!(data.len(), 2);
        assert_eq!(value(&secrets[0], "HUB_POSTGRES_ADMIN_PASSWORD_FILE"), b"a");
    }

    #[test]
    fn test_optional_certificates() {
        let config = OperatorConfig::default();
        let mut cr = blackduck("hub", "2019.6.0");
        cr.spec.certificate = "CERT".to_string();
        let ctx = GenerationContext::new(&config, None, &cr);
        assert!(web_certificate(&ctx).unwrap().is_empty());
        assert!(proxy_certificate(&ctx).unwrap().is_empty());

        cr.spec.certificate_key = "KEY".to_string();
        cr.spec.proxy_certificate = "PROXY".to_string();
        let ctx = GenerationContext::new(&config, None, &cr);
        assert_eq!(web_certificate(&ctx).unwrap().len(), 1);
        let proxy = proxy_certificate(&ctx).unwrap();
        assert_eq!(
            proxy[0].metadata.name.as_deref(),
            Some("hub-blackduck-proxy-certificate")
        );
        assert_eq!(value(&proxy[0], PROXY_CERTIFICATE_KEY), b"PROXY");
    }

    #[test]
    fn test_seal_key_from_resource() {
        let config = OperatorConfig {
            seal_key: "o".repeat(32),
            ..Default::default()
        };
        let mut cr = blackduck("hub", "2019.6.0");
        cr.spec.seal_key = STANDARD.encode("r".repeat(32));
        let ctx = GenerationContext::new(&config, None, &cr);

        let secrets = upload_cache(&ctx).unwrap();
        assert_eq!(secrets[0].metadata.name.as_deref(), Some("hub-blackduck-upload-cache"));
        assert_eq!(value(&secrets[0], UPLOAD_CACHE_SEAL_KEY), "r".repeat(32).into_bytes());
    }

    #[test]
    fn test_seal_key_from_operator() {
        let config = OperatorConfig {
            seal_key: "o".repeat(32),
            ..Default::default()
        };
        let mut cr = blackduck("hub", "2019.6.0");
        cr.spec.seal_key.clear();
        assert_eq!(seal_key(&cr, &config).unwrap(), "o".repeat(32).into_bytes());
    }

    #[test]
    fn test_seal_key_required() {
        let mut cr = blackduck("hub", "2019.6.0");
        cr.spec.seal_key.clear();
        let err = seal_key(&cr, &OperatorConfig::default()).unwrap_err();
        assert!(matches!(err, OperatorError::InvalidSpec(_)));
        assert!(err.to_string().contains("SEAL_KEY"));
    }

    #[test]
    fn test_seal_key_length_checked() {
        let config = OperatorConfig {
            seal_key: "short".to_string(),
            ..Default::default()
        };
        let mut cr = blackduck("hub", "2019.6.0");
        cr.spec.seal_key.clear();
        assert!(seal_key(&cr, &config).unwrap_err().to_string().contains("32 bytes, got 5"));

        cr.spec.seal_key = STANDARD.encode("r".repeat(16));
        assert!(matches!(
            seal_key(&cr, &config),
            Err(OperatorError::InvalidSpec(_))
        ));

        cr.spec.seal_key = "not base64!".to_string();
        assert!(matches!(seal_key(&cr, &config), Err(OperatorError::Decode(_))));
    }
}
