//! Service-provider side of SAML login, backed by `samael`.
//!
//! All trust decisions for the login flow live here: the identity provider's
//! certificate, the expected issuer and audience, and the correlation between
//! an AuthnRequest and the response that answers it. Route handlers only see
//! redirect locations and validated principals.

use crate::config::Config;
use crate::principal::Principal;
use anyhow::{Context, Result, anyhow, bail};
use openssl::pkey::{PKey, Private};
use samael::crypto::CertificateDer;
use samael::key_info::{KeyInfo, X509Data};
use samael::metadata::{
    Endpoint, EntityDescriptor, HTTP_POST_BINDING, HTTP_REDIRECT_BINDING, IdpSsoDescriptor,
    IndexedEndpoint, KeyDescriptor, SpSsoDescriptor,
};
use samael::service_provider::ServiceProvider;
use samael::traits::ToXml;
use std::sync::Arc;
use std::time::Duration;

/// Key material read at startup. Never leaves the strategy.
pub struct Credentials {
    sp_key: PKey<Private>,
    sp_cert_der: Option<Vec<u8>>,
    idp_cert_der: Vec<u8>,
}

impl Credentials {
    pub fn load(config: &Config) -> Result<Self> {
        let sp_key_pem = std::fs::read(&config.sp_key_path)
            .with_context(|| format!("failed to read SP private key {:?}", config.sp_key_path))?;
        let sp_cert_pem = config
            .sp_cert_path
            .as_ref()
            .map(|path| {
                std::fs::read(path)
                    .with_context(|| format!("failed to read SP certificate {path:?}"))
            })
            .transpose()?;
        let idp_cert_pem = std::fs::read(&config.idp_cert_path).with_context(|| {
            format!("failed to read IdP certificate {:?}", config.idp_cert_path)
        })?;

        Self::from_pem(&sp_key_pem, sp_cert_pem.as_deref(), &idp_cert_pem)
    }

    pub fn from_pem(
        sp_key_pem: &[u8],
        sp_cert_pem: Option<&[u8]>,
        idp_cert_pem: &[u8],
    ) -> Result<Self> {
        let sp_key =
            PKey::private_key_from_pem(sp_key_pem).context("failed to parse SP private key")?;
        sp_key.rsa().context("SP key must be RSA")?;

        let sp_cert_der = match sp_cert_pem {
            Some(pem) => {
                let cert = openssl::x509::X509::from_pem(pem)
                    .context("failed to parse SP certificate")?;
                let cert_key = cert
                    .public_key()
                    .context("SP certificate has no public key")?;
                if !cert_key.public_eq(&sp_key) {
                    bail!("SP certificate does not match the SP private key");
                }
                Some(cert.to_der().context("failed to encode SP certificate as DER")?)
            }
            None => None,
        };

        let idp_cert = openssl::x509::X509::from_pem(idp_cert_pem)
            .context("failed to parse IdP certificate")?;
        let idp_cert_der = idp_cert
            .to_der()
            .context("failed to encode IdP certificate as DER")?;

        Ok(Self {
            sp_key,
            sp_cert_der,
            idp_cert_der,
        })
    }
}

/// Why a callback was refused. The detail is for logs only.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("no outstanding authentication request for this RelayState")]
    UnknownRequest,
    #[error("SAML response rejected: {0}")]
    Rejected(String),
    #[error("SAML response validation timed out")]
    TimedOut,
    /// The validation task panicked or was cancelled.
    #[error("validation task failed: {0}")]
    Aborted(String),
}

/// Where to send the user agent to start a login.
#[derive(Debug, Clone)]
pub struct RedirectInstruction {
    pub request_id: String,
    pub relay_state: String,
    pub location: String,
}

pub struct SamlStrategy {
    sp: ServiceProvider,
    entry_point: String,
    credentials: Credentials,
    sign_requests: bool,
    validation_timeout: Duration,
    issuer: String,
    callback_url: String,
    logout_url: Option<String>,
}

impl SamlStrategy {
    pub fn new(config: &Config, credentials: Credentials) -> Result<Self> {
        let idp_metadata = idp_descriptor(config, &credentials.idp_cert_der);

        let sp = ServiceProvider {
            entity_id: Some(config.issuer.clone()),
            acs_url: Some(config.callback_url.clone()),
            slo_url: config.logout_url.clone(),
            idp_metadata,
            allow_idp_initiated: false,
            max_issue_delay: chrono::Duration::minutes(5),
            ..ServiceProvider::default()
        };

        let entry_point = sp
            .sso_binding_location(HTTP_REDIRECT_BINDING)
            .context("no HTTP-Redirect SSO endpoint for the identity provider")?;

        Ok(Self {
            sp,
            entry_point,
            credentials,
            sign_requests: config.sign_requests,
            validation_timeout: config.validation_timeout,
            issuer: config.issuer.clone(),
            callback_url: config.callback_url.clone(),
            logout_url: config.logout_url.clone(),
        })
    }

    /// Builds a fresh AuthnRequest addressed to the entry point.
    pub fn initiate(&self) -> Result<RedirectInstruction> {
        let authn_request = self
            .sp
            .make_authentication_request(&self.entry_point)
            .map_err(|e| anyhow!("{e}"))?;

        let relay_state = uuid::Uuid::new_v4().to_string();

        let url = if self.sign_requests {
            authn_request
                .signed_redirect(&relay_state, &self.credentials.sp_key)
                .map_err(|e| anyhow!("{e}"))?
        } else {
            authn_request
                .redirect(&relay_state)
                .map_err(|e| anyhow!("{e}"))?
        };
        let url = url.ok_or_else(|| anyhow!("AuthnRequest has no destination"))?;

        Ok(RedirectInstruction {
            request_id: authn_request.id,
            relay_state,
            location: url.to_string(),
        })
    }

    /// Checks the signature against the IdP certificate, the issuer, the
    /// audience, the destination, the validity window and that the response
    /// answers `request_id`.
    pub fn validate(&self, saml_response: &str, request_id: &str) -> Result<Principal, AuthError> {
        let assertion = self
            .sp
            .parse_base64_response(saml_response, Some(&[request_id][..]))
            .map_err(|e| AuthError::Rejected(e.to_string()))?;

        Ok(Principal::from_assertion(&assertion))
    }

    /// [`Self::validate`] on the blocking pool, abandoned after the
    /// configured timeout.
    pub async fn validate_bounded(
        self: Arc<Self>,
        saml_response: String,
        request_id: String,
    ) -> Result<Principal, AuthError> {
        let timeout = self.validation_timeout;
        let task =
            tokio::task::spawn_blocking(move || self.validate(&saml_response, &request_id));

        match tokio::time::timeout(timeout, task).await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => Err(AuthError::Aborted(e.to_string())),
            Err(_) => Err(AuthError::TimedOut),
        }
    }

    /// SP metadata (EntityDescriptor with SPSSODescriptor) for the identity
    /// provider to consume.
    pub fn metadata_xml(&self) -> Result<String> {
        let key_descriptors = self
            .credentials
            .sp_cert_der
            .as_ref()
            .map(|der| vec![signing_key_descriptor(der)]);

        let sp_descriptor = SpSsoDescriptor {
            authn_requests_signed: Some(self.sign_requests),
            want_assertions_signed: Some(true),
            protocol_support_enumeration: Some("urn:oasis:names:tc:SAML:2.0:protocol".to_string()),
            key_descriptors,
            assertion_consumer_services: vec![IndexedEndpoint {
                binding: HTTP_POST_BINDING.to_string(),
                location: self.callback_url.clone(),
                response_location: None,
                index: 0,
                is_default: Some(true),
            }],
            single_logout_services: self.logout_url.as_ref().map(|location| {
                vec![Endpoint {
                    binding: HTTP_REDIRECT_BINDING.to_string(),
                    location: location.clone(),
                    response_location: None,
                }]
            }),
            ..Default::default()
        };

        let entity_descriptor = EntityDescriptor {
            entity_id: Some(self.issuer.clone()),
            sp_sso_descriptors: Some(vec![sp_descriptor]),
            ..Default::default()
        };

        entity_descriptor.to_string().map_err(|e| anyhow!("{e}"))
    }
}

fn signing_key_descriptor(cert_der: &[u8]) -> KeyDescriptor {
    let cert_der = CertificateDer::from(cert_der.to_vec());
    let cert_b64 = samael::crypto::mime_encode_x509_cert(&cert_der);

    KeyDescriptor {
        key_use: Some("signing".to_string()),
        key_info: KeyInfo {
            id: None,
            x509_data: Some(X509Data {
                certificates: vec![cert_b64],
            }),
        },
        encryption_methods: None,
    }
}

// The identity provider as samael needs to see it: its entity ID, the one
// certificate it may sign with, and the entry point.
fn idp_descriptor(config: &Config, idp_cert_der: &[u8]) -> EntityDescriptor {
    let idp_descriptor = IdpSsoDescriptor {
        want_authn_requests_signed: Some(config.sign_requests),
        protocol_support_enumeration: Some("urn:oasis:names:tc:SAML:2.0:protocol".to_string()),
        key_descriptors: vec![signing_key_descriptor(idp_cert_der)],
        name_id_formats: vec![],
        single_sign_on_services: vec![Endpoint {
            binding: HTTP_REDIRECT_BINDING.to_string(),
            location: config.entry_point.clone(),
            response_location: None,
        }],
        id: None,
        valid_until: None,
        cache_duration: None,
        error_url: None,
        signature: None,
        organization: None,
        contact_people: vec![],
        artifact_resolution_service: vec![],
        single_logout_services: vec![],
        manage_name_id_services: vec![],
        name_id_mapping_services: vec![],
        assertion_id_request_services: vec![],
        attribute_profiles: vec![],
        attributes: vec![],
    };

    EntityDescriptor {
        entity_id: Some(config.idp_entity_id.clone()),
        idp_sso_descriptors: Some(vec![idp_descriptor]),
        ..Default::default()
    }
}
