//! Certificate-header authentication.
//!
//! The reverse proxy terminates mutual TLS and is the only component that
//! validates client certificates. It forwards its verdict and the certificate
//! DNs in headers (nginx `ssl_module` variables):
//!
//! - `$ssl_client_verify` -> `x-ssl-authenticated`
//! - `$ssl_client_s_dn`   -> `x-ssl-user-dn`
//! - `$ssl_client_i_dn`   -> `x-ssl-issuer-dn`
//!
//! This module never parses a certificate. It only maps an already-verified
//! identity onto a profile, and only after the proxy's verdict is `SUCCESS`.

use axum::http::{HeaderMap, HeaderName, Uri};
use tracing::{debug, error, info};

use crate::error::AppError;
use crate::repos::profile_repo::Profile;
use crate::services::pki::dn;
use crate::services::pki::resolver::{IdentityResolver, Resolution};

pub const VERIFY_STATUS_HEADER: HeaderName = HeaderName::from_static("x-ssl-authenticated");
pub const SUBJECT_DN_HEADER: HeaderName = HeaderName::from_static("x-ssl-user-dn");
pub const ISSUER_DN_HEADER: HeaderName = HeaderName::from_static("x-ssl-issuer-dn");

pub const VERIFY_SUCCESS: &str = "SUCCESS";

/// Transport and header snapshot of one request, as seen by the gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    pub secure: bool,
    pub verify_status: Option<String>,
    pub subject_dn: Option<String>,
    pub issuer_dn: Option<String>,
}

impl RequestContext {
    pub fn from_parts(uri: &Uri, headers: &HeaderMap, transport: &SecureTransport) -> Self {
        // DNs may carry UTF-8 (e.g. accented CNs) that `to_str` would refuse.
        let text = |name: &HeaderName| {
            headers
                .get(name)
                .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned())
        };

        Self {
            secure: transport.is_secure(uri, headers),
            verify_status: text(&VERIFY_STATUS_HEADER),
            subject_dn: text(&SUBJECT_DN_HEADER),
            issuer_dn: text(&ISSUER_DN_HEADER),
        }
    }
}

/// How a request proves it arrived over TLS when TLS ends at the proxy.
#[derive(Debug, Clone)]
pub struct SecureTransport {
    pub proxy_header: HeaderName,
    pub proxy_value: String,
}

impl SecureTransport {
    pub fn new(proxy_header: HeaderName, proxy_value: impl Into<String>) -> Self {
        Self {
            proxy_header,
            proxy_value: proxy_value.into(),
        }
    }

    pub fn is_secure(&self, uri: &Uri, headers: &HeaderMap) -> bool {
        if uri.scheme_str() == Some("https") {
            return true;
        }
        headers
            .get(&self.proxy_header)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.trim().eq_ignore_ascii_case(&self.proxy_value))
    }
}

impl Default for SecureTransport {
    fn default() -> Self {
        Self::new(HeaderName::from_static("x-forwarded-proto"), "https")
    }
}

/// Why this authentication method had nothing to say about the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotApplicable {
    InsecureTransport,
    MissingVerifyStatus,
    VerificationFailed,
    MissingSubjectDn,
    MissingIssuerDn,
}

/// Why a verified certificate identity was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Denied {
    InactiveAccount,
    UsernameUnavailable,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthOutcome {
    Authenticated(Profile),
    NotApplicable(NotApplicable),
    Denied(Denied),
}

#[derive(Debug, Clone)]
pub struct PkiAuthenticator {
    resolver: IdentityResolver,
    preprocess_dn: bool,
}

impl PkiAuthenticator {
    pub fn new(resolver: IdentityResolver, preprocess_dn: bool) -> Self {
        Self {
            resolver,
            preprocess_dn,
        }
    }

    /// Never fails for missing or rejected credentials; `Err` means the store broke.
    pub async fn authenticate(&self, ctx: &RequestContext) -> Result<AuthOutcome, AppError> {
        if !ctx.secure {
            error!("insecure request (not HTTPS): incompatible with pki authentication");
            return Ok(AuthOutcome::NotApplicable(NotApplicable::InsecureTransport));
        }

        let Some(status) = non_empty(&ctx.verify_status) else {
            error!(header = %VERIFY_STATUS_HEADER, "missing header");
            return Ok(AuthOutcome::NotApplicable(
                NotApplicable::MissingVerifyStatus,
            ));
        };

        if status != VERIFY_SUCCESS {
            error!(
                header = %VERIFY_STATUS_HEADER,
                status = %status,
                "client verification status is not SUCCESS"
            );
            return Ok(AuthOutcome::NotApplicable(NotApplicable::VerificationFailed));
        }

        let Some(subject_dn) = non_empty(&ctx.subject_dn) else {
            error!(header = %SUBJECT_DN_HEADER, "missing header");
            return Ok(AuthOutcome::NotApplicable(NotApplicable::MissingSubjectDn));
        };

        let Some(issuer_dn) = non_empty(&ctx.issuer_dn) else {
            error!(header = %ISSUER_DN_HEADER, "missing header");
            return Ok(AuthOutcome::NotApplicable(NotApplicable::MissingIssuerDn));
        };

        let (subject_dn, issuer_dn) = if self.preprocess_dn {
            (dn::normalize(subject_dn), dn::normalize(issuer_dn))
        } else {
            (subject_dn.to_string(), issuer_dn.to_string())
        };

        info!(
            dn = %subject_dn,
            issuer_dn = %issuer_dn,
            "attempting to authenticate user"
        );

        let resolution = self
            .resolver
            .resolve_or_create(&subject_dn, &issuer_dn)
            .await
            .map_err(|e| {
                error!(dn = %subject_dn, error = ?e, "profile lookup failed");
                AppError::Internal
            })?;

        match resolution {
            Resolution::Existing(profile) | Resolution::Created(profile) => {
                info!(
                    username = %profile.account.username,
                    "found user, authentication succeeded"
                );
                Ok(AuthOutcome::Authenticated(profile))
            }
            Resolution::Inactive { dn } => {
                debug!(dn = %dn, "authentication refused: account inactive");
                Ok(AuthOutcome::Denied(Denied::InactiveAccount))
            }
            Resolution::UsernameUnavailable { dn, username } => {
                error!(
                    dn = %dn,
                    username = %username,
                    "failed to find/create user for dn, authentication failed"
                );
                Ok(AuthOutcome::Denied(Denied::UsernameUnavailable))
            }
        }
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}
