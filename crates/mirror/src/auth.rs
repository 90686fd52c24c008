//! API credential verification. Tokens are minted out-of-band as
//! `base64(claims-json) "." base64(tag)` where the tag is an HMAC-SHA256
//! over the claims bytes; the service only ever verifies. Signature
//! comparison is constant time via the `hmac` crate.

use {
    crate::api::error,
    axum::{
        http::{HeaderMap, StatusCode},
        response::{IntoResponse, Response},
    },
    base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD},
    hmac::{Hmac, Mac},
    serde::{Deserialize, Serialize},
    sha2::Sha256,
    thiserror::Error,
};

type HmacSha256 = Hmac<Sha256>;

pub const AUTH_HEADER: &str = "x-auth-token";

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    Reader,
}

impl Role {
    /// Admins may do everything a reader may.
    fn allows(self, required: Role) -> bool {
        self == Role::Admin || self == required
    }
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Claims {
    pub role: Role,
    pub subject: String,
}

#[derive(Debug, Error, Eq, PartialEq)]
pub enum AuthError {
    #[error("malformed credential token")]
    Malformed,
    #[error("credential signature mismatch")]
    BadSignature,
}

#[derive(Clone)]
pub struct Verifier {
    secret: std::sync::Arc<[u8]>,
}

impl Verifier {
    pub fn new(secret: &str) -> Self {
        Self {
            secret: secret.as_bytes().into(),
        }
    }

    pub fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        let (claims_b64, tag_b64) = token.split_once('.').ok_or(AuthError::Malformed)?;
        let claims_bytes = URL_SAFE_NO_PAD
            .decode(claims_b64)
            .map_err(|_| AuthError::Malformed)?;
        let tag = URL_SAFE_NO_PAD
            .decode(tag_b64)
            .map_err(|_| AuthError::Malformed)?;

        let mut mac =
            HmacSha256::new_from_slice(&self.secret).map_err(|_| AuthError::Malformed)?;
        mac.update(&claims_bytes);
        mac.verify_slice(&tag)
            .map_err(|_| AuthError::BadSignature)?;

        serde_json::from_slice(&claims_bytes).map_err(|_| AuthError::Malformed)
    }

    /// Mints a token for the given claims. Issuance happens out-of-band;
    /// this exists for the issuance tooling and tests.
    pub fn sign(&self, claims: &Claims) -> String {
        let claims_bytes = serde_json::to_vec(claims).expect("claims always serialize");
        let mut mac =
            HmacSha256::new_from_slice(&self.secret).expect("hmac accepts any key length");
        mac.update(&claims_bytes);
        let tag = mac.finalize().into_bytes();
        format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(claims_bytes),
            URL_SAFE_NO_PAD.encode(tag)
        )
    }
}

/// Checks the request's credential and role, mapping failures to the
/// matching API error responses.
pub(crate) fn authorize(
    verifier: &Verifier,
    headers: &HeaderMap,
    required: Role,
) -> Result<Claims, Response> {
    let token = headers
        .get(AUTH_HEADER)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| {
            (
                StatusCode::UNAUTHORIZED,
                error("MissingCredential", format!("{AUTH_HEADER} header is required")),
            )
                .into_response()
        })?;

    let claims = verifier.verify(token).map_err(|err| {
        (
            StatusCode::UNAUTHORIZED,
            error("InvalidCredential", err.to_string()),
        )
            .into_response()
    })?;

    if !claims.role.allows(required) {
        return Err((
            StatusCode::FORBIDDEN,
            error("InsufficientRole", "this operation requires a different role"),
        )
            .into_response());
    }
    Ok(claims)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claims(role: Role) -> Claims {
        Claims {
            role,
            subject: "ops@example.com".to_string(),
        }
    }

    #[test]
    fn sign_verify_round_trip() {
        let verifier = Verifier::new("super secret");
        let token = verifier.sign(&claims(Role::Admin));
        assert_eq!(verifier.verify(&token).unwrap(), claims(Role::Admin));
    }

    #[test]
    fn wrong_secret_fails() {
        let token = Verifier::new("secret a").sign(&claims(Role::Admin));
        assert_eq!(
            Verifier::new("secret b").verify(&token),
            Err(AuthError::BadSignature)
        );
    }

    #[test]
    fn tampered_claims_fail() {
        let verifier = Verifier::new("super secret");
        let token = verifier.sign(&claims(Role::Reader));
        let (_, tag) = token.split_once('.').unwrap();
        let forged_claims =
            URL_SAFE_NO_PAD.encode(serde_json::to_vec(&claims(Role::Admin)).unwrap());
        let forged = format!("{forged_claims}.{tag}");
        assert_eq!(verifier.verify(&forged), Err(AuthError::BadSignature));
    }

    #[test]
    fn malformed_tokens_fail() {
        let verifier = Verifier::new("super secret");
        assert_eq!(verifier.verify("no-dot"), Err(AuthError::Malformed));
        assert_eq!(verifier.verify("a.!!!"), Err(AuthError::Malformed));
        assert_eq!(verifier.verify(""), Err(AuthError::Malformed));
    }

    #[test]
    fn roles_are_hierarchical() {
        assert!(Role::Admin.allows(Role::Reader));
        assert!(Role::Admin.allows(Role::Admin));
        assert!(Role::Reader.allows(Role::Reader));
        assert!(!Role::Reader.allows(Role::Admin));
    }
}
