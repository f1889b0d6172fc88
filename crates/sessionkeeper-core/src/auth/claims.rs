//! Bearer credential decoding.
//!
//! Only the payload segment is read. Signatures are not verified here; the
//! backend is the trust boundary.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

use super::error::CredentialError;
use crate::models::Profile;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Expiry, seconds since epoch
    pub exp: i64,
    #[serde(default)]
    pub iat: Option<i64>,
    #[serde(default)]
    pub sub: Option<String>,
    #[serde(default)]
    pub user_id: Option<i64>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub company_id: Option<i64>,
    #[serde(default)]
    pub company_name: Option<String>,
}

impl Claims {
    /// Subject identifier, from `user_id` or a numeric `sub`.
    pub fn subject_id(&self) -> Option<i64> {
        self.user_id
            .or_else(|| self.sub.as_deref().and_then(|s| s.parse().ok()))
    }

    pub fn expires_at(&self) -> Result<DateTime<Utc>, CredentialError> {
        DateTime::from_timestamp(self.exp, 0)
            .ok_or_else(|| CredentialError::Malformed(format!("exp out of range: {}", self.exp)))
    }

    pub fn to_profile(&self) -> Profile {
        let mut profile = Profile::new(self.subject_id(), self.name.clone(), self.role.as_deref());
        profile.company_id = self.company_id;
        profile.company_name = self.company_name.clone();
        profile
    }
}

fn payload_validation() -> Validation {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.validate_aud = false;
    validation.required_spec_claims = HashSet::from(["exp".to_string()]);
    validation
}

/// Decode a token's claims without verifying its signature.
pub fn decode_claims(token: &str) -> Result<Claims, CredentialError> {
    let token = token.trim();
    if token.is_empty() {
        return Err(CredentialError::Malformed("empty token".to_string()));
    }

    decode::<Claims>(token, &DecodingKey::from_secret(&[]), &payload_validation())
        .map(|data| data.claims)
        .map_err(|e| CredentialError::Malformed(e.to_string()))
}

/// Extract the expiry instant.
pub fn decode_expiry(token: &str) -> Result<DateTime<Utc>, CredentialError> {
    decode_claims(token)?.expires_at()
}

#[cfg(test)]
pub(crate) mod test_tokens {
    //! Token minting shared by the crate's tests.

    use chrono::{DateTime, Duration, Utc};
    use jsonwebtoken::{encode, EncodingKey, Header};
    use serde_json::json;

    pub fn token_with_claims(claims: serde_json::Value) -> String {
        encode(&Header::default(), &claims, &EncodingKey::from_secret(b"test-secret")).unwrap()
    }

    pub fn token_expiring_at(exp: DateTime<Utc>) -> String {
        token_with_claims(json!({
            "user_id": 42,
            "name": "Asha",
            "role": "ADMIN",
            "company_id": 7,
            "company_name": "Asha Traders",
            "exp": exp.timestamp(),
        }))
    }

    pub fn token_expiring_in(delta: Duration) -> String {
        token_expiring_at(Utc::now() + delta)
    }
}
