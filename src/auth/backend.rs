/// Token Backend
///
/// Signs claim sets into compact JWS strings and verifies them back.
/// Configuration is fixed at construction; share it through an `Arc`.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde_json::Value;

use crate::auth::claims::{ClaimSet, AUD_CLAIM, EXP_CLAIM, ISS_CLAIM, NBF_CLAIM};
use crate::clock::{datetime_from_claim, Clock, SystemClock};
use crate::error::BackendError;

pub struct TokenBackend {
    algorithm: Algorithm,
    encoding_key: Option<EncodingKey>,
    decoding_key: Option<DecodingKey>,
    issuer: Option<String>,
    audience: Option<String>,
    leeway: Duration,
    clock: Arc<dyn Clock>,
}

impl TokenBackend {
    /// Build a backend
    ///
    /// # Arguments
    /// * `algorithm` - JWS algorithm name, e.g. `HS256` or `RS256`
    /// * `signing_key` - HMAC secret or PEM private key; `None` makes a verify-only backend
    /// * `verifying_key` - PEM public key; ignored for HMAC algorithms
    /// * `issuer` / `audience` - added on encode and required on verified decode
    /// * `leeway` - clock skew tolerated on `exp` and `nbf`
    ///
    /// # Errors
    /// Returns error if the algorithm is unknown, a key cannot be parsed or
    /// the leeway is negative
    pub fn new(
        algorithm: &str,
        signing_key: Option<&str>,
        verifying_key: Option<&str>,
        issuer: Option<String>,
        audience: Option<String>,
        leeway: Duration,
    ) -> Result<Self, BackendError> {
        let algorithm = Algorithm::from_str(algorithm)
            .map_err(|_| BackendError::InvalidAlgorithm(algorithm.to_string()))?;
        if leeway < Duration::zero() {
            return Err(BackendError::InvalidDuration("leeway", "must not be negative".to_string()));
        }
        let signing_key = signing_key.filter(|key| !key.is_empty());
        let verifying_key = verifying_key.filter(|key| !key.is_empty());

        let (encoding_key, decoding_key) = if is_hmac(algorithm) {
            (
                signing_key.map(|key| EncodingKey::from_secret(key.as_bytes())),
                signing_key.map(|key| DecodingKey::from_secret(key.as_bytes())),
            )
        } else {
            (
                signing_key
                    .map(|key| encoding_key_from_pem(algorithm, key))
                    .transpose()?,
                verifying_key
                    .map(|key| decoding_key_from_pem(algorithm, key))
                    .transpose()?,
            )
        };

        Ok(Self {
            algorithm,
            encoding_key,
            decoding_key,
            issuer,
            audience,
            leeway,
            clock: Arc::new(SystemClock),
        })
    }

    /// HMAC backend with no issuer, audience or leeway
    pub fn hmac(algorithm: &str, secret: &str) -> Result<Self, BackendError> {
        Self::new(algorithm, Some(secret), None, None, None, Duration::zero())
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    pub fn leeway(&self) -> Duration {
        self.leeway
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Sign a claim set
    ///
    /// `aud` and `iss` are added when configured. The output only depends on
    /// the claims, the key and the algorithm.
    ///
    /// # Errors
    /// Returns error if no signing key is configured or signing fails
    pub fn encode(&self, claims: &ClaimSet) -> Result<String, BackendError> {
        let key = self
            .encoding_key
            .as_ref()
            .ok_or(BackendError::MissingSigningKey)?;

        let mut payload = claims.clone();
        if let Some(audience) = &self.audience {
            payload.insert(AUD_CLAIM, audience.clone());
        }
        if let Some(issuer) = &self.issuer {
            payload.insert(ISS_CLAIM, issuer.clone());
        }

        encode(&Header::new(self.algorithm), &payload, key)
            .map_err(|e| BackendError::Encode(e.to_string()))
    }

    /// Parse a token, checking signature and timing claims when `verify` is set
    ///
    /// # Errors
    /// Returns error if the token is malformed, signed with another algorithm
    /// or key, expired beyond the leeway, or not yet valid
    pub fn decode(&self, token: &str, verify: bool) -> Result<ClaimSet, BackendError> {
        if !verify {
            let validation = self.unverified_validation();
            return decode::<ClaimSet>(token, &DecodingKey::from_secret(&[]), &validation)
                .map(|data| data.claims)
                .map_err(|e| BackendError::Invalid(e.to_string()));
        }

        let key = self
            .decoding_key
            .as_ref()
            .ok_or(BackendError::MissingVerifyingKey)?;

        let claims = decode::<ClaimSet>(token, key, &self.validation())
            .map(|data| data.claims)
            .map_err(|e| {
                tracing::debug!(error = %e, "Token signature verification failed");
                BackendError::Invalid(e.to_string())
            })?;

        self.check_timing(&claims)?;
        Ok(claims)
    }

    fn validation(&self) -> Validation {
        let mut validation = Validation::new(self.algorithm);
        // exp/nbf are compared in `check_timing` so the boundary is inclusive
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.required_spec_claims.clear();

        match &self.audience {
            Some(audience) => {
                validation.set_audience(&[audience]);
                validation.required_spec_claims.insert(AUD_CLAIM.to_string());
            }
            None => validation.validate_aud = false,
        }
        if let Some(issuer) = &self.issuer {
            validation.set_issuer(&[issuer]);
            validation.required_spec_claims.insert(ISS_CLAIM.to_string());
        }
        validation
    }

    fn unverified_validation(&self) -> Validation {
        let mut validation = Validation::new(self.algorithm);
        validation.insecure_disable_signature_validation();
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.validate_aud = false;
        validation.required_spec_claims.clear();
        validation
    }

    fn check_timing(&self, claims: &ClaimSet) -> Result<(), BackendError> {
        let now = self.clock.now();

        if let Some(exp) = claims.get(EXP_CLAIM) {
            let exp = timestamp(exp, EXP_CLAIM)?;
            // Out of range edges mean nothing is early or late enough to fail
            let expired = now
                .checked_sub_signed(self.leeway)
                .is_some_and(|edge| exp <= edge);
            if expired {
                return Err(BackendError::Expired);
            }
        }
        if let Some(nbf) = claims.get(NBF_CLAIM) {
            let nbf = timestamp(nbf, NBF_CLAIM)?;
            let immature = now
                .checked_add_signed(self.leeway)
                .is_some_and(|edge| nbf > edge);
            if immature {
                return Err(BackendError::Immature);
            }
        }
        Ok(())
    }
}

impl fmt::Debug for TokenBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenBackend")
            .field("algorithm", &self.algorithm)
            .field("signing_key", &self.encoding_key.as_ref().map(|_| "[REDACTED]"))
            .field("verifying_key", &self.decoding_key.as_ref().map(|_| "[REDACTED]"))
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .field("leeway", &self.leeway)
            .finish()
    }
}

fn timestamp(value: &Value, claim: &str) -> Result<DateTime<Utc>, BackendError> {
    datetime_from_claim(value)
        .ok_or_else(|| BackendError::Invalid(format!("'{}' claim is not a timestamp", claim)))
}

fn is_hmac(algorithm: Algorithm) -> bool {
    matches!(
        algorithm,
        Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512
    )
}

fn encoding_key_from_pem(algorithm: Algorithm, pem: &str) -> Result<EncodingKey, BackendError> {
    let pem = pem.as_bytes();
    let key = match algorithm {
        Algorithm::ES256 | Algorithm::ES384 => EncodingKey::from_ec_pem(pem),
        Algorithm::EdDSA => EncodingKey::from_ed_pem(pem),
        _ => EncodingKey::from_rsa_pem(pem),
    };
    key.map_err(|e| BackendError::KeyParse("signing", e.to_string()))
}

fn decoding_key_from_pem(algorithm: Algorithm, pem: &str) -> Result<DecodingKey, BackendError> {
    let pem = pem.as_bytes();
    let key = match algorithm {
        Algorithm::ES256 | Algorithm::ES384 => DecodingKey::from_ec_pem(pem),
        Algorithm::EdDSA => DecodingKey::from_ed_pem(pem),
        _ => DecodingKey::from_rsa_pem(pem),
    };
    key.map_err(|e| BackendError::KeyParse("verifying", e.to_string()))
}
