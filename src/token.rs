use std::fmt;
use std::time::Duration;

use diesel::SqliteConnection;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::actions;
use crate::error::{AppError, TOKEN_INVALID};
use crate::models::User;

/// Payload carried by an access token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub email: String,
    /// Expiry as seconds since the Unix epoch.
    pub exp: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessToken {
    pub access_token: String,
}

/// Issues and checks HMAC-signed access tokens.
#[derive(Clone)]
pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    algorithm: Algorithm,
    lifetime: Duration,
}

impl fmt::Debug for TokenService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenService")
            .field("algorithm", &self.algorithm)
            .field("lifetime", &self.lifetime)
            .finish_non_exhaustive()
    }
}

/// Accepts only the HMAC family; the service is keyed with a shared secret.
pub fn parse_hmac_algorithm(value: &str) -> Result<Algorithm, String> {
    let algorithm: Algorithm = value
        .parse()
        .map_err(|_| format!("unknown JWT algorithm: {value}"))?;
    match algorithm {
        Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512 => Ok(algorithm),
        other => Err(format!("{other:?} needs a key pair, use HS256, HS384 or HS512")),
    }
}

impl TokenService {
    pub fn new(secret: &[u8], algorithm: Algorithm, lifetime: Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            algorithm,
            lifetime,
        }
    }

    pub fn lifetime(&self) -> Duration {
        self.lifetime
    }

    /// Returns a token for `email` expiring after the configured lifetime.
    pub fn encode(&self, email: &str) -> Result<AccessToken, AppError> {
        let claims = Claims {
            email: email.to_owned(),
            exp: jsonwebtoken::get_current_timestamp() + self.lifetime.as_secs(),
        };
        self.encode_claims(&claims)
    }

    pub fn encode_claims(&self, claims: &Claims) -> Result<AccessToken, AppError> {
        let access_token =
            jsonwebtoken::encode(&Header::new(self.algorithm), claims, &self.encoding)?;
        Ok(AccessToken { access_token })
    }

    /// Payload of a correctly signed, unexpired token; `None` otherwise.
    pub fn decode(&self, token: &str) -> Option<Claims> {
        let mut validation = Validation::new(self.algorithm);
        validation.leeway = 0;

        match jsonwebtoken::decode::<Claims>(token, &self.decoding, &validation) {
            Ok(data) => Some(data.claims),
            Err(err) => {
                tracing::debug!(error = %err, "rejected access token");
                None
            }
        }
    }

    /// Checks `token` and issues a fresh one for the same user.
    pub fn refresh(&self, token: &str, conn: &mut SqliteConnection) -> Result<AccessToken, AppError> {
        let claims = self
            .decode(token)
            .ok_or_else(|| AppError::Unauthorized(TOKEN_INVALID.to_owned()))?;
        let user = user_from_claims(conn, &claims)?;
        self.encode(&user.email)
    }
}

/// Loads the user a token was issued for.
pub fn user_from_claims(conn: &mut SqliteConnection, claims: &Claims) -> Result<User, AppError> {
    actions::find_user_by_email(conn, &claims.email)?.ok_or_else(|| {
        AppError::Unauthorized("User from token payload does not exist".to_owned())
    })
}

/// Credentials of an `Authorization`-style value such as `Bearer <token>`.
///
/// Cookie values may arrive wrapped in double quotes.
pub fn bearer_credentials(value: &str) -> Option<&str> {
    let value = value.trim().trim_matches('"');
    let (scheme, credentials) = value.split_once(' ')?;
    let credentials = credentials.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !credentials.is_empty()).then_some(credentials)
}
