use chrono::{serde::ts_seconds, DateTime, Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, TokenData, Validation};
use log::warn;
use rocket::{
    http::{Cookie, SameSite, Status},
    request::{FromRequest, Outcome},
    Request, State,
};
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::Error;
use crate::model::api::id::ApiId;

use super::caller::{Caller, Role};

pub const AUTH_TOKEN_COOKIE: &str = "auth_token";

const BEARER_PREFIX: &str = "Bearer ";

/// Token claims: who the caller is, what they may do, and when the token expires.
#[derive(Serialize, Deserialize)]
struct Claims {
    sub: ApiId,
    #[serde(rename = "rls")]
    roles: Vec<Role>,
    #[serde(rename = "brc", default)]
    branch_code: Option<String>,
    #[serde(rename = "exp", with = "ts_seconds")]
    expire_at: DateTime<Utc>,
}

impl Caller {
    /// Encode this identity as a signed token valid for `ttl`.
    ///
    /// Tokens are normally minted by the identity provider sharing our secret;
    /// this is its counterpart for tooling and tests.
    #[allow(clippy::missing_panics_doc)]
    pub fn into_token(self, config: &Config, ttl: Duration) -> String {
        let claims = Claims {
            sub: self.id.into(),
            roles: self.roles,
            branch_code: self.branch_code,
            expire_at: Utc::now() + ttl,
        };

        jsonwebtoken::encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(config.jwt_secret()),
        )
        .expect("JWT encoding is infallible with default settings")
    }

    /// Wrap a freshly encoded token in the cookie we read identities from.
    pub fn into_cookie(self, config: &Config, ttl: Duration) -> Cookie<'static> {
        let token = self.into_token(config, ttl);
        Cookie::build(AUTH_TOKEN_COOKIE, token)
            .max_age(rocket::time::Duration::seconds(ttl.num_seconds()))
            .http_only(true)
            .same_site(SameSite::Strict)
            .finish()
    }

    /// Decode and verify a token.
    pub fn from_token(token: &str, config: &Config) -> Result<Self, Error> {
        let claims = jsonwebtoken::decode(
            token,
            &DecodingKey::from_secret(config.jwt_secret()),
            &Validation::default(),
        )
        .map(|data: TokenData<Claims>| data.claims)?;
        Ok(Self {
            id: claims.sub.into(),
            roles: claims.roles,
            branch_code: claims.branch_code,
        })
    }
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for Caller {
    type Error = Error;

    /// Get the caller's identity from the auth cookie, or failing that a bearer token.
    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let config = match req.guard::<&State<Config>>().await {
            Outcome::Success(config) => config,
            _ => {
                return Outcome::Failure((
                    Status::InternalServerError,
                    Error::Config("application config is not in managed state".to_string()),
                ))
            }
        };

        let token = req
            .cookies()
            .get(AUTH_TOKEN_COOKIE)
            .map(|cookie| cookie.value().to_string())
            .or_else(|| {
                req.headers()
                    .get_one("Authorization")
                    .and_then(|value| value.strip_prefix(BEARER_PREFIX))
                    .map(str::to_string)
            });
        let token = match token {
            Some(token) => token,
            None => {
                return Outcome::Failure((
                    Status::Unauthorized,
                    Error::Unauthorized("no identity token supplied".to_string()),
                ))
            }
        };

        match Self::from_token(&token, config) {
            Ok(caller) => Outcome::Success(caller),
            Err(e) => {
                warn!("Rejected identity token: {e}");
                Outcome::Failure((Status::Unauthorized, e))
            }
        }
    }
}
