//! Request extractors.

use axum::async_trait;
use axum::extract::{FromRequest, FromRequestParts};
use axum::http::request::Parts;
use axum::http::HeaderMap;
use std::convert::Infallible;
use uuid::Uuid;

use crate::identity::Caller;
use crate::EcommerceError;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_EMAIL_HEADER: &str = "x-user-email";
pub const USER_ROLE_HEADER: &str = "x-user-role";

/// JSON body whose rejections use the `{success:false, error}` envelope.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(EcommerceError))]
pub struct ApiJson<T>(pub T);

fn header(headers: &HeaderMap, name: &str) -> Option<String> {
    headers.get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Identity asserted by the upstream provider. Missing headers yield an anonymous caller.
#[async_trait]
impl<S> FromRequestParts<S> for Caller
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Caller {
            user_id: header(&parts.headers, USER_ID_HEADER),
            email: header(&parts.headers, USER_EMAIL_HEADER),
            role: header(&parts.headers, USER_ROLE_HEADER),
        })
    }
}

pub fn parse_id(raw: &str, what: &str) -> Result<Uuid, EcommerceError> {
    Uuid::parse_str(raw.trim()).map_err(|_| EcommerceError::validation(format!("Invalid {what} id: {raw}")))
}
