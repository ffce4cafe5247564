use actix_web::{dev::Payload, FromRequest, HttpRequest};
use std::future::{ready, Ready};

use crate::error::AppError;

pub const USER_ID_HEADER: &str = "X-User-Id";
pub const ORGANIZATION_ID_HEADER: &str = "X-Organization-Id";

/// Caller identity forwarded by the authenticating gateway
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserContext {
    pub user_id: String,
    pub organization_id: String,
}

impl UserContext {
    pub fn new(user_id: impl Into<String>, organization_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            organization_id: organization_id.into(),
        }
    }

    fn from_request_headers(req: &HttpRequest) -> Result<Self, AppError> {
        let header = |name: &str| {
            req.headers()
                .get(name)
                .and_then(|h| h.to_str().ok())
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };

        match (header(USER_ID_HEADER), header(ORGANIZATION_ID_HEADER)) {
            (Some(user_id), Some(organization_id)) => Ok(Self {
                user_id,
                organization_id,
            }),
            _ => Err(AppError::Unauthorized),
        }
    }
}

impl FromRequest for UserContext {
    type Error = AppError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        ready(Self::from_request_headers(req))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test::TestRequest;

    #[test]
    fn test_reads_identity_headers() {
        let req = TestRequest::default()
            .insert_header((USER_ID_HEADER, "alice"))
            .insert_header((ORGANIZATION_ID_HEADER, "org-1"))
            .to_http_request();
        let ctx = UserContext::from_request_headers(&req).unwrap();
        assert_eq!(ctx, UserContext::new("alice", "org-1"));
    }

    #[test]
    fn test_missing_org_is_unauthorized() {
        let req = TestRequest::default()
            .insert_header((USER_ID_HEADER, "alice"))
            .to_http_request();
        assert!(matches!(
            UserContext::from_request_headers(&req),
            Err(AppError::Unauthorized)
        ));
    }
}
