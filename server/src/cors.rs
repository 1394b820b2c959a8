//! Origin allow-list.
//!
//! Two layers share one `OriginPolicy`: `reject_unlisted` turns away requests
//! whose `Origin` header is not on the list, and the `CorsLayer` from
//! `cors_layer` answers preflights and adds the CORS response headers for the
//! origins that remain. Requests with no `Origin` header (curl, other
//! servers) pass through untouched.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{header, HeaderValue, Method},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tower_http::cors::{AllowHeaders, AllowOrigin, CorsLayer};

use crate::error::ApiError;

#[derive(Debug, Clone)]
pub struct OriginPolicy {
    allowed: Vec<HeaderValue>,
}

impl OriginPolicy {
    /// Entries that are not valid header values are dropped with a warning.
    pub fn new<S: AsRef<str>>(origins: &[S]) -> Self {
        let allowed = origins
            .iter()
            .filter_map(|origin| {
                let origin = origin.as_ref();
                HeaderValue::from_str(origin)
                    .inspect_err(|_| tracing::warn!(origin, "ignoring unusable allowed origin"))
                    .ok()
            })
            .collect();
        Self { allowed }
    }

    pub fn allows(&self, origin: &HeaderValue) -> bool {
        self.allowed.iter().any(|allowed| allowed == origin)
    }

    /// CORS headers for allowed origins, with credentials.
    pub fn cors_layer(&self) -> CorsLayer {
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(self.allowed.clone()))
            .allow_credentials(true)
            .allow_methods([
                Method::GET,
                Method::HEAD,
                Method::POST,
                Method::PUT,
                Method::DELETE,
            ])
            .allow_headers(AllowHeaders::mirror_request())
    }
}

/// Middleware rejecting requests from origins outside the allow-list.
pub async fn reject_unlisted(
    State(policy): State<Arc<OriginPolicy>>,
    req: Request,
    next: Next,
) -> Response {
    if let Some(origin) = req.headers().get(header::ORIGIN) {
        if !policy.allows(origin) {
            tracing::warn!(origin = ?origin, method = %req.method(), uri = %req.uri(), "blocked by CORS");
            return ApiError::OriginRejected.into_response();
        }
    }
    next.run(req).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allows_only_listed_origins() {
        let policy = OriginPolicy::new(&["http://localhost:3000", "https://claude.ai"]);
        assert!(policy.allows(&HeaderValue::from_static("https://claude.ai")));
        assert!(!policy.allows(&HeaderValue::from_static("https://evil.example")));
        assert!(!policy.allows(&HeaderValue::from_static("http://localhost:3001")));
    }

    #[tokio::test]
    async fn preflight_advertises_only_routed_methods() {
        use axum::{body::Body, http::Request, routing::get, Router};
        use tower::ServiceExt;

        let policy = OriginPolicy::new(&["https://claude.ai"]);
        let app = Router::new()
            .route("/", get(|| async { "ok" }))
            .layer(policy.cors_layer());
        let req = Request::builder()
            .method(Method::OPTIONS)
            .uri("/")
            .header(header::ORIGIN, "https://claude.ai")
            .header(header::ACCESS_CONTROL_REQUEST_METHOD, "PUT")
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();

        let methods = resp.headers()[header::ACCESS_CONTROL_ALLOW_METHODS]
            .to_str()
            .unwrap()
            .to_string();
        for method in ["GET", "HEAD", "POST", "PUT", "DELETE"] {
            assert!(methods.contains(method), "missing {method} in {methods}");
        }
        assert!(!methods.contains("PATCH"), "PATCH advertised in {methods}");
    }

    #[test]
    fn drops_origins_that_are_not_header_values() {
        let policy = OriginPolicy::new(&["https://ok.example".to_string(), "bad\norigin".to_string()]);
        assert_eq!(policy.allowed.len(), 1);
    }
}
