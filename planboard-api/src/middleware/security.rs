/// Response hardening headers
///
/// The API serves only JSON and WebSocket frames, so the content policy
/// forbids loading anything at all. HSTS is sent only in production, where
/// the server sits behind TLS.
///
/// ```no_run
/// use axum::{middleware::from_fn_with_state, Router};
/// use planboard_api::middleware::security::{security_headers, SecurityHeaders};
///
/// let app: Router = Router::new()
///     .layer(from_fn_with_state(SecurityHeaders::new(true), security_headers));
/// ```

use axum::{
    extract::{Request, State},
    http::{header, HeaderName, HeaderValue},
    middleware::Next,
    response::Response,
};

const BASELINE: [(HeaderName, &str); 4] = [
    (header::X_CONTENT_TYPE_OPTIONS, "nosniff"),
    (header::X_FRAME_OPTIONS, "DENY"),
    (header::REFERRER_POLICY, "no-referrer"),
    (
        header::CONTENT_SECURITY_POLICY,
        "default-src 'none'; frame-ancestors 'none'",
    ),
];

const HSTS: &str = "max-age=31536000; includeSubDomains";

/// Which headers to stamp on responses
#[derive(Debug, Clone, Copy)]
pub struct SecurityHeaders {
    hsts: bool,
}

impl SecurityHeaders {
    pub fn new(production: bool) -> Self {
        Self { hsts: production }
    }

    fn apply(&self, response: &mut Response) {
        let headers = response.headers_mut();

        for (name, value) in BASELINE {
            headers.insert(name, HeaderValue::from_static(value));
        }
        if self.hsts {
            headers.insert(header::STRICT_TRANSPORT_SECURITY, HeaderValue::from_static(HSTS));
        }
    }
}

pub async fn security_headers(
    State(policy): State<SecurityHeaders>,
    request: Request,
    next: Next,
) -> Response {
    let mut response = next.run(request).await;
    policy.apply(&mut response);
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, middleware::from_fn_with_state, routing::get, Router};
    use tower::ServiceExt;

    async fn fetch(production: bool) -> Response {
        Router::new()
            .route("/ping", get(|| async { "pong" }))
            .layer(from_fn_with_state(SecurityHeaders::new(production), security_headers))
            .oneshot(Request::builder().uri("/ping").body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_baseline_headers() {
        let response = fetch(false).await;
        let headers = response.headers();

        assert_eq!(headers["x-content-type-options"], "nosniff");
        assert_eq!(headers["x-frame-options"], "DENY");
        assert_eq!(headers["referrer-policy"], "no-referrer");
        assert_eq!(
            headers["content-security-policy"],
            "default-src 'none'; frame-ancestors 'none'"
        );
    }

    #[tokio::test]
    async fn test_hsts_follows_production_flag() {
        let prod = fetch(true).await;
        assert_eq!(prod.headers()["strict-transport-security"], HSTS);

        let dev = fetch(false).await;
        assert!(!dev.headers().contains_key("strict-transport-security"));
    }
}
