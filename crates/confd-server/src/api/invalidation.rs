//! Decision cache flush on configuration writes

use axum::extract::{Request, State};
use axum::http::Method;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use confd_core::cache::DecisionCache;
use tracing::debug;

use super::error::ApiError;

fn is_mutating(method: &Method) -> bool {
    !matches!(*method, Method::GET | Method::HEAD | Method::OPTIONS)
}

/// Flush the whole decision cache after any successful write.
///
/// A failed flush turns the write's response into a server error.
pub async fn invalidate_on_write(State(cache): State<DecisionCache>, request: Request, next: Next) -> Response {
    let mutating = is_mutating(request.method());
    let path = request.uri().path().to_string();
    let response = next.run(request).await;

    if mutating && response.status().is_success() {
        debug!(%path, "Configuration changed, flushing decision cache");
        if let Err(e) = cache.invalidate_all().await {
            return ApiError::from(e).into_response();
        }
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_mutating() {
        assert!(is_mutating(&Method::POST));
        assert!(is_mutating(&Method::PUT));
        assert!(is_mutating(&Method::PATCH));
        assert!(is_mutating(&Method::DELETE));
        assert!(!is_mutating(&Method::GET));
        assert!(!is_mutating(&Method::HEAD));
    }
}
