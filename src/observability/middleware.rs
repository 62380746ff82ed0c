use axum::{
    extract::{MatchedPath, Request},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use opentelemetry::trace::{Status, TraceContextExt};
use std::{sync::Arc, time::Instant};
use tracing::{error, info, instrument, warn, Instrument, Span};
use tracing_opentelemetry::OpenTelemetrySpanExt;

use super::Metrics;

/// Route label for requests no route matched. Raw paths carry user and
/// dish ids, so they never become metric labels.
pub const UNMATCHED_ROUTE: &str = "unmatched";

/// Route template the request matched, e.g. `/api/cart/:user_id/items`
pub fn route_label(request: &Request) -> String {
    request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| UNMATCHED_ROUTE.to_string(), |path| path.as_str().to_string())
}

/// First hop of `X-Forwarded-For`, then `X-Real-IP`
pub fn client_address(headers: &HeaderMap) -> String {
    let header = |name: &str| headers.get(name).and_then(|value| value.to_str().ok());

    header("x-forwarded-for")
        .and_then(|value| value.split(',').next())
        .or_else(|| header("x-real-ip"))
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .unwrap_or("unknown")
        .to_string()
}

/// Request span, in-flight gauge, latency histogram and one completion log line per request
pub async fn observability_middleware(
    metrics: Arc<Metrics>,
    request: Request,
    next: Next,
) -> Response {
    let started = Instant::now();
    let method = request.method().to_string();
    let route = route_label(&request);
    let client_ip = client_address(request.headers());
    let user_agent = request
        .headers()
        .get("user-agent")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown")
        .to_string();

    let span_name = format!("{} {}", method, route);
    let span = tracing::info_span!(
        target: "cafeteria_rs::http",
        "{}", span_name,
        otel.name = %span_name,
        otel.kind = "server",
        http.method = %method,
        http.route = %route,
        http.url = %request.uri(),
        http.user_agent = %user_agent,
        client.address = %client_ip,
        http.response.status_code = tracing::field::Empty,
        http.response_time_ms = tracing::field::Empty,
    );

    async move {
        metrics.increment_in_flight(&method, &route);
        let trace_id = Span::current()
            .context()
            .span()
            .span_context()
            .trace_id()
            .to_string();

        let response = next.run(request).await;

        let elapsed = started.elapsed();
        let status_code = response.status().as_u16();
        metrics.decrement_in_flight(&method, &route);
        metrics.record_http_request(&method, &route, status_code, elapsed.as_secs_f64());

        let span = Span::current();
        span.record("http.response.status_code", status_code);
        span.record("http.response_time_ms", elapsed.as_millis());
        // Client mistakes such as an empty-cart checkout are not server faults
        if status_code >= 500 {
            span.context().span().set_status(Status::error("HTTP server error"));
        } else {
            span.context().span().set_status(Status::Ok);
        }

        let duration_ms = elapsed.as_millis();
        match status_code {
            500..=u16::MAX => error!(%trace_id, %method, %route, status_code, duration_ms, %client_ip, "Request failed"),
            400..=499 => warn!(%trace_id, %method, %route, status_code, duration_ms, %client_ip, "Request rejected"),
            _ => info!(%trace_id, %method, %route, status_code, duration_ms, %client_ip, "Request completed"),
        }

        response
    }
    .instrument(span)
    .await
}

/// Wraps service operations with a span, a log line and a business metric
#[derive(Clone)]
pub struct BusinessTracingMiddleware {
    metrics: Arc<Metrics>,
}

impl BusinessTracingMiddleware {
    pub fn new(metrics: Arc<Metrics>) -> Self {
        Self { metrics }
    }

    /// Trace an admin operation on users, dishes or restaurants
    #[instrument(skip_all, fields(
        entity = %entity,
        operation = %operation,
    ))]
    pub async fn trace_catalog_operation<F, T, E>(
        &self,
        entity: &str,
        operation: &str,
        future: F,
    ) -> Result<T, E>
    where
        F: std::future::Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        let start_time = Instant::now();

        info!("Starting catalog operation");

        match future.await {
            Ok(result) => {
                self.metrics.record_catalog_operation(entity, operation, true);

                info!(
                    duration_ms = start_time.elapsed().as_millis(),
                    "Catalog operation completed successfully"
                );

                Ok(result)
            }
            Err(error) => {
                self.metrics.record_catalog_operation(entity, operation, false);

                error!(
                    error = %error,
                    duration_ms = start_time.elapsed().as_millis(),
                    "Catalog operation failed"
                );

                Err(error)
            }
        }
    }

    /// Trace a cart operation of one user
    #[instrument(skip_all, fields(
        operation = %operation,
        user_id = %user_id,
    ))]
    pub async fn trace_cart_operation<F, T, E>(
        &self,
        operation: &str,
        user_id: &str,
        future: F,
    ) -> Result<T, E>
    where
        F: std::future::Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        let start_time = Instant::now();

        info!("Starting cart operation");

        match future.await {
            Ok(result) => {
                self.metrics.record_cart_operation(operation, true);

                info!(
                    duration_ms = start_time.elapsed().as_millis(),
                    "Cart operation completed successfully"
                );

                Ok(result)
            }
            Err(error) => {
                self.metrics.record_cart_operation(operation, false);

                error!(
                    error = %error,
                    duration_ms = start_time.elapsed().as_millis(),
                    "Cart operation failed"
                );

                Err(error)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{Method, Request, StatusCode},
        middleware,
        routing::{get, post},
        Router,
    };
    use tower::ServiceExt;

    async fn cart_view() -> &'static str {
        "{}"
    }

    async fn empty_cart_checkout() -> StatusCode {
        StatusCode::UNPROCESSABLE_ENTITY
    }

    fn observed_app(metrics: Arc<Metrics>) -> Router {
        Router::new()
            .route("/api/cart/:user_id", get(cart_view))
            .route("/api/cart/:user_id/checkout", post(empty_cart_checkout))
            .layer(middleware::from_fn(move |req, next| {
                observability_middleware(metrics.clone(), req, next)
            }))
    }

    fn request(method: Method, uri: &str) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap()
    }

    #[tokio::test]
    async fn test_requests_are_counted_per_route_template() {
        let metrics = Arc::new(Metrics::new().unwrap());
        let app = observed_app(metrics.clone());

        for user_id in ["U0a1b2c3d", "U0e0f1a2b"] {
            let response = app
                .clone()
                .oneshot(request(Method::GET, &format!("/api/cart/{}", user_id)))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK);
        }

        let count = metrics
            .http_requests_total
            .with_label_values(&["GET", "/api/cart/:user_id", "200"])
            .get();
        assert_eq!(count, 2.0);

        let in_flight = metrics
            .http_requests_in_flight
            .with_label_values(&["GET", "/api/cart/:user_id"])
            .get();
        assert_eq!(in_flight, 0.0);
    }

    #[tokio::test]
    async fn test_rejected_checkout_is_recorded_with_status() {
        let metrics = Arc::new(Metrics::new().unwrap());

        let response = observed_app(metrics.clone())
            .oneshot(request(Method::POST, "/api/cart/U0a1b2c3d/checkout"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let count = metrics
            .http_requests_total
            .with_label_values(&["POST", "/api/cart/:user_id/checkout", "422"])
            .get();
        assert_eq!(count, 1.0);
    }

    #[tokio::test]
    async fn test_unknown_paths_share_one_label() {
        let metrics = Arc::new(Metrics::new().unwrap());
        let app = Router::new()
            .route("/api/cart/:user_id", get(cart_view))
            .fallback(|| async { StatusCode::NOT_FOUND })
            .layer(middleware::from_fn({
                let metrics = metrics.clone();
                move |req, next| observability_middleware(metrics.clone(), req, next)
            }));

        let response = app
            .oneshot(request(Method::GET, "/api/carts/U0a1b2c3d"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let encoded = metrics.encode().unwrap();
        assert!(encoded.contains(UNMATCHED_ROUTE));
        assert!(!encoded.contains("U0a1b2c3d"));
    }

    #[test]
    fn test_client_address() {
        let mut headers = HeaderMap::new();
        assert_eq!(client_address(&headers), "unknown");

        headers.insert("x-real-ip", "10.0.0.7".parse().unwrap());
        assert_eq!(client_address(&headers), "10.0.0.7");

        headers.insert("x-forwarded-for", "203.0.113.9, 10.0.0.1".parse().unwrap());
        assert_eq!(client_address(&headers), "203.0.113.9");
    }

    #[tokio::test]
    async fn test_business_tracing_middleware() {
        let metrics = Arc::new(Metrics::new().unwrap());
        let middleware = BusinessTracingMiddleware::new(metrics.clone());

        let result = middleware
            .trace_catalog_operation("dish", "create", async { Ok::<_, String>("success") })
            .await;
        assert!(result.is_ok());

        let result = middleware
            .trace_cart_operation("add_item", "U12345678", async {
                Err::<String, _>("cart is gone")
            })
            .await;
        assert!(result.is_err());

        let failed = metrics
            .cart_operations_total
            .with_label_values(&["add_item", "error"])
            .get();
        assert_eq!(failed, 1.0);

        let encoded = metrics.encode().unwrap();
        assert!(encoded.contains("catalog_operations_total"));
        assert!(encoded.contains("cart_operations_total"));
    }
}
