use actix_web::{HttpRequest, HttpResponse};
use metrics::counter;
use panic_dashboard_domain::messages;
use tracing::debug;

use super::{result, ApiError};

pub async fn ping_handler() -> HttpResponse {
    result(messages::PONG)
}

pub async fn invalid_endpoint_handler(req: HttpRequest) -> Result<HttpResponse, ApiError> {
    counter!("dashboard_invalid_endpoint_total", "method" => req.method().as_str().to_owned())
        .increment(1);
    debug!(method = %req.method(), path = req.path(), "invalid endpoint");
    Err(ApiError::InvalidEndpoint)
}
