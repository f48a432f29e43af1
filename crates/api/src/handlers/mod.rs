pub mod chains;
pub mod metrics;
pub mod ping;
pub mod repos;
pub mod snapshot;

pub use chains::{chain_nodes_map_handler, chains_handler};
pub use metrics::metrics_handler;
pub use ping::{invalid_endpoint_handler, ping_handler};
pub use repos::repos_handler;
pub use snapshot::all_chain_info_handler;

use actix_web::{http::StatusCode, web, HttpResponse, ResponseError};
use serde::Serialize;
use thiserror::Error;

use panic_dashboard_domain::{messages, snapshot::AggregationError};

/// Registers every `/server/*` route. Unknown paths and methods under the
/// scope answer with the invalid-endpoint error.
pub fn configure_server_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/server")
            .route("/chains", web::get().to(chains_handler))
            .route("/chain_nodes_map", web::get().to(chain_nodes_map_handler))
            .route("/all_chain_info", web::get().to(all_chain_info_handler))
            .route("/repos", web::get().to(repos_handler))
            .route("/ping_server", web::post().to(ping_handler))
            .default_service(web::route().to(invalid_endpoint_handler)),
    );
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("missing query arguments")]
    MissingArguments,
    #[error("no such endpoint")]
    InvalidEndpoint,
    #[error(transparent)]
    Aggregation(#[from] AggregationError),
}

impl ApiError {
    /// Message constant sent to the client.
    pub fn message(&self) -> &'static str {
        match self {
            ApiError::MissingArguments => messages::MISSING_ARGUMENTS,
            ApiError::InvalidEndpoint => messages::INVALID_ENDPOINT,
            ApiError::Aggregation(err) => err.message(),
        }
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::MissingArguments => StatusCode::BAD_REQUEST,
            ApiError::InvalidEndpoint => StatusCode::NOT_FOUND,
            ApiError::Aggregation(err) => match err {
                AggregationError::ChainNotFound(_) => StatusCode::NOT_FOUND,
                AggregationError::StoreNotConfigured => StatusCode::SERVICE_UNAVAILABLE,
                AggregationError::StoreAuth(_) | AggregationError::StoreConnection(_) => {
                    StatusCode::BAD_GATEWAY
                }
                AggregationError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(ErrorBody {
            error: self.message().to_string(),
        })
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

#[derive(Debug, Serialize)]
pub struct ResultBody<T> {
    pub result: T,
}

pub(crate) fn result<T: Serialize>(payload: T) -> HttpResponse {
    HttpResponse::Ok().json(ResultBody { result: payload })
}
