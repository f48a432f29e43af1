use actix_web::{web, HttpResponse};
use panic_dashboard_domain::snapshot::build_snapshot;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::state::AppState;

use super::{result, ApiError};

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct ChainQuery {
    #[serde(rename = "chainName")]
    pub chain_name: Option<String>,
}

pub async fn all_chain_info_handler(
    state: web::Data<AppState>,
    query: web::Query<ChainQuery>,
) -> Result<HttpResponse, ApiError> {
    let chain_name = query
        .into_inner()
        .chain_name
        .filter(|name| !name.is_empty())
        .ok_or(ApiError::MissingArguments)?;

    // One snapshot for the whole request, even if a reload lands meanwhile.
    let topology = state.topology().load();
    let snapshot = build_snapshot(state.store(), &chain_name, &topology)
        .await
        .map_err(|err| {
            warn!(chain = %chain_name, %err, "chain snapshot failed");
            ApiError::from(err)
        })?;
    Ok(result(snapshot))
}
