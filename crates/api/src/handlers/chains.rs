use actix_web::{web, HttpResponse};
use panic_dashboard_domain::model::to_bool;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::state::AppState;

use super::result;

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct MonitoredQuery {
    #[serde(rename = "onlyIfMonitored")]
    pub only_if_monitored: Option<String>,
}

impl MonitoredQuery {
    fn only_monitored(&self) -> bool {
        self.only_if_monitored.as_deref().is_some_and(to_bool)
    }
}

pub async fn chains_handler(
    state: web::Data<AppState>,
    query: web::Query<MonitoredQuery>,
) -> HttpResponse {
    let topology = state.topology().load();
    let only_monitored = query.only_monitored();
    debug!(only_monitored, "listing chains");

    if only_monitored {
        return result(topology.monitored_chains_considering_nodes());
    }
    result(topology.chain_nodes().keys().collect::<Vec<_>>())
}

pub async fn chain_nodes_map_handler(
    state: web::Data<AppState>,
    query: web::Query<MonitoredQuery>,
) -> HttpResponse {
    let topology = state.topology().load();
    if query.only_monitored() {
        return result(topology.monitored_nodes());
    }
    result(topology.chain_nodes())
}
