use actix_web::{web, HttpResponse};

use crate::state::AppState;

use super::result;

pub async fn repos_handler(state: web::Data<AppState>) -> HttpResponse {
    let topology = state.topology().load();
    result(topology.repo_names())
}
