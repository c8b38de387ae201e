pub mod health;
pub mod tools;
pub mod turn;

use crate::state::AppState;
use axum::Router;

pub fn configure(state: AppState) -> Router {
    Router::new()
        .merge(turn::routes(state.clone()))
        .merge(tools::routes(state))
        .merge(health::routes())
}
