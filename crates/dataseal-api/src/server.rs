use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::handlers;
use crate::state::AppState;

/// Create the API application router
pub fn create_app(state: AppState) -> Router {
    Router::new()
        // Health and info
        .route("/health", get(handlers::health))
        .route("/v1/info", get(handlers::info))
        .route("/v1/status", get(handlers::get_status))

        // Accounts (devnet funding)
        .route("/v1/accounts/deposit", post(handlers::deposit))
        .route("/v1/accounts/:account/balance", get(handlers::get_balance))

        // Markets
        .route("/v1/markets", post(handlers::register_market))
        .route("/v1/markets/:market/tasks", get(handlers::list_market_tasks))

        // Task lifecycle
        .route("/v1/tasks/commit", post(handlers::commit_task))
        .route("/v1/tasks/:task_id", get(handlers::get_task))
        .route("/v1/tasks/:task_id/reveal", post(handlers::reveal_task))
        .route("/v1/tasks/:task_id/buyer-funds", post(handlers::lock_buyer_funds))
        .route("/v1/tasks/:task_id/verifications", post(handlers::submit_verification))
        .route("/v1/tasks/:task_id/settle", post(handlers::settle_task))
        .route("/v1/tasks/:task_id/dispute", post(handlers::initiate_dispute))
        .route("/v1/tasks/:task_id/resolve", post(handlers::resolve_dispute))
        .route("/v1/tasks/:task_id/cancel", post(handlers::cancel_expired))
        .route("/v1/tasks/:task_id/emergency-finalize", post(handlers::emergency_finalize))
        .route("/v1/tasks/:task_id/time-remaining", get(handlers::get_time_remaining))
        .route("/v1/tasks/:task_id/consensus", get(handlers::get_consensus))
        .route("/v1/tasks/:task_id/escrow", get(handlers::get_escrow))
        .route("/v1/providers/:provider/tasks", get(handlers::list_provider_tasks))

        // Oracles
        .route("/v1/oracles", get(handlers::list_active_oracles))
        .route("/v1/oracles/register", post(handlers::register_oracle))
        .route("/v1/oracles/stake", post(handlers::increase_oracle_stake))
        .route("/v1/oracles/deactivate", post(handlers::deactivate_oracle))
        .route("/v1/oracles/slash", post(handlers::slash_oracle))
        .route("/v1/oracles/:oracle", get(handlers::get_oracle))

        // Event polling
        .route("/v1/events", get(handlers::list_events))

        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
