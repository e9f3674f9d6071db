mod auth;
mod error;
mod routes;

pub use error::ApiError;

use axum::{Router, middleware, routing::get};

use crate::state::AgentState;

/// Builds the agent's HTTP router: every route but `/health` goes through
/// the authentication middleware (shared-token check, plus HMAC signature
/// verification when the agent is configured with a skew window).
pub fn app(state: AgentState) -> Router {
  let authenticated = Router::new()
    .route("/execute", axum::routing::post(routes::execute))
    .route("/queries", axum::routing::post(routes::submit_query))
    .route(
      "/queries/{id}",
      get(routes::get_query_status).delete(routes::delete_query),
    )
    .route("/queries/{id}/results", get(routes::fetch_query_results))
    .route("/queries/{id}/cancel", axum::routing::post(routes::cancel_query))
    .layer(middleware::from_fn_with_state(state.clone(), auth::authenticate))
    .with_state(state.clone());

  Router::new()
    .route("/health", get(routes::health))
    .with_state(state.clone())
    .merge(authenticated)
    .layer(tower_http::trace::TraceLayer::new_for_http())
}
