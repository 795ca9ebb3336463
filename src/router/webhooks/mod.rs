//! Signed notifications from the payment processor and the
//! authentication provider.

mod clerk;
mod paypal;

use axum::Router;
use axum::routing::post;

use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/paypal", post(paypal::handler))
        .route("/clerk", post(clerk::handler))
}
