use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// Unauthenticated endpoints. Listings here only ever expose what visitors may see:
/// available menu items and active banners.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // Liveness check for monitoring and load balancers.
        .route("/health", get(handlers::health))
        // GET /menu/categories
        .route("/menu/categories", get(handlers::list_categories))
        // GET /menu/items?category_id=...
        // Unavailable items are filtered out in the repository query.
        .route("/menu/items", get(handlers::list_menu_items))
        // POST /reservations
        // Validated before any write; new bookings are stored as `pending`.
        .route("/reservations", post(handlers::create_reservation))
        // POST /contact
        .route("/contact", post(handlers::create_contact))
        // GET /banners
        // Active banners only.
        .route("/banners", get(handlers::list_banners))
}
