use crate::{AppState, handlers, require_admin, storage::MAX_UPLOAD_BYTES};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
};

/// Upload bodies may exceed the image limit so that an oversize file reaches the
/// handler and is rejected with a 400 rather than cut off by the transport.
const UPLOAD_BODY_LIMIT: usize = 2 * MAX_UPLOAD_BYTES;

/// Admin Router Module
///
/// Every route registered before `route_layer` passes through `require_admin`, which
/// rejects requests without a valid bearer token before the handler (or any body
/// extractor) runs. `/login` is added afterwards and stays reachable anonymously.
pub fn admin_routes(state: AppState) -> Router<AppState> {
    Router::new()
        // POST /upload (multipart, field `file`)
        .route(
            "/upload",
            post(handlers::upload_image).layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT)),
        )
        // --- Categories ---
        .route(
            "/categories",
            get(handlers::admin_list_categories).post(handlers::admin_create_category),
        )
        .route(
            "/categories/{id}",
            get(handlers::admin_get_category)
                .put(handlers::admin_update_category)
                .delete(handlers::admin_delete_category),
        )
        // --- Menu Items ---
        // The admin listing includes unavailable items.
        .route(
            "/menu/items",
            get(handlers::admin_list_menu_items).post(handlers::admin_create_menu_item),
        )
        .route(
            "/menu/items/{id}",
            get(handlers::admin_get_menu_item)
                .put(handlers::admin_update_menu_item)
                .delete(handlers::admin_delete_menu_item),
        )
        // --- Banners ---
        // The admin listing includes inactive banners.
        .route(
            "/banners",
            get(handlers::admin_list_banners).post(handlers::admin_create_banner),
        )
        .route(
            "/banners/{id}",
            get(handlers::admin_get_banner)
                .put(handlers::admin_update_banner)
                .delete(handlers::admin_delete_banner),
        )
        // --- Reservations (read-only) ---
        .route("/reservations", get(handlers::admin_list_reservations))
        .route_layer(middleware::from_fn_with_state(state, require_admin))
        // POST /login
        // Ungated: this is where tokens come from.
        .route("/login", post(handlers::admin_login))
}
