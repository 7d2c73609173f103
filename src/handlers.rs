use crate::{
    AppState,
    auth::{AdminPrincipal, CredentialService},
    error::{ApiError, ErrorBody},
    models::{
        AdminLogin, Banner, BannerCreate, BannerUpdate, Category, CategoryCreate, CategoryUpdate,
        ContactCreate, ContactResponse, DeleteResponse, HealthResponse, MenuItem, MenuItemCreate,
        MenuItemUpdate, Reservation, ReservationCreate, ReservationResponse, Token, UploadResponse,
    },
    repository::MenuItemFilter,
    storage::{MAX_UPLOAD_BYTES, allowed_extension, generate_upload_name, upload_url},
};
use axum::{
    Json,
    extract::{
        FromRequest, FromRequestParts, Multipart, Path, Query, Request, State,
        rejection::JsonRejection,
    },
    http::request::Parts,
};
use serde::{Deserialize, de::DeserializeOwned};
use validator::Validate;

/// Default and ceiling for the admin reservation listing.
const DEFAULT_RESERVATION_LIMIT: i64 = 100;
const MAX_RESERVATION_LIMIT: i64 = 500;

// --- Extractors ---

/// ValidatedJson
///
/// Deserializes a JSON body and runs its `Validate` rules before the handler sees it.
/// Malformed JSON, missing fields and rule violations all surface as `ValidationError`,
/// so nothing reaches the repository unless the payload is acceptable.
pub struct ValidatedJson<T>(pub T);

impl<S, T> FromRequest<S> for ValidatedJson<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Validate,
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| ApiError::Validation(rejection.body_text()))?;
        value.validate()?;
        Ok(ValidatedJson(value))
    }
}

/// ApiPath
///
/// `Path` whose rejection is an `ApiError`, so a malformed id gets the JSON error body.
pub struct ApiPath<T>(pub T);

impl<S, T> FromRequestParts<S> for ApiPath<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Send,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(value) = Path::<T>::from_request_parts(parts, state).await?;
        Ok(ApiPath(value))
    }
}

/// `Query` counterpart of `ApiPath`.
pub struct ApiQuery<T>(pub T);

impl<S, T> FromRequestParts<S> for ApiQuery<T>
where
    S: Send + Sync,
    T: DeserializeOwned,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(value) = Query::<T>::from_request_parts(parts, state).await?;
        Ok(ApiQuery(value))
    }
}

// --- Filter Structs ---

/// MenuItemQuery
///
/// Query parameters for both menu item listings (GET /menu/items, GET /admin/menu/items).
#[derive(Debug, Deserialize, utoipa::IntoParams)]
pub struct MenuItemQuery {
    /// Only items belonging to this category.
    pub category_id: Option<i64>,
}

#[derive(Debug, Deserialize, utoipa::IntoParams)]
pub struct ReservationQuery {
    /// Maximum number of reservations to return (default 100, capped at 500).
    pub limit: Option<i64>,
}

// --- Public Handlers ---

/// health
///
/// [Public Route] Liveness check; also mounted at the root.
#[utoipa::path(
    get,
    path = "/api/health",
    responses((status = 200, description = "Service is up", body = HealthResponse))
)]
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

/// list_categories
///
/// [Public Route] All menu categories ordered by (sort_order, name).
#[utoipa::path(
    get,
    path = "/api/menu/categories",
    responses((status = 200, description = "Categories", body = [Category]))
)]
pub async fn list_categories(State(state): State<AppState>) -> Result<Json<Vec<Category>>, ApiError> {
    Ok(Json(state.repo.list_categories().await?))
}

/// list_menu_items
///
/// [Public Route] Available items only; unavailable dishes never leak to the menu.
#[utoipa::path(
    get,
    path = "/api/menu/items",
    params(MenuItemQuery),
    responses((status = 200, description = "Available menu items", body = [MenuItem]))
)]
pub async fn list_menu_items(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<MenuItemQuery>,
) -> Result<Json<Vec<MenuItem>>, ApiError> {
    let filter = MenuItemFilter {
        category_id: query.category_id,
        available_only: true,
    };
    Ok(Json(state.repo.list_menu_items(filter).await?))
}

/// create_reservation
///
/// [Public Route] Books a table. The stored reservation always starts as `pending`.
#[utoipa::path(
    post,
    path = "/api/reservations",
    request_body = ReservationCreate,
    responses(
        (status = 200, description = "Reservation received", body = ReservationResponse),
        (status = 422, description = "Invalid reservation", body = ErrorBody)
    )
)]
pub async fn create_reservation(
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<ReservationCreate>,
) -> Result<Json<ReservationResponse>, ApiError> {
    let reservation = state.repo.create_reservation(payload).await?;
    tracing::info!(
        reservation_id = reservation.id,
        date = %reservation.date,
        time = %reservation.time,
        guests = reservation.guests,
        "reservation received"
    );
    Ok(Json(reservation.into()))
}

/// create_contact
///
/// [Public Route] Stores a contact-form message and echoes a summary.
#[utoipa::path(
    post,
    path = "/api/contact",
    request_body = ContactCreate,
    responses(
        (status = 200, description = "Message received", body = ContactResponse),
        (status = 422, description = "Invalid message", body = ErrorBody)
    )
)]
pub async fn create_contact(
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<ContactCreate>,
) -> Result<Json<ContactResponse>, ApiError> {
    let message = state.repo.create_contact_message(payload).await?;
    tracing::info!(message_id = message.id, "contact message received");
    Ok(Json(message.into()))
}

/// list_banners
///
/// [Public Route] Active banners only.
#[utoipa::path(
    get,
    path = "/api/banners",
    responses((status = 200, description = "Active banners", body = [Banner]))
)]
pub async fn list_banners(State(state): State<AppState>) -> Result<Json<Vec<Banner>>, ApiError> {
    Ok(Json(state.repo.list_banners(true).await?))
}

// --- Admin Handlers ---

fn invalid_credentials() -> ApiError {
    ApiError::Unauthenticated("Invalid credentials".to_string())
}

/// admin_login
///
/// [Admin Route, ungated] Exchanges username/password for a bearer token.
/// Unknown users and wrong passwords produce the same response.
#[utoipa::path(
    post,
    path = "/api/admin/login",
    request_body = AdminLogin,
    responses(
        (status = 200, description = "Token issued", body = Token),
        (status = 401, description = "Invalid credentials", body = ErrorBody)
    )
)]
pub async fn admin_login(
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<AdminLogin>,
) -> Result<Json<Token>, ApiError> {
    let admin = state.repo.get_admin_by_username(&payload.username).await?;

    // Unknown users verify against the decoy hash.
    let hash = admin.as_ref().map(|admin| admin.hashed_password.clone());
    let password = payload.password;
    let verified = tokio::task::spawn_blocking(move || {
        let hash = hash.as_deref().unwrap_or_else(|| CredentialService::decoy_hash());
        CredentialService::verify_password(&password, hash)
    })
    .await
    .map_err(|e| ApiError::Internal(format!("password check aborted: {e}")))?;

    let admin = match admin {
        Some(admin) if verified => admin,
        Some(admin) => {
            tracing::warn!(username = %admin.username, "login with wrong password");
            return Err(invalid_credentials());
        }
        None => {
            tracing::warn!(username = %payload.username, "login for unknown admin");
            return Err(invalid_credentials());
        }
    };

    let access_token = state.credentials.issue_token(&admin.username)?;
    tracing::info!(username = %admin.username, "admin logged in");

    Ok(Json(Token {
        access_token,
        token_type: "bearer".to_string(),
    }))
}

/// upload_image
///
/// [Admin Route] Accepts one multipart `file` field. The extension must be an
/// allowed image type and the content at most 5 MiB; the stored name is a fresh
/// UUID that keeps only the (lowercased) extension of the original name.
#[utoipa::path(
    post,
    path = "/api/admin/upload",
    responses(
        (status = 200, description = "Stored", body = UploadResponse),
        (status = 400, description = "Disallowed type or too large", body = ErrorBody),
        (status = 401, description = "Unauthenticated", body = ErrorBody)
    )
)]
pub async fn upload_image(
    admin: AdminPrincipal,
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    while let Some(mut field) = multipart.next_field().await? {
        if field.name() != Some("file") {
            continue;
        }

        let original = field.file_name().unwrap_or_default().to_string();
        let extension = allowed_extension(&original)
            .ok_or_else(|| ApiError::BadRequest("Allowed: jpg, jpeg, png, webp".to_string()))?;

        // Read chunk by chunk so an oversize file is rejected without buffering all of it.
        let mut content = Vec::new();
        while let Some(chunk) = field.chunk().await? {
            if content.len() + chunk.len() > MAX_UPLOAD_BYTES {
                return Err(ApiError::BadRequest("File too large (max 5 MiB)".to_string()));
            }
            content.extend_from_slice(&chunk);
        }

        let filename = generate_upload_name(&extension);
        state.storage.store(&filename, &content).await?;
        tracing::info!(
            admin = %admin.username,
            file = %filename,
            size = content.len(),
            "image uploaded"
        );

        return Ok(Json(UploadResponse {
            url: upload_url(&filename),
        }));
    }

    Err(ApiError::BadRequest("Missing multipart field 'file'".to_string()))
}

// --- Admin: Categories ---

/// admin_list_categories
///
/// [Admin Route] Same ordering as the public listing.
#[utoipa::path(
    get,
    path = "/api/admin/categories",
    responses((status = 200, description = "All categories", body = [Category]))
)]
pub async fn admin_list_categories(
    State(state): State<AppState>,
) -> Result<Json<Vec<Category>>, ApiError> {
    Ok(Json(state.repo.list_categories().await?))
}

/// admin_get_category
///
/// [Admin Route]
#[utoipa::path(
    get,
    path = "/api/admin/categories/{id}",
    params(("id" = i64, Path, description = "Category ID")),
    responses(
        (status = 200, description = "Found", body = Category),
        (status = 404, description = "Not Found", body = ErrorBody)
    )
)]
pub async fn admin_get_category(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> Result<Json<Category>, ApiError> {
    state
        .repo
        .get_category(id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Category"))
}

/// admin_create_category
///
/// [Admin Route] A duplicate slug fails with 409 Conflict.
#[utoipa::path(
    post,
    path = "/api/admin/categories",
    request_body = CategoryCreate,
    responses(
        (status = 200, description = "Created", body = Category),
        (status = 409, description = "Duplicate slug", body = ErrorBody)
    )
)]
pub async fn admin_create_category(
    admin: AdminPrincipal,
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<CategoryCreate>,
) -> Result<Json<Category>, ApiError> {
    let category = state.repo.create_category(payload).await?;
    tracing::info!(admin = %admin.username, category_id = category.id, "category created");
    Ok(Json(category))
}

/// admin_update_category
///
/// [Admin Route] Partial update. Existence is checked first because the store's
/// update-then-fetch cannot tell "no such id" from "nothing changed".
#[utoipa::path(
    put,
    path = "/api/admin/categories/{id}",
    params(("id" = i64, Path, description = "Category ID")),
    request_body = CategoryUpdate,
    responses(
        (status = 200, description = "Updated", body = Category),
        (status = 404, description = "Not Found", body = ErrorBody),
        (status = 409, description = "Duplicate slug", body = ErrorBody)
    )
)]
pub async fn admin_update_category(
    admin: AdminPrincipal,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
    ValidatedJson(payload): ValidatedJson<CategoryUpdate>,
) -> Result<Json<Category>, ApiError> {
    if state.repo.get_category(id).await?.is_none() {
        return Err(ApiError::not_found("Category"));
    }
    let category = state
        .repo
        .update_category(id, payload)
        .await?
        .ok_or_else(|| ApiError::not_found("Category"))?;
    tracing::info!(admin = %admin.username, category_id = id, "category updated");
    Ok(Json(category))
}

/// admin_delete_category
///
/// [Admin Route] Also removes every menu item in the category.
#[utoipa::path(
    delete,
    path = "/api/admin/categories/{id}",
    params(("id" = i64, Path, description = "Category ID")),
    responses(
        (status = 200, description = "Deleted", body = DeleteResponse),
        (status = 404, description = "Not Found", body = ErrorBody)
    )
)]
pub async fn admin_delete_category(
    admin: AdminPrincipal,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> Result<Json<DeleteResponse>, ApiError> {
    if state.repo.get_category(id).await?.is_none() {
        return Err(ApiError::not_found("Category"));
    }
    state.repo.delete_category(id).await?;
    tracing::info!(admin = %admin.username, category_id = id, "category deleted");
    Ok(Json(DeleteResponse { ok: true }))
}

// --- Admin: Menu Items ---

/// admin_list_menu_items
///
/// [Admin Route] Includes unavailable items.
#[utoipa::path(
    get,
    path = "/api/admin/menu/items",
    params(MenuItemQuery),
    responses((status = 200, description = "All menu items", body = [MenuItem]))
)]
pub async fn admin_list_menu_items(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<MenuItemQuery>,
) -> Result<Json<Vec<MenuItem>>, ApiError> {
    let filter = MenuItemFilter {
        category_id: query.category_id,
        available_only: false,
    };
    Ok(Json(state.repo.list_menu_items(filter).await?))
}

/// admin_get_menu_item
///
/// [Admin Route] Returns the item whether or not it is available.
#[utoipa::path(
    get,
    path = "/api/admin/menu/items/{id}",
    params(("id" = i64, Path, description = "Menu item ID")),
    responses(
        (status = 200, description = "Found", body = MenuItem),
        (status = 404, description = "Not Found", body = ErrorBody)
    )
)]
pub async fn admin_get_menu_item(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> Result<Json<MenuItem>, ApiError> {
    state
        .repo
        .get_menu_item(id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Menu item"))
}

/// admin_create_menu_item
///
/// [Admin Route] An unknown `category_id` is rejected as a validation error.
#[utoipa::path(
    post,
    path = "/api/admin/menu/items",
    request_body = MenuItemCreate,
    responses(
        (status = 200, description = "Created", body = MenuItem),
        (status = 422, description = "Invalid item or unknown category", body = ErrorBody)
    )
)]
pub async fn admin_create_menu_item(
    admin: AdminPrincipal,
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<MenuItemCreate>,
) -> Result<Json<MenuItem>, ApiError> {
    let item = state.repo.create_menu_item(payload).await?;
    tracing::info!(admin = %admin.username, item_id = item.id, "menu item created");
    Ok(Json(item))
}

/// admin_update_menu_item
///
/// [Admin Route] Partial update; moving to an unknown category is rejected.
#[utoipa::path(
    put,
    path = "/api/admin/menu/items/{id}",
    params(("id" = i64, Path, description = "Menu item ID")),
    request_body = MenuItemUpdate,
    responses(
        (status = 200, description = "Updated", body = MenuItem),
        (status = 404, description = "Not Found", body = ErrorBody)
    )
)]
pub async fn admin_update_menu_item(
    admin: AdminPrincipal,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
    ValidatedJson(payload): ValidatedJson<MenuItemUpdate>,
) -> Result<Json<MenuItem>, ApiError> {
    if state.repo.get_menu_item(id).await?.is_none() {
        return Err(ApiError::not_found("Menu item"));
    }
    let item = state
        .repo
        .update_menu_item(id, payload)
        .await?
        .ok_or_else(|| ApiError::not_found("Menu item"))?;
    tracing::info!(admin = %admin.username, item_id = id, "menu item updated");
    Ok(Json(item))
}

/// admin_delete_menu_item
///
/// [Admin Route]
#[utoipa::path(
    delete,
    path = "/api/admin/menu/items/{id}",
    params(("id" = i64, Path, description = "Menu item ID")),
    responses(
        (status = 200, description = "Deleted", body = DeleteResponse),
        (status = 404, description = "Not Found", body = ErrorBody)
    )
)]
pub async fn admin_delete_menu_item(
    admin: AdminPrincipal,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> Result<Json<DeleteResponse>, ApiError> {
    if state.repo.get_menu_item(id).await?.is_none() {
        return Err(ApiError::not_found("Menu item"));
    }
    state.repo.delete_menu_item(id).await?;
    tracing::info!(admin = %admin.username, item_id = id, "menu item deleted");
    Ok(Json(DeleteResponse { ok: true }))
}

// --- Admin: Banners ---

/// admin_list_banners
///
/// [Admin Route] Includes inactive banners.
#[utoipa::path(
    get,
    path = "/api/admin/banners",
    responses((status = 200, description = "All banners", body = [Banner]))
)]
pub async fn admin_list_banners(State(state): State<AppState>) -> Result<Json<Vec<Banner>>, ApiError> {
    Ok(Json(state.repo.list_banners(false).await?))
}

/// admin_get_banner
///
/// [Admin Route] Inactive banners are visible here.
#[utoipa::path(
    get,
    path = "/api/admin/banners/{id}",
    params(("id" = i64, Path, description = "Banner ID")),
    responses(
        (status = 200, description = "Found", body = Banner),
        (status = 404, description = "Not Found", body = ErrorBody)
    )
)]
pub async fn admin_get_banner(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> Result<Json<Banner>, ApiError> {
    state
        .repo
        .get_banner(id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Banner"))
}

/// admin_create_banner
///
/// [Admin Route] New banners are active unless `is_active` is false.
#[utoipa::path(
    post,
    path = "/api/admin/banners",
    request_body = BannerCreate,
    responses((status = 200, description = "Created", body = Banner))
)]
pub async fn admin_create_banner(
    admin: AdminPrincipal,
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<BannerCreate>,
) -> Result<Json<Banner>, ApiError> {
    let banner = state.repo.create_banner(payload).await?;
    tracing::info!(admin = %admin.username, banner_id = banner.id, "banner created");
    Ok(Json(banner))
}

/// admin_update_banner
///
/// [Admin Route] Partial update; `null` clears the optional texts and links.
#[utoipa::path(
    put,
    path = "/api/admin/banners/{id}",
    params(("id" = i64, Path, description = "Banner ID")),
    request_body = BannerUpdate,
    responses(
        (status = 200, description = "Updated", body = Banner),
        (status = 404, description = "Not Found", body = ErrorBody)
    )
)]
pub async fn admin_update_banner(
    admin: AdminPrincipal,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
    ValidatedJson(payload): ValidatedJson<BannerUpdate>,
) -> Result<Json<Banner>, ApiError> {
    if state.repo.get_banner(id).await?.is_none() {
        return Err(ApiError::not_found("Banner"));
    }
    let banner = state
        .repo
        .update_banner(id, payload)
        .await?
        .ok_or_else(|| ApiError::not_found("Banner"))?;
    tracing::info!(admin = %admin.username, banner_id = id, "banner updated");
    Ok(Json(banner))
}

/// admin_delete_banner
///
/// [Admin Route]
#[utoipa::path(
    delete,
    path = "/api/admin/banners/{id}",
    params(("id" = i64, Path, description = "Banner ID")),
    responses(
        (status = 200, description = "Deleted", body = DeleteResponse),
        (status = 404, description = "Not Found", body = ErrorBody)
    )
)]
pub async fn admin_delete_banner(
    admin: AdminPrincipal,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> Result<Json<DeleteResponse>, ApiError> {
    if state.repo.get_banner(id).await?.is_none() {
        return Err(ApiError::not_found("Banner"));
    }
    state.repo.delete_banner(id).await?;
    tracing::info!(admin = %admin.username, banner_id = id, "banner deleted");
    Ok(Json(DeleteResponse { ok: true }))
}

// --- Admin: Reservations ---

/// admin_list_reservations
///
/// [Admin Route] Newest bookings first.
#[utoipa::path(
    get,
    path = "/api/admin/reservations",
    params(ReservationQuery),
    responses((status = 200, description = "Reservations", body = [Reservation]))
)]
pub async fn admin_list_reservations(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<ReservationQuery>,
) -> Result<Json<Vec<Reservation>>, ApiError> {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_RESERVATION_LIMIT)
        .clamp(1, MAX_RESERVATION_LIMIT);
    Ok(Json(state.repo.list_reservations(limit).await?))
}
