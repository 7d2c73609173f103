#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode, header},
    response::Response,
};
use chrono::{Duration, Utc};
use keny_cafe::{
    AppConfig, AppState, CredentialService, MockStorageService, create_router,
    models::{
        AdminUser, Banner, BannerCreate, BannerUpdate, Category, CategoryCreate, CategoryUpdate,
        ContactCreate, ContactMessage, MenuItem, MenuItemCreate, MenuItemUpdate, Patch,
        Reservation, ReservationCreate, ReservationStatus,
    },
    repository::{MenuItemFilter, RepoResult, Repository, RepositoryError},
};
use serde::{Serialize, de::DeserializeOwned};
use std::sync::{Arc, Mutex};
use tower::ServiceExt;

pub const TEST_SECRET: &str = "keny-cafe-test-secret";
pub const ADMIN_USERNAME: &str = "admin";
pub const ADMIN_PASSWORD: &str = "admin123";

// --- In-Memory Repository ---

#[derive(Default)]
struct Tables {
    next_id: i64,
    categories: Vec<Category>,
    menu_items: Vec<MenuItem>,
    reservations: Vec<Reservation>,
    contact_messages: Vec<ContactMessage>,
    banners: Vec<Banner>,
    admins: Vec<AdminUser>,
}

impl Tables {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn slug_taken(&self, slug: &str, except: Option<i64>) -> bool {
        self.categories
            .iter()
            .any(|c| c.slug == slug && Some(c.id) != except)
    }

    fn category_exists(&self, id: i64) -> bool {
        self.categories.iter().any(|c| c.id == id)
    }
}

/// Mirrors the Postgres store's observable rules: unique slugs, the category
/// foreign key, cascade on category delete, ordering and patch semantics.
#[derive(Default)]
pub struct InMemoryRepository {
    tables: Mutex<Tables>,
    /// When true, every call fails like an unreachable database.
    pub broken: bool,
}

fn slug_conflict() -> RepositoryError {
    RepositoryError::Conflict("A category with this slug already exists".to_string())
}

fn unknown_category() -> RepositoryError {
    RepositoryError::InvalidReference(
        "category_id does not reference an existing category".to_string(),
    )
}

fn set<T: Clone>(target: &mut T, patch: &Patch<T>) {
    if let Patch::Set(value) = patch {
        *target = value.clone();
    }
}

fn set_optional<T: Clone>(target: &mut Option<T>, patch: &Patch<T>) {
    if let Some(change) = patch.as_change() {
        *target = change.cloned();
    }
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn broken() -> Self {
        Self {
            broken: true,
            ..Self::default()
        }
    }

    /// Seeds an admin with a cheap bcrypt cost to keep the suite fast.
    pub fn with_admin(self, username: &str, password: &str) -> Self {
        let hashed_password = bcrypt::hash(password, 4).expect("hash test password");
        {
            let mut tables = self.tables.lock().unwrap();
            let id = tables.next_id();
            tables.admins.push(AdminUser {
                id,
                username: username.to_string(),
                hashed_password,
                created_at: Utc::now(),
            });
        }
        self
    }

    pub fn menu_item_count(&self) -> usize {
        self.tables.lock().unwrap().menu_items.len()
    }

    pub fn reservations(&self) -> Vec<Reservation> {
        self.tables.lock().unwrap().reservations.clone()
    }

    pub fn contact_messages(&self) -> Vec<ContactMessage> {
        self.tables.lock().unwrap().contact_messages.clone()
    }

    fn check(&self) -> RepoResult<()> {
        if self.broken {
            return Err(RepositoryError::Database(sqlx::Error::PoolTimedOut));
        }
        Ok(())
    }
}

#[async_trait]
impl Repository for InMemoryRepository {
    async fn list_categories(&self) -> RepoResult<Vec<Category>> {
        self.check()?;
        let mut categories = self.tables.lock().unwrap().categories.clone();
        categories.sort_by(|a, b| {
            (a.sort_order, &a.name, a.id).cmp(&(b.sort_order, &b.name, b.id))
        });
        Ok(categories)
    }

    async fn get_category(&self, id: i64) -> RepoResult<Option<Category>> {
        self.check()?;
        let tables = self.tables.lock().unwrap();
        Ok(tables.categories.iter().find(|c| c.id == id).cloned())
    }

    async fn create_category(&self, data: CategoryCreate) -> RepoResult<Category> {
        self.check()?;
        let mut tables = self.tables.lock().unwrap();
        if tables.slug_taken(&data.slug, None) {
            return Err(slug_conflict());
        }
        let category = Category {
            id: tables.next_id(),
            name: data.name,
            slug: data.slug,
            description: data.description,
            sort_order: data.sort_order,
            created_at: Utc::now(),
        };
        tables.categories.push(category.clone());
        Ok(category)
    }

    async fn update_category(&self, id: i64, data: CategoryUpdate) -> RepoResult<Option<Category>> {
        self.check()?;
        let mut tables = self.tables.lock().unwrap();
        if let Patch::Set(slug) = &data.slug {
            if tables.slug_taken(slug, Some(id)) {
                return Err(slug_conflict());
            }
        }
        let Some(category) = tables.categories.iter_mut().find(|c| c.id == id) else {
            return Ok(None);
        };
        set(&mut category.name, &data.name);
        set(&mut category.slug, &data.slug);
        set_optional(&mut category.description, &data.description);
        set(&mut category.sort_order, &data.sort_order);
        Ok(Some(category.clone()))
    }

    async fn delete_category(&self, id: i64) -> RepoResult<bool> {
        self.check()?;
        let mut tables = self.tables.lock().unwrap();
        let before = tables.categories.len();
        tables.categories.retain(|c| c.id != id);
        let removed = tables.categories.len() < before;
        if removed {
            tables.menu_items.retain(|item| item.category_id != id);
        }
        Ok(removed)
    }

    async fn list_menu_items(&self, filter: MenuItemFilter) -> RepoResult<Vec<MenuItem>> {
        self.check()?;
        let mut items: Vec<MenuItem> = self
            .tables
            .lock()
            .unwrap()
            .menu_items
            .iter()
            .filter(|item| !filter.available_only || item.is_available)
            .filter(|item| filter.category_id.is_none_or(|id| item.category_id == id))
            .cloned()
            .collect();
        items.sort_by(|a, b| (a.sort_order, &a.name, a.id).cmp(&(b.sort_order, &b.name, b.id)));
        Ok(items)
    }

    async fn get_menu_item(&self, id: i64) -> RepoResult<Option<MenuItem>> {
        self.check()?;
        let tables = self.tables.lock().unwrap();
        Ok(tables.menu_items.iter().find(|i| i.id == id).cloned())
    }

    async fn create_menu_item(&self, data: MenuItemCreate) -> RepoResult<MenuItem> {
        self.check()?;
        let mut tables = self.tables.lock().unwrap();
        if !tables.category_exists(data.category_id) {
            return Err(unknown_category());
        }
        let item = MenuItem {
            id: tables.next_id(),
            category_id: data.category_id,
            name: data.name,
            description: data.description,
            price: data.price,
            image_url: data.image_url,
            is_available: data.is_available,
            sort_order: data.sort_order,
            created_at: Utc::now(),
        };
        tables.menu_items.push(item.clone());
        Ok(item)
    }

    async fn update_menu_item(&self, id: i64, data: MenuItemUpdate) -> RepoResult<Option<MenuItem>> {
        self.check()?;
        let mut tables = self.tables.lock().unwrap();
        if let Patch::Set(category_id) = data.category_id {
            if !tables.category_exists(category_id) {
                return Err(unknown_category());
            }
        }
        let Some(item) = tables.menu_items.iter_mut().find(|i| i.id == id) else {
            return Ok(None);
        };
        set(&mut item.category_id, &data.category_id);
        set(&mut item.name, &data.name);
        set_optional(&mut item.description, &data.description);
        set(&mut item.price, &data.price);
        set_optional(&mut item.image_url, &data.image_url);
        set(&mut item.is_available, &data.is_available);
        set(&mut item.sort_order, &data.sort_order);
        Ok(Some(item.clone()))
    }

    async fn delete_menu_item(&self, id: i64) -> RepoResult<bool> {
        self.check()?;
        let mut tables = self.tables.lock().unwrap();
        let before = tables.menu_items.len();
        tables.menu_items.retain(|i| i.id != id);
        Ok(tables.menu_items.len() < before)
    }

    async fn create_reservation(&self, data: ReservationCreate) -> RepoResult<Reservation> {
        self.check()?;
        let mut tables = self.tables.lock().unwrap();
        let reservation = Reservation {
            id: tables.next_id(),
            name: data.name,
            phone: data.phone,
            email: data.email,
            date: data.date,
            time: data.time,
            guests: data.guests,
            comment: data.comment,
            status: ReservationStatus::Pending,
            created_at: Utc::now(),
        };
        tables.reservations.push(reservation.clone());
        Ok(reservation)
    }

    async fn list_reservations(&self, limit: i64) -> RepoResult<Vec<Reservation>> {
        self.check()?;
        let mut reservations = self.tables.lock().unwrap().reservations.clone();
        reservations.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
        reservations.truncate(limit.max(0) as usize);
        Ok(reservations)
    }

    async fn create_contact_message(&self, data: ContactCreate) -> RepoResult<ContactMessage> {
        self.check()?;
        let mut tables = self.tables.lock().unwrap();
        let message = ContactMessage {
            id: tables.next_id(),
            name: data.name,
            email: data.email,
            phone: data.phone,
            message: data.message,
            created_at: Utc::now(),
        };
        tables.contact_messages.push(message.clone());
        Ok(message)
    }

    async fn list_banners(&self, active_only: bool) -> RepoResult<Vec<Banner>> {
        self.check()?;
        let mut banners: Vec<Banner> = self
            .tables
            .lock()
            .unwrap()
            .banners
            .iter()
            .filter(|b| !active_only || b.is_active)
            .cloned()
            .collect();
        banners.sort_by(|a, b| (a.sort_order, &a.title, a.id).cmp(&(b.sort_order, &b.title, b.id)));
        Ok(banners)
    }

    async fn get_banner(&self, id: i64) -> RepoResult<Option<Banner>> {
        self.check()?;
        let tables = self.tables.lock().unwrap();
        Ok(tables.banners.iter().find(|b| b.id == id).cloned())
    }

    async fn create_banner(&self, data: BannerCreate) -> RepoResult<Banner> {
        self.check()?;
        let mut tables = self.tables.lock().unwrap();
        let banner = Banner {
            id: tables.next_id(),
            title: data.title,
            discount_text: data.discount_text,
            description: data.description,
            image_url: data.image_url,
            link: data.link,
            is_active: data.is_active,
            sort_order: data.sort_order,
            created_at: Utc::now(),
        };
        tables.banners.push(banner.clone());
        Ok(banner)
    }

    async fn update_banner(&self, id: i64, data: BannerUpdate) -> RepoResult<Option<Banner>> {
        self.check()?;
        let mut tables = self.tables.lock().unwrap();
        let Some(banner) = tables.banners.iter_mut().find(|b| b.id == id) else {
            return Ok(None);
        };
        set(&mut banner.title, &data.title);
        set_optional(&mut banner.discount_text, &data.discount_text);
        set_optional(&mut banner.description, &data.description);
        set_optional(&mut banner.image_url, &data.image_url);
        set_optional(&mut banner.link, &data.link);
        set(&mut banner.is_active, &data.is_active);
        set(&mut banner.sort_order, &data.sort_order);
        Ok(Some(banner.clone()))
    }

    async fn delete_banner(&self, id: i64) -> RepoResult<bool> {
        self.check()?;
        let mut tables = self.tables.lock().unwrap();
        let before = tables.banners.len();
        tables.banners.retain(|b| b.id != id);
        Ok(tables.banners.len() < before)
    }

    async fn get_admin_by_username(&self, username: &str) -> RepoResult<Option<AdminUser>> {
        self.check()?;
        let tables = self.tables.lock().unwrap();
        Ok(tables.admins.iter().find(|a| a.username == username).cloned())
    }
}

// --- App Harness ---

pub fn test_config() -> AppConfig {
    AppConfig {
        jwt_secret: TEST_SECRET.to_string(),
        uploads_dir: std::env::temp_dir().join("keny-cafe-test-uploads"),
        ..AppConfig::default()
    }
}

pub struct TestApp {
    pub router: Router,
    pub repo: Arc<InMemoryRepository>,
    pub storage: MockStorageService,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with(
            InMemoryRepository::new().with_admin(ADMIN_USERNAME, ADMIN_PASSWORD),
            MockStorageService::new(),
        )
    }

    pub fn with(repo: InMemoryRepository, storage: MockStorageService) -> Self {
        let repo = Arc::new(repo);
        let state = AppState::new(repo.clone(), Arc::new(storage.clone()), test_config());
        Self {
            router: create_router(state),
            repo,
            storage,
        }
    }

    pub async fn send(&self, request: Request<Body>) -> Response {
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible")
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> Response {
        self.send(request("GET", uri, token, Body::empty())).await
    }

    pub async fn delete(&self, uri: &str, token: Option<&str>) -> Response {
        self.send(request("DELETE", uri, token, Body::empty())).await
    }

    pub async fn post_json<T: Serialize>(&self, uri: &str, token: Option<&str>, body: &T) -> Response {
        self.send(json_request("POST", uri, token, body)).await
    }

    pub async fn put_json<T: Serialize>(&self, uri: &str, token: Option<&str>, body: &T) -> Response {
        self.send(json_request("PUT", uri, token, body)).await
    }
}

pub fn credentials(secret: &str, ttl: Duration) -> CredentialService {
    CredentialService::new(secret, ttl)
}

/// A valid token for the seeded admin, signed with the test secret.
pub fn admin_token() -> String {
    credentials(TEST_SECRET, Duration::minutes(60))
        .issue_token(ADMIN_USERNAME)
        .expect("issue token")
}

pub fn request(method: &str, uri: &str, token: Option<&str>, body: Body) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(body).expect("valid request")
}

pub fn json_request<T: Serialize>(
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: &T,
) -> Request<Body> {
    let mut request = request(
        method,
        uri,
        token,
        Body::from(serde_json::to_vec(body).expect("serialize body")),
    );
    request.headers_mut().insert(
        header::CONTENT_TYPE,
        header::HeaderValue::from_static("application/json"),
    );
    request
}

/// A multipart body with a single `file` part.
pub fn multipart_upload(token: Option<&str>, filename: &str, content: &[u8]) -> Request<Body> {
    const BOUNDARY: &str = "keny-cafe-test-boundary";
    let mut body = Vec::with_capacity(content.len() + 256);
    body.extend_from_slice(
        format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\n\
             Content-Type: application/octet-stream\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(content);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

    let mut request = request("POST", "/api/admin/upload", token, Body::from(body));
    request.headers_mut().insert(
        header::CONTENT_TYPE,
        header::HeaderValue::from_str(&format!("multipart/form-data; boundary={BOUNDARY}"))
            .expect("valid content type"),
    );
    request
}

pub async fn read_json<T: DeserializeOwned>(response: Response) -> T {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read body");
    serde_json::from_slice(&bytes).unwrap_or_else(|e| {
        panic!(
            "body is not the expected JSON ({e}): {}",
            String::from_utf8_lossy(&bytes)
        )
    })
}

/// Asserts the status and returns the decoded body.
pub async fn expect_json<T: DeserializeOwned>(response: Response, status: StatusCode) -> T {
    assert_eq!(response.status(), status);
    read_json(response).await
}
