use crate::models::{
    AdminUser, Banner, BannerCreate, BannerUpdate, Category, CategoryCreate, CategoryUpdate,
    ContactCreate, ContactMessage, MenuItem, MenuItemCreate, MenuItemUpdate, Patch, Reservation,
    ReservationCreate, ReservationStatus,
};
use async_trait::async_trait;
use sqlx::{Encode, PgPool, Postgres, Type, query_builder::QueryBuilder};
use std::sync::Arc;
use thiserror::Error;

const CATEGORY_COLUMNS: &str = "id, name, slug, description, sort_order, created_at";
const MENU_ITEM_COLUMNS: &str =
    "id, category_id, name, description, price, image_url, is_available, sort_order, created_at";
const RESERVATION_COLUMNS: &str =
    "id, name, phone, email, date, time, guests, comment, status, created_at";
const CONTACT_COLUMNS: &str = "id, name, email, phone, message, created_at";
const BANNER_COLUMNS: &str =
    "id, title, discount_text, description, image_url, link, is_active, sort_order, created_at";

/// RepositoryError
///
/// Store failures the handlers need to tell apart. Constraint violations are
/// classified here so callers never inspect driver errors themselves.
#[derive(Error, Debug)]
pub enum RepositoryError {
    /// A uniqueness constraint rejected the write (e.g. duplicate category slug).
    #[error("{0}")]
    Conflict(String),
    /// A foreign key pointed at a row that does not exist.
    #[error("{0}")]
    InvalidReference(String),
    #[error("database error: {0}")]
    Database(#[source] sqlx::Error),
}

impl From<sqlx::Error> for RepositoryError {
    fn from(e: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db) = &e {
            if db.is_unique_violation() {
                let detail = match db.constraint() {
                    Some("categories_slug_key") => "A category with this slug already exists",
                    Some("admin_users_username_key") => "An admin with this username already exists",
                    _ => "Resource already exists",
                };
                return RepositoryError::Conflict(detail.to_string());
            }
            if db.is_foreign_key_violation() {
                return RepositoryError::InvalidReference(
                    "category_id does not reference an existing category".to_string(),
                );
            }
        }
        RepositoryError::Database(e)
    }
}

pub type RepoResult<T> = Result<T, RepositoryError>;

/// MenuItemFilter
///
/// `available_only` is true on the public surface and false for admins.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MenuItemFilter {
    pub category_id: Option<i64>,
    pub available_only: bool,
}

/// Repository Trait
///
/// The abstract contract for all persistence operations, so handlers never know
/// which store backs them (Postgres in production, an in-memory mock in tests).
///
/// Lookups signal "not found" with `None`; deletes are idempotent and report
/// whether a row existed. Updates only touch the fields a `Patch` marks as present.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Categories ---
    // Ordered by (sort_order, name). Never filtered.
    async fn list_categories(&self) -> RepoResult<Vec<Category>>;
    async fn get_category(&self, id: i64) -> RepoResult<Option<Category>>;
    async fn create_category(&self, data: CategoryCreate) -> RepoResult<Category>;
    async fn update_category(&self, id: i64, data: CategoryUpdate) -> RepoResult<Option<Category>>;
    // Cascades to the category's menu items.
    async fn delete_category(&self, id: i64) -> RepoResult<bool>;

    // --- Menu Items ---
    async fn list_menu_items(&self, filter: MenuItemFilter) -> RepoResult<Vec<MenuItem>>;
    async fn get_menu_item(&self, id: i64) -> RepoResult<Option<MenuItem>>;
    async fn create_menu_item(&self, data: MenuItemCreate) -> RepoResult<MenuItem>;
    async fn update_menu_item(&self, id: i64, data: MenuItemUpdate) -> RepoResult<Option<MenuItem>>;
    async fn delete_menu_item(&self, id: i64) -> RepoResult<bool>;

    // --- Submissions (append-only) ---
    async fn create_reservation(&self, data: ReservationCreate) -> RepoResult<Reservation>;
    // Newest first.
    async fn list_reservations(&self, limit: i64) -> RepoResult<Vec<Reservation>>;
    async fn create_contact_message(&self, data: ContactCreate) -> RepoResult<ContactMessage>;

    // --- Banners ---
    async fn list_banners(&self, active_only: bool) -> RepoResult<Vec<Banner>>;
    async fn get_banner(&self, id: i64) -> RepoResult<Option<Banner>>;
    async fn create_banner(&self, data: BannerCreate) -> RepoResult<Banner>;
    async fn update_banner(&self, id: i64, data: BannerUpdate) -> RepoResult<Option<Banner>>;
    async fn delete_banner(&self, id: i64) -> RepoResult<bool>;

    // --- Admin Principal ---
    async fn get_admin_by_username(&self, username: &str) -> RepoResult<Option<AdminUser>>;
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer across the application state.
pub type RepositoryState = Arc<dyn Repository>;

/// PostgresRepository
///
/// The concrete implementation of the `Repository` trait, backed by PostgreSQL.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    /// Creates a new repository instance using the initialized connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Appends `column = $n` to an UPDATE's SET list when the patch carries a change.
/// `Clear` binds NULL.
fn push_patch<'args, T>(
    builder: &mut QueryBuilder<'args, Postgres>,
    changed: &mut bool,
    column: &str,
    patch: &Patch<T>,
) where
    T: Clone + 'args + Encode<'args, Postgres> + Type<Postgres>,
{
    let Some(change) = patch.as_change() else {
        return;
    };
    if *changed {
        builder.push(", ");
    }
    *changed = true;
    builder.push(column).push(" = ");
    builder.push_bind(change.cloned());
}

impl PostgresRepository {
    /// Runs a dynamic partial UPDATE and re-reads the row in one transaction.
    /// A patch with no present fields skips the UPDATE and just returns the row.
    async fn apply_update<R>(
        &self,
        table: &str,
        columns: &str,
        id: i64,
        mut builder: QueryBuilder<'_, Postgres>,
        changed: bool,
    ) -> RepoResult<Option<R>>
    where
        R: for<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> + Send + Unpin,
    {
        let mut tx = self.pool.begin().await?;

        if changed {
            builder.push(" WHERE id = ").push_bind(id);
            builder.build().execute(&mut *tx).await?;
        }

        let row = sqlx::query_as::<_, R>(&format!("SELECT {columns} FROM {table} WHERE id = $1"))
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(row)
    }

    async fn delete_by_id(&self, table: &str, id: i64) -> RepoResult<bool> {
        let result = sqlx::query(&format!("DELETE FROM {table} WHERE id = $1"))
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl Repository for PostgresRepository {
    async fn list_categories(&self) -> RepoResult<Vec<Category>> {
        let sql = format!("SELECT {CATEGORY_COLUMNS} FROM categories ORDER BY sort_order, name, id");
        Ok(sqlx::query_as::<_, Category>(&sql).fetch_all(&self.pool).await?)
    }

    async fn get_category(&self, id: i64) -> RepoResult<Option<Category>> {
        let sql = format!("SELECT {CATEGORY_COLUMNS} FROM categories WHERE id = $1");
        Ok(sqlx::query_as::<_, Category>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn create_category(&self, data: CategoryCreate) -> RepoResult<Category> {
        let sql = format!(
            "INSERT INTO categories (name, slug, description, sort_order) \
             VALUES ($1, $2, $3, $4) RETURNING {CATEGORY_COLUMNS}"
        );
        Ok(sqlx::query_as::<_, Category>(&sql)
            .bind(data.name)
            .bind(data.slug)
            .bind(data.description)
            .bind(data.sort_order)
            .fetch_one(&self.pool)
            .await?)
    }

    async fn update_category(&self, id: i64, data: CategoryUpdate) -> RepoResult<Option<Category>> {
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new("UPDATE categories SET ");
        let mut changed = false;
        push_patch(&mut builder, &mut changed, "name", &data.name);
        push_patch(&mut builder, &mut changed, "slug", &data.slug);
        push_patch(&mut builder, &mut changed, "description", &data.description);
        push_patch(&mut builder, &mut changed, "sort_order", &data.sort_order);

        self.apply_update("categories", CATEGORY_COLUMNS, id, builder, changed)
            .await
    }

    async fn delete_category(&self, id: i64) -> RepoResult<bool> {
        // menu_items.category_id is declared ON DELETE CASCADE.
        self.delete_by_id("categories", id).await
    }

    /// list_menu_items
    ///
    /// Uses QueryBuilder so the optional filters stay parameterized.
    async fn list_menu_items(&self, filter: MenuItemFilter) -> RepoResult<Vec<MenuItem>> {
        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {MENU_ITEM_COLUMNS} FROM menu_items WHERE TRUE"));

        if filter.available_only {
            builder.push(" AND is_available = TRUE");
        }
        if let Some(category_id) = filter.category_id {
            builder.push(" AND category_id = ");
            builder.push_bind(category_id);
        }
        builder.push(" ORDER BY sort_order, name, id");

        Ok(builder
            .build_query_as::<MenuItem>()
            .fetch_all(&self.pool)
            .await?)
    }

    async fn get_menu_item(&self, id: i64) -> RepoResult<Option<MenuItem>> {
        let sql = format!("SELECT {MENU_ITEM_COLUMNS} FROM menu_items WHERE id = $1");
        Ok(sqlx::query_as::<_, MenuItem>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn create_menu_item(&self, data: MenuItemCreate) -> RepoResult<MenuItem> {
        let sql = format!(
            "INSERT INTO menu_items \
             (category_id, name, description, price, image_url, is_available, sort_order) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING {MENU_ITEM_COLUMNS}"
        );
        Ok(sqlx::query_as::<_, MenuItem>(&sql)
            .bind(data.category_id)
            .bind(data.name)
            .bind(data.description)
            .bind(data.price)
            .bind(data.image_url)
            .bind(data.is_available)
            .bind(data.sort_order)
            .fetch_one(&self.pool)
            .await?)
    }

    async fn update_menu_item(&self, id: i64, data: MenuItemUpdate) -> RepoResult<Option<MenuItem>> {
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new("UPDATE menu_items SET ");
        let mut changed = false;
        push_patch(&mut builder, &mut changed, "category_id", &data.category_id);
        push_patch(&mut builder, &mut changed, "name", &data.name);
        push_patch(&mut builder, &mut changed, "description", &data.description);
        push_patch(&mut builder, &mut changed, "price", &data.price);
        push_patch(&mut builder, &mut changed, "image_url", &data.image_url);
        push_patch(&mut builder, &mut changed, "is_available", &data.is_available);
        push_patch(&mut builder, &mut changed, "sort_order", &data.sort_order);

        self.apply_update("menu_items", MENU_ITEM_COLUMNS, id, builder, changed)
            .await
    }

    async fn delete_menu_item(&self, id: i64) -> RepoResult<bool> {
        self.delete_by_id("menu_items", id).await
    }

    async fn create_reservation(&self, data: ReservationCreate) -> RepoResult<Reservation> {
        let sql = format!(
            "INSERT INTO reservations (name, phone, email, date, time, guests, comment, status) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) RETURNING {RESERVATION_COLUMNS}"
        );
        Ok(sqlx::query_as::<_, Reservation>(&sql)
            .bind(data.name)
            .bind(data.phone)
            .bind(data.email)
            .bind(data.date)
            .bind(data.time)
            .bind(data.guests)
            .bind(data.comment)
            .bind(ReservationStatus::Pending.as_str())
            .fetch_one(&self.pool)
            .await?)
    }

    async fn list_reservations(&self, limit: i64) -> RepoResult<Vec<Reservation>> {
        let sql = format!(
            "SELECT {RESERVATION_COLUMNS} FROM reservations \
             ORDER BY created_at DESC, id DESC LIMIT $1"
        );
        Ok(sqlx::query_as::<_, Reservation>(&sql)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn create_contact_message(&self, data: ContactCreate) -> RepoResult<ContactMessage> {
        let sql = format!(
            "INSERT INTO contact_messages (name, email, phone, message) \
             VALUES ($1, $2, $3, $4) RETURNING {CONTACT_COLUMNS}"
        );
        Ok(sqlx::query_as::<_, ContactMessage>(&sql)
            .bind(data.name)
            .bind(data.email)
            .bind(data.phone)
            .bind(data.message)
            .fetch_one(&self.pool)
            .await?)
    }

    async fn list_banners(&self, active_only: bool) -> RepoResult<Vec<Banner>> {
        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {BANNER_COLUMNS} FROM banners"));
        if active_only {
            builder.push(" WHERE is_active = TRUE");
        }
        builder.push(" ORDER BY sort_order, title, id");

        Ok(builder
            .build_query_as::<Banner>()
            .fetch_all(&self.pool)
            .await?)
    }

    async fn get_banner(&self, id: i64) -> RepoResult<Option<Banner>> {
        let sql = format!("SELECT {BANNER_COLUMNS} FROM banners WHERE id = $1");
        Ok(sqlx::query_as::<_, Banner>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn create_banner(&self, data: BannerCreate) -> RepoResult<Banner> {
        let sql = format!(
            "INSERT INTO banners \
             (title, discount_text, description, image_url, link, is_active, sort_order) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING {BANNER_COLUMNS}"
        );
        Ok(sqlx::query_as::<_, Banner>(&sql)
            .bind(data.title)
            .bind(data.discount_text)
            .bind(data.description)
            .bind(data.image_url)
            .bind(data.link)
            .bind(data.is_active)
            .bind(data.sort_order)
            .fetch_one(&self.pool)
            .await?)
    }

    async fn update_banner(&self, id: i64, data: BannerUpdate) -> RepoResult<Option<Banner>> {
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new("UPDATE banners SET ");
        let mut changed = false;
        push_patch(&mut builder, &mut changed, "title", &data.title);
        push_patch(&mut builder, &mut changed, "discount_text", &data.discount_text);
        push_patch(&mut builder, &mut changed, "description", &data.description);
        push_patch(&mut builder, &mut changed, "image_url", &data.image_url);
        push_patch(&mut builder, &mut changed, "link", &data.link);
        push_patch(&mut builder, &mut changed, "is_active", &data.is_active);
        push_patch(&mut builder, &mut changed, "sort_order", &data.sort_order);

        self.apply_update("banners", BANNER_COLUMNS, id, builder, changed)
            .await
    }

    async fn delete_banner(&self, id: i64) -> RepoResult<bool> {
        self.delete_by_id("banners", id).await
    }

    async fn get_admin_by_username(&self, username: &str) -> RepoResult<Option<AdminUser>> {
        Ok(sqlx::query_as::<_, AdminUser>(
            "SELECT id, username, hashed_password, created_at FROM admin_users WHERE username = $1",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?)
    }
}
