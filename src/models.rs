use std::sync::LazyLock;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sqlx::FromRow;
use thiserror::Error;
use ts_rs::TS;
use utoipa::ToSchema;
use validator::{Validate, ValidationError};

// --- Core Application Schemas (Mapped to Database) ---

/// Category
///
/// A menu section (coffee, breakfast, ...) from the `categories` table.
/// Deleting a category removes its menu items through `ON DELETE CASCADE`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, FromRow)]
#[ts(export)]
pub struct Category {
    #[ts(type = "number")]
    pub id: i64,
    pub name: String,
    /// Globally unique, human-readable identifier.
    pub slug: String,
    pub description: Option<String>,
    pub sort_order: i32,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

/// MenuItem
///
/// A dish or drink from the `menu_items` table. `category_id` always references
/// an existing category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, FromRow)]
#[ts(export)]
pub struct MenuItem {
    #[ts(type = "number")]
    pub id: i64,
    #[ts(type = "number")]
    pub category_id: i64,
    pub name: String,
    pub description: Option<String>,
    pub price: f64,
    pub image_url: Option<String>,
    pub is_available: bool,
    pub sort_order: i32,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

/// ReservationStatus
///
/// Stored as lowercase text. New reservations always start as `Pending`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum ReservationStatus {
    #[default]
    Pending,
    Confirmed,
    Cancelled,
}

impl ReservationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReservationStatus::Pending => "pending",
            ReservationStatus::Confirmed => "confirmed",
            ReservationStatus::Cancelled => "cancelled",
        }
    }
}

#[derive(Error, Debug)]
#[error("unknown reservation status '{0}'")]
pub struct UnknownStatus(pub String);

impl TryFrom<String> for ReservationStatus {
    type Error = UnknownStatus;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "pending" => Ok(ReservationStatus::Pending),
            "confirmed" => Ok(ReservationStatus::Confirmed),
            "cancelled" => Ok(ReservationStatus::Cancelled),
            _ => Err(UnknownStatus(value)),
        }
    }
}

/// Reservation
///
/// Full row from the `reservations` table. Append-only: there is no update or
/// delete path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, FromRow)]
#[ts(export)]
pub struct Reservation {
    #[ts(type = "number")]
    pub id: i64,
    pub name: String,
    pub phone: String,
    pub email: Option<String>,
    /// YYYY-MM-DD
    pub date: String,
    /// HH:MM
    pub time: String,
    pub guests: i32,
    pub comment: Option<String>,
    #[sqlx(try_from = "String")]
    pub status: ReservationStatus,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

/// ContactMessage
///
/// Full row from the `contact_messages` table. Append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, FromRow)]
#[ts(export)]
pub struct ContactMessage {
    #[ts(type = "number")]
    pub id: i64,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub message: String,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

/// Banner
///
/// A promotional banner (e.g. "50% off rolls") from the `banners` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, FromRow)]
#[ts(export)]
pub struct Banner {
    #[ts(type = "number")]
    pub id: i64,
    pub title: String,
    pub discount_text: Option<String>,
    pub description: Option<String>,
    pub image_url: Option<String>,
    /// Optional target opened when the banner is clicked.
    pub link: Option<String>,
    pub is_active: bool,
    pub sort_order: i32,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

/// AdminUser
///
/// The credential principal. Never serialized: the hash must not leave the server.
#[derive(Debug, Clone, FromRow)]
pub struct AdminUser {
    pub id: i64,
    pub username: String,
    pub hashed_password: String,
    pub created_at: DateTime<Utc>,
}

// --- Partial Update Wrapper ---

/// Patch
///
/// Tri-state field for partial updates. A key missing from the JSON body is `Unset`
/// and leaves the column alone, an explicit `null` is `Clear`, anything else is `Set`.
/// Fields must be declared with `#[serde(default)]` for the missing case to work.
#[derive(Debug, Clone, PartialEq)]
pub enum Patch<T> {
    Unset,
    Clear,
    Set(T),
}

impl<T> Default for Patch<T> {
    fn default() -> Self {
        Patch::Unset
    }
}

impl<T> Patch<T> {
    pub fn is_unset(&self) -> bool {
        matches!(self, Patch::Unset)
    }

    /// `None` when untouched, `Some(None)` when cleared, `Some(Some(v))` when set.
    pub fn as_change(&self) -> Option<Option<&T>> {
        match self {
            Patch::Unset => None,
            Patch::Clear => Some(None),
            Patch::Set(value) => Some(Some(value)),
        }
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for Patch<T> {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(match Option::<T>::deserialize(deserializer)? {
            Some(value) => Patch::Set(value),
            None => Patch::Clear,
        })
    }
}

impl<T: Serialize> Serialize for Patch<T> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Patch::Set(value) => value.serialize(serializer),
            Patch::Unset | Patch::Clear => serializer.serialize_none(),
        }
    }
}

// --- Field Validators ---

static DATE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").expect("valid date regex"));
static TIME_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{2}:\d{2}$").expect("valid time regex"));

fn invalid(code: &'static str, message: &'static str) -> ValidationError {
    ValidationError::new(code).with_message(message.into())
}

/// YYYY-MM-DD that also names a real calendar day.
fn reservation_date(value: &str) -> Result<(), ValidationError> {
    if !DATE_PATTERN.is_match(value) || NaiveDate::parse_from_str(value, "%Y-%m-%d").is_err() {
        return Err(invalid("date", "date must be a valid YYYY-MM-DD calendar date"));
    }
    Ok(())
}

/// HH:MM on a 24-hour clock.
fn reservation_time(value: &str) -> Result<(), ValidationError> {
    if !TIME_PATTERN.is_match(value) || NaiveTime::parse_from_str(value, "%H:%M").is_err() {
        return Err(invalid("time", "time must be a valid HH:MM time"));
    }
    Ok(())
}

fn not_null<T>(value: &Patch<T>) -> Result<(), ValidationError> {
    match value {
        Patch::Clear => Err(invalid("not_null", "field cannot be null")),
        _ => Ok(()),
    }
}

fn patch_text(value: &Patch<String>, max: usize, nullable: bool) -> Result<(), ValidationError> {
    match value {
        Patch::Unset => Ok(()),
        Patch::Clear if nullable => Ok(()),
        Patch::Clear => Err(invalid("not_null", "field cannot be null")),
        Patch::Set(text) if text.trim().is_empty() && !nullable => {
            Err(invalid("length", "field cannot be empty"))
        }
        Patch::Set(text) if text.chars().count() > max => {
            Err(invalid("length", "field is too long"))
        }
        Patch::Set(_) => Ok(()),
    }
}

fn required_name(value: &Patch<String>) -> Result<(), ValidationError> {
    patch_text(value, 100, false)
}

fn required_item_name(value: &Patch<String>) -> Result<(), ValidationError> {
    patch_text(value, 200, false)
}

fn optional_url(value: &Patch<String>) -> Result<(), ValidationError> {
    patch_text(value, 500, true)
}

fn optional_short_text(value: &Patch<String>) -> Result<(), ValidationError> {
    patch_text(value, 100, true)
}

fn patch_price(value: &Patch<f64>) -> Result<(), ValidationError> {
    match value {
        Patch::Clear => Err(invalid("not_null", "price cannot be null")),
        Patch::Set(price) if !price.is_finite() || *price < 0.0 => {
            Err(invalid("range", "price must be zero or greater"))
        }
        _ => Ok(()),
    }
}

fn finite_price(value: f64) -> Result<(), ValidationError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(invalid("range", "price must be a finite number"))
    }
}

fn default_true() -> bool {
    true
}

fn default_guests() -> i32 {
    2
}

// --- Request Payloads (Input Schemas) ---

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Validate)]
#[ts(export)]
pub struct CategoryCreate {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[validate(length(min = 1, max = 100))]
    pub slug: String,
    pub description: Option<String>,
    #[serde(default)]
    pub sort_order: i32,
}

/// CategoryUpdate
///
/// Partial update payload; only keys present in the JSON body are written.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema, Validate)]
pub struct CategoryUpdate {
    #[serde(default, skip_serializing_if = "Patch::is_unset")]
    #[schema(value_type = Option<String>)]
    #[validate(custom(function = "required_name"))]
    pub name: Patch<String>,

    #[serde(default, skip_serializing_if = "Patch::is_unset")]
    #[schema(value_type = Option<String>)]
    #[validate(custom(function = "required_name"))]
    pub slug: Patch<String>,

    #[serde(default, skip_serializing_if = "Patch::is_unset")]
    #[schema(value_type = Option<String>)]
    pub description: Patch<String>,

    #[serde(default, skip_serializing_if = "Patch::is_unset")]
    #[schema(value_type = Option<i32>)]
    #[validate(custom(function = "not_null"))]
    pub sort_order: Patch<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Validate)]
#[ts(export)]
pub struct MenuItemCreate {
    #[ts(type = "number")]
    pub category_id: i64,
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    pub description: Option<String>,
    #[validate(range(min = 0.0), custom(function = "finite_price"))]
    pub price: f64,
    #[validate(length(max = 500))]
    pub image_url: Option<String>,
    #[serde(default = "default_true")]
    pub is_available: bool,
    #[serde(default)]
    pub sort_order: i32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema, Validate)]
pub struct MenuItemUpdate {
    #[serde(default, skip_serializing_if = "Patch::is_unset")]
    #[schema(value_type = Option<i64>)]
    #[validate(custom(function = "not_null"))]
    pub category_id: Patch<i64>,

    #[serde(default, skip_serializing_if = "Patch::is_unset")]
    #[schema(value_type = Option<String>)]
    #[validate(custom(function = "required_item_name"))]
    pub name: Patch<String>,

    #[serde(default, skip_serializing_if = "Patch::is_unset")]
    #[schema(value_type = Option<String>)]
    pub description: Patch<String>,

    #[serde(default, skip_serializing_if = "Patch::is_unset")]
    #[schema(value_type = Option<f64>)]
    #[validate(custom(function = "patch_price"))]
    pub price: Patch<f64>,

    #[serde(default, skip_serializing_if = "Patch::is_unset")]
    #[schema(value_type = Option<String>)]
    #[validate(custom(function = "optional_url"))]
    pub image_url: Patch<String>,

    #[serde(default, skip_serializing_if = "Patch::is_unset")]
    #[schema(value_type = Option<bool>)]
    #[validate(custom(function = "not_null"))]
    pub is_available: Patch<bool>,

    #[serde(default, skip_serializing_if = "Patch::is_unset")]
    #[schema(value_type = Option<i32>)]
    #[validate(custom(function = "not_null"))]
    pub sort_order: Patch<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Validate)]
#[ts(export)]
pub struct BannerCreate {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[validate(length(max = 100))]
    pub discount_text: Option<String>,
    pub description: Option<String>,
    #[validate(length(max = 500))]
    pub image_url: Option<String>,
    #[validate(length(max = 500))]
    pub link: Option<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub sort_order: i32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema, Validate)]
pub struct BannerUpdate {
    #[serde(default, skip_serializing_if = "Patch::is_unset")]
    #[schema(value_type = Option<String>)]
    #[validate(custom(function = "required_item_name"))]
    pub title: Patch<String>,

    #[serde(default, skip_serializing_if = "Patch::is_unset")]
    #[schema(value_type = Option<String>)]
    #[validate(custom(function = "optional_short_text"))]
    pub discount_text: Patch<String>,

    #[serde(default, skip_serializing_if = "Patch::is_unset")]
    #[schema(value_type = Option<String>)]
    pub description: Patch<String>,

    #[serde(default, skip_serializing_if = "Patch::is_unset")]
    #[schema(value_type = Option<String>)]
    #[validate(custom(function = "optional_url"))]
    pub image_url: Patch<String>,

    #[serde(default, skip_serializing_if = "Patch::is_unset")]
    #[schema(value_type = Option<String>)]
    #[validate(custom(function = "optional_url"))]
    pub link: Patch<String>,

    #[serde(default, skip_serializing_if = "Patch::is_unset")]
    #[schema(value_type = Option<bool>)]
    #[validate(custom(function = "not_null"))]
    pub is_active: Patch<bool>,

    #[serde(default, skip_serializing_if = "Patch::is_unset")]
    #[schema(value_type = Option<i32>)]
    #[validate(custom(function = "not_null"))]
    pub sort_order: Patch<i32>,
}

/// ReservationCreate
///
/// Public table-booking form (POST /reservations).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Validate)]
#[ts(export)]
pub struct ReservationCreate {
    #[validate(length(min = 2, max = 100))]
    pub name: String,
    #[validate(length(min = 10, max = 20))]
    pub phone: String,
    #[validate(email, length(max = 200))]
    pub email: Option<String>,
    #[schema(example = "2024-06-15")]
    #[validate(custom(function = "reservation_date"))]
    pub date: String,
    #[schema(example = "19:30")]
    #[validate(custom(function = "reservation_time"))]
    pub time: String,
    #[serde(default = "default_guests")]
    #[validate(range(min = 1, max = 20))]
    pub guests: i32,
    pub comment: Option<String>,
}

/// ContactCreate
///
/// Public contact form (POST /contact).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Validate)]
#[ts(export)]
pub struct ContactCreate {
    #[validate(length(min = 2, max = 100))]
    pub name: String,
    #[validate(email, length(max = 200))]
    pub email: String,
    #[validate(length(max = 20))]
    pub phone: Option<String>,
    #[validate(length(min = 10, max = 2000))]
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Validate)]
#[ts(export)]
pub struct AdminLogin {
    #[validate(length(min = 1, max = 50))]
    pub username: String,
    #[validate(length(min = 1))]
    pub password: String,
}

// --- Response Schemas (Output) ---

/// Token
///
/// Returned by POST /admin/login. `token_type` is always "bearer".
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct Token {
    pub access_token: String,
    pub token_type: String,
}

/// ReservationResponse
///
/// What the public booking endpoint echoes back; contact details stay server-side.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct ReservationResponse {
    #[ts(type = "number")]
    pub id: i64,
    pub name: String,
    pub date: String,
    pub time: String,
    pub guests: i32,
    pub status: ReservationStatus,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

impl From<Reservation> for ReservationResponse {
    fn from(r: Reservation) -> Self {
        Self {
            id: r.id,
            name: r.name,
            date: r.date,
            time: r.time,
            guests: r.guests,
            status: r.status,
            created_at: r.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct ContactResponse {
    #[ts(type = "number")]
    pub id: i64,
    pub name: String,
    pub email: String,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

impl From<ContactMessage> for ContactResponse {
    fn from(m: ContactMessage) -> Self {
        Self {
            id: m.id,
            name: m.name,
            email: m.email,
            created_at: m.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct UploadResponse {
    /// Relative URL under /uploads.
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct DeleteResponse {
    pub ok: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct HealthResponse {
    pub status: String,
}
