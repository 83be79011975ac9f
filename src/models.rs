// Data records exchanged with the travel booking API and kept in persisted storage

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

// Role attached to an authenticated identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Customer,
    Admin,
    #[serde(other)]
    Unknown,
}

/// Identity record owned by the session store.
///
/// The server speaks snake_case (`created_at`) while the persisted copy uses
/// camelCase (`createdAt`); both spellings decode into the same field.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub role: Option<UserRole>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_id: Option<String>,
    #[serde(
        rename = "createdAt",
        alias = "created_at",
        default,
        deserialize_with = "lenient_timestamp",
        skip_serializing_if = "Option::is_none"
    )]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(
        rename = "lastLogin",
        alias = "last_login",
        default,
        deserialize_with = "lenient_timestamp",
        skip_serializing_if = "Option::is_none"
    )]
    pub last_login: Option<DateTime<Utc>>,
}

impl User {
    /// Returns a copy of this record with every field present in `patch` applied.
    pub fn merged(&self, patch: &UserPatch) -> User {
        let mut merged = self.clone();
        if let Some(name) = &patch.name {
            merged.name = name.clone();
        }
        if let Some(email) = &patch.email {
            merged.email = email.clone();
        }
        if let Some(phone) = &patch.phone {
            merged.phone = Some(phone.clone());
        }
        if let Some(avatar) = &patch.avatar {
            merged.avatar = Some(avatar.clone());
        }
        if let Some(image_id) = &patch.image_id {
            merged.image_id = Some(image_id.clone());
        }
        merged
    }

    // Takes the server's copy where it has a value and keeps ours elsewhere
    pub fn overlaid_with(&self, reply: User) -> User {
        User {
            id: reply.id,
            name: reply.name,
            email: reply.email,
            role: reply.role.or(self.role),
            phone: reply.phone.or_else(|| self.phone.clone()),
            avatar: reply.avatar.or_else(|| self.avatar.clone()),
            image_id: reply.image_id.or_else(|| self.image_id.clone()),
            created_at: reply.created_at.or(self.created_at),
            last_login: reply.last_login.or(self.last_login),
        }
    }
}

// Unparseable timestamps are dropped rather than failing the whole record
fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw.and_then(|value| {
        DateTime::parse_from_rfc3339(&value)
            .ok()
            .map(|parsed| parsed.with_timezone(&Utc))
    }))
}

// Partial profile update; absent fields are left untouched
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct UserPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct RegisterData {
    pub name: String,
    pub email: String,
    pub password: String,
    pub phone: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest<'a> {
    pub email: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoginResponse {
    #[serde(default)]
    pub msg: Option<String>,
    pub token: String,
    pub data: User,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RegisterResponse {
    #[serde(default)]
    pub msg: Option<String>,
    pub token: String,
    #[serde(alias = "data")]
    pub user: User,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TokenResponse {
    pub token: String,
}

// Error body returned on non-2xx responses
#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct ErrorBody {
    #[serde(default)]
    pub msg: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub code: Option<serde_json::Value>,
}

// Envelopes

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ListEnvelope<T> {
    #[serde(default)]
    pub list: Vec<T>,
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub page: u32,
    #[serde(default)]
    pub limit: u32,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct DataEnvelope<T> {
    pub data: T,
}

// Detail endpoints answer either with the bare record or wrapped in `{data}`
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum DetailBody<T> {
    Wrapped(DataEnvelope<T>),
    Bare(T),
}

impl<T> DetailBody<T> {
    pub(crate) fn into_inner(self) -> T {
        match self {
            DetailBody::Wrapped(envelope) => envelope.data,
            DetailBody::Bare(record) => record,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct ImagesBody {
    #[serde(default)]
    pub images: Vec<Image>,
}

// Paging and ordering for list endpoints
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub search: Option<String>,
    pub order_by: Option<String>,
}

impl ListQuery {
    pub fn page(page: u32, limit: u32) -> Self {
        Self {
            page: Some(page),
            limit: Some(limit),
            ..Default::default()
        }
    }

    // Only the present parameters go on the wire
    pub fn to_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(page) = self.page.filter(|p| *p > 0) {
            pairs.push(("page", page.to_string()));
        }
        if let Some(limit) = self.limit.filter(|l| *l > 0) {
            pairs.push(("limit", limit.to_string()));
        }
        if let Some(search) = self.search.as_ref().filter(|s| !s.is_empty()) {
            pairs.push(("search", search.clone()));
        }
        if let Some(order_by) = self.order_by.as_ref().filter(|o| !o.is_empty()) {
            pairs.push(("orderBy", order_by.clone()));
        }
        pairs
    }
}

// Catalog records

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Destination {
    pub id: String,
    pub name: String,
    pub slug: String,
    pub description: String,
    pub location_point: String,
    pub province: String,
    pub city: String,
    pub country: String,
    pub category: String,
    pub popularity: i64,
    pub featured: bool,
    pub image_id: String,
    pub gallery: String,
    pub average_rating: f64,
    pub review_count: i64,
    pub is_active: bool,
    pub meta_keywords: String,
    pub meta_description: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Description {
    pub id: Option<String>,
    pub title: Option<String>,
    pub content: Option<String>,
    pub text: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct PackageCore {
    pub id: String,
    pub name: String,
    pub descriptions: Vec<Description>,
    pub destination_ids: Vec<String>,
    pub price: f64,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct PackageWithDestinations {
    #[serde(flatten)]
    pub package: PackageCore,
    pub destinations: Vec<Destination>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Fleet {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub fleet_type: String,
    pub plate_number: String,
    pub capacity: u32,
    pub driver_name: String,
    pub status: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ScheduleCore {
    pub id: String,
    pub package_id: String,
    pub fleet_id: String,
    pub departure_date: String,
    pub return_date: String,
    pub departure_time: String,
    pub available_seats: u32,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ScheduleDetail {
    #[serde(flatten)]
    pub schedule: ScheduleCore,
    pub package_data: PackageCore,
    pub fleet_data: Fleet,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct BookingCore {
    pub id: String,
    pub user_id: String,
    pub package_schedule_id: String,
    pub booking_date: String,
    pub number_of_seats: u32,
    pub total_price: f64,
    pub payment_status: String,
    pub notes: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct BookingDetail {
    #[serde(flatten)]
    pub booking: BookingCore,
    pub package_data: PackageCore,
    pub schedule_data: ScheduleCore,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct PaymentMethod {
    pub id: String,
    pub name: String,
    pub provider: String,
    #[serde(rename = "type")]
    pub method_type: String,
    pub account_number: String,
    pub account_name: String,
    pub is_active: bool,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct PaymentCore {
    pub id: String,
    pub booking_id: String,
    pub payment_method_id: String,
    pub payment_date: String,
    pub payment_amount: f64,
    pub payment_proof: String,
    pub status: String,
    pub is_approved: bool,
    pub approved_by: Option<String>,
    pub approved_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct PaymentDetail {
    #[serde(flatten)]
    pub payment: PaymentCore,
    pub payment_method: PaymentMethod,
    pub booking: BookingCore,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Image {
    pub id: String,
    #[serde(rename = "FK")]
    pub fk: String,
    pub image_base64: String,
    pub created_at: String,
    pub updated_at: String,
}

// Request payloads

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct CreateBookingRequest {
    pub schedule_id: String,
    pub number_of_seats: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct CreatePaymentRequest {
    pub booking_id: String,
    pub payment_method_id: String,
    pub amount: f64,
    pub payment_proof: String,
}
