use chrono::{DateTime, NaiveDate, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use spark_shared::interests::unknown_interests;

use crate::schema::profiles;

pub const DATE_FORMAT: &str = "%Y-%m-%d";

// --- Enumerations stored as VARCHAR ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
}

impl Gender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Gender::Male => "male",
            Gender::Female => "female",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelationshipIntent {
    Friendship,
    Dating,
    Casual,
    Marriage,
}

impl RelationshipIntent {
    pub fn as_str(&self) -> &'static str {
        match self {
            RelationshipIntent::Friendship => "friendship",
            RelationshipIntent::Dating => "dating",
            RelationshipIntent::Casual => "casual",
            RelationshipIntent::Marriage => "marriage",
        }
    }
}

// --- Profile ---

#[derive(Debug, Clone, Queryable, QueryableByName, Selectable, Identifiable, Serialize)]
#[diesel(table_name = profiles)]
pub struct Profile {
    pub id: Uuid,
    pub user_id: Uuid,
    pub fullname: String,
    pub bio: String,
    pub date_of_birth: NaiveDate,
    pub gender: String,
    pub is_gender_public: bool,
    pub relationship_intent: String,
    pub latitude: f64,
    pub longitude: f64,
    pub interests: serde_json::Value,
    pub photo_url: Option<String>,
    pub photo_public_id: Option<String>,
    pub is_verified: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing)]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Profile {
    /// Interest tags as stored; anything that is not a JSON string is ignored.
    pub fn interest_tags(&self) -> Vec<String> {
        interests_from_json(&self.interests)
    }
}

pub fn interests_from_json(value: &serde_json::Value) -> Vec<String> {
    value
        .as_array()
        .map(|tags| tags.iter().filter_map(|t| t.as_str().map(str::to_string)).collect())
        .unwrap_or_default()
}

/// Field list for raw queries; keep in step with `Profile`.
pub const PROFILE_COLUMNS: &str = "id, user_id, fullname, bio, date_of_birth, gender, \
    is_gender_public, relationship_intent, latitude, longitude, interests, photo_url, \
    photo_public_id, is_verified, created_at, updated_at, deleted_at";

#[derive(Debug, AsChangeset, Default)]
#[diesel(table_name = profiles)]
pub struct ProfileChangeset {
    pub fullname: Option<String>,
    pub bio: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub gender: Option<String>,
    pub is_gender_public: Option<bool>,
    pub relationship_intent: Option<String>,
    pub interests: Option<serde_json::Value>,
}

// --- Requests ---

#[derive(Debug, Deserialize, Validate)]
pub struct CreateProfileRequest {
    #[validate(length(min = 2, max = 255))]
    pub fullname: String,
    #[validate(length(min = 1), custom = "validate_interests")]
    pub interests: Vec<String>,
    #[validate(length(min = 10, max = 5000))]
    pub bio: String,
    #[validate(custom = "validate_birth_date")]
    pub dob: String,
    pub gender: Gender,
    #[serde(default = "default_true")]
    pub is_gender_public: bool,
    pub relationship_intent: RelationshipIntent,
    #[validate(range(min = -90.0, max = 90.0))]
    pub latitude: f64,
    #[validate(range(min = -180.0, max = 180.0))]
    pub longitude: f64,
}

fn default_true() -> bool { true }

#[derive(Debug, Default, Deserialize, Validate)]
#[validate(schema(function = "validate_location_pair"))]
pub struct UpdateProfileRequest {
    #[validate(length(min = 2, max = 255))]
    pub fullname: Option<String>,
    #[validate(length(min = 1), custom = "validate_interests")]
    pub interests: Option<Vec<String>>,
    #[validate(length(min = 10, max = 5000))]
    pub bio: Option<String>,
    #[validate(custom = "validate_birth_date")]
    pub dob: Option<String>,
    pub gender: Option<Gender>,
    pub is_gender_public: Option<bool>,
    pub relationship_intent: Option<RelationshipIntent>,
    #[validate(range(min = -90.0, max = 90.0))]
    pub latitude: Option<f64>,
    #[validate(range(min = -180.0, max = 180.0))]
    pub longitude: Option<f64>,
}

impl UpdateProfileRequest {
    pub fn location(&self) -> Option<(f64, f64)> {
        self.latitude.zip(self.longitude)
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct NearbyQuery {
    #[validate(range(min = -90.0, max = 90.0))]
    pub lat: f64,
    #[validate(range(min = -180.0, max = 180.0))]
    pub lng: f64,
    #[serde(default = "default_radius")]
    pub radius: f64,
    #[serde(default = "default_nearby_limit")]
    #[validate(range(min = 1, max = 100))]
    pub limit: i64,
    #[serde(default)]
    #[validate(range(min = 0))]
    pub offset: i64,
}

fn default_radius() -> f64 { 5000.0 }
fn default_nearby_limit() -> i64 { 20 }

pub const MIN_RADIUS_METERS: f64 = 100.0;

// --- Validators ---

pub fn parse_birth_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw, DATE_FORMAT).ok()
}

fn validate_birth_date(raw: &str) -> Result<(), ValidationError> {
    let date = parse_birth_date(raw).ok_or_else(|| ValidationError::new("invalid_date_format"))?;
    if date >= Utc::now().date_naive() {
        return Err(ValidationError::new("date_not_in_past"));
    }
    Ok(())
}

fn validate_interests(tags: &[String]) -> Result<(), ValidationError> {
    let unknown = unknown_interests(tags);
    if unknown.is_empty() {
        return Ok(());
    }
    let mut err = ValidationError::new("unknown_interest");
    err.add_param("unknown".into(), &unknown);
    Err(err)
}

fn validate_location_pair(req: &UpdateProfileRequest) -> Result<(), ValidationError> {
    if req.latitude.is_some() != req.longitude.is_some() {
        return Err(ValidationError::new("latitude_and_longitude_required_together"));
    }
    Ok(())
}
