use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use diesel::sql_types::{Bool, Date, Float8, Int8, Jsonb, Text, Uuid as SqlUuid};
use uuid::Uuid;

use spark_shared::clients::db::DbPool;
use spark_shared::errors::{AppError, ErrorCode, StoreError};
use spark_shared::interests::unknown_interests;

use crate::index::reseed::{ProfileInterests, ProfileSource};
use crate::models::{
    interests_from_json, parse_birth_date, CreateProfileRequest, NearbyQuery, Profile,
    ProfileChangeset, UpdateProfileRequest, MIN_RADIUS_METERS, PROFILE_COLUMNS,
};
use crate::schema::{profiles, users};

#[derive(Debug, thiserror::Error)]
pub enum ProfileError {
    #[error("profile not found")]
    NotFound,

    #[error("a profile already exists for this user")]
    AlreadyExists,

    #[error("user not found")]
    UserNotFound,

    #[error("unknown interests: {}", .0.join(", "))]
    UnknownInterests(Vec<String>),

    #[error("latitude and longitude must be provided together")]
    PartialLocation,

    #[error("date of birth must be a past date formatted YYYY-MM-DD")]
    InvalidBirthDate,

    #[error("radius must be between {min} and {max} meters")]
    InvalidRadius { min: f64, max: f64 },

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<DieselError> for ProfileError {
    fn from(err: DieselError) -> Self {
        match err {
            DieselError::NotFound => Self::NotFound,
            DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => Self::AlreadyExists,
            DieselError::DatabaseError(DatabaseErrorKind::ForeignKeyViolation, _) => Self::UserNotFound,
            other => Self::Store(StoreError::from(other)),
        }
    }
}

impl From<diesel::r2d2::PoolError> for ProfileError {
    fn from(err: diesel::r2d2::PoolError) -> Self {
        Self::Store(StoreError::from(err))
    }
}

impl From<ProfileError> for AppError {
    fn from(err: ProfileError) -> Self {
        let message = err.to_string();
        match err {
            ProfileError::NotFound => AppError::new(ErrorCode::ProfileNotFound, message),
            ProfileError::AlreadyExists => AppError::new(ErrorCode::ProfileAlreadyExists, message),
            ProfileError::UserNotFound => AppError::new(ErrorCode::UserNotFound, message),
            ProfileError::UnknownInterests(tags) => AppError::with_details(
                ErrorCode::UnknownInterest,
                message,
                serde_json::json!({ "unknown": tags }),
            ),
            ProfileError::PartialLocation => AppError::new(ErrorCode::InvalidLocation, message),
            ProfileError::InvalidBirthDate => AppError::new(ErrorCode::ValidationError, message),
            ProfileError::InvalidRadius { .. } => AppError::bad_request(message),
            ProfileError::Store(e) => AppError::Store(e),
        }
    }
}

/// Rejects tags outside the system vocabulary.
pub fn check_interests(tags: &[String]) -> Result<(), ProfileError> {
    let unknown = unknown_interests(tags);
    if unknown.is_empty() {
        Ok(())
    } else {
        Err(ProfileError::UnknownInterests(unknown.into_iter().map(str::to_string).collect()))
    }
}

pub fn create_profile(pool: &DbPool, user_id: Uuid, req: &CreateProfileRequest) -> Result<Profile, ProfileError> {
    check_interests(&req.interests)?;
    let dob = parse_birth_date(&req.dob).ok_or(ProfileError::InvalidBirthDate)?;
    let interests = serde_json::json!(req.interests);

    let mut conn = pool.get()?;

    let query = format!(
        "INSERT INTO profiles (id, user_id, fullname, bio, date_of_birth, gender, is_gender_public, \
         relationship_intent, latitude, longitude, location, interests, created_at, updated_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, \
         ST_SetSRID(ST_MakePoint($10, $9), 4326)::geography, $11, NOW(), NOW()) \
         RETURNING {PROFILE_COLUMNS}"
    );

    let profile = diesel::sql_query(query)
        .bind::<SqlUuid, _>(Uuid::now_v7())
        .bind::<SqlUuid, _>(user_id)
        .bind::<Text, _>(&req.fullname)
        .bind::<Text, _>(&req.bio)
        .bind::<Date, _>(dob)
        .bind::<Text, _>(req.gender.as_str())
        .bind::<Bool, _>(req.is_gender_public)
        .bind::<Text, _>(req.relationship_intent.as_str())
        .bind::<Float8, _>(req.latitude)
        .bind::<Float8, _>(req.longitude)
        .bind::<Jsonb, _>(interests)
        .get_result::<Profile>(&mut conn)?;

    tracing::info!(
        profile_id = %profile.id,
        user_id = %user_id,
        "profile created"
    );

    Ok(profile)
}

pub fn get_profile(pool: &DbPool, id: Uuid) -> Result<Profile, ProfileError> {
    let mut conn = pool.get()?;
    profiles::table
        .filter(profiles::id.eq(id))
        .filter(profiles::deleted_at.is_null())
        .select(Profile::as_select())
        .first(&mut conn)
        .optional()?
        .ok_or(ProfileError::NotFound)
}

pub fn get_profile_by_user_id(pool: &DbPool, user_id: Uuid) -> Result<Profile, ProfileError> {
    let mut conn = pool.get()?;
    profiles::table
        .filter(profiles::user_id.eq(user_id))
        .filter(profiles::deleted_at.is_null())
        .select(Profile::as_select())
        .first(&mut conn)
        .optional()?
        .ok_or(ProfileError::NotFound)
}

#[derive(Debug)]
pub struct UpdatedProfile {
    pub profile: Profile,
    /// Interests before the update, present only when the update changed them.
    pub replaced_interests: Option<Vec<String>>,
}

pub fn update_profile(pool: &DbPool, user_id: Uuid, req: &UpdateProfileRequest) -> Result<UpdatedProfile, ProfileError> {
    if req.latitude.is_some() != req.longitude.is_some() {
        return Err(ProfileError::PartialLocation);
    }
    if let Some(tags) = &req.interests {
        check_interests(tags)?;
    }
    let dob = req
        .dob
        .as_deref()
        .map(|raw| parse_birth_date(raw).ok_or(ProfileError::InvalidBirthDate))
        .transpose()?;

    let changeset = ProfileChangeset {
        fullname: req.fullname.clone(),
        bio: req.bio.clone(),
        date_of_birth: dob,
        gender: req.gender.map(|g| g.as_str().to_string()),
        is_gender_public: req.is_gender_public,
        relationship_intent: req.relationship_intent.map(|r| r.as_str().to_string()),
        interests: req.interests.as_ref().map(|tags| serde_json::json!(tags)),
    };

    let mut conn = pool.get()?;

    conn.transaction::<_, ProfileError, _>(|conn| {
        let previous = profiles::table
            .filter(profiles::user_id.eq(user_id))
            .filter(profiles::deleted_at.is_null())
            .select(Profile::as_select())
            .for_update()
            .first(conn)
            .optional()?
            .ok_or(ProfileError::NotFound)?;

        diesel::update(profiles::table.filter(profiles::id.eq(previous.id)))
            .set((&changeset, profiles::updated_at.eq(Utc::now())))
            .execute(conn)?;

        if let Some((lat, lng)) = req.location() {
            diesel::sql_query(
                "UPDATE profiles SET latitude = $1, longitude = $2, \
                 location = ST_SetSRID(ST_MakePoint($2, $1), 4326)::geography WHERE id = $3",
            )
            .bind::<Float8, _>(lat)
            .bind::<Float8, _>(lng)
            .bind::<SqlUuid, _>(previous.id)
            .execute(conn)?;
        }

        let profile = profiles::table
            .find(previous.id)
            .select(Profile::as_select())
            .first(conn)?;

        let old_tags = previous.interest_tags();
        let replaced_interests = match &req.interests {
            Some(new_tags) if !same_tags(&old_tags, new_tags) => Some(old_tags),
            _ => None,
        };

        tracing::info!(
            profile_id = %profile.id,
            user_id = %user_id,
            interests_changed = replaced_interests.is_some(),
            "profile updated"
        );

        Ok(UpdatedProfile { profile, replaced_interests })
    })
}

fn same_tags(a: &[String], b: &[String]) -> bool {
    let mut a: Vec<&String> = a.iter().collect();
    let mut b: Vec<&String> = b.iter().collect();
    a.sort();
    a.dedup();
    b.sort();
    b.dedup();
    a == b
}

/// Profiles within `query.radius` meters of the given point, nearest first.
pub fn nearby_profiles(
    pool: &DbPool,
    exclude_user_id: Uuid,
    query: &NearbyQuery,
    max_radius: f64,
) -> Result<Vec<Profile>, ProfileError> {
    if !(MIN_RADIUS_METERS..=max_radius).contains(&query.radius) {
        return Err(ProfileError::InvalidRadius { min: MIN_RADIUS_METERS, max: max_radius });
    }

    let mut conn = pool.get()?;

    let sql = format!(
        "SELECT {PROFILE_COLUMNS} FROM profiles \
         WHERE user_id <> $1 AND deleted_at IS NULL \
         AND ST_DWithin(location, ST_SetSRID(ST_MakePoint($3, $2), 4326)::geography, $4) \
         ORDER BY ST_Distance(location, ST_SetSRID(ST_MakePoint($3, $2), 4326)::geography), id \
         LIMIT $5 OFFSET $6"
    );

    let profiles = diesel::sql_query(sql)
        .bind::<SqlUuid, _>(exclude_user_id)
        .bind::<Float8, _>(query.lat)
        .bind::<Float8, _>(query.lng)
        .bind::<Float8, _>(query.radius)
        .bind::<Int8, _>(query.limit.clamp(1, 100))
        .bind::<Int8, _>(query.offset.max(0))
        .load::<Profile>(&mut conn)?;

    Ok(profiles)
}

/// Marks the user as active now; called by other services.
pub fn touch_activity(pool: &DbPool, user_id: Uuid) -> Result<(), ProfileError> {
    let mut conn = pool.get()?;
    let updated = diesel::update(users::table.filter(users::id.eq(user_id)))
        .set(users::last_active.eq(Utc::now()))
        .execute(&mut conn)?;

    if updated == 0 {
        return Err(ProfileError::UserNotFound);
    }
    Ok(())
}

/// Reads the profiles table for interest index reseeds.
pub struct PgProfileSource {
    pool: DbPool,
}

impl PgProfileSource {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

impl ProfileSource for PgProfileSource {
    fn active_profile_interests(
        &self,
        active_since: DateTime<Utc>,
        after: Option<Uuid>,
        limit: i64,
    ) -> Result<Vec<ProfileInterests>, StoreError> {
        let mut conn = self.pool.get()?;

        let mut query = profiles::table
            .inner_join(users::table)
            .filter(users::last_active.ge(active_since))
            .filter(users::deleted_at.is_null())
            .filter(profiles::deleted_at.is_null())
            .select((profiles::user_id, profiles::interests))
            .order(profiles::user_id.asc())
            .limit(limit)
            .into_boxed();

        if let Some(after) = after {
            query = query.filter(profiles::user_id.gt(after));
        }

        let rows = query.load::<(Uuid, serde_json::Value)>(&mut conn)?;

        Ok(rows
            .into_iter()
            .map(|(user_id, interests)| ProfileInterests {
                user_id,
                interests: interests_from_json(&interests),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use axum::response::IntoResponse;

    fn db_error(kind: DatabaseErrorKind) -> DieselError {
        DieselError::DatabaseError(kind, Box::new("constraint".to_string()))
    }

    #[test]
    fn second_profile_for_user_is_a_conflict() {
        let err = ProfileError::from(db_error(DatabaseErrorKind::UniqueViolation));
        assert!(matches!(err, ProfileError::AlreadyExists));
        let resp = AppError::from(err).into_response();
        assert_eq!(resp.status(), StatusCode::CONFLICT);
    }

    #[test]
    fn missing_owner_is_user_not_found() {
        let err = ProfileError::from(db_error(DatabaseErrorKind::ForeignKeyViolation));
        assert!(matches!(err, ProfileError::UserNotFound));
    }

    #[test]
    fn unknown_interests_are_reported_by_name() {
        let err = check_interests(&["Art".into(), "Skydiving On Mars".into()]).unwrap_err();
        match &err {
            ProfileError::UnknownInterests(tags) => assert_eq!(tags, &vec!["Skydiving On Mars".to_string()]),
            other => panic!("unexpected error: {other:?}"),
        }
        let app: AppError = err.into();
        assert_eq!(app.error_code(), ErrorCode::UnknownInterest);
        assert_eq!(app.into_response().status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn store_timeouts_stay_retryable() {
        let err = ProfileError::from(StoreError::Transient("pool timed out".into()));
        assert_eq!(AppError::from(err).error_code(), ErrorCode::ServiceUnavailable);
    }

    #[test]
    fn tag_comparison_ignores_order_and_duplicates() {
        let a = vec!["Art".to_string(), "Gym".to_string()];
        let b = vec!["Gym".to_string(), "Art".to_string(), "Art".to_string()];
        assert!(same_tags(&a, &b));
        assert!(!same_tags(&a, &["Art".to_string()]));
    }
}
