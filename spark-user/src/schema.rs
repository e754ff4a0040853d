// `profiles.location` (GEOGRAPHY(POINT, 4326)) is absent: diesel has no
// type for it, so it is only ever touched through raw SQL in `services::profile_service`.

diesel::table! {
    users (id) {
        id -> Uuid,
        #[max_length = 50]
        username -> Varchar,
        #[max_length = 255]
        email -> Varchar,
        #[max_length = 20]
        role -> Varchar,
        last_active -> Timestamptz,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
        deleted_at -> Nullable<Timestamptz>,
    }
}

diesel::table! {
    profiles (id) {
        id -> Uuid,
        user_id -> Uuid,
        #[max_length = 255]
        fullname -> Varchar,
        bio -> Text,
        date_of_birth -> Date,
        #[max_length = 10]
        gender -> Varchar,
        is_gender_public -> Bool,
        #[max_length = 20]
        relationship_intent -> Varchar,
        latitude -> Float8,
        longitude -> Float8,
        interests -> Jsonb,
        photo_url -> Nullable<Text>,
        photo_public_id -> Nullable<Text>,
        is_verified -> Bool,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
        deleted_at -> Nullable<Timestamptz>,
    }
}

diesel::joinable!(profiles -> users (user_id));

diesel::allow_tables_to_appear_in_same_query!(
    users,
    profiles,
);
