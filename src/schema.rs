// Diesel table definitions for the fieldtrip database.
// Datetimes are stored as ISO-8601 text and parsed in the repository layer.

diesel::table! {
    sources (id) {
        id -> Integer,
        name -> Text,
        base_url -> Text,
        adapter_type -> Text,
        crawl_frequency -> Text,
        active -> Bool,
    }
}

diesel::table! {
    venues (id) {
        id -> Integer,
        name -> Text,
        address -> Nullable<Text>,
        city -> Nullable<Text>,
        state -> Nullable<Text>,
        website -> Nullable<Text>,
    }
}

diesel::table! {
    activities (id) {
        id -> Integer,
        source_id -> Integer,
        source_url -> Text,
        title -> Text,
        description -> Nullable<Text>,
        activity_type -> Nullable<Text>,
        age_min -> Nullable<Integer>,
        age_max -> Nullable<Integer>,
        is_free -> Bool,
        free_verification_status -> Text,
        drop_in -> Nullable<Bool>,
        registration_required -> Nullable<Bool>,
        start_at -> Text,
        end_at -> Nullable<Text>,
        timezone -> Text,
        location_text -> Nullable<Text>,
        venue_id -> Nullable<Integer>,
        extraction_method -> Text,
        status -> Text,
        confidence_score -> Double,
        first_seen_at -> Text,
        last_seen_at -> Text,
        updated_at -> Text,
    }
}

diesel::joinable!(activities -> sources (source_id));
diesel::joinable!(activities -> venues (venue_id));

diesel::allow_tables_to_appear_in_same_query!(activities, sources, venues);
