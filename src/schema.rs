diesel::table! {
    step (id) {
        id -> Integer,
        name -> Text,
        estimated_time -> Nullable<Integer>,
        order -> Integer,
        actual_time -> Nullable<Integer>,
        notes -> Nullable<Text>,
        time_study_id -> Integer,
    }
}

diesel::table! {
    time_study (id) {
        id -> Integer,
        name -> Text,
        estimated_total_time -> Nullable<Integer>,
        actual_total_time -> Nullable<Integer>,
        status -> Text,
        notes -> Nullable<Text>,
        admin_id -> Integer,
    }
}

diesel::table! {
    time_study_machinists (time_study_id, user_id) {
        time_study_id -> Integer,
        user_id -> Integer,
    }
}

diesel::table! {
    user (id) {
        id -> Integer,
        username -> Text,
        role -> Text,
    }
}

diesel::joinable!(step -> time_study (time_study_id));
diesel::joinable!(time_study -> user (admin_id));
diesel::joinable!(time_study_machinists -> time_study (time_study_id));
diesel::joinable!(time_study_machinists -> user (user_id));

diesel::allow_tables_to_appear_in_same_query!(step, time_study, time_study_machinists, user,);
