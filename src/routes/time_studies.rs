use std::collections::HashMap;

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;
use serde::Serialize;
use serde_json::{json, Value};

use crate::error::{AppError, AppResult};
use crate::models::{NewStep, NewTimeStudy, NewTimeStudyMachinist, Step, TimeStudy, User};
use crate::schema::{step, time_study, time_study_machinists, user};
use crate::state::AppState;
use crate::utils::json::{
    classify_nullable_int, classify_nullable_str, non_empty_str, opt_i32, parse_object,
    NullableValue,
};

use super::steps::{to_step_response, StepResponse};
use super::users::{to_user_response, UserResponse};

#[derive(Serialize)]
pub struct TimeStudyResponse {
    pub id: i32,
    pub name: String,
    pub estimated_total_time: Option<i32>,
    pub actual_total_time: Option<i32>,
    pub number_of_steps: usize,
    pub status: String,
    pub notes: Option<String>,
    pub admin: UserResponse,
    pub admin_id: i32,
    pub steps: Vec<StepResponse>,
    pub machinists: Vec<UserResponse>,
}

#[derive(AsChangeset, Default)]
#[diesel(table_name = time_study)]
struct UpdateTimeStudyChangeset {
    status: Option<String>,
    actual_total_time: Option<Option<i32>>,
    notes: Option<Option<String>>,
}

/// Builds the nested study representation: full admin object, steps sorted by
/// their display order, and the assigned machinists.
pub(super) fn load_study_responses(
    conn: &mut SqliteConnection,
    studies: Vec<TimeStudy>,
) -> AppResult<Vec<TimeStudyResponse>> {
    let admin_ids: Vec<i32> = studies.iter().map(|study| study.admin_id).collect();
    let admins: Vec<User> = user::table
        .filter(user::id.eq_any(&admin_ids))
        .load(conn)?;
    let admin_map: HashMap<i32, User> = admins.into_iter().map(|admin| (admin.id, admin)).collect();

    let steps: Vec<Step> = Step::belonging_to(&studies).load(conn)?;
    let grouped_steps = steps.grouped_by(&studies);

    let study_ids: Vec<i32> = studies.iter().map(|study| study.id).collect();
    let machinist_rows: Vec<(i32, User)> = time_study_machinists::table
        .inner_join(user::table)
        .filter(time_study_machinists::time_study_id.eq_any(&study_ids))
        .select((time_study_machinists::time_study_id, user::all_columns))
        .load(conn)?;
    let mut machinist_map: HashMap<i32, Vec<User>> = HashMap::new();
    for (study_id, machinist) in machinist_rows {
        machinist_map.entry(study_id).or_default().push(machinist);
    }

    studies
        .into_iter()
        .zip(grouped_steps)
        .map(|(study, mut study_steps)| {
            study_steps.sort_by_key(|step| step.order);
            let admin = admin_map.get(&study.admin_id).cloned().ok_or_else(|| {
                AppError::internal(format!(
                    "admin {} missing for time study {}",
                    study.admin_id, study.id
                ))
            })?;
            let machinists = machinist_map.remove(&study.id).unwrap_or_default();

            Ok(TimeStudyResponse {
                id: study.id,
                name: study.name,
                estimated_total_time: study.estimated_total_time,
                actual_total_time: study.actual_total_time,
                number_of_steps: study_steps.len(),
                status: study.status,
                notes: study.notes,
                admin: to_user_response(admin),
                admin_id: study.admin_id,
                steps: study_steps.into_iter().map(to_step_response).collect(),
                machinists: machinists.into_iter().map(to_user_response).collect(),
            })
        })
        .collect()
}

fn load_study_response(
    conn: &mut SqliteConnection,
    study: TimeStudy,
) -> AppResult<TimeStudyResponse> {
    let study_id = study.id;
    load_study_responses(conn, vec![study])?
        .pop()
        .ok_or_else(|| AppError::internal(format!("failed to serialize time study {study_id}")))
}

pub async fn list_time_studies(
    State(state): State<AppState>,
) -> AppResult<Json<Vec<TimeStudyResponse>>> {
    let mut conn = state.db()?;

    let studies: Vec<TimeStudy> = time_study::table.load(&mut conn)?;

    Ok(Json(load_study_responses(&mut conn, studies)?))
}

pub async fn get_time_study(
    State(state): State<AppState>,
    Path(study_id): Path<i32>,
) -> AppResult<Json<TimeStudyResponse>> {
    let mut conn = state.db()?;

    let study: Option<TimeStudy> = time_study::table
        .find(study_id)
        .first(&mut conn)
        .optional()?;
    let Some(study) = study else {
        return Err(AppError::not_found(format!(
            "Time study with id {study_id} not found"
        )));
    };

    Ok(Json(load_study_response(&mut conn, study)?))
}

pub async fn create_time_study(
    State(state): State<AppState>,
    body: Bytes,
) -> AppResult<(StatusCode, Json<TimeStudyResponse>)> {
    let data = parse_object(&body).map_err(AppError::bad_request)?;

    let name = non_empty_str(&data, "name");
    let admin_value = data.get("admin_id");
    let (Some(name), Some(admin_value)) = (name, admin_value) else {
        return Err(AppError::bad_request("Missing required fields: name, admin_id"));
    };

    let mut conn = state.db()?;

    let admin: Option<User> = match admin_value.as_i64().and_then(|v| i32::try_from(v).ok()) {
        Some(admin_id) => user::table.find(admin_id).first(&mut conn).optional()?,
        None => None,
    };
    let Some(admin) = admin else {
        return Err(AppError::not_found(format!(
            "Admin with id {admin_value} not found"
        )));
    };

    // The study, its steps and its machinist assignments are created in one
    // transaction: an invalid step aborts the whole request, while an unknown
    // machinist id is skipped with a warning.
    let study = conn
        .transaction::<TimeStudy, AppError, _>(|conn| {
            let new_study = NewTimeStudy {
                name,
                estimated_total_time: opt_i32(&data, "estimated_total_time"),
                status: data
                    .get("status")
                    .and_then(Value::as_str)
                    .unwrap_or("not started"),
                admin_id: admin.id,
            };
            let study: TimeStudy = diesel::insert_into(time_study::table)
                .values(&new_study)
                .get_result(conn)?;

            if let Some(raw_steps) = data.get("steps").and_then(Value::as_array) {
                for step_data in raw_steps {
                    let step_obj = step_data.as_object();
                    let step_name = step_obj
                        .and_then(|obj| obj.get("name"))
                        .and_then(Value::as_str)
                        .filter(|s| !s.is_empty());
                    let step_order = step_obj
                        .and_then(|obj| obj.get("order"))
                        .and_then(Value::as_i64)
                        .and_then(|v| i32::try_from(v).ok());
                    let (Some(step_name), Some(step_order)) = (step_name, step_order) else {
                        return Err(AppError::bad_request("Each step must have a name and order"));
                    };

                    let new_step = NewStep {
                        name: step_name,
                        estimated_time: step_obj
                            .and_then(|obj| obj.get("estimated_time"))
                            .and_then(Value::as_i64)
                            .and_then(|v| i32::try_from(v).ok()),
                        order: step_order,
                        time_study_id: study.id,
                    };
                    diesel::insert_into(step::table)
                        .values(&new_step)
                        .execute(conn)?;
                }
            }

            if let Some(machinist_ids) = data.get("machinist_ids").and_then(Value::as_array) {
                for raw_id in machinist_ids {
                    let machinist: Option<User> = match raw_id
                        .as_i64()
                        .and_then(|v| i32::try_from(v).ok())
                    {
                        Some(machinist_id) => {
                            user::table.find(machinist_id).first(conn).optional()?
                        }
                        None => None,
                    };
                    match machinist {
                        Some(machinist) => {
                            let assignment = NewTimeStudyMachinist {
                                time_study_id: study.id,
                                user_id: machinist.id,
                            };
                            diesel::insert_into(time_study_machinists::table)
                                .values(&assignment)
                                .execute(conn)?;
                        }
                        None => {
                            tracing::warn!(machinist_id = %raw_id, "machinist not found, skipping");
                        }
                    }
                }
            }

            Ok(study)
        })
        .map_err(|err| err.with_context("Failed to create time study"))?;

    let response = load_study_response(&mut conn, study)?;
    Ok((StatusCode::CREATED, Json(response)))
}

pub async fn update_time_study(
    State(state): State<AppState>,
    Path(study_id): Path<i32>,
    body: Bytes,
) -> AppResult<Json<TimeStudyResponse>> {
    let mut conn = state.db()?;

    let existing: Option<TimeStudy> = time_study::table
        .find(study_id)
        .first(&mut conn)
        .optional()?;
    let Some(existing) = existing else {
        return Err(AppError::not_found(format!(
            "Time study with id {study_id} not found"
        )));
    };

    let data = parse_object(&body).map_err(AppError::bad_request)?;
    if data.is_empty() {
        return Err(AppError::bad_request("Request body cannot be empty"));
    }

    // Only status, actual_total_time and notes are mutable here; name, admin,
    // steps and machinists have their own endpoints or are fixed at creation.
    let status = classify_nullable_str(data.get("status")).map_err(AppError::bad_request)?;
    let actual_total_time =
        classify_nullable_int(data.get("actual_total_time")).map_err(AppError::bad_request)?;
    let notes = classify_nullable_str(data.get("notes")).map_err(AppError::bad_request)?;

    let mut changeset = UpdateTimeStudyChangeset::default();
    match status {
        NullableValue::Omitted => {}
        NullableValue::Null => {
            return Err(AppError::bad_request("status cannot be null"));
        }
        NullableValue::Value(value) => changeset.status = Some(value),
    }
    match actual_total_time {
        NullableValue::Omitted => {}
        NullableValue::Null => changeset.actual_total_time = Some(None),
        NullableValue::Value(value) => changeset.actual_total_time = Some(Some(value)),
    }
    match notes {
        NullableValue::Omitted => {}
        NullableValue::Null => changeset.notes = Some(None),
        NullableValue::Value(value) => changeset.notes = Some(Some(value)),
    }

    if changeset.status.is_none()
        && changeset.actual_total_time.is_none()
        && changeset.notes.is_none()
    {
        return Ok(Json(load_study_response(&mut conn, existing)?));
    }

    diesel::update(time_study::table.find(study_id))
        .set(&changeset)
        .execute(&mut conn)?;

    let updated: TimeStudy = time_study::table.find(study_id).first(&mut conn)?;
    Ok(Json(load_study_response(&mut conn, updated)?))
}

pub async fn delete_time_study(
    State(state): State<AppState>,
    Path(study_id): Path<i32>,
) -> AppResult<Json<serde_json::Value>> {
    let mut conn = state.db()?;

    let existing: Option<TimeStudy> = time_study::table
        .find(study_id)
        .first(&mut conn)
        .optional()?;
    let Some(existing) = existing else {
        return Err(AppError::not_found(format!(
            "Time study with id {study_id} not found"
        )));
    };

    // Steps and machinist assignments go with the study; the admin and
    // machinist users themselves are untouched.
    conn.transaction::<(), AppError, _>(|conn| {
        diesel::delete(
            time_study_machinists::table
                .filter(time_study_machinists::time_study_id.eq(existing.id)),
        )
        .execute(conn)?;
        diesel::delete(step::table.filter(step::time_study_id.eq(existing.id))).execute(conn)?;
        diesel::delete(time_study::table.find(existing.id)).execute(conn)?;
        Ok(())
    })
    .map_err(|err| err.with_context("Failed to delete time study"))?;

    Ok(Json(json!({
        "message": format!(
            "Time Study \"{}\" and its steps deleted successfully.",
            existing.name
        )
    })))
}
