use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use diesel::prelude::*;
use serde::Serialize;
use serde_json::json;

use crate::error::{AppError, AppResult};
use crate::models::{NewStep, Step, TimeStudy};
use crate::schema::{step, time_study};
use crate::state::AppState;
use crate::utils::json::{
    classify_nullable_int, classify_nullable_str, non_empty_str, opt_i32, parse_object,
    NullableValue,
};

#[derive(Serialize)]
pub struct StepResponse {
    pub id: i32,
    pub name: String,
    pub estimated_time: Option<i32>,
    pub order: i32,
    pub actual_time: Option<i32>,
    pub notes: Option<String>,
    pub time_study_id: i32,
}

pub fn to_step_response(step: Step) -> StepResponse {
    StepResponse {
        id: step.id,
        name: step.name,
        estimated_time: step.estimated_time,
        order: step.order,
        actual_time: step.actual_time,
        notes: step.notes,
        time_study_id: step.time_study_id,
    }
}

#[derive(AsChangeset, Default)]
#[diesel(table_name = step)]
struct UpdateStepChangeset {
    actual_time: Option<Option<i32>>,
    notes: Option<Option<String>>,
}

pub async fn add_step(
    State(state): State<AppState>,
    Path(study_id): Path<i32>,
    body: Bytes,
) -> AppResult<(StatusCode, Json<StepResponse>)> {
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

    let data = parse_object(&body).map_err(AppError::bad_request)?;
    let name = non_empty_str(&data, "name");
    let order = opt_i32(&data, "order");
    let (Some(name), Some(order)) = (name, order) else {
        return Err(AppError::bad_request("Step name and order are required"));
    };

    let new_step = NewStep {
        name,
        estimated_time: opt_i32(&data, "estimated_time"),
        order,
        time_study_id: study.id,
    };

    let created: Step = diesel::insert_into(step::table)
        .values(&new_step)
        .get_result(&mut conn)
        .map_err(|err| AppError::from(err).with_context("Failed to create step"))?;

    Ok((StatusCode::CREATED, Json(to_step_response(created))))
}

pub async fn update_step(
    State(state): State<AppState>,
    Path(step_id): Path<i32>,
    body: Bytes,
) -> AppResult<Json<StepResponse>> {
    let mut conn = state.db()?;

    let existing: Option<Step> = step::table.find(step_id).first(&mut conn).optional()?;
    let Some(existing) = existing else {
        return Err(AppError::not_found(format!(
            "Step with id {step_id} not found"
        )));
    };

    let data = parse_object(&body).map_err(AppError::bad_request)?;
    if data.is_empty() {
        return Err(AppError::bad_request("Request body cannot be empty"));
    }

    // Only actual_time and notes are mutable here; anything else in the
    // payload is ignored.
    let actual_time = classify_nullable_int(data.get("actual_time")).map_err(AppError::bad_request)?;
    let notes = classify_nullable_str(data.get("notes")).map_err(AppError::bad_request)?;

    let mut changeset = UpdateStepChangeset::default();
    match actual_time {
        NullableValue::Omitted => {}
        NullableValue::Null => changeset.actual_time = Some(None),
        NullableValue::Value(value) => changeset.actual_time = Some(Some(value)),
    }
    match notes {
        NullableValue::Omitted => {}
        NullableValue::Null => changeset.notes = Some(None),
        NullableValue::Value(value) => changeset.notes = Some(Some(value)),
    }

    if changeset.actual_time.is_none() && changeset.notes.is_none() {
        return Ok(Json(to_step_response(existing)));
    }

    diesel::update(step::table.find(step_id))
        .set(&changeset)
        .execute(&mut conn)?;

    let updated: Step = step::table.find(step_id).first(&mut conn)?;
    Ok(Json(to_step_response(updated)))
}

pub async fn delete_step(
    State(state): State<AppState>,
    Path(step_id): Path<i32>,
) -> AppResult<Json<serde_json::Value>> {
    let mut conn = state.db()?;

    let existing: Option<Step> = step::table.find(step_id).first(&mut conn).optional()?;
    let Some(existing) = existing else {
        return Err(AppError::not_found(format!(
            "Step with id {step_id} not found"
        )));
    };

    diesel::delete(step::table.find(step_id))
        .execute(&mut conn)
        .map_err(|err| AppError::from(err).with_context("Failed to delete step"))?;

    Ok(Json(json!({
        "message": format!("Step \"{}\" deleted successfully.", existing.name)
    })))
}
