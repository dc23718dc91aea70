use diesel::prelude::*;

use crate::schema::*;

#[derive(Debug, Clone, Queryable, Identifiable)]
#[diesel(table_name = user)]
pub struct User {
    pub id: i32,
    pub username: String,
    pub role: String,
}

/// `role` is passed straight through from the request payload; a missing role
/// hits the NOT NULL constraint at insert time instead of being validated up
/// front, matching the existing frontend contract.
#[derive(Debug, Insertable)]
#[diesel(table_name = user)]
pub struct NewUser<'a> {
    pub username: &'a str,
    pub role: Option<&'a str>,
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations)]
#[diesel(table_name = time_study)]
#[diesel(belongs_to(User, foreign_key = admin_id))]
pub struct TimeStudy {
    pub id: i32,
    pub name: String,
    pub estimated_total_time: Option<i32>,
    pub actual_total_time: Option<i32>,
    pub status: String,
    pub notes: Option<String>,
    pub admin_id: i32,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = time_study)]
pub struct NewTimeStudy<'a> {
    pub name: &'a str,
    pub estimated_total_time: Option<i32>,
    pub status: &'a str,
    pub admin_id: i32,
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations)]
#[diesel(table_name = step)]
#[diesel(belongs_to(TimeStudy))]
pub struct Step {
    pub id: i32,
    pub name: String,
    pub estimated_time: Option<i32>,
    pub order: i32,
    pub actual_time: Option<i32>,
    pub notes: Option<String>,
    pub time_study_id: i32,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = step)]
pub struct NewStep<'a> {
    pub name: &'a str,
    pub estimated_time: Option<i32>,
    pub order: i32,
    pub time_study_id: i32,
}

#[derive(Debug, Clone, Queryable, Associations)]
#[diesel(table_name = time_study_machinists)]
#[diesel(belongs_to(TimeStudy))]
#[diesel(belongs_to(User))]
#[diesel(primary_key(time_study_id, user_id))]
pub struct TimeStudyMachinist {
    pub time_study_id: i32,
    pub user_id: i32,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = time_study_machinists)]
pub struct NewTimeStudyMachinist {
    pub time_study_id: i32,
    pub user_id: i32,
}
