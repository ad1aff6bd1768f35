use crate::access::Actor;
use crate::error::PlanError;
use crate::ipc::error::HandlerErr;
use crate::ipc::types::AppState;
use crate::model::{format_iso_date, parse_iso_date, CalendarDay, Course};
use chrono::NaiveDate;
use rusqlite::Connection;
use serde_json::{json, Value};
use std::str::FromStr;

pub fn db_conn(state: &AppState) -> Result<&Connection, HandlerErr> {
    state.db.as_ref().ok_or_else(|| HandlerErr {
        code: "no_workspace",
        message: "select a workspace first".to_string(),
        details: None,
    })
}

pub fn required_str(params: &Value, key: &str) -> Result<String, HandlerErr> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|v| v.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| HandlerErr::bad_params(format!("missing {}", key)))
}

/// The caller identity every course-scoped method must carry.
pub fn actor(params: &Value) -> Result<Actor, HandlerErr> {
    required_str(params, "actorId").map(Actor::new)
}

pub fn parse_bool(params: &Value, key: &str, default: bool) -> Result<bool, HandlerErr> {
    match params.get(key) {
        None => Ok(default),
        Some(v) if v.is_null() => Ok(default),
        Some(v) => v
            .as_bool()
            .ok_or_else(|| HandlerErr::bad_params(format!("{} must be boolean", key))),
    }
}

pub fn opt_str(params: &Value, key: &str) -> Result<Option<String>, HandlerErr> {
    match params.get(key) {
        None => Ok(None),
        Some(v) if v.is_null() => Ok(None),
        Some(v) => {
            let s = v
                .as_str()
                .ok_or_else(|| HandlerErr::bad_params(format!("{} must be string or null", key)))?
                .trim()
                .to_string();
            Ok(if s.is_empty() { None } else { Some(s) })
        }
    }
}

pub fn required_date(params: &Value, key: &str) -> Result<NaiveDate, HandlerErr> {
    let raw = required_str(params, key)?;
    Ok(parse_iso_date(&raw, key)?)
}

pub fn opt_date(params: &Value, key: &str) -> Result<Option<NaiveDate>, HandlerErr> {
    match opt_str(params, key)? {
        Some(raw) => Ok(Some(parse_iso_date(&raw, key)?)),
        None => Ok(None),
    }
}

pub fn opt_enum<T: FromStr<Err = PlanError>>(params: &Value, key: &str) -> Result<Option<T>, HandlerErr> {
    match opt_str(params, key)? {
        Some(raw) => Ok(Some(raw.parse::<T>()?)),
        None => Ok(None),
    }
}

pub fn course_json(course: &Course) -> Value {
    json!({
        "id": course.id,
        "ownerId": course.owner_id,
        "title": course.title,
        "className": course.class_name,
        "libraryId": course.selected_library_id,
        "scheduleModel": course.schedule_model.as_str(),
        "abMeetingDay": course.ab_meeting_day.map(|d| d.as_str()),
        "abPatternStartDate": course.ab_pattern_start_date.map(format_iso_date),
        "schoolYearStart": format_iso_date(course.school_year_start),
        "schoolYearEnd": format_iso_date(course.school_year_end),
    })
}

pub fn calendar_day_json(day: &CalendarDay) -> Value {
    json!({
        "classDate": format_iso_date(day.date),
        "dayType": day.day_type.as_str(),
        "abDay": day.ab_day.map(|d| d.as_str()),
        "reasonId": day.reason_id,
        "note": day.note,
    })
}
