use crate::access::load_owned_course;
use crate::courses::{self, CourseDraft};
use crate::ipc::error::{respond, HandlerErr};
use crate::ipc::helpers::{actor, course_json, db_conn, opt_date, opt_enum, opt_str, required_date, required_str};
use crate::ipc::types::{AppState, Request};
use crate::model::ScheduleModel;
use crate::store::SqliteStore;
use serde_json::{json, Value};

fn courses_create(state: &AppState, req: &Request) -> Result<Value, HandlerErr> {
    let conn = db_conn(state)?;
    let actor = actor(&req.params)?;
    let schedule_model = required_str(&req.params, "scheduleModel")?.parse::<ScheduleModel>()?;
    let draft = CourseDraft {
        library_id: required_str(&req.params, "libraryId")?,
        title: opt_str(&req.params, "title")?,
        schedule_model,
        ab_meeting_day: opt_enum(&req.params, "abMeetingDay")?,
        ab_pattern_start_date: opt_date(&req.params, "abPatternStartDate")?,
        school_year_start: required_date(&req.params, "schoolYearStart")?,
        school_year_end: required_date(&req.params, "schoolYearEnd")?,
    };
    let course = courses::create(&SqliteStore::new(conn), &actor, draft)?;
    Ok(json!({
        "courseId": course.id,
        "course": course_json(&course),
        "stale": ["classes"],
    }))
}

fn courses_list(state: &AppState, req: &Request) -> Result<Value, HandlerErr> {
    let conn = db_conn(state)?;
    let actor = actor(&req.params)?;
    let rows = courses::list(&SqliteStore::new(conn), &actor)?
        .into_iter()
        .map(|s| {
            let mut v = course_json(&s.course);
            v["calendarDayCount"] = json!(s.calendar_days);
            v["plannedLessonCount"] = json!(s.planned_lessons);
            v["announcementCount"] = json!(s.announcements);
            v
        })
        .collect::<Vec<_>>();
    Ok(json!({ "courses": rows }))
}

fn courses_open(state: &AppState, req: &Request) -> Result<Value, HandlerErr> {
    let conn = db_conn(state)?;
    let actor = actor(&req.params)?;
    let course_id = required_str(&req.params, "courseId")?;
    let store = SqliteStore::new(conn);
    let course = load_owned_course(&store, state.access.as_ref(), &actor, &course_id)?;
    Ok(json!({ "course": course_json(&course) }))
}

fn courses_delete(state: &AppState, req: &Request) -> Result<Value, HandlerErr> {
    let conn = db_conn(state)?;
    let actor = actor(&req.params)?;
    let course_id = required_str(&req.params, "courseId")?;
    courses::delete(&SqliteStore::new(conn), state.access.as_ref(), &actor, &course_id)?;
    Ok(json!({ "ok": true, "stale": ["classes"] }))
}

fn reasons_list(state: &AppState, req: &Request) -> Result<Value, HandlerErr> {
    let conn = db_conn(state)?;
    let actor = actor(&req.params)?;
    let reasons = SqliteStore::new(conn)
        .reasons_for_owner(&actor.id)?
        .into_iter()
        .map(|r| {
            json!({
                "id": r.id,
                "label": r.label,
                "global": r.owner_id.is_none(),
            })
        })
        .collect::<Vec<_>>();
    Ok(json!({ "reasons": reasons }))
}

fn reasons_create(state: &AppState, req: &Request) -> Result<Value, HandlerErr> {
    let conn = db_conn(state)?;
    let actor = actor(&req.params)?;
    let label = required_str(&req.params, "label")?;
    if label.chars().count() > 80 {
        return Err(HandlerErr::bad_params("label length must be <= 80"));
    }
    let reason = SqliteStore::new(conn).create_reason(&actor.id, &label)?;
    Ok(json!({ "reasonId": reason.id, "label": reason.label }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "courses.create" => Some(respond(&req.id, courses_create(state, req))),
        "courses.list" => Some(respond(&req.id, courses_list(state, req))),
        "courses.open" => Some(respond(&req.id, courses_open(state, req))),
        "courses.delete" => Some(respond(&req.id, courses_delete(state, req))),
        "reasons.list" => Some(respond(&req.id, reasons_list(state, req))),
        "reasons.create" => Some(respond(&req.id, reasons_create(state, req))),
        _ => None,
    }
}
