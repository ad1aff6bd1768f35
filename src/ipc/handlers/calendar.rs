use crate::calendar::{self, CalendarSummary};
use crate::ipc::error::{respond, HandlerErr};
use crate::ipc::helpers::{actor, calendar_day_json, course_json, db_conn, opt_str, parse_bool, required_date, required_str};
use crate::ipc::types::{AppState, Request};
use crate::model::{CalendarDayEdit, DayType};
use crate::store::SqliteStore;
use serde_json::{json, Value};

fn summary_json(s: &CalendarSummary) -> Value {
    json!({
        "total": s.total,
        "instructional": s.instructional,
        "off": s.off,
        "half": s.half,
        "modified": s.modified,
    })
}

fn calendar_generate(state: &AppState, req: &Request) -> Result<Value, HandlerErr> {
    let conn = db_conn(state)?;
    let actor = actor(&req.params)?;
    let course_id = required_str(&req.params, "courseId")?;
    let force = parse_bool(&req.params, "force", false)?;

    let store = SqliteStore::new(conn);
    let outcome = calendar::generate(&store, state.access.as_ref(), &actor, &course_id, force)?;
    let days = outcome.days();
    Ok(json!({
        "generated": outcome.was_generated(),
        "skipped": !outcome.was_generated(),
        "summary": summary_json(&CalendarSummary::of(days)),
        "days": days.iter().map(calendar_day_json).collect::<Vec<_>>(),
        "stale": ["calendar", "classes"],
    }))
}

fn calendar_list(state: &AppState, req: &Request) -> Result<Value, HandlerErr> {
    let conn = db_conn(state)?;
    let actor = actor(&req.params)?;
    let course_id = required_str(&req.params, "courseId")?;

    let store = SqliteStore::new(conn);
    let (course, days) = calendar::list(&store, state.access.as_ref(), &actor, &course_id)?;
    Ok(json!({
        "course": course_json(&course),
        "summary": summary_json(&CalendarSummary::of(&days)),
        "days": days.iter().map(calendar_day_json).collect::<Vec<_>>(),
    }))
}

fn calendar_update_day(state: &AppState, req: &Request) -> Result<Value, HandlerErr> {
    let conn = db_conn(state)?;
    let actor = actor(&req.params)?;
    let course_id = required_str(&req.params, "courseId")?;
    let date = required_date(&req.params, "date")?;
    // Rejected before any write.
    let day_type = required_str(&req.params, "dayType")?.parse::<DayType>()?;
    let edit = CalendarDayEdit {
        day_type,
        reason_id: opt_str(&req.params, "reasonId")?,
        note: opt_str(&req.params, "note")?,
    };

    let store = SqliteStore::new(conn);
    calendar::update_day(&store, state.access.as_ref(), &actor, &course_id, date, &edit)?;
    Ok(json!({ "ok": true, "stale": ["calendar", "pacing"] }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "calendar.generate" => Some(respond(&req.id, calendar_generate(state, req))),
        "calendar.list" => Some(respond(&req.id, calendar_list(state, req))),
        "calendar.updateDay" => Some(respond(&req.id, calendar_update_day(state, req))),
        _ => None,
    }
}
