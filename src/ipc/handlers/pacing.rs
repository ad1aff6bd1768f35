use crate::ipc::error::{respond, HandlerErr};
use crate::ipc::helpers::{actor, course_json, db_conn, required_str};
use crate::ipc::types::{AppState, Request};
use crate::model::format_iso_date;
use crate::pacing::{self, lesson_label};
use crate::store::SqliteStore;
use serde_json::{json, Value};

fn pacing_generate(state: &AppState, req: &Request) -> Result<Value, HandlerErr> {
    let conn = db_conn(state)?;
    let actor = actor(&req.params)?;
    let course_id = required_str(&req.params, "courseId")?;

    let store = SqliteStore::new(conn);
    let entries = pacing::assign(&store, state.access.as_ref(), &actor, &course_id)?;
    Ok(json!({
        "planned": entries.len(),
        "firstDate": entries.first().map(|e| format_iso_date(e.date)),
        "lastDate": entries.last().map(|e| format_iso_date(e.date)),
        "stale": ["pacing", "calendar", "classes"],
    }))
}

fn pacing_list(state: &AppState, req: &Request) -> Result<Value, HandlerErr> {
    let conn = db_conn(state)?;
    let actor = actor(&req.params)?;
    let course_id = required_str(&req.params, "courseId")?;

    let store = SqliteStore::new(conn);
    let view = pacing::list(&store, state.access.as_ref(), &actor, &course_id)?;
    let rows = view
        .rows
        .iter()
        .map(|row| {
            let lesson = row.lesson.as_ref();
            json!({
                "classDate": format_iso_date(row.entry.date),
                "status": row.entry.status.as_str(),
                "isAddedBufferDay": row.entry.is_added_buffer_day,
                "lessonId": row.entry.lesson_id,
                "sequenceIndex": lesson.map(|l| l.sequence_index),
                "label": lesson_label(
                    lesson.and_then(|l| l.source_lesson_code.as_deref()),
                    lesson.map(|l| l.title.as_str()).unwrap_or(""),
                ),
                "objective": lesson.map(|l| l.objective.as_str()),
            })
        })
        .collect::<Vec<_>>();
    Ok(json!({
        "course": course_json(&view.course),
        "counts": {
            "eligibleDays": view.counts.eligible_days,
            "libraryLessons": view.counts.library_lessons,
            "planned": view.counts.planned,
        },
        "rows": rows,
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "pacing.generate" => Some(respond(&req.id, pacing_generate(state, req))),
        "pacing.list" => Some(respond(&req.id, pacing_list(state, req))),
        _ => None,
    }
}
