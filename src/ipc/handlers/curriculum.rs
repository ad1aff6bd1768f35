use crate::announce::group_standard_codes;
use crate::curriculum;
use crate::error::PlanError;
use crate::ipc::error::{respond, HandlerErr};
use crate::ipc::helpers::{db_conn, required_str};
use crate::ipc::types::{AppState, Request};
use crate::store::{PlannerStore, SqliteStore};
use serde_json::{json, Value};
use std::path::PathBuf;

fn libraries_list(state: &AppState, _req: &Request) -> Result<Value, HandlerErr> {
    let conn = db_conn(state)?;
    let libraries = SqliteStore::new(conn)
        .libraries()?
        .into_iter()
        .map(|l| {
            json!({
                "id": l.id,
                "provider": l.provider,
                "classCode": l.class_code,
                "className": l.class_name,
                "lessonCount": l.lesson_count,
            })
        })
        .collect::<Vec<_>>();
    Ok(json!({ "libraries": libraries }))
}

fn libraries_lessons(state: &AppState, req: &Request) -> Result<Value, HandlerErr> {
    let conn = db_conn(state)?;
    let library_id = required_str(&req.params, "libraryId")?;
    let store = SqliteStore::new(conn);
    if store.library(&library_id)?.is_none() {
        return Err(PlanError::NotFound("library").into());
    }
    let lessons = store.library_lessons(&library_id)?;
    let lesson_ids: Vec<String> = lessons.iter().map(|l| l.id.clone()).collect();
    let links = group_standard_codes(store.standard_codes(&lesson_ids)?);
    let out = lessons
        .iter()
        .map(|l| {
            json!({
                "id": l.id,
                "sequenceIndex": l.sequence_index,
                "sourceLessonCode": l.source_lesson_code,
                "title": l.title,
                "objective": l.objective,
                "standards": links.get(&l.id).cloned().unwrap_or_default(),
            })
        })
        .collect::<Vec<_>>();
    Ok(json!({ "libraryId": library_id, "lessons": out }))
}

fn import_csv(state: &AppState, req: &Request) -> Result<Value, HandlerErr> {
    let conn = db_conn(state)?;
    let path = PathBuf::from(required_str(&req.params, "path")?);
    let summary = curriculum::import_csv_file(conn, &path)?;
    let skipped = summary
        .skipped
        .iter()
        .map(|s| json!({ "line": s.line, "reason": s.reason }))
        .collect::<Vec<_>>();
    Ok(json!({
        "libraries": summary.libraries,
        "lessons": summary.lessons,
        "standards": summary.standards,
        "skipped": skipped,
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "libraries.list" => Some(respond(&req.id, libraries_list(state, req))),
        "libraries.lessons" => Some(respond(&req.id, libraries_lessons(state, req))),
        "curriculum.importCsv" => Some(respond(&req.id, import_csv(state, req))),
        _ => None,
    }
}
