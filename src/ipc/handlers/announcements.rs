use crate::announce;
use crate::export;
use crate::ipc::error::{respond, HandlerErr};
use crate::ipc::handlers::setup;
use crate::ipc::helpers::{actor, db_conn, parse_bool, required_str};
use crate::ipc::types::{AppState, Request};
use crate::model::{format_iso_date, AnnouncementRecord};
use crate::store::SqliteStore;
use serde_json::{json, Value};
use std::path::PathBuf;

fn record_json(r: &AnnouncementRecord) -> Value {
    json!({
        "classDate": format_iso_date(r.date),
        "content": r.content,
        "sha256": r.content_sha256,
        "updatedAt": r.updated_at,
    })
}

fn announcements_generate(state: &AppState, req: &Request) -> Result<Value, HandlerErr> {
    let conn = db_conn(state)?;
    let actor = actor(&req.params)?;
    let course_id = required_str(&req.params, "courseId")?;
    let configured = setup::prune_stale_announcements(conn).map_err(|e| HandlerErr {
        code: "db_query_failed",
        message: e.to_string(),
        details: None,
    })?;
    let prune_stale = parse_bool(&req.params, "pruneStale", configured)?;

    let store = SqliteStore::new(conn);
    let outcome = announce::compose(&store, state.access.as_ref(), &actor, &course_id, prune_stale)?;
    Ok(json!({
        "count": outcome.records.len(),
        "changed": outcome.changed,
        "pruned": outcome.pruned,
        "stale": ["announcements", "pacing"],
    }))
}

fn announcements_list(state: &AppState, req: &Request) -> Result<Value, HandlerErr> {
    let conn = db_conn(state)?;
    let actor = actor(&req.params)?;
    let course_id = required_str(&req.params, "courseId")?;

    let store = SqliteStore::new(conn);
    let (_course, records) = announce::list(&store, state.access.as_ref(), &actor, &course_id)?;
    Ok(json!({
        "announcements": records.iter().map(record_json).collect::<Vec<_>>(),
    }))
}

fn announcements_export(state: &AppState, req: &Request) -> Result<Value, HandlerErr> {
    let conn = db_conn(state)?;
    let actor = actor(&req.params)?;
    let course_id = required_str(&req.params, "courseId")?;
    let out_path = PathBuf::from(required_str(&req.params, "outPath")?);

    let store = SqliteStore::new(conn);
    let (course, records) = announce::list(&store, state.access.as_ref(), &actor, &course_id)?;
    let summary = export::export_announcements(&course, &records, &out_path)?;
    Ok(json!({
        "outPath": out_path.to_string_lossy(),
        "bundleFormat": summary.bundle_format,
        "entryCount": summary.entry_count,
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "announcements.generate" => Some(respond(&req.id, announcements_generate(state, req))),
        "announcements.list" => Some(respond(&req.id, announcements_list(state, req))),
        "announcements.export" => Some(respond(&req.id, announcements_export(state, req))),
        _ => None,
    }
}
