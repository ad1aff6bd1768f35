use crate::db;
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use rusqlite::Connection;
use serde_json::{json, Map, Value};

const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5000;

#[derive(Clone, Copy)]
enum SetupSection {
    Announcements,
    Workspace,
}

impl SetupSection {
    const ALL: [SetupSection; 2] = [Self::Announcements, Self::Workspace];

    fn parse(s: &str) -> Option<Self> {
        match s {
            "announcements" => Some(Self::Announcements),
            "workspace" => Some(Self::Workspace),
            _ => None,
        }
    }

    fn name(self) -> &'static str {
        match self {
            Self::Announcements => "announcements",
            Self::Workspace => "workspace",
        }
    }

    fn key(self) -> &'static str {
        match self {
            Self::Announcements => "setup.announcements",
            Self::Workspace => "setup.workspace",
        }
    }
}

fn default_section(section: SetupSection) -> Value {
    match section {
        SetupSection::Announcements => json!({
            "pruneStale": true
        }),
        SetupSection::Workspace => json!({
            "busyTimeoutMs": DEFAULT_BUSY_TIMEOUT_MS
        }),
    }
}

fn parse_bool(v: &Value, key: &str) -> Result<bool, String> {
    v.as_bool()
        .ok_or_else(|| format!("{} must be boolean", key))
}

fn parse_i64_range(v: &Value, key: &str, min: i64, max: i64) -> Result<i64, String> {
    let n = v
        .as_i64()
        .ok_or_else(|| format!("{} must be integer", key))?;
    if !(min..=max).contains(&n) {
        return Err(format!("{} must be in {}..={}", key, min, max));
    }
    Ok(n)
}

fn merge_section_patch(
    section: SetupSection,
    current: &mut Value,
    patch: &Map<String, Value>,
) -> Result<(), String> {
    let obj = current
        .as_object_mut()
        .ok_or_else(|| "internal setup object must be a JSON object".to_string())?;
    for (k, v) in patch {
        match section {
            SetupSection::Announcements => match k.as_str() {
                "pruneStale" => {
                    obj.insert(k.clone(), Value::Bool(parse_bool(v, k)?));
                }
                _ => return Err(format!("unknown announcements field: {}", k)),
            },
            SetupSection::Workspace => match k.as_str() {
                "busyTimeoutMs" => {
                    obj.insert(k.clone(), Value::from(parse_i64_range(v, k, 0, 60_000)?));
                }
                _ => return Err(format!("unknown workspace field: {}", k)),
            },
        }
    }
    Ok(())
}

fn load_section(conn: &Connection, section: SetupSection) -> anyhow::Result<Value> {
    let mut current = default_section(section);
    if let Some(saved) = db::settings_get_json(conn, section.key())? {
        if let Some(saved_obj) = saved.as_object() {
            // Malformed historical values fall back to defaults field by field.
            let _ = merge_section_patch(section, &mut current, saved_obj);
        }
    }
    Ok(current)
}

/// Whether announcement generation deletes rows for dates no longer in the plan.
pub fn prune_stale_announcements(conn: &Connection) -> anyhow::Result<bool> {
    let section = load_section(conn, SetupSection::Announcements)?;
    Ok(section
        .get("pruneStale")
        .and_then(|v| v.as_bool())
        .unwrap_or(true))
}

pub fn busy_timeout_ms(conn: &Connection) -> u64 {
    load_section(conn, SetupSection::Workspace)
        .ok()
        .and_then(|s| s.get("busyTimeoutMs").and_then(|v| v.as_u64()))
        .unwrap_or(DEFAULT_BUSY_TIMEOUT_MS)
}

fn handle_setup_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let mut out = Map::new();
    for section in SetupSection::ALL {
        match load_section(conn, section) {
            Ok(v) => {
                out.insert(section.name().to_string(), v);
            }
            Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
        }
    }
    ok(&req.id, Value::Object(out))
}

fn handle_setup_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let Some(section_raw) = req.params.get("section").and_then(|v| v.as_str()) else {
        return err(&req.id, "bad_params", "missing section", None);
    };
    let Some(section) = SetupSection::parse(section_raw) else {
        return err(&req.id, "bad_params", "unknown section", None);
    };
    let Some(patch_obj) = req.params.get("patch").and_then(|v| v.as_object()) else {
        return err(&req.id, "bad_params", "patch must be an object", None);
    };

    let mut current = match load_section(conn, section) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    if let Err(msg) = merge_section_patch(section, &mut current, patch_obj) {
        return err(&req.id, "bad_params", msg, None);
    }
    if let Err(e) = db::settings_set_json(conn, section.key(), &current) {
        return err(&req.id, "db_update_failed", e.to_string(), None);
    }
    if let SetupSection::Workspace = section {
        if let Err(e) = db::apply_busy_timeout(conn, busy_timeout_ms(conn)) {
            return err(&req.id, "db_update_failed", e.to_string(), None);
        }
    }
    ok(&req.id, json!({ "ok": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "setup.get" => Some(handle_setup_get(state, req)),
        "setup.update" => Some(handle_setup_update(state, req)),
        _ => None,
    }
}
