use super::handlers;
use super::types::{AppState, Request};
use crate::ipc::error::err;
use tracing::{debug, warn};

pub fn handle_request(state: &mut AppState, req: Request) -> serde_json::Value {
    debug!(id = %req.id, method = %req.method, "request");
    let resp = dispatch(state, &req);
    if resp.get("ok").and_then(|v| v.as_bool()) == Some(false) {
        let code = resp
            .pointer("/error/code")
            .and_then(|v| v.as_str())
            .unwrap_or("");
        warn!(id = %req.id, method = %req.method, code, "request failed");
    }
    resp
}

fn dispatch(state: &mut AppState, req: &Request) -> serde_json::Value {
    if let Some(resp) = handlers::core::try_handle(state, req) {
        return resp;
    }
    if let Some(resp) = handlers::setup::try_handle(state, req) {
        return resp;
    }
    if let Some(resp) = handlers::curriculum::try_handle(state, req) {
        return resp;
    }
    if let Some(resp) = handlers::courses::try_handle(state, req) {
        return resp;
    }
    if let Some(resp) = handlers::calendar::try_handle(state, req) {
        return resp;
    }
    if let Some(resp) = handlers::pacing::try_handle(state, req) {
        return resp;
    }
    if let Some(resp) = handlers::announcements::try_handle(state, req) {
        return resp;
    }

    err(
        &req.id,
        "not_implemented",
        format!("unknown method: {}", req.method),
        None,
    )
}
