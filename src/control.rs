//! Messaging-boundary adapter for the configuration surface.
//!
//! The configuration UI talks to the engine by operation name. Dispatch by
//! name lives only here, mapped onto a fixed allow-list of engine methods;
//! the engine itself keeps a typed surface. Unknown names resolve to a
//! defined [`InvokeResponse::NotFound`], never a panic across the boundary.

use chrono::Utc;
use serde::Serialize;
use serde_json::{json, Value};

use crate::policy::config::{Action, Mode};
use crate::policy::engine::PolicyEngine;
use crate::policy::schedule::Schedule;

/// Result of a name-based invocation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "kebab-case")]
pub enum InvokeResponse {
    Ok { value: Value },
    NotFound { operation: String },
    BadArgs { operation: String, message: String },
}

fn ok(value: Value) -> InvokeResponse {
    InvokeResponse::Ok { value }
}

fn bad_args(operation: &str, message: impl std::fmt::Display) -> InvokeResponse {
    InvokeResponse::BadArgs {
        operation: operation.to_string(),
        message: message.to_string(),
    }
}

fn arg<T: serde::de::DeserializeOwned>(
    operation: &str,
    params: &[Value],
    index: usize,
) -> Result<T, InvokeResponse> {
    let value = params
        .get(index)
        .ok_or_else(|| bad_args(operation, format!("missing argument {index}")))?;
    serde_json::from_value(value.clone()).map_err(|e| bad_args(operation, e))
}

/// Invoke an engine operation by name.
pub fn invoke(engine: &PolicyEngine, operation: &str, params: &[Value]) -> InvokeResponse {
    match operation {
        "get_mode" => ok(json!(engine.mode())),
        "set_mode" => match arg::<Mode>(operation, params, 0) {
            Ok(mode) => {
                engine.set_mode(mode);
                ok(Value::Null)
            }
            Err(resp) => resp,
        },
        "get_action" => ok(json!(engine.action())),
        "set_action" => match arg::<Action>(operation, params, 0) {
            Ok(action) => {
                engine.set_action(action);
                ok(Value::Null)
            }
            Err(resp) => resp,
        },
        "get_blacklist" => ok(json!(engine.blacklist())),
        "set_blacklist" => match arg::<Vec<String>>(operation, params, 0) {
            Ok(list) => {
                engine.set_blacklist(list);
                ok(Value::Null)
            }
            Err(resp) => resp,
        },
        "get_whitelist" => ok(json!(engine.whitelist())),
        "set_whitelist" => match arg::<Vec<String>>(operation, params, 0) {
            Ok(list) => {
                engine.set_whitelist(list);
                ok(Value::Null)
            }
            Err(resp) => resp,
        },
        "get_schedule" => ok(json!(engine.schedule())),
        "set_schedule" => match arg::<Schedule>(operation, params, 0) {
            Ok(schedule) => {
                engine.set_schedule(schedule);
                ok(Value::Null)
            }
            Err(resp) => resp,
        },
        "get_redirect_url" => ok(json!(engine.redirect_url())),
        "set_redirect_url" => match arg::<String>(operation, params, 0) {
            Ok(url) => {
                engine.set_redirect_url(&url);
                ok(json!(engine.redirect_url()))
            }
            Err(resp) => resp,
        },
        "get_unblock_once_timeout" => ok(json!(engine.unblock_once_timeout())),
        "set_unblock_once_timeout" => match arg::<u64>(operation, params, 0) {
            Ok(seconds) => {
                engine.set_unblock_once_timeout(seconds);
                ok(Value::Null)
            }
            Err(resp) => resp,
        },
        "get_is_enabled" => ok(json!(engine.is_enabled())),
        "set_is_enabled" => match arg::<bool>(operation, params, 0) {
            Ok(enabled) => {
                engine.set_is_enabled(enabled);
                ok(Value::Null)
            }
            Err(resp) => resp,
        },
        "is_blacklisted" => match arg::<String>(operation, params, 0) {
            Ok(url) => ok(json!(engine.is_blacklisted(&url))),
            Err(resp) => resp,
        },
        "is_whitelisted" => match arg::<String>(operation, params, 0) {
            Ok(url) => ok(json!(engine.is_whitelisted(&url))),
            Err(resp) => resp,
        },
        "allow_host_for" => {
            let host = match arg::<String>(operation, params, 0) {
                Ok(host) => host,
                Err(resp) => return resp,
            };
            match arg::<u64>(operation, params, 1) {
                Ok(minutes) => {
                    engine.allow_host_for(&host, minutes, Utc::now());
                    ok(Value::Null)
                }
                Err(resp) => resp,
            }
        }
        "allow_host_once" => match arg::<String>(operation, params, 0) {
            Ok(host) => {
                engine.allow_host_once(&host);
                ok(Value::Null)
            }
            Err(resp) => resp,
        },
        "get_settings" => ok(json!(engine.snapshot())),
        _ => InvokeResponse::NotFound {
            operation: operation.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::DetachedHost;
    use std::sync::Arc;

    fn engine() -> PolicyEngine {
        PolicyEngine::new(Arc::new(DetachedHost))
    }

    #[test]
    fn unknown_operation_is_not_found() {
        let engine = engine();
        let resp = invoke(&engine, "self_destruct", &[]);
        assert_eq!(
            resp,
            InvokeResponse::NotFound {
                operation: "self_destruct".to_string()
            }
        );
    }

    #[test]
    fn get_set_mode_roundtrip() {
        let engine = engine();
        assert_eq!(invoke(&engine, "get_mode", &[]), ok(json!("blacklist")));

        let resp = invoke(&engine, "set_mode", &[json!("whitelist")]);
        assert_eq!(resp, ok(Value::Null));
        assert_eq!(invoke(&engine, "get_mode", &[]), ok(json!("whitelist")));
    }

    #[test]
    fn set_blacklist_recompiles() {
        let engine = engine();
        let resp = invoke(
            &engine,
            "set_blacklist",
            &[json!(["*.facebook.com/*", "*.twitter.com/*"])],
        );
        assert_eq!(resp, ok(Value::Null));
        assert_eq!(
            invoke(&engine, "is_blacklisted", &[json!("https://www.facebook.com/feed")]),
            ok(json!(true))
        );
    }

    #[test]
    fn missing_argument_is_bad_args() {
        let engine = engine();
        let resp = invoke(&engine, "set_mode", &[]);
        assert!(matches!(resp, InvokeResponse::BadArgs { .. }));
    }

    #[test]
    fn wrong_argument_type_is_bad_args() {
        let engine = engine();
        let resp = invoke(&engine, "set_unblock_once_timeout", &[json!("ten")]);
        assert!(matches!(resp, InvokeResponse::BadArgs { .. }));
    }

    #[test]
    fn set_redirect_url_reports_sanitized_value() {
        let engine = engine();
        let resp = invoke(&engine, "set_redirect_url", &[json!("garbage")]);
        assert_eq!(resp, ok(json!("")));
    }

    #[test]
    fn enable_via_invoke() {
        let engine = engine();
        invoke(&engine, "set_is_enabled", &[json!(true)]);
        assert_eq!(invoke(&engine, "get_is_enabled", &[]), ok(json!(true)));
    }

    #[test]
    fn allow_host_once_inserts_override() {
        let engine = engine();
        invoke(&engine, "set_blacklist", &[json!(["*example.com*"])]);
        invoke(&engine, "allow_host_once", &[json!("example.com")]);

        let decision = engine.decide("http://example.com/", chrono::Local::now());
        assert_eq!(decision, crate::policy::engine::Decision::Noop);
    }
}
