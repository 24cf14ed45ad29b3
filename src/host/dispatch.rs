//! Translates an intervention into an [`Effect`].

use crate::policy::config::Action;

use super::{Effect, TabId, HOLD_URL};

/// Navigation the effect applies to.
#[derive(Debug, Clone)]
pub struct DispatchContext {
    pub tab_id: TabId,
    pub url: String,
}

/// Build the effect realizing `action` for the navigation in `ctx`.
///
/// Block and redirect actions both produce a redirect: to the configured
/// redirect URL when the action asks for one and a target is configured,
/// otherwise to the internal blocked page with the original URL carried as
/// a percent-encoded query parameter for display. Close produces a close
/// instruction plus a neutral hold target for the in-flight navigation.
pub fn build_effect(
    action: Action,
    redirect_url: &str,
    blocked_page_base: &str,
    ctx: &DispatchContext,
) -> Effect {
    match action {
        Action::BlockTab | Action::RedirectToUrl => {
            let target = if action == Action::RedirectToUrl && !redirect_url.is_empty() {
                redirect_url.to_string()
            } else {
                blocked_page_url(blocked_page_base, &ctx.url)
            };
            Effect::Redirect {
                tab_id: ctx.tab_id,
                url: target,
            }
        }
        Action::CloseTab => Effect::Close {
            tab_id: ctx.tab_id,
            hold_url: HOLD_URL.to_string(),
        },
    }
}

fn blocked_page_url(base: &str, original: &str) -> String {
    let encoded: String = url::form_urlencoded::byte_serialize(original.as_bytes()).collect();
    format!("{base}#blocked?url={encoded}")
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "navgate://blocked";

    fn ctx() -> DispatchContext {
        DispatchContext {
            tab_id: 7,
            url: "https://example.com/watch?v=1&t=2".to_string(),
        }
    }

    #[test]
    fn block_tab_targets_internal_page() {
        let effect = build_effect(Action::BlockTab, "", BASE, &ctx());
        match effect {
            Effect::Redirect { tab_id, url } => {
                assert_eq!(tab_id, 7);
                assert!(url.starts_with("navgate://blocked#blocked?url="));
                assert!(!url.contains("watch?v=1&t=2")); // original is encoded
            }
            other => panic!("unexpected effect: {other:?}"),
        }
    }

    #[test]
    fn redirect_uses_configured_target() {
        let effect = build_effect(
            Action::RedirectToUrl,
            "https://example.org/focus",
            BASE,
            &ctx(),
        );
        assert_eq!(
            effect,
            Effect::Redirect {
                tab_id: 7,
                url: "https://example.org/focus".to_string(),
            }
        );
    }

    #[test]
    fn redirect_without_target_falls_back_to_blocked_page() {
        let effect = build_effect(Action::RedirectToUrl, "", BASE, &ctx());
        match effect {
            Effect::Redirect { url, .. } => {
                assert!(url.starts_with("navgate://blocked#blocked?url="))
            }
            other => panic!("unexpected effect: {other:?}"),
        }
    }

    #[test]
    fn block_tab_ignores_configured_redirect() {
        let effect = build_effect(Action::BlockTab, "https://example.org/focus", BASE, &ctx());
        match effect {
            Effect::Redirect { url, .. } => {
                assert!(url.starts_with("navgate://blocked#blocked?url="))
            }
            other => panic!("unexpected effect: {other:?}"),
        }
    }

    #[test]
    fn close_tab_carries_hold_url() {
        let effect = build_effect(Action::CloseTab, "", BASE, &ctx());
        assert_eq!(
            effect,
            Effect::Close {
                tab_id: 7,
                hold_url: HOLD_URL.to_string(),
            }
        );
    }
}
