//! Execution-host boundary.
//!
//! The engine never talks to a browser directly: every capability it needs
//! from the surrounding host (listener registration, tab mutation, tab
//! lookup) is injected through the [`ExecutionHost`] trait so the decision
//! logic is unit-testable with no host present. Decisions that warrant
//! intervention are rendered as [`Effect`] values; applying an effect to
//! real tabs is the integration layer's job.

pub mod dispatch;

use tracing::info;

/// Identifier of a tab as assigned by the execution host.
pub type TabId = i64;

/// Neutral target for an in-flight navigation whose tab is being closed.
pub const HOLD_URL: &str = "about:blank";

/// A concrete instruction handed to the execution host to realize a
/// decision.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Effect {
    /// Steer the tab's navigation to `url`.
    Redirect { tab_id: TabId, url: String },
    /// Close the tab; the navigation that triggered the decision is steered
    /// to `hold_url` since its tab is about to be destroyed.
    Close { tab_id: TabId, hold_url: String },
}

/// Capabilities the engine requires from its execution host.
pub trait ExecutionHost: Send + Sync {
    /// Register the engine with the host's navigation/tab event stream.
    /// Called exactly once per disabled→enabled transition.
    fn attach_listeners(&self);

    /// Deregister from the event stream. Called exactly once per
    /// enabled→disabled transition, before `disable` returns.
    fn detach_listeners(&self);

    /// Steer the given tab to `url`.
    fn redirect_tab(&self, tab_id: TabId, url: &str);

    /// Close the given tab.
    fn close_tab(&self, tab_id: TabId);

    /// Current URL of the given tab, if the host still knows it.
    fn tab_url(&self, tab_id: TabId) -> Option<String>;

    /// Base URL of the internal page shown for blocked navigations.
    fn blocked_page_base(&self) -> String;
}

/// Host implementation with no browser behind it.
///
/// Used by the one-off CLI path and the HTTP surface, where effects are
/// returned to the caller instead of pushed; tab mutations only leave a
/// trace line.
#[derive(Debug, Default)]
pub struct DetachedHost;

impl ExecutionHost for DetachedHost {
    fn attach_listeners(&self) {
        info!("listeners attached");
    }

    fn detach_listeners(&self) {
        info!("listeners detached");
    }

    fn redirect_tab(&self, tab_id: TabId, url: &str) {
        info!(tab_id, url, "redirect tab");
    }

    fn close_tab(&self, tab_id: TabId) {
        info!(tab_id, "close tab");
    }

    fn tab_url(&self, _tab_id: TabId) -> Option<String> {
        None
    }

    fn blocked_page_base(&self) -> String {
        "navgate://blocked".to_string()
    }
}
