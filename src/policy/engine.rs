//! The per-navigation decision engine.
//!
//! One [`PolicyEngine`] instance exists per process. It owns the mutable
//! policy state (mode, action, rule lists, schedule, redirect target) and
//! the temporary override store, and answers every navigation attempt with
//! a [`Decision`], synchronously. Configuration setters and `decide` share
//! a single `RwLock`, so a decision observes either the fully-old or the
//! fully-new state, never a mix.

use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use chrono::{DateTime, Local, Utc};
use serde::Serialize;
use tracing::{debug, info};
use url::Url;

use crate::host::dispatch::{build_effect, DispatchContext};
use crate::host::{Effect, ExecutionHost, TabId};

use super::config::{sanitize_redirect_url, Action, Mode, Settings};
use super::overrides::TemporaryOverrideStore;
use super::rules::RuleSet;
use super::schedule::Schedule;

/// The engine's verdict for one navigation attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "verdict", rename_all = "kebab-case")]
pub enum Decision {
    /// Let the navigation proceed untouched.
    Noop,
    /// Intervene with the given action.
    Intervene { action: Action },
}

impl Decision {
    /// Stable label used by the audit log and stats.
    pub fn label(&self) -> &'static str {
        match self {
            Decision::Noop => "noop",
            Decision::Intervene {
                action: Action::BlockTab,
            } => "block-tab",
            Decision::Intervene {
                action: Action::RedirectToUrl,
            } => "redirect-to-url",
            Decision::Intervene {
                action: Action::CloseTab,
            } => "close-tab",
        }
    }
}

/// Mutable policy fields guarded by the engine's state lock.
#[derive(Debug, Clone)]
struct PolicyState {
    mode: Mode,
    action: Action,
    blacklist: RuleSet,
    whitelist: RuleSet,
    schedule: Schedule,
    redirect_url: String,
    unblock_once_timeout: u64,
    enable_on_startup: bool,
}

impl Default for PolicyState {
    fn default() -> Self {
        let defaults = Settings::default();
        PolicyState {
            mode: defaults.mode,
            action: defaults.action,
            blacklist: RuleSet::default(),
            whitelist: RuleSet::default(),
            schedule: defaults.schedule,
            redirect_url: defaults.redirect_url,
            unblock_once_timeout: defaults.unblock_once_timeout,
            enable_on_startup: defaults.enable_on_startup,
        }
    }
}

/// Listener attachment state; `listeners_attached == enabled` at rest.
#[derive(Debug, Default)]
struct RunState {
    enabled: bool,
    listeners_attached: bool,
}

/// Orchestrator for every navigation decision and policy mutation.
pub struct PolicyEngine {
    state: RwLock<PolicyState>,
    run: Mutex<RunState>,
    overrides: TemporaryOverrideStore,
    host: Arc<dyn ExecutionHost>,
}

impl PolicyEngine {
    /// Build an engine with safe defaults: disabled, empty lists, blacklist
    /// mode, no listeners attached. Loaded settings are applied afterwards
    /// via [`apply_settings`](Self::apply_settings).
    pub fn new(host: Arc<dyn ExecutionHost>) -> Self {
        PolicyEngine {
            state: RwLock::new(PolicyState::default()),
            run: Mutex::new(RunState::default()),
            overrides: TemporaryOverrideStore::new(),
            host,
        }
    }

    //----- Decision path

    /// Decide what to do with a navigation to `url` at `now`.
    ///
    /// Precedence: schedule gate, then temporary override, then rule lists.
    /// An overridden host is treated as not-blacklisted in blacklist mode
    /// and as whitelisted in whitelist mode; a matched one-shot override is
    /// consumed on the way.
    pub fn decide(&self, url: &str, now: DateTime<Local>) -> Decision {
        let state = self.state.read().unwrap();
        if state.schedule.enabled && !state.schedule.is_active_at(now) {
            debug!(url, "outside schedule window, navigation unrestricted");
            return Decision::Noop;
        }
        let grace = Duration::from_secs(state.unblock_once_timeout);
        let now_utc = now.with_timezone(&Utc);
        let host = host_of(url);
        if let Some(host) = host.as_deref() {
            if self.overrides.is_allowed(host, now_utc) {
                self.overrides.consume_once_if_present(host, grace);
                debug!(url, host, "temporary override active");
                return Decision::Noop;
            }
        }
        match state.mode {
            Mode::Blacklist if state.blacklist.contains_match(url) => Decision::Intervene {
                action: state.action,
            },
            Mode::Whitelist if !state.whitelist.contains_match(url) => Decision::Intervene {
                action: state.action,
            },
            _ => Decision::Noop,
        }
    }

    /// Handle a navigation attempt reported by the execution host.
    ///
    /// Returns the effect for the host to apply to the in-flight
    /// navigation, or `None` to let it proceed. A close decision also
    /// closes the tab through the host; the returned effect then steers the
    /// doomed navigation to a neutral target.
    pub fn report_navigation(
        &self,
        url: &str,
        tab_id: TabId,
        now: DateTime<Local>,
    ) -> Option<Effect> {
        if !self.is_enabled() {
            return None;
        }
        let effect = self.effect_for(url, tab_id, now)?;
        if let Effect::Close { tab_id, .. } = effect {
            self.host.close_tab(tab_id);
        }
        Some(effect)
    }

    /// Handle a tab whose URL changed after the navigation committed.
    /// The effect is applied directly through the host.
    pub fn report_tab_updated(&self, tab_id: TabId, url: &str, now: DateTime<Local>) {
        if !self.is_enabled() || !has_web_scheme(url) {
            return;
        }
        match self.effect_for(url, tab_id, now) {
            Some(Effect::Redirect { tab_id, url }) => self.host.redirect_tab(tab_id, &url),
            Some(Effect::Close { tab_id, .. }) => self.host.close_tab(tab_id),
            None => {}
        }
    }

    /// Handle a tab being replaced by another (e.g. prerendering swaps).
    /// The new tab's URL is fetched through the host and re-evaluated.
    pub fn report_tab_replaced(&self, added_tab_id: TabId, removed_tab_id: TabId, now: DateTime<Local>) {
        if !self.is_enabled() {
            return;
        }
        debug!(added_tab_id, removed_tab_id, "tab replaced");
        if let Some(url) = self.host.tab_url(added_tab_id) {
            self.report_tab_updated(added_tab_id, &url, now);
        }
    }

    fn effect_for(&self, url: &str, tab_id: TabId, now: DateTime<Local>) -> Option<Effect> {
        match self.decide(url, now) {
            Decision::Noop => None,
            Decision::Intervene { action } => {
                let (redirect_url, base) = {
                    let state = self.state.read().unwrap();
                    (state.redirect_url.clone(), self.host.blocked_page_base())
                };
                let ctx = DispatchContext {
                    tab_id,
                    url: url.to_string(),
                };
                Some(build_effect(action, &redirect_url, &base, &ctx))
            }
        }
    }

    //----- Run state

    /// Attach to the host's event stream. Idempotent.
    pub fn enable(&self) {
        let mut run = self.run.lock().unwrap();
        if !run.listeners_attached {
            self.host.attach_listeners();
            run.listeners_attached = true;
        }
        run.enabled = true;
    }

    /// Detach from the host's event stream before returning. Idempotent.
    /// Effects already handed out for in-flight navigations stand.
    pub fn disable(&self) {
        let mut run = self.run.lock().unwrap();
        if run.listeners_attached {
            self.host.detach_listeners();
            run.listeners_attached = false;
        }
        run.enabled = false;
    }

    pub fn is_enabled(&self) -> bool {
        self.run.lock().unwrap().enabled
    }

    //----- Temporary overrides

    /// Allow `hostname` for the given number of minutes.
    pub fn allow_host_for(&self, hostname: &str, minutes: u64, now: DateTime<Utc>) {
        self.overrides.allow_for(hostname, minutes, now);
    }

    /// Allow exactly one navigation to `hostname`.
    pub fn allow_host_once(&self, hostname: &str) {
        self.overrides.allow_once(hostname);
    }

    //----- Getters & setters

    pub fn set_mode(&self, mode: Mode) {
        self.state.write().unwrap().mode = mode;
    }

    pub fn mode(&self) -> Mode {
        self.state.read().unwrap().mode
    }

    pub fn set_action(&self, action: Action) {
        self.state.write().unwrap().action = action;
    }

    pub fn action(&self) -> Action {
        self.state.read().unwrap().action
    }

    /// Replace the blacklist; the rule set is fully recompiled before the
    /// setter returns.
    pub fn set_blacklist(&self, patterns: Vec<String>) {
        let rules = RuleSet::compile(&patterns);
        self.state.write().unwrap().blacklist = rules;
    }

    pub fn blacklist(&self) -> Vec<String> {
        self.state.read().unwrap().blacklist.patterns()
    }

    /// Replace the whitelist; the rule set is fully recompiled before the
    /// setter returns.
    pub fn set_whitelist(&self, patterns: Vec<String>) {
        let rules = RuleSet::compile(&patterns);
        self.state.write().unwrap().whitelist = rules;
    }

    pub fn whitelist(&self) -> Vec<String> {
        self.state.read().unwrap().whitelist.patterns()
    }

    pub fn set_schedule(&self, schedule: Schedule) {
        self.state.write().unwrap().schedule = schedule;
    }

    pub fn schedule(&self) -> Schedule {
        self.state.read().unwrap().schedule.clone()
    }

    /// Set the custom redirect target. Invalid input is coerced to empty so
    /// the redirect action falls back to the internal blocked page.
    pub fn set_redirect_url(&self, url: &str) {
        self.state.write().unwrap().redirect_url = sanitize_redirect_url(url);
    }

    pub fn redirect_url(&self) -> String {
        self.state.read().unwrap().redirect_url.clone()
    }

    pub fn set_unblock_once_timeout(&self, seconds: u64) {
        self.state.write().unwrap().unblock_once_timeout = seconds;
    }

    pub fn unblock_once_timeout(&self) -> u64 {
        self.state.read().unwrap().unblock_once_timeout
    }

    pub fn set_is_enabled(&self, enabled: bool) {
        if enabled {
            self.enable();
        } else {
            self.disable();
        }
    }

    /// True iff `url` matches some blacklist rule.
    pub fn is_blacklisted(&self, url: &str) -> bool {
        self.state.read().unwrap().blacklist.contains_match(url)
    }

    /// True iff `url` matches some whitelist rule.
    pub fn is_whitelisted(&self, url: &str) -> bool {
        self.state.read().unwrap().whitelist.contains_match(url)
    }

    //----- Settings surface

    /// Apply a loaded settings snapshot, replacing every policy field and
    /// finally the enabled flag (`enable_on_startup` forces enablement at
    /// load time).
    pub fn apply_settings(&self, settings: &Settings) {
        {
            let mut state = self.state.write().unwrap();
            state.mode = settings.mode;
            state.action = settings.action;
            state.blacklist = RuleSet::compile(&settings.blacklist);
            state.whitelist = RuleSet::compile(&settings.whitelist);
            state.schedule = settings.schedule.clone();
            state.redirect_url = sanitize_redirect_url(&settings.redirect_url);
            state.unblock_once_timeout = settings.unblock_once_timeout;
            state.enable_on_startup = settings.enable_on_startup;
        }
        self.set_is_enabled(settings.enabled || settings.enable_on_startup);
        info!(
            mode = ?settings.mode,
            action = ?settings.action,
            blacklist = settings.blacklist.len(),
            whitelist = settings.whitelist.len(),
            "settings applied"
        );
    }

    /// Current settings as a serializable snapshot.
    pub fn snapshot(&self) -> Settings {
        let state = self.state.read().unwrap();
        Settings {
            enabled: self.is_enabled(),
            enable_on_startup: state.enable_on_startup,
            mode: state.mode,
            action: state.action,
            blacklist: state.blacklist.patterns(),
            whitelist: state.whitelist.patterns(),
            schedule: state.schedule.clone(),
            redirect_url: state.redirect_url.clone(),
            unblock_once_timeout: state.unblock_once_timeout,
        }
    }
}

/// Lowercased hostname of `url`, if it parses as an absolute URL.
fn host_of(url: &str) -> Option<String> {
    Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.to_ascii_lowercase()))
}

fn has_web_scheme(url: &str) -> bool {
    matches!(Url::parse(url), Ok(u) if u.scheme() == "http" || u.scheme() == "https")
}
