//! visitor context for condition evaluation
//!
//! a [`Context`] is an immutable snapshot of the facts conditions look at.
//! [`ContextBuilder`] assembles one from explicit values, a user agent and
//! a page URL, sampling the clock for anything left unset.

mod detect;

pub use detect::{primary_language, Browser, Device};

use chrono::{Local, NaiveDateTime};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::conditions::time::parse_clock;

/// URL fragment marking a page builder preview
pub const DEFAULT_EDITOR_MARKER: &str = "elementor-preview";

/// language used when no language tag is supplied
pub const DEFAULT_LANGUAGE: &str = "en";

/// error building a context from user-supplied values
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ContextError {
    #[error("invalid device '{0}': use desktop, mobile, or tablet")]
    InvalidDevice(String),
    #[error("invalid browser '{0}': use chrome, firefox, safari, edge, or unknown")]
    InvalidBrowser(String),
    #[error("invalid time '{0}': use HH:MM (24-hour)")]
    InvalidTime(String),
}

/// snapshot of the environment a section is rendered in
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Context {
    /// page path, e.g. "/pricing"
    pub url: String,
    pub device: Device,
    pub browser: Browser,
    /// two-letter lower-case language code
    pub language: String,
    /// referring URL, empty when there is none
    pub referrer: String,
    /// wall-clock time, "HH:MM" 24-hour
    pub current_time: String,
    pub is_logged_in: bool,
    pub is_editor_mode: bool,
    /// raw user agent string
    pub user_agent: String,
}

impl Context {
    /// start building a context
    pub fn builder() -> ContextBuilder {
        ContextBuilder::default()
    }
}

/// collects context facts; anything unset is derived or sampled at build time
///
/// deserializes from the same camelCase JSON a [`Context`] serializes to,
/// with every field optional, so partial context files can be merged with
/// explicit overrides
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ContextBuilder {
    /// full page URL; supplies `url` and the editor-mode flag when those are unset
    pub href: Option<String>,
    pub url: Option<String>,
    pub user_agent: Option<String>,
    pub device: Option<String>,
    pub browser: Option<String>,
    pub language: Option<String>,
    pub referrer: Option<String>,
    pub current_time: Option<String>,
    pub is_logged_in: Option<bool>,
    #[serde(alias = "isElementorEditMode")]
    pub is_editor_mode: Option<bool>,
    #[serde(skip)]
    editor_marker: Option<String>,
    #[serde(skip)]
    default_language: Option<String>,
}

impl ContextBuilder {
    pub fn with_href(mut self, href: impl Into<String>) -> Self {
        self.href = Some(href.into());
        self
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    pub fn with_device(mut self, device: impl Into<String>) -> Self {
        self.device = Some(device.into());
        self
    }

    pub fn with_browser(mut self, browser: impl Into<String>) -> Self {
        self.browser = Some(browser.into());
        self
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    pub fn with_referrer(mut self, referrer: impl Into<String>) -> Self {
        self.referrer = Some(referrer.into());
        self
    }

    pub fn with_time(mut self, time: impl Into<String>) -> Self {
        self.current_time = Some(time.into());
        self
    }

    pub fn with_logged_in(mut self, logged_in: bool) -> Self {
        self.is_logged_in = Some(logged_in);
        self
    }

    pub fn with_editor_mode(mut self, editor_mode: bool) -> Self {
        self.is_editor_mode = Some(editor_mode);
        self
    }

    /// set the URL fragment that marks editor previews
    pub fn with_editor_marker(mut self, marker: impl Into<String>) -> Self {
        self.editor_marker = Some(marker.into());
        self
    }

    /// set the language used when none is supplied
    pub fn with_default_language(mut self, language: impl Into<String>) -> Self {
        self.default_language = Some(language.into());
        self
    }

    /// overlay every value set in `other` onto this builder
    pub fn merge(mut self, other: ContextBuilder) -> Self {
        macro_rules! overlay {
            ($($field:ident),*) => {
                $(if other.$field.is_some() { self.$field = other.$field; })*
            };
        }
        overlay!(
            href,
            url,
            user_agent,
            device,
            browser,
            language,
            referrer,
            current_time,
            is_logged_in,
            is_editor_mode,
            editor_marker,
            default_language
        );
        self
    }

    /// build using the local wall clock when no time is set
    pub fn build(self) -> Result<Context, ContextError> {
        self.build_at(Local::now().naive_local())
    }

    /// build using `now` when no time is set
    pub fn build_at(self, now: NaiveDateTime) -> Result<Context, ContextError> {
        let user_agent = self.user_agent.unwrap_or_default();

        let device = match self.device {
            Some(d) => d.parse()?,
            None => Device::detect(&user_agent),
        };

        let browser = match self.browser {
            Some(b) => b.parse()?,
            None => Browser::detect(&user_agent),
        };

        let url = match (self.url, &self.href) {
            (Some(url), _) => url,
            (None, Some(href)) => path_of(href),
            (None, None) => "/".to_string(),
        };

        let marker = self
            .editor_marker
            .unwrap_or_else(|| DEFAULT_EDITOR_MARKER.to_string());
        let is_editor_mode = match (self.is_editor_mode, &self.href) {
            (Some(flag), _) => flag,
            (None, Some(href)) => !marker.is_empty() && href.contains(&marker),
            (None, None) => false,
        };

        let language = self
            .language
            .map(|tag| primary_language(&tag))
            .filter(|lang| !lang.is_empty())
            .unwrap_or_else(|| {
                self.default_language
                    .map(|tag| primary_language(&tag))
                    .unwrap_or_else(|| DEFAULT_LANGUAGE.to_string())
            });

        let current_time = match self.current_time {
            Some(t) => {
                if parse_clock(&t).is_none() {
                    return Err(ContextError::InvalidTime(t));
                }
                t.trim().to_string()
            }
            None => now.format("%H:%M").to_string(),
        };

        Ok(Context {
            url,
            device,
            browser,
            language,
            referrer: self.referrer.unwrap_or_default(),
            current_time,
            is_logged_in: self.is_logged_in.unwrap_or(false),
            is_editor_mode,
            user_agent,
        })
    }
}

/// extract the path component of a URL ("https://a.com/x?y#z" -> "/x")
pub fn path_of(href: &str) -> String {
    let rest = match href.find("://") {
        Some(pos) => {
            let after_scheme = &href[pos + 3..];
            match after_scheme.find(['/', '?', '#']) {
                Some(slash) => &after_scheme[slash..],
                None => "",
            }
        }
        None => href,
    };

    let end = rest.find(['?', '#']).unwrap_or(rest.len());
    let path = &rest[..end];

    if path.is_empty() {
        "/".to_string()
    } else {
        path.to_string()
    }
}
