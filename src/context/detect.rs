//! user agent classification
//!
//! device: mobile patterns are tested before tablet patterns. "android" is
//! a mobile pattern, so android tablets classify as mobile; only "tablet"
//! and "ipad" user agents are tablets.
//!
//! browser: first match wins in the order chrome, firefox, safari, edge.
//! chrome user agents also carry "safari", so safari excludes "chrome";
//! chrome excludes "edge" so legacy edge falls through to the edge check.

use std::fmt;
use std::str::FromStr;

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

use super::ContextError;

lazy_static::lazy_static! {
    static ref MOBILE_PATTERN: Regex =
        RegexBuilder::new(r"mobile|android|iphone|ipod|blackberry|iemobile|opera mini")
            .case_insensitive(true)
            .build()
            .expect("mobile pattern is valid");
    static ref TABLET_PATTERN: Regex =
        RegexBuilder::new(r"tablet|ipad")
            .case_insensitive(true)
            .build()
            .expect("tablet pattern is valid");
}

/// device class of the visitor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Device {
    #[default]
    Desktop,
    Mobile,
    Tablet,
}

impl Device {
    pub fn as_str(&self) -> &'static str {
        match self {
            Device::Desktop => "desktop",
            Device::Mobile => "mobile",
            Device::Tablet => "tablet",
        }
    }

    /// classify a user agent string
    pub fn detect(user_agent: &str) -> Self {
        if MOBILE_PATTERN.is_match(user_agent) {
            Device::Mobile
        } else if TABLET_PATTERN.is_match(user_agent) {
            Device::Tablet
        } else {
            Device::Desktop
        }
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Device {
    type Err = ContextError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "desktop" => Ok(Device::Desktop),
            "mobile" => Ok(Device::Mobile),
            "tablet" => Ok(Device::Tablet),
            _ => Err(ContextError::InvalidDevice(s.to_string())),
        }
    }
}

/// browser family of the visitor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Browser {
    Chrome,
    Firefox,
    Safari,
    Edge,
    #[default]
    Unknown,
}

impl Browser {
    pub fn as_str(&self) -> &'static str {
        match self {
            Browser::Chrome => "chrome",
            Browser::Firefox => "firefox",
            Browser::Safari => "safari",
            Browser::Edge => "edge",
            Browser::Unknown => "unknown",
        }
    }

    /// classify a user agent string
    pub fn detect(user_agent: &str) -> Self {
        let ua = user_agent.to_lowercase();

        if ua.contains("chrome") && !ua.contains("edge") {
            Browser::Chrome
        } else if ua.contains("firefox") {
            Browser::Firefox
        } else if ua.contains("safari") && !ua.contains("chrome") {
            Browser::Safari
        } else if ua.contains("edge") {
            Browser::Edge
        } else {
            Browser::Unknown
        }
    }
}

impl fmt::Display for Browser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Browser {
    type Err = ContextError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "chrome" => Ok(Browser::Chrome),
            "firefox" => Ok(Browser::Firefox),
            "safari" => Ok(Browser::Safari),
            "edge" => Ok(Browser::Edge),
            "unknown" => Ok(Browser::Unknown),
            _ => Err(ContextError::InvalidBrowser(s.to_string())),
        }
    }
}

/// reduce a language tag like "en-US" or "pt_BR" to its lower-cased primary subtag
pub fn primary_language(tag: &str) -> String {
    tag.trim()
        .split(['-', '_'])
        .next()
        .unwrap_or_default()
        .to_lowercase()
}
