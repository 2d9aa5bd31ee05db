//! Supported Gemini models
//!
//! The host may only pick from this fixed allow-list.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Model identifiers the coach is allowed to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SupportedModel {
    #[default]
    #[serde(rename = "gemini-2.5-flash-preview-09-2025")]
    Flash,
    #[serde(rename = "gemini-2.5-pro-preview-09-2025")]
    Pro,
}

impl SupportedModel {
    pub const ALL: [SupportedModel; 2] = [SupportedModel::Flash, SupportedModel::Pro];

    /// Identifier as sent to the API
    pub fn id(&self) -> &'static str {
        match self {
            SupportedModel::Flash => "gemini-2.5-flash-preview-09-2025",
            SupportedModel::Pro => "gemini-2.5-pro-preview-09-2025",
        }
    }

    /// Get display name (shorter version for UI)
    pub fn display_name(&self) -> &'static str {
        // Drop any provider prefix and the preview date suffix
        let id = self.id().rsplit('/').next().unwrap_or(self.id());
        id.strip_suffix("-preview-09-2025").unwrap_or(id)
    }

    /// Next model in the allow-list, wrapping around
    pub fn next(&self) -> SupportedModel {
        let idx = Self::ALL.iter().position(|m| m == self).unwrap_or(0);
        Self::ALL[(idx + 1) % Self::ALL.len()]
    }
}

impl fmt::Display for SupportedModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// Rejected model identifier
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unsupported model '{0}' (expected one of: {})", supported_ids())]
pub struct UnsupportedModel(pub String);

fn supported_ids() -> String {
    SupportedModel::ALL
        .iter()
        .map(|m| m.id())
        .collect::<Vec<_>>()
        .join(", ")
}

impl FromStr for SupportedModel {
    type Err = UnsupportedModel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        SupportedModel::ALL
            .into_iter()
            .find(|m| m.id() == s || m.display_name() == s)
            .ok_or_else(|| UnsupportedModel(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_flash() {
        assert_eq!(SupportedModel::default().id(), "gemini-2.5-flash-preview-09-2025");
    }

    #[test]
    fn test_parse() {
        assert_eq!(
            "gemini-2.5-pro-preview-09-2025".parse::<SupportedModel>().unwrap(),
            SupportedModel::Pro
        );
        assert_eq!("gemini-2.5-flash".parse::<SupportedModel>().unwrap(), SupportedModel::Flash);

        let err = "gpt-4".parse::<SupportedModel>().unwrap_err();
        assert!(err.to_string().contains("gpt-4"));
        assert!(err.to_string().contains("gemini-2.5-pro-preview-09-2025"));
    }

    #[test]
    fn test_display_name() {
        assert_eq!(SupportedModel::Flash.display_name(), "gemini-2.5-flash");
        assert_eq!(SupportedModel::Pro.display_name(), "gemini-2.5-pro");
    }

    #[test]
    fn test_next_wraps() {
        assert_eq!(SupportedModel::Flash.next(), SupportedModel::Pro);
        assert_eq!(SupportedModel::Pro.next(), SupportedModel::Flash);
    }

    #[test]
    fn test_serde_uses_ids() {
        let json = serde_json::to_string(&SupportedModel::Pro).unwrap();
        assert_eq!(json, "\"gemini-2.5-pro-preview-09-2025\"");
    }
}
