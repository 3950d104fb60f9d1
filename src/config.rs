use serde::Deserialize;

use crate::{Error, Result};

/// Which family of browser quirks the session emulates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BrowserFamily {
    #[default]
    Modern,
    /// `attachEvent`/`detachEvent`/`fireEvent` and the ambient `window.event`.
    Legacy,
}

impl BrowserFamily {
    pub fn supports_legacy_events(self) -> bool {
        matches!(self, Self::Legacy)
    }

    pub fn exposes_window_event(self) -> bool {
        matches!(self, Self::Legacy)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct TraceConfig {
    pub enabled: bool,
    pub events: bool,
    pub navigation: bool,
    pub log_limit: usize,
}

impl Default for TraceConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            events: true,
            navigation: true,
            log_limit: 10_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub family: BrowserFamily,
    pub initial_url: String,
    /// Run queued tasks once the outermost host call returns.
    pub auto_drain_tasks: bool,
    pub max_frame_depth: usize,
    pub task_step_limit: usize,
    pub trace: TraceConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            family: BrowserFamily::Modern,
            initial_url: "about:blank".to_string(),
            auto_drain_tasks: true,
            max_frame_depth: 16,
            task_step_limit: 10_000,
            trace: TraceConfig::default(),
        }
    }
}

impl SessionConfig {
    pub fn from_json(source: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(source).map_err(|err| Error::Config(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_family(mut self, family: BrowserFamily) -> Self {
        self.family = family;
        self
    }

    pub fn with_initial_url(mut self, url: &str) -> Self {
        self.initial_url = url.to_string();
        self
    }

    pub fn with_auto_drain_tasks(mut self, enabled: bool) -> Self {
        self.auto_drain_tasks = enabled;
        self
    }

    pub fn with_trace(mut self, enabled: bool) -> Self {
        self.trace.enabled = enabled;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.trace.log_limit == 0 {
            return Err(Error::Config("trace.log_limit must be at least 1".into()));
        }
        if self.task_step_limit == 0 {
            return Err(Error::Config("task_step_limit must be at least 1".into()));
        }
        if self.max_frame_depth == 0 {
            return Err(Error::Config("max_frame_depth must be at least 1".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_overrides_merge_with_defaults() -> Result<()> {
        let config = SessionConfig::from_json(
            r#"{ "family": "legacy", "initial_url": "http://app.local/", "trace": { "enabled": true } }"#,
        )?;
        assert_eq!(config.family, BrowserFamily::Legacy);
        assert_eq!(config.initial_url, "http://app.local/");
        assert!(config.trace.enabled);
        assert!(config.trace.events);
        assert_eq!(config.trace.log_limit, 10_000);
        assert!(config.auto_drain_tasks);
        Ok(())
    }

    #[test]
    fn invalid_limits_are_rejected() {
        assert!(matches!(
            SessionConfig::from_json(r#"{ "task_step_limit": 0 }"#),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            SessionConfig::from_json(r#"{ "family": "netscape" }"#),
            Err(Error::Config(_))
        ));
    }
}
