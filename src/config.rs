use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::retry::RetryPolicy;

pub const DEFAULT_PORTAL_URL: &str = "https://pubmed.ncbi.nlm.nih.gov/";
pub const DEFAULT_WEBDRIVER_URL: &str = "http://localhost:9515";
pub const DEFAULT_MAX_PAPERS_PER_KINASE: usize = 10;
pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_CHECKPOINT_EVERY: usize = 5;

/// Chrome flags the scraper has always launched with.
const BROWSER_ARGS: &[&str] = &[
    "--no-sandbox",
    "--disable-dev-shm-usage",
    "--disable-gpu",
    "--window-size=1920,1080",
    "--start-maximized",
    "--disable-extensions",
    "--disable-infobars",
    "--disable-notifications",
    "--disable-popup-blocking",
];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value:?} ({reason})")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },
}

/// Scraper configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    pub input_path: PathBuf,
    pub output_path: PathBuf,
    pub kinase_column: Option<String>,
    pub user_name: String,
    /// Fixed `Extraction Date (UTC)` value; the run start time is used when unset.
    pub extraction_time: Option<String>,
    pub max_papers_per_kinase: usize,
    pub max_retries: u32,
    pub checkpoint_every: usize,
    pub portal_url: String,
    pub webdriver_url: String,
    pub headless: bool,
    pub browser_args: Vec<String>,
    pub timings: Timings,
    pub selectors: PortalSelectors,
}

/// Every pause and bounded wait the scraper performs.
#[derive(Debug, Clone, PartialEq)]
pub struct Timings {
    /// Upper bound when waiting for a page element to appear.
    pub element_wait: Duration,
    /// Upper bound for each abstract selector probe.
    pub abstract_probe_wait: Duration,
    /// Pause after navigation, tab opening and pagination clicks.
    pub page_load_delay: Duration,
    /// Pause after submitting a search.
    pub search_settle: Duration,
    pub expand_pause: Duration,
    /// Pause after closing an article tab.
    pub tab_settle: Duration,
    pub inter_kinase_pause: Duration,
    /// Pause between discarding a faulted session and launching a new one.
    pub recovery_pause: Duration,
    /// Backoff unit: attempt `n` waits `(2^n + 1) * retry_unit`.
    pub retry_unit: Duration,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            element_wait: Duration::from_secs(20),
            abstract_probe_wait: Duration::from_secs(5),
            page_load_delay: Duration::from_secs(3),
            search_settle: Duration::from_secs(6),
            expand_pause: Duration::from_secs(1),
            tab_settle: Duration::from_secs(1),
            inter_kinase_pause: Duration::from_secs(3),
            recovery_pause: Duration::from_secs(5),
            retry_unit: Duration::from_secs(1),
        }
    }
}

/// CSS selectors for the elements the scraper relies on in the portal.
#[derive(Debug, Clone, PartialEq)]
pub struct PortalSelectors {
    pub search_input: String,
    pub result_count: String,
    pub article_link: String,
    pub title: String,
    pub abstract_expander: String,
    /// Tried in order, first non-empty text wins.
    pub abstract_candidates: Vec<String>,
    /// Matched against the article page source when no candidate yields text.
    pub abstract_structural: String,
    pub next_page: String,
}

impl Default for PortalSelectors {
    fn default() -> Self {
        Self {
            search_input: "input[name='term']".into(),
            result_count: ".results-amount".into(),
            article_link: ".docsum-title".into(),
            title: ".heading-title".into(),
            abstract_expander: ".abstract-expander".into(),
            abstract_candidates: vec![
                ".abstract-content.selected".into(),
                ".abstract-content".into(),
                ".abstract".into(),
                ".abstract-1".into(),
            ],
            abstract_structural: "div[class*='abstract-content'] p".into(),
            next_page: ".next-page".into(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            input_path: PathBuf::from("input.xlsx"),
            output_path: PathBuf::from("output.xlsx"),
            kinase_column: None,
            user_name: "unknown".into(),
            extraction_time: None,
            max_papers_per_kinase: DEFAULT_MAX_PAPERS_PER_KINASE,
            max_retries: DEFAULT_MAX_RETRIES,
            checkpoint_every: DEFAULT_CHECKPOINT_EVERY,
            portal_url: DEFAULT_PORTAL_URL.into(),
            webdriver_url: DEFAULT_WEBDRIVER_URL.into(),
            headless: false,
            browser_args: BROWSER_ARGS.iter().map(|s| s.to_string()).collect(),
            timings: Timings::default(),
            selectors: PortalSelectors::default(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a configuration from an arbitrary key lookup, falling back to defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(path) = lookup("KINASE_INPUT") {
            config.input_path = PathBuf::from(path);
        }
        if let Some(path) = lookup("KINASE_OUTPUT") {
            config.output_path = PathBuf::from(path);
        }
        config.kinase_column = lookup("KINASE_COLUMN").filter(|c| !c.trim().is_empty());
        config.user_name = lookup("KINASE_USER")
            .or_else(|| lookup("USER"))
            .or_else(|| lookup("USERNAME"))
            .unwrap_or(config.user_name);
        config.extraction_time = lookup("KINASE_EXTRACTION_TIME");
        if let Some(url) = lookup("KINASE_PORTAL_URL") {
            config.portal_url = url;
        }
        if let Some(url) = lookup("KINASE_WEBDRIVER_URL") {
            config.webdriver_url = url;
        }

        config.max_papers_per_kinase =
            parse_or(&lookup, "KINASE_MAX_PAPERS", config.max_papers_per_kinase)?;
        config.max_retries = parse_or(&lookup, "KINASE_MAX_RETRIES", config.max_retries)?;
        config.checkpoint_every =
            parse_or(&lookup, "KINASE_CHECKPOINT_EVERY", config.checkpoint_every)?;
        config.headless = parse_or(&lookup, "KINASE_HEADLESS", config.headless)?;

        let t = &mut config.timings;
        t.element_wait = secs_or(&lookup, "KINASE_ELEMENT_WAIT_SECS", t.element_wait)?;
        t.abstract_probe_wait =
            secs_or(&lookup, "KINASE_ABSTRACT_WAIT_SECS", t.abstract_probe_wait)?;
        t.page_load_delay = secs_or(&lookup, "KINASE_PAGE_LOAD_SECS", t.page_load_delay)?;
        t.search_settle =
            secs_or(&lookup, "KINASE_SEARCH_SETTLE_SECS", t.page_load_delay * 2)?;
        t.expand_pause = secs_or(&lookup, "KINASE_EXPAND_PAUSE_SECS", t.expand_pause)?;
        t.tab_settle = secs_or(&lookup, "KINASE_TAB_SETTLE_SECS", t.tab_settle)?;
        t.inter_kinase_pause = secs_or(&lookup, "KINASE_PAUSE_SECS", t.page_load_delay)?;
        t.recovery_pause = secs_or(&lookup, "KINASE_RECOVERY_SECS", t.recovery_pause)?;
        t.retry_unit = secs_or(&lookup, "KINASE_RETRY_UNIT_SECS", t.retry_unit)?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_papers_per_kinase == 0 {
            return Err(invalid("max papers per kinase", "0", "must be at least 1"));
        }
        if self.max_retries == 0 {
            return Err(invalid("max retries", "0", "must be at least 1"));
        }
        if self.checkpoint_every == 0 {
            return Err(invalid("checkpoint interval", "0", "must be at least 1"));
        }
        Ok(())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_retries,
            unit: self.timings.retry_unit,
        }
    }

    /// Browser arguments including the headless switch when requested.
    pub fn effective_browser_args(&self) -> Vec<String> {
        let mut args = self.browser_args.clone();
        if self.headless {
            args.push("--headless=new".into());
        }
        args
    }
}

fn invalid(key: &str, value: &str, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e: T::Err| invalid(key, &raw, &e.to_string())),
        None => Ok(default),
    }
}

fn secs_or<F>(lookup: &F, key: &str, default: Duration) -> Result<Duration, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|s| s.is_finite() && *s >= 0.0)
            .map(Duration::from_secs_f64)
            .ok_or_else(|| invalid(key, &raw, "expected a non-negative number of seconds")),
        None => Ok(default),
    }
}
