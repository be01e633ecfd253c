use std::time::Duration;

use async_trait::async_trait;
use scraper::{Html, Selector};

use crate::config::{PortalSelectors, Timings};
use crate::driver::{DriverError, PageDriver};
use crate::models::{ABSTRACT_NOT_FOUND, TITLE_NOT_FOUND};

/// One way of pulling abstract text out of the active article tab.
#[async_trait]
pub trait AbstractStrategy<D: PageDriver>: Send + Sync {
    fn name(&self) -> &str;

    /// Non-empty, trimmed text, or `None` when this strategy finds nothing.
    async fn extract(&self, driver: &mut D) -> Option<String>;
}

/// Text of the first element matching a CSS selector, with a bounded wait.
pub struct SelectorStrategy {
    selector: String,
    wait: Duration,
}

impl SelectorStrategy {
    pub fn new(selector: impl Into<String>, wait: Duration) -> Self {
        Self {
            selector: selector.into(),
            wait,
        }
    }
}

#[async_trait]
impl<D: PageDriver> AbstractStrategy<D> for SelectorStrategy {
    fn name(&self) -> &str {
        &self.selector
    }

    async fn extract(&self, driver: &mut D) -> Option<String> {
        let element = driver.wait_for(&self.selector, self.wait).await.ok()?;
        let text = driver.text(&element).await.ok()?;
        non_empty(&text)
    }
}

/// Parses the page source and joins the paragraphs under the abstract container.
pub struct StructuralStrategy {
    selector: String,
}

impl StructuralStrategy {
    pub fn new(selector: impl Into<String>) -> Self {
        Self {
            selector: selector.into(),
        }
    }
}

#[async_trait]
impl<D: PageDriver> AbstractStrategy<D> for StructuralStrategy {
    fn name(&self) -> &str {
        "page structure"
    }

    async fn extract(&self, driver: &mut D) -> Option<String> {
        let html = driver.page_source().await.ok()?;
        paragraphs_matching(&html, &self.selector)
    }
}

fn paragraphs_matching(html: &str, selector: &str) -> Option<String> {
    let selector = match Selector::parse(selector) {
        Ok(s) => s,
        Err(e) => {
            tracing::warn!("Invalid structural selector {:?}: {:?}", selector, e);
            return None;
        }
    };
    let document = Html::parse_document(html);
    let paragraphs: Vec<String> = document
        .select(&selector)
        .map(|el| el.text().collect::<Vec<_>>().join(" "))
        .map(|t| t.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|t| !t.is_empty())
        .collect();
    if paragraphs.is_empty() {
        None
    } else {
        Some(paragraphs.join("\n"))
    }
}

fn non_empty(text: &str) -> Option<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Candidate selectors in order, then the structural fallback.
pub fn default_strategies<D: PageDriver>(
    selectors: &PortalSelectors,
    timings: &Timings,
) -> Vec<Box<dyn AbstractStrategy<D>>> {
    let mut strategies: Vec<Box<dyn AbstractStrategy<D>>> = selectors
        .abstract_candidates
        .iter()
        .map(|s| {
            Box::new(SelectorStrategy::new(s.clone(), timings.abstract_probe_wait))
                as Box<dyn AbstractStrategy<D>>
        })
        .collect();
    strategies.push(Box::new(StructuralStrategy::new(
        selectors.abstract_structural.clone(),
    )));
    strategies
}

/// Title of the active article; the sentinel when it never shows up.
///
/// Only a missing element is absorbed; other driver failures abort the article.
pub async fn extract_title<D: PageDriver>(
    driver: &mut D,
    selectors: &PortalSelectors,
    timings: &Timings,
) -> Result<String, DriverError> {
    match driver.wait_for(&selectors.title, timings.element_wait).await {
        Ok(element) => Ok(driver.text(&element).await?.trim().to_string()),
        Err(DriverError::Timeout { .. }) | Err(DriverError::NotFound { .. }) => {
            Ok(TITLE_NOT_FOUND.to_string())
        }
        Err(e) => Err(e),
    }
}

/// Expand the abstract if the page offers it, then run the strategies in order.
pub async fn extract_abstract<D: PageDriver>(
    driver: &mut D,
    strategies: &[Box<dyn AbstractStrategy<D>>],
    selectors: &PortalSelectors,
    timings: &Timings,
) -> String {
    if let Ok(expander) = driver.find(&selectors.abstract_expander).await {
        match driver.click(&expander).await {
            Ok(()) => tokio::time::sleep(timings.expand_pause).await,
            Err(e) => tracing::debug!("Abstract expander click failed: {}", e),
        }
    }

    for strategy in strategies {
        if let Some(text) = strategy.extract(driver).await {
            tracing::debug!("Abstract found via {}", strategy.name());
            return text;
        }
    }
    ABSTRACT_NOT_FOUND.to_string()
}
