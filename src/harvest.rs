//! Search, paginate and visit articles for a single kinase.

use crate::config::Config;
use crate::driver::{DriverError, PageDriver, WindowHandle};
use crate::extract::{extract_abstract, extract_title, AbstractStrategy};
use crate::models::PaperRecord;
use crate::query::SearchQuery;
use crate::retry::with_retry;

/// Why the loop for one kinase stopped.
#[derive(Debug)]
pub enum Termination {
    /// The search could not be submitted after all retries.
    SearchFailed,
    /// The count was missing, unreadable or zero.
    NoResults,
    CapReached,
    /// No article links on the page, or every reported result was collected.
    Exhausted,
    /// The next-page control was absent, disabled or unclickable.
    NoNextPage,
    /// The browser stopped answering: the count or the results tab could
    /// not be read, or the results tab could not be restored.
    SessionFault(DriverError),
}

#[derive(Debug)]
pub struct Harvest {
    pub papers: Vec<PaperRecord>,
    pub total_results: usize,
    pub termination: Termination,
}

impl Harvest {
    fn stop(papers: Vec<PaperRecord>, total_results: usize, termination: Termination) -> Self {
        Self {
            papers,
            total_results,
            termination,
        }
    }
}

/// Outcome of opening one article.
struct Visit {
    /// `None` when the article was skipped.
    paper: Option<PaperRecord>,
    /// The results tab itself is gone and the session cannot continue.
    fault: Option<DriverError>,
}

/// Drives one browser session through the search and article pages.
pub struct Harvester<'a, D: PageDriver> {
    driver: &'a mut D,
    config: &'a Config,
    strategies: &'a [Box<dyn AbstractStrategy<D>>],
}

impl<'a, D: PageDriver> Harvester<'a, D> {
    pub fn new(
        driver: &'a mut D,
        config: &'a Config,
        strategies: &'a [Box<dyn AbstractStrategy<D>>],
    ) -> Self {
        Self {
            driver,
            config,
            strategies,
        }
    }

    /// Run the whole search → paginate → extract loop for one query.
    pub async fn run(&mut self, kinase: &str, query: &SearchQuery) -> Harvest {
        let policy = self.config.retry_policy();
        let owned_query = query.as_str().to_string();
        let label = format!("Search for {}", kinase);
        let submitted: Option<()> = with_retry(&mut *self, &policy, &label, |h| {
            let q = owned_query.clone();
            Box::pin(async move { h.submit_search(&q).await })
        })
        .await;
        if submitted.is_none() {
            return Harvest::stop(Vec::new(), 0, Termination::SearchFailed);
        }

        let total = match self.total_results().await {
            Ok(total) => total,
            Err(fault) => {
                tracing::error!("Could not read the result count for {}: {}", kinase, fault);
                return Harvest::stop(Vec::new(), 0, Termination::SessionFault(fault));
            }
        };
        if total == 0 {
            tracing::info!("No results found for {}", kinase);
            return Harvest::stop(Vec::new(), 0, Termination::NoResults);
        }
        tracing::info!("Found {} papers for {}", total, kinase);

        let cap = self.config.max_papers_per_kinase;
        let target = total.min(cap);
        let mut papers = Vec::new();
        let mut page = 1usize;

        loop {
            let links = match self
                .driver
                .wait_for_all(&self.config.selectors.article_link, self.config.timings.element_wait)
                .await
            {
                Ok(links) => links,
                Err(e) => {
                    tracing::info!("No article links on page {} for {}: {}", page, kinase, e);
                    return Harvest::stop(papers, total, Termination::Exhausted);
                }
            };

            for link in &links {
                if papers.len() >= cap {
                    break;
                }
                let visit = self.visit_article(link).await;
                if let Some(paper) = visit.paper {
                    papers.push(paper);
                    tracing::info!(
                        "Extracted abstract {} of {} for {}",
                        papers.len(),
                        target,
                        kinase
                    );
                }
                if let Some(fault) = visit.fault {
                    tracing::error!("Lost the results tab while processing {}: {}", kinase, fault);
                    return Harvest::stop(papers, total, Termination::SessionFault(fault));
                }
            }

            if papers.len() >= cap {
                return Harvest::stop(papers, total, Termination::CapReached);
            }
            if papers.len() >= total {
                return Harvest::stop(papers, total, Termination::Exhausted);
            }
            if !self.next_page().await {
                return Harvest::stop(papers, total, Termination::NoNextPage);
            }
            page += 1;
        }
    }

    async fn submit_search(&mut self, query: &str) -> Result<(), DriverError> {
        let timings = &self.config.timings;
        self.driver.goto(&self.config.portal_url).await?;
        tokio::time::sleep(timings.page_load_delay).await;

        let search_box = self
            .driver
            .wait_for(&self.config.selectors.search_input, timings.element_wait)
            .await?;
        self.driver.clear(&search_box).await?;
        self.driver.send_keys(&search_box, query).await?;
        self.driver.press_enter(&search_box).await?;
        tokio::time::sleep(timings.search_settle).await;
        Ok(())
    }

    /// Reported result count.
    ///
    /// A missing count element or unreadable text counts as zero; any other
    /// driver failure means the session is unusable and is returned.
    async fn total_results(&mut self) -> Result<usize, DriverError> {
        let element = match self
            .driver
            .wait_for(&self.config.selectors.result_count, self.config.timings.element_wait)
            .await
        {
            Ok(element) => element,
            Err(e @ DriverError::Timeout { .. }) | Err(e @ DriverError::NotFound { .. }) => {
                tracing::debug!("Result count unavailable: {}", e);
                return Ok(0);
            }
            Err(e) => return Err(e),
        };
        match self.driver.text(&element).await {
            Ok(text) => Ok(parse_count(&text)),
            Err(DriverError::Stale) => Ok(0),
            Err(e) => Err(e),
        }
    }

    /// Open one article in a new tab and extract it.
    async fn visit_article(&mut self, link: &D::Element) -> Visit {
        let main = match self.driver.current_window().await {
            Ok(main) => main,
            Err(fault) => return Visit { paper: None, fault: Some(fault) },
        };

        let outcome = self.extract_in_new_tab(link, &main).await;
        let restored = self.restore_main(&main).await;

        let paper = match outcome {
            Ok(paper) => Some(paper),
            Err(e) => {
                tracing::warn!("Error processing article: {}", e);
                None
            }
        };
        if let Err(fault) = restored {
            return Visit { paper, fault: Some(fault) };
        }
        tokio::time::sleep(self.config.timings.tab_settle).await;
        Visit { paper, fault: None }
    }

    async fn extract_in_new_tab(
        &mut self,
        link: &D::Element,
        main: &WindowHandle,
    ) -> Result<PaperRecord, DriverError> {
        let config = self.config;
        self.driver.open_in_new_tab(link).await?;
        tokio::time::sleep(config.timings.page_load_delay).await;

        let article_tab = self
            .driver
            .windows()
            .await?
            .into_iter()
            .find(|h| h != main)
            .ok_or(DriverError::NoNewTab)?;
        self.driver.switch_to(&article_tab).await?;

        let title = extract_title(&mut *self.driver, &config.selectors, &config.timings).await?;
        let abstract_text =
            extract_abstract(&mut *self.driver, self.strategies, &config.selectors, &config.timings).await;
        Ok(PaperRecord {
            title,
            abstract_text,
        })
    }

    /// Close every tab except `main` and focus `main` again.
    async fn restore_main(&mut self, main: &WindowHandle) -> Result<(), DriverError> {
        for handle in self.driver.windows().await? {
            if &handle == main {
                continue;
            }
            self.driver.switch_to(&handle).await?;
            self.driver.close_window().await?;
        }
        self.driver.switch_to(main).await
    }

    /// Click through to the next results page; `false` when there is none.
    async fn next_page(&mut self) -> bool {
        let next = match self.driver.find(&self.config.selectors.next_page).await {
            Ok(next) => next,
            Err(_) => return false,
        };
        match self.driver.attr(&next, "class").await {
            Ok(Some(class)) if class.split_whitespace().any(|c| c == "disabled") => return false,
            Ok(_) => {}
            Err(_) => return false,
        }
        if let Err(e) = self.driver.click(&next).await {
            tracing::warn!("Next page click failed: {}", e);
            return false;
        }
        tokio::time::sleep(self.config.timings.page_load_delay).await;
        true
    }
}

/// Digits of the count text, e.g. `"1,234 results"` → 1234.
fn parse_count(text: &str) -> usize {
    let digits: String = text.chars().filter(|c| c.is_ascii_digit()).collect();
    digits.parse().unwrap_or(0)
}
