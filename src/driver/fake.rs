//! Scripted in-memory portal used by the harvest and runner tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use super::{DriverError, PageDriver, SessionFactory, WindowHandle};
use crate::config::PortalSelectors;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArticleFault {
    /// Clicking the link never opens a tab.
    NoTab,
    /// Every lookup in the article tab fails with a command error.
    Broken,
    /// The article extracts fine but its tab cannot be closed.
    Unclosable,
}

#[derive(Debug, Clone, Default)]
pub struct FakeArticle {
    pub title: Option<String>,
    /// Abstract text keyed by the selector that exposes it.
    pub abstracts: Vec<(String, String)>,
    /// Abstract selectors only match after the expander was clicked.
    pub collapsed: bool,
    pub source_html: Option<String>,
    pub fault: Option<ArticleFault>,
}

impl FakeArticle {
    pub fn ok(title: &str, abstract_text: &str) -> Self {
        Self {
            title: Some(title.to_string()),
            abstracts: vec![(".abstract-content.selected".into(), abstract_text.to_string())],
            ..Self::default()
        }
    }

    pub fn faulty(fault: ArticleFault) -> Self {
        Self {
            fault: Some(fault),
            ..Self::ok("unreachable", "unreachable")
        }
    }
}

/// What the portal shows for one kinase.
#[derive(Debug, Clone, Default)]
pub struct KinaseScript {
    pub count_text: Option<String>,
    pub pages: Vec<Vec<FakeArticle>>,
    pub next_missing: bool,
    /// Reading the result count fails with a session error.
    pub count_fault: bool,
    /// The session breaks once this many articles were opened.
    pub fault_after_articles: Option<usize>,
}

impl KinaseScript {
    /// `total` healthy articles split into pages of `per_page`.
    pub fn healthy(total: usize, per_page: usize) -> Self {
        let articles: Vec<FakeArticle> = (0..total)
            .map(|i| FakeArticle::ok(&format!("Paper {}", i + 1), &format!("Abstract {}", i + 1)))
            .collect();
        let pages = if articles.is_empty() {
            vec![Vec::new()]
        } else {
            articles.chunks(per_page.max(1)).map(|c| c.to_vec()).collect()
        };
        Self {
            count_text: Some(format!("{} results", total)),
            pages,
            ..Self::default()
        }
    }
}

#[derive(Debug, Default)]
pub struct FakeStats {
    pub searches: Vec<String>,
    pub link_collections: usize,
    pub articles_opened: usize,
    pub max_windows: usize,
    pub launches: usize,
    pub quits: usize,
}

#[derive(Debug, Clone, PartialEq)]
enum Tab {
    Home,
    Results { page: usize },
    Article { page: usize, idx: usize, expanded: bool },
}

#[derive(Debug, Clone, PartialEq)]
pub enum FakeElement {
    SearchBox,
    Count,
    Link { page: usize, idx: usize },
    Next,
    Title,
    Abstract(String),
    Expander,
}

pub struct FakePortal {
    catalog: HashMap<String, KinaseScript>,
    selectors: PortalSelectors,
    active: Option<KinaseScript>,
    windows: Vec<(WindowHandle, Tab)>,
    current: Option<usize>,
    next_handle: usize,
    pub search_failures: u32,
    pub stats: Arc<Mutex<FakeStats>>,
}

impl FakePortal {
    pub fn new(catalog: HashMap<String, KinaseScript>) -> Self {
        Self::with_stats(catalog, Arc::new(Mutex::new(FakeStats::default())))
    }

    pub fn single(kinase: &str, script: KinaseScript) -> Self {
        Self::new(HashMap::from([(kinase.to_string(), script)]))
    }

    fn with_stats(catalog: HashMap<String, KinaseScript>, stats: Arc<Mutex<FakeStats>>) -> Self {
        Self {
            catalog,
            selectors: PortalSelectors::default(),
            active: None,
            windows: vec![(WindowHandle("main".into()), Tab::Home)],
            current: Some(0),
            next_handle: 1,
            search_failures: 0,
            stats,
        }
    }

    pub fn open_windows(&self) -> Vec<WindowHandle> {
        self.windows.iter().map(|(h, _)| h.clone()).collect()
    }

    pub fn active_window(&self) -> Option<WindowHandle> {
        self.current.map(|i| self.windows[i].0.clone())
    }

    fn tab(&self) -> Result<&Tab, DriverError> {
        self.current
            .and_then(|i| self.windows.get(i))
            .map(|(_, tab)| tab)
            .ok_or_else(|| DriverError::Command("no such window".into()))
    }

    fn tab_mut(&mut self) -> Result<&mut Tab, DriverError> {
        match self.current {
            Some(i) if i < self.windows.len() => Ok(&mut self.windows[i].1),
            _ => Err(DriverError::Command("no such window".into())),
        }
    }

    fn script(&self) -> Result<&KinaseScript, DriverError> {
        self.active
            .as_ref()
            .ok_or_else(|| DriverError::Command("no search submitted".into()))
    }

    fn article(&self, page: usize, idx: usize) -> Result<&FakeArticle, DriverError> {
        self.script()?
            .pages
            .get(page)
            .and_then(|p| p.get(idx))
            .ok_or(DriverError::Stale)
    }

    fn timeout(selector: &str, timeout: Duration) -> DriverError {
        DriverError::Timeout {
            selector: selector.to_string(),
            timeout,
        }
    }

    fn lookup(&mut self, selector: &str, timeout: Duration) -> Result<FakeElement, DriverError> {
        let sel = self.selectors.clone();
        match self.tab()?.clone() {
            Tab::Home | Tab::Results { .. } if selector == sel.search_input => {
                if self.search_failures > 0 {
                    self.search_failures -= 1;
                    Err(Self::timeout(selector, timeout))
                } else {
                    Ok(FakeElement::SearchBox)
                }
            }
            Tab::Results { .. } if selector == sel.result_count => {
                let script = self.script()?;
                if script.count_fault {
                    return Err(DriverError::Session("chrome not reachable".into()));
                }
                match script.count_text {
                    Some(_) => Ok(FakeElement::Count),
                    None => Err(Self::timeout(selector, timeout)),
                }
            }
            Tab::Results { page } if selector == sel.next_page => {
                let script = self.script()?;
                if script.next_missing || script.pages.is_empty() || page >= script.pages.len() {
                    Err(DriverError::NotFound { selector: selector.to_string() })
                } else {
                    Ok(FakeElement::Next)
                }
            }
            Tab::Article { page, idx, expanded } => {
                let article = self.article(page, idx)?;
                if article.fault == Some(ArticleFault::Broken) {
                    return Err(DriverError::Command("renderer crashed".into()));
                }
                if selector == sel.title {
                    return match &article.title {
                        Some(_) => Ok(FakeElement::Title),
                        None => Err(Self::timeout(selector, timeout)),
                    };
                }
                if selector == sel.abstract_expander {
                    return if article.collapsed {
                        Ok(FakeElement::Expander)
                    } else {
                        Err(DriverError::NotFound { selector: selector.to_string() })
                    };
                }
                if article.collapsed && !expanded {
                    return Err(Self::timeout(selector, timeout));
                }
                article
                    .abstracts
                    .iter()
                    .find(|(s, _)| s == selector)
                    .map(|(_, text)| FakeElement::Abstract(text.clone()))
                    .ok_or_else(|| Self::timeout(selector, timeout))
            }
            _ => Err(Self::timeout(selector, timeout)),
        }
    }

    fn fault_due(&self) -> bool {
        let opened = self.stats.lock().unwrap().articles_opened;
        self.active
            .as_ref()
            .and_then(|s| s.fault_after_articles)
            .map(|n| opened >= n)
            .unwrap_or(false)
    }
}

#[async_trait]
impl PageDriver for FakePortal {
    type Element = FakeElement;

    async fn goto(&mut self, _url: &str) -> Result<(), DriverError> {
        *self.tab_mut()? = Tab::Home;
        Ok(())
    }

    async fn wait_for(&mut self, selector: &str, timeout: Duration) -> Result<FakeElement, DriverError> {
        self.lookup(selector, timeout)
    }

    async fn wait_for_all(
        &mut self,
        selector: &str,
        timeout: Duration,
    ) -> Result<Vec<FakeElement>, DriverError> {
        if let Tab::Results { page } = self.tab()?.clone() {
            if selector == self.selectors.article_link {
                self.stats.lock().unwrap().link_collections += 1;
                let count = self.script()?.pages.get(page).map(|p| p.len()).unwrap_or(0);
                if count > 0 {
                    return Ok((0..count).map(|idx| FakeElement::Link { page, idx }).collect());
                }
            }
        }
        Err(Self::timeout(selector, timeout))
    }

    async fn find(&mut self, selector: &str) -> Result<FakeElement, DriverError> {
        self.lookup(selector, Duration::ZERO).map_err(|e| match e {
            DriverError::Timeout { selector, .. } => DriverError::NotFound { selector },
            other => other,
        })
    }

    async fn text(&mut self, element: &FakeElement) -> Result<String, DriverError> {
        match element {
            FakeElement::Count => Ok(self.script()?.count_text.clone().unwrap_or_default()),
            FakeElement::Title => match self.tab()?.clone() {
                Tab::Article { page, idx, .. } => {
                    Ok(self.article(page, idx)?.title.clone().unwrap_or_default())
                }
                _ => Err(DriverError::Stale),
            },
            FakeElement::Abstract(text) => Ok(text.clone()),
            _ => Ok(String::new()),
        }
    }

    async fn attr(&mut self, element: &FakeElement, name: &str) -> Result<Option<String>, DriverError> {
        match (element, name, self.tab()?.clone()) {
            (FakeElement::Next, "class", Tab::Results { page }) => {
                let last = self.script()?.pages.len().saturating_sub(1);
                Ok(Some(if page >= last {
                    "button-wrapper next-page disabled".into()
                } else {
                    "button-wrapper next-page".into()
                }))
            }
            _ => Ok(None),
        }
    }

    async fn click(&mut self, element: &FakeElement) -> Result<(), DriverError> {
        match element {
            FakeElement::Next => {
                if let Tab::Results { page } = self.tab_mut()? {
                    *page += 1;
                }
                Ok(())
            }
            FakeElement::Expander => {
                if let Tab::Article { expanded, .. } = self.tab_mut()? {
                    *expanded = true;
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }

    async fn clear(&mut self, _element: &FakeElement) -> Result<(), DriverError> {
        Ok(())
    }

    async fn send_keys(&mut self, element: &FakeElement, text: &str) -> Result<(), DriverError> {
        if *element == FakeElement::SearchBox {
            self.stats.lock().unwrap().searches.push(text.to_string());
        }
        Ok(())
    }

    async fn press_enter(&mut self, _element: &FakeElement) -> Result<(), DriverError> {
        let typed = self.stats.lock().unwrap().searches.last().cloned().unwrap_or_default();
        self.active = self
            .catalog
            .iter()
            .find(|(kinase, _)| typed.starts_with(&format!("({}[", kinase)))
            .map(|(_, script)| script.clone())
            .or_else(|| Some(KinaseScript::default()));
        *self.tab_mut()? = Tab::Results { page: 0 };
        Ok(())
    }

    async fn open_in_new_tab(&mut self, element: &FakeElement) -> Result<(), DriverError> {
        let FakeElement::Link { page, idx } = element else {
            return Err(DriverError::Command("not a link".into()));
        };
        if self.article(*page, *idx)?.fault == Some(ArticleFault::NoTab) {
            return Ok(());
        }
        let handle = WindowHandle(format!("tab-{}", self.next_handle));
        self.next_handle += 1;
        self.windows.push((
            handle,
            Tab::Article { page: *page, idx: *idx, expanded: false },
        ));
        let mut stats = self.stats.lock().unwrap();
        stats.articles_opened += 1;
        stats.max_windows = stats.max_windows.max(self.windows.len());
        Ok(())
    }

    async fn current_window(&mut self) -> Result<WindowHandle, DriverError> {
        if self.fault_due() {
            return Err(DriverError::Session("chrome not reachable".into()));
        }
        self.current
            .map(|i| self.windows[i].0.clone())
            .ok_or_else(|| DriverError::Command("no such window".into()))
    }

    async fn windows(&mut self) -> Result<Vec<WindowHandle>, DriverError> {
        Ok(self.open_windows())
    }

    async fn switch_to(&mut self, handle: &WindowHandle) -> Result<(), DriverError> {
        match self.windows.iter().position(|(h, _)| h == handle) {
            Some(i) => {
                self.current = Some(i);
                Ok(())
            }
            None => Err(DriverError::Command(format!("no such window: {}", handle))),
        }
    }

    async fn close_window(&mut self) -> Result<(), DriverError> {
        if let Ok(Tab::Article { page, idx, .. }) = self.tab().cloned() {
            if self.article(page, idx)?.fault == Some(ArticleFault::Unclosable) {
                return Err(DriverError::Session("tab crashed".into()));
            }
        }
        match self.current.take() {
            Some(i) if i < self.windows.len() => {
                self.windows.remove(i);
                Ok(())
            }
            _ => Err(DriverError::Command("no such window".into())),
        }
    }

    async fn page_source(&mut self) -> Result<String, DriverError> {
        match self.tab()?.clone() {
            Tab::Article { page, idx, .. } => Ok(self
                .article(page, idx)?
                .source_html
                .clone()
                .unwrap_or_else(|| "<html><body></body></html>".into())),
            _ => Ok("<html><body></body></html>".into()),
        }
    }

    async fn quit(&mut self) -> Result<(), DriverError> {
        self.stats.lock().unwrap().quits += 1;
        Ok(())
    }
}

/// Hands out fresh portals sharing one catalog and one stats record.
pub struct FakeFactory {
    pub catalog: HashMap<String, KinaseScript>,
    pub stats: Arc<Mutex<FakeStats>>,
    /// Launches beyond this count fail.
    pub max_launches: Option<usize>,
}

impl FakeFactory {
    pub fn new(catalog: HashMap<String, KinaseScript>) -> Self {
        Self {
            catalog,
            stats: Arc::new(Mutex::new(FakeStats::default())),
            max_launches: None,
        }
    }
}

#[async_trait]
impl SessionFactory for FakeFactory {
    type Driver = FakePortal;

    async fn launch(&self) -> Result<FakePortal, DriverError> {
        let mut stats = self.stats.lock().unwrap();
        if self.max_launches.is_some_and(|max| stats.launches >= max) {
            return Err(DriverError::Session("chromedriver went away".into()));
        }
        stats.launches += 1;
        // Faults are per session: a fresh browser starts with a clean counter.
        stats.articles_opened = 0;
        drop(stats);
        Ok(FakePortal::with_stats(self.catalog.clone(), Arc::clone(&self.stats)))
    }
}
