pub mod webdriver;

#[cfg(test)]
pub mod fake;

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

/// Identifier of a browser tab/window within one session.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WindowHandle(pub String);

impl fmt::Display for WindowHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Error)]
pub enum DriverError {
    #[error("Element not found: {selector}")]
    NotFound { selector: String },
    #[error("Timed out after {timeout:?} waiting for {selector}")]
    Timeout { selector: String, timeout: Duration },
    #[error("Stale element reference")]
    Stale,
    #[error("No new tab appeared after opening an article")]
    NoNewTab,
    #[error("WebDriver command failed: {0}")]
    Command(String),
    #[error("Session error: {0}")]
    Session(String),
}

/// The browser capability the scraper drives.
///
/// All selectors are CSS. Every method acts on the active tab.
#[async_trait]
pub trait PageDriver: Send {
    type Element: Clone + Send + Sync;

    async fn goto(&mut self, url: &str) -> Result<(), DriverError>;

    /// Wait up to `timeout` for the first element matching `selector`.
    async fn wait_for(
        &mut self,
        selector: &str,
        timeout: Duration,
    ) -> Result<Self::Element, DriverError>;

    /// Wait up to `timeout` for at least one match, then return all matches.
    async fn wait_for_all(
        &mut self,
        selector: &str,
        timeout: Duration,
    ) -> Result<Vec<Self::Element>, DriverError>;

    /// Immediate lookup without waiting.
    async fn find(&mut self, selector: &str) -> Result<Self::Element, DriverError>;

    async fn text(&mut self, element: &Self::Element) -> Result<String, DriverError>;

    async fn attr(
        &mut self,
        element: &Self::Element,
        name: &str,
    ) -> Result<Option<String>, DriverError>;

    async fn click(&mut self, element: &Self::Element) -> Result<(), DriverError>;

    async fn clear(&mut self, element: &Self::Element) -> Result<(), DriverError>;

    async fn send_keys(&mut self, element: &Self::Element, text: &str) -> Result<(), DriverError>;

    async fn press_enter(&mut self, element: &Self::Element) -> Result<(), DriverError>;

    /// Click a link so that its target opens in a new tab. Focus stays put.
    async fn open_in_new_tab(&mut self, element: &Self::Element) -> Result<(), DriverError>;

    async fn current_window(&mut self) -> Result<WindowHandle, DriverError>;

    async fn windows(&mut self) -> Result<Vec<WindowHandle>, DriverError>;

    async fn switch_to(&mut self, handle: &WindowHandle) -> Result<(), DriverError>;

    /// Close the active tab. Focus must be switched explicitly afterwards.
    async fn close_window(&mut self) -> Result<(), DriverError>;

    async fn page_source(&mut self) -> Result<String, DriverError>;

    /// End the browser session. Calling it twice is harmless.
    async fn quit(&mut self) -> Result<(), DriverError>;
}

/// Creates browser sessions; the run controller owns whichever one is live.
#[async_trait]
pub trait SessionFactory: Send + Sync {
    type Driver: PageDriver;

    async fn launch(&self) -> Result<Self::Driver, DriverError>;
}
