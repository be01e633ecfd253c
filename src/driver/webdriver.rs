use std::time::Duration;

use async_trait::async_trait;
use fantoccini::elements::Element;
use fantoccini::error::CmdError;
use fantoccini::{Client, ClientBuilder, Locator};
use serde::Serialize;

use super::{DriverError, PageDriver, SessionFactory, WindowHandle};

/// WebDriver key code for Enter.
const ENTER_KEY: &str = "\u{E007}";

const OPEN_IN_NEW_TAB_JS: &str = "arguments[0].setAttribute('target', '_blank');";

#[derive(Serialize)]
struct ChromeOptions<'a> {
    args: &'a [String],
}

/// Launches Chrome sessions through a running chromedriver.
pub struct WebDriverFactory {
    webdriver_url: String,
    browser_args: Vec<String>,
    http: reqwest::Client,
}

impl WebDriverFactory {
    pub fn new(webdriver_url: String, browser_args: Vec<String>) -> Self {
        Self {
            webdriver_url,
            browser_args,
            http: reqwest::Client::new(),
        }
    }

    /// Ask the WebDriver server whether it is ready to create sessions.
    async fn is_ready(&self) -> bool {
        let status_url = format!("{}/status", self.webdriver_url.trim_end_matches('/'));
        match self.http.get(&status_url).send().await {
            Ok(resp) => resp.status().is_success(),
            Err(e) => {
                tracing::debug!("WebDriver status probe failed: {}", e);
                false
            }
        }
    }

    fn capabilities(&self) -> Result<serde_json::Map<String, serde_json::Value>, DriverError> {
        let options = serde_json::to_value(ChromeOptions { args: &self.browser_args })
            .map_err(|e| DriverError::Session(format!("Invalid browser options: {}", e)))?;
        let mut caps = serde_json::Map::new();
        caps.insert("browserName".into(), serde_json::Value::from("chrome"));
        caps.insert("goog:chromeOptions".into(), options);
        Ok(caps)
    }
}

#[async_trait]
impl SessionFactory for WebDriverFactory {
    type Driver = WebDriverSession;

    async fn launch(&self) -> Result<WebDriverSession, DriverError> {
        if !self.is_ready().await {
            return Err(DriverError::Session(format!(
                "No WebDriver server answering at {}. Start chromedriver (e.g. `chromedriver --port 9515`) \
                 or set KINASE_WEBDRIVER_URL",
                self.webdriver_url
            )));
        }

        tracing::info!("Opening browser session via {}", self.webdriver_url);
        let client = ClientBuilder::native()
            .capabilities(self.capabilities()?)
            .connect(&self.webdriver_url)
            .await
            .map_err(|e| DriverError::Session(format!("Failed to start browser: {}", e)))?;

        Ok(WebDriverSession { client: Some(client) })
    }
}

/// A live browser session. `quit` drops the client, later calls fail.
pub struct WebDriverSession {
    client: Option<Client>,
}

impl WebDriverSession {
    fn client(&self) -> Result<&Client, DriverError> {
        self.client
            .as_ref()
            .ok_or_else(|| DriverError::Session("Browser session already closed".into()))
    }
}

fn map_cmd(selector: &str, timeout: Option<Duration>, e: CmdError) -> DriverError {
    if let (CmdError::WaitTimeout, Some(timeout)) = (&e, timeout) {
        return DriverError::Timeout {
            selector: selector.to_string(),
            timeout,
        };
    }
    if e.is_no_such_element() {
        return DriverError::NotFound {
            selector: selector.to_string(),
        };
    }
    let message = e.to_string();
    if message.contains("stale element") {
        DriverError::Stale
    } else {
        DriverError::Command(message)
    }
}

fn cmd(e: CmdError) -> DriverError {
    map_cmd("", None, e)
}

#[async_trait]
impl PageDriver for WebDriverSession {
    type Element = Element;

    async fn goto(&mut self, url: &str) -> Result<(), DriverError> {
        self.client()?.goto(url).await.map_err(cmd)
    }

    async fn wait_for(&mut self, selector: &str, timeout: Duration) -> Result<Element, DriverError> {
        self.client()?
            .wait()
            .at_most(timeout)
            .for_element(Locator::Css(selector))
            .await
            .map_err(|e| map_cmd(selector, Some(timeout), e))
    }

    async fn wait_for_all(
        &mut self,
        selector: &str,
        timeout: Duration,
    ) -> Result<Vec<Element>, DriverError> {
        self.wait_for(selector, timeout).await?;
        self.client()?
            .find_all(Locator::Css(selector))
            .await
            .map_err(|e| map_cmd(selector, None, e))
    }

    async fn find(&mut self, selector: &str) -> Result<Element, DriverError> {
        self.client()?
            .find(Locator::Css(selector))
            .await
            .map_err(|e| map_cmd(selector, None, e))
    }

    async fn text(&mut self, element: &Element) -> Result<String, DriverError> {
        element.text().await.map_err(cmd)
    }

    async fn attr(&mut self, element: &Element, name: &str) -> Result<Option<String>, DriverError> {
        element.attr(name).await.map_err(cmd)
    }

    async fn click(&mut self, element: &Element) -> Result<(), DriverError> {
        element.click().await.map_err(cmd)
    }

    async fn clear(&mut self, element: &Element) -> Result<(), DriverError> {
        element.clear().await.map_err(cmd)
    }

    async fn send_keys(&mut self, element: &Element, text: &str) -> Result<(), DriverError> {
        element.send_keys(text).await.map_err(cmd)
    }

    async fn press_enter(&mut self, element: &Element) -> Result<(), DriverError> {
        element.send_keys(ENTER_KEY).await.map_err(cmd)
    }

    async fn open_in_new_tab(&mut self, element: &Element) -> Result<(), DriverError> {
        let arg = serde_json::to_value(element)
            .map_err(|e| DriverError::Command(format!("Cannot pass element to script: {}", e)))?;
        self.client()?
            .execute(OPEN_IN_NEW_TAB_JS, vec![arg])
            .await
            .map_err(cmd)?;
        element.click().await.map_err(cmd)
    }

    async fn current_window(&mut self) -> Result<WindowHandle, DriverError> {
        let handle = self.client()?.window().await.map_err(cmd)?;
        Ok(WindowHandle(String::from(handle)))
    }

    async fn windows(&mut self) -> Result<Vec<WindowHandle>, DriverError> {
        let handles = self.client()?.windows().await.map_err(cmd)?;
        Ok(handles
            .into_iter()
            .map(|h| WindowHandle(String::from(h)))
            .collect())
    }

    async fn switch_to(&mut self, handle: &WindowHandle) -> Result<(), DriverError> {
        let wd_handle = fantoccini::wd::WindowHandle::try_from(handle.0.clone())
            .map_err(|e| DriverError::Command(format!("Invalid window handle {}: {}", handle, e)))?;
        self.client()?.switch_to_window(wd_handle).await.map_err(cmd)
    }

    async fn close_window(&mut self) -> Result<(), DriverError> {
        self.client()?.close_window().await.map_err(cmd)
    }

    async fn page_source(&mut self) -> Result<String, DriverError> {
        self.client()?.source().await.map_err(cmd)
    }

    async fn quit(&mut self) -> Result<(), DriverError> {
        match self.client.take() {
            Some(client) => client
                .close()
                .await
                .map_err(|e| DriverError::Session(format!("Failed to close browser: {}", e))),
            None => Ok(()),
        }
    }
}
