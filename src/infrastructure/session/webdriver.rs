//! WebDriver-backed session (chromedriver or any W3C WebDriver server)

use async_trait::async_trait;
use thirtyfour::error::WebDriverError;
use thirtyfour::{By, ChromiumLikeCapabilities, DesiredCapabilities, WebDriver, WebElement};
use tracing::{debug, info, warn};

use super::{ElementHandle, Session, SessionError, SessionFactory, SessionResult};
use crate::infrastructure::config::WebDriverConfig;

pub struct WebDriverSession {
    driver: Option<WebDriver>,
    elements: Vec<WebElement>,
    generation: u64,
}

impl WebDriverSession {
    pub async fn connect(config: &WebDriverConfig) -> SessionResult<Self> {
        let mut caps = DesiredCapabilities::chrome();
        for arg in &config.browser_args {
            caps.add_arg(arg).map_err(|e| SessionError::Unavailable {
                reason: format!("invalid browser argument '{arg}': {e}"),
            })?;
        }

        let driver = WebDriver::new(&config.server_url, caps)
            .await
            .map_err(|e| SessionError::Unavailable {
                reason: format!("{} ({})", e, config.server_url),
            })?;
        debug!("WebDriver session opened on {}", config.server_url);

        Ok(Self {
            driver: Some(driver),
            elements: Vec::new(),
            generation: 0,
        })
    }

    fn driver(&self) -> SessionResult<&WebDriver> {
        self.driver
            .as_ref()
            .ok_or_else(|| SessionError::driver("session already closed"))
    }

    fn element(&self, handle: &ElementHandle) -> SessionResult<&WebElement> {
        if handle.generation() != self.generation {
            return Err(SessionError::stale(handle.selector()));
        }
        self.elements
            .get(handle.id())
            .ok_or_else(|| SessionError::stale(handle.selector()))
    }

    fn register(&mut self, found: Vec<WebElement>, selector: &str) -> Vec<ElementHandle> {
        found
            .into_iter()
            .map(|element| {
                let id = self.elements.len();
                self.elements.push(element);
                ElementHandle::new(id, self.generation, selector)
            })
            .collect()
    }
}

fn classify(selector: &str, error: &WebDriverError) -> SessionError {
    SessionError::from_driver_message(selector, &error.to_string())
}

#[async_trait]
impl Session for WebDriverSession {
    async fn goto(&mut self, url: &str) -> SessionResult<()> {
        self.driver()?
            .goto(url)
            .await
            .map_err(|e| SessionError::Navigation {
                url: url.to_string(),
                reason: e.to_string(),
            })?;
        self.generation += 1;
        self.elements.clear();
        Ok(())
    }

    async fn find_all(
        &mut self,
        scope: Option<&ElementHandle>,
        selector: &str,
    ) -> SessionResult<Vec<ElementHandle>> {
        let found = match scope {
            Some(handle) => self
                .element(handle)?
                .find_all(By::Css(selector))
                .await
                .map_err(|e| classify(handle.selector(), &e))?,
            None => self
                .driver()?
                .find_all(By::Css(selector))
                .await
                .map_err(|e| classify(selector, &e))?,
        };
        Ok(self.register(found, selector))
    }

    async fn text(&mut self, element: &ElementHandle) -> SessionResult<String> {
        self.element(element)?
            .text()
            .await
            .map_err(|e| classify(element.selector(), &e))
    }

    async fn attribute(
        &mut self,
        element: &ElementHandle,
        name: &str,
    ) -> SessionResult<Option<String>> {
        self.element(element)?
            .attr(name)
            .await
            .map_err(|e| classify(element.selector(), &e))
    }

    async fn is_displayed(&mut self, element: &ElementHandle) -> SessionResult<bool> {
        self.element(element)?
            .is_displayed()
            .await
            .map_err(|e| classify(element.selector(), &e))
    }

    async fn is_enabled(&mut self, element: &ElementHandle) -> SessionResult<bool> {
        self.element(element)?
            .is_enabled()
            .await
            .map_err(|e| classify(element.selector(), &e))
    }

    async fn click(&mut self, element: &ElementHandle) -> SessionResult<()> {
        self.element(element)?
            .click()
            .await
            .map_err(|e| classify(element.selector(), &e))?;
        // A click may re-render the page; release everything found before it
        self.generation += 1;
        self.elements.clear();
        Ok(())
    }

    async fn close(self: Box<Self>) -> SessionResult<()> {
        let Self { driver, .. } = *self;
        match driver {
            Some(driver) => driver.quit().await.map_err(|e| {
                warn!("WebDriver quit failed: {}", e);
                SessionError::driver(e.to_string())
            }),
            None => Ok(()),
        }
    }
}

/// Opens one browser per product visit against a running WebDriver server.
#[derive(Debug, Clone)]
pub struct WebDriverFactory {
    config: WebDriverConfig,
}

impl WebDriverFactory {
    pub fn new(config: WebDriverConfig) -> Self {
        info!(
            "🌐 WebDriver sessions will connect to {} ({} browser args)",
            config.server_url,
            config.browser_args.len()
        );
        Self { config }
    }
}

#[async_trait]
impl SessionFactory for WebDriverFactory {
    async fn open(&self) -> SessionResult<Box<dyn Session>> {
        let session = WebDriverSession::connect(&self.config).await?;
        Ok(Box::new(session))
    }
}
