use crate::browser::{ActionOutcome, DriverStep, PageDriver, SessionFactory};
use crate::error::DriverError;
use crate::model::{NavigationAction, ScrollDirection, TerminalOutcome};
use crate::parsers;
use crate::snapshot::{ElementRef, PageElement, PageSnapshot};
use async_trait::async_trait;
use fantoccini::error::CmdError;
use fantoccini::{Client, ClientBuilder, Locator};
use regex::Regex;
use std::sync::LazyLock;
use std::time::Duration;

/// Error texts that mean the browser session is gone
static SESSION_LOST: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(invalid session|unable to find session|session deleted|no such window|not reachable|disconnected|connection (refused|reset|closed)|webdriver session .* lost)",
    )
    .expect("valid session error regex")
});

/// Error texts where the element exists but cannot take the action right now
static ELEMENT_UNUSABLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(stale element reference|element not interactable|element click intercepted|invalid element state|element is not (clickable|selectable))",
    )
    .expect("valid element error regex")
});

/// Common local WebDriver endpoints tried when the configured one is down
const FALLBACK_URLS: [&str; 4] = [
    "http://localhost:9515", // ChromeDriver default
    "http://localhost:4723", // Appium default
    "http://localhost:9222", // Chrome debug port default
    "http://127.0.0.1:4444", // IP instead of localhost
];

/// Opens fantoccini sessions against a WebDriver server
#[derive(Debug, Clone)]
pub struct WebDriverFactory {
    webdriver_url: String,
    settle_delay: Duration,
}

impl WebDriverFactory {
    pub fn new(webdriver_url: &str, settle_delay: Duration) -> Self {
        Self {
            webdriver_url: webdriver_url.to_string(),
            settle_delay,
        }
    }
}

#[async_trait]
impl SessionFactory for WebDriverFactory {
    async fn create(&self) -> Result<Box<dyn PageDriver>, DriverError> {
        let client = connect_to_webdriver(&self.webdriver_url).await?;
        Ok(Box::new(WebDriverSession {
            client: Some(client),
            webdriver_url: self.webdriver_url.clone(),
            settle_delay: self.settle_delay,
            last: PageSnapshot::default(),
        }))
    }
}

/// Connects to the WebDriver instance, falling back to common local ports
async fn connect_to_webdriver(webdriver_url: &str) -> Result<Client, DriverError> {
    match ClientBuilder::native().connect(webdriver_url).await {
        Ok(client) => {
            ::log::debug!("Connected to WebDriver at {}", webdriver_url);
            return Ok(client);
        }
        Err(e) => {
            ::log::error!(
                "Failed to connect to WebDriver at {}: {}",
                webdriver_url,
                e
            );
        }
    }

    for url in FALLBACK_URLS.iter() {
        if *url == webdriver_url {
            continue;
        }
        ::log::info!("Trying fallback WebDriver URL: {}", url);
        if let Ok(client) = ClientBuilder::native().connect(url).await {
            ::log::debug!("Connected to fallback WebDriver at {}", url);
            return Ok(client);
        }
    }

    ::log::error!(
        "Make sure a WebDriver server is running or set the WEBDRIVER_URL environment variable"
    );
    Err(DriverError::Connect(format!(
        "no WebDriver server reachable at {webdriver_url} or fallbacks"
    )))
}

/// One live browser session.
///
/// Element refs are resolved through the CSS locators of the last snapshot
/// this session produced.
pub struct WebDriverSession {
    client: Option<Client>,
    webdriver_url: String,
    settle_delay: Duration,
    last: PageSnapshot,
}

impl WebDriverSession {
    /// Reads the live page into a snapshot
    async fn read(&mut self) -> DriverStep {
        let Some(client) = self.client.as_ref() else {
            return (PageSnapshot::default(), ActionOutcome::CrashedSession);
        };
        let html = match client.source().await {
            Ok(source) => source,
            Err(e) => return self.failed(e, "getting source"),
        };
        let url = match client.current_url().await {
            Ok(url) => url.to_string(),
            Err(e) => return self.failed(e, "reading the URL"),
        };
        self.last = parsers::snapshot(&html, &url);
        ::log::debug!(
            "Read {} ({} elements)",
            self.last.url,
            self.last.elements.len()
        );
        (self.last.clone(), ActionOutcome::Applied)
    }

    async fn settle(&self) {
        if !self.settle_delay.is_zero() {
            tokio::time::sleep(self.settle_delay).await;
        }
    }

    fn target(&self, reference: &ElementRef) -> Option<PageElement> {
        self.last.element(reference).cloned()
    }

    /// Sends one command for the action; `Ok(false)` means the element is gone
    async fn perform(&self, client: &Client, action: &NavigationAction) -> Result<bool, CmdError> {
        match action {
            NavigationAction::Click(reference) => {
                let Some(target) = self.target(reference) else {
                    return Ok(false);
                };
                client.find(Locator::Css(&target.locator)).await?.click().await?;
            }
            NavigationAction::TypeText(reference, text) => {
                let Some(target) = self.target(reference) else {
                    return Ok(false);
                };
                let field = client.find(Locator::Css(&target.locator)).await?;
                field.clear().await?;
                field.send_keys(text).await?;
            }
            NavigationAction::SelectOption(reference, wanted) => {
                let Some(target) = self.target(reference) else {
                    return Ok(false);
                };
                let value = target
                    .choice(wanted)
                    .map(|c| c.value.clone())
                    .unwrap_or_else(|| wanted.clone());
                client
                    .find(Locator::Css(&target.locator))
                    .await?
                    .select_by_value(&value)
                    .await?;
            }
            NavigationAction::Scroll(direction) => {
                let script = match direction {
                    ScrollDirection::Down => "window.scrollBy(0, window.innerHeight);",
                    ScrollDirection::Up => "window.scrollBy(0, -window.innerHeight);",
                };
                client.execute(script, vec![]).await?;
            }
            NavigationAction::Terminal(TerminalOutcome::Ready | TerminalOutcome::Exhausted) => {}
        }
        Ok(true)
    }

    fn failed(&self, error: CmdError, context: &str) -> DriverStep {
        (PageSnapshot::default(), handle_command_error(&error, context))
    }
}

/// Classifies a failed WebDriver command
fn handle_command_error(error: &CmdError, context: &str) -> ActionOutcome {
    if error.is_no_such_element() {
        ::log::debug!("Element vanished while {}", context);
        return ActionOutcome::ElementNotFound;
    }
    let message = error.to_string();
    let outcome = classify_error_message(&message);
    match outcome {
        ActionOutcome::CrashedSession => {
            ::log::warn!("Lost session while {}: {}", context, message)
        }
        ActionOutcome::ElementNotFound => {
            ::log::debug!("Element unusable while {}: {}", context, message)
        }
        _ if message.to_ascii_lowercase().contains("timeout") => {
            ::log::warn!("Timed out while {}: {}", context, message)
        }
        _ => ::log::error!("Unexpected browser error while {}: {}", context, message),
    }
    outcome
}

/// Maps WebDriver error text onto an outcome. Anything unrecognised is
/// treated as the page misbehaving rather than the element being missing.
fn classify_error_message(message: &str) -> ActionOutcome {
    if SESSION_LOST.is_match(message) {
        ActionOutcome::CrashedSession
    } else if ELEMENT_UNUSABLE.is_match(message) {
        ActionOutcome::ElementNotFound
    } else {
        ActionOutcome::NavigationTimeout
    }
}

#[async_trait]
impl PageDriver for WebDriverSession {
    async fn open(&mut self, url: &str) -> DriverStep {
        let Some(client) = self.client.clone() else {
            return (PageSnapshot::default(), ActionOutcome::CrashedSession);
        };
        if let Err(e) = client.goto(url).await {
            let outcome = handle_command_error(&e, "opening the page");
            // a page that never loaded is a navigation failure, not a missing element
            let outcome = match outcome {
                ActionOutcome::ElementNotFound => ActionOutcome::NavigationTimeout,
                other => other,
            };
            return (PageSnapshot::default(), outcome);
        }
        self.settle().await;
        self.read().await
    }

    async fn apply(&mut self, action: &NavigationAction) -> DriverStep {
        let Some(client) = self.client.clone() else {
            return (PageSnapshot::default(), ActionOutcome::CrashedSession);
        };
        match self.perform(&client, action).await {
            Ok(true) => {
                self.settle().await;
                self.read().await
            }
            Ok(false) => {
                ::log::debug!("{} does not name an element of the current page", action);
                (self.last.clone(), ActionOutcome::ElementNotFound)
            }
            Err(e) => match handle_command_error(&e, "applying the action") {
                ActionOutcome::ElementNotFound => {
                    // the page changed under us, hand back a fresh view
                    let (snapshot, outcome) = self.read().await;
                    match outcome {
                        ActionOutcome::Applied => (snapshot, ActionOutcome::ElementNotFound),
                        other => (snapshot, other),
                    }
                }
                other => (self.last.clone(), other),
            },
        }
    }

    async fn snapshot(&mut self) -> DriverStep {
        self.read().await
    }

    async fn restart(&mut self) -> Result<(), DriverError> {
        ::log::warn!("Attempting to reconnect WebDriver session");
        if let Some(old) = self.client.take() {
            if let Err(e) = old.close().await {
                ::log::debug!("Old session did not close cleanly: {}", e);
            }
        }
        let client = connect_to_webdriver(&self.webdriver_url).await?;
        self.client = Some(client);
        self.last = PageSnapshot::default();
        ::log::info!("Successfully reconnected to WebDriver");
        Ok(())
    }

    async fn close(&mut self) {
        if let Some(client) = self.client.take() {
            if let Err(e) = client.close().await {
                ::log::warn!("Failed to close WebDriver client: {}", e);
            }
        }
    }
}
