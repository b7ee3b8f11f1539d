//! Browser sessions: the driver seam, the per-attempt session wrapper, and
//! the fantoccini-backed WebDriver implementation.

mod driver;
mod session;
pub mod webdriver;

pub use driver::{ActionOutcome, DriverStep, PageDriver, SessionFactory};
pub use session::{BrowserSession, MAX_RESTARTS};
pub use webdriver::{WebDriverFactory, WebDriverSession};
