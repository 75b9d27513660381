use std::ffi::OsStr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use headless_chrome::{Browser, LaunchOptions};

/// Produces the fully rendered markup of a page.
pub trait PageRenderer: Send + Sync + 'static {
    fn render(&self, url: &str, load_timeout: Duration) -> Result<String>;
}

// Keeps an idle browser alive a little past the page-load budget.
const IDLE_MARGIN: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Default)]
pub struct HeadlessChrome {
    chrome_path: Option<PathBuf>,
}

impl HeadlessChrome {
    pub fn new(chrome_path: Option<PathBuf>) -> Self {
        Self { chrome_path }
    }
}

impl PageRenderer for HeadlessChrome {
    /// Launches a dedicated browser per call. The browser is owned by this frame, so its
    /// process is torn down on every return path, including errors.
    fn render(&self, url: &str, load_timeout: Duration) -> Result<String> {
        let options = LaunchOptions::default_builder()
            .headless(true)
            .path(self.chrome_path.clone())
            .args(vec![OsStr::new("--disable-gpu")])
            .idle_browser_timeout(load_timeout + IDLE_MARGIN)
            .build()
            .map_err(|err| anyhow!("invalid browser launch options: {err}"))?;

        let browser = Browser::new(options).context("failed to launch headless browser")?;
        let tab = browser.new_tab().context("failed to open browser tab")?;
        tab.set_default_timeout(load_timeout);
        tab.navigate_to(url)
            .with_context(|| format!("failed to navigate to {url}"))?
            .wait_until_navigated()
            .with_context(|| format!("page load did not complete for {url}"))?;

        tab.get_content()
            .with_context(|| format!("failed to read rendered page {url}"))
    }
}
