mod browser;
mod extract;

use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;
use std::time::Duration;

pub use browser::{HeadlessChrome, PageRenderer};
pub use extract::{MAX_LINES, extract_visible_text};

pub const DEFAULT_PAGE_LOAD_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchError {
    pub url: String,
    pub message: String,
}

impl Display for FetchError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "failed to fetch '{}': {}", self.url, self.message)
    }
}

impl Error for FetchError {}

#[derive(Debug)]
pub struct TextExtractor<R = HeadlessChrome> {
    renderer: Arc<R>,
    load_timeout: Duration,
}

impl<R> Clone for TextExtractor<R> {
    fn clone(&self) -> Self {
        Self {
            renderer: Arc::clone(&self.renderer),
            load_timeout: self.load_timeout,
        }
    }
}

impl<R: PageRenderer> TextExtractor<R> {
    pub fn new(renderer: R) -> Self {
        Self {
            renderer: Arc::new(renderer),
            load_timeout: DEFAULT_PAGE_LOAD_TIMEOUT,
        }
    }

    pub fn with_load_timeout(mut self, load_timeout: Duration) -> Self {
        self.load_timeout = load_timeout;
        self
    }

    /// Renders `url` and returns its visible text. Browser work runs on the blocking pool.
    pub async fn fetch_text(&self, url: &str) -> Result<String, FetchError> {
        let renderer = Arc::clone(&self.renderer);
        let target = url.to_string();
        let load_timeout = self.load_timeout;

        let html = tokio::task::spawn_blocking(move || renderer.render(&target, load_timeout))
            .await
            .map_err(|err| FetchError {
                url: url.to_string(),
                message: format!("browser task failed: {err}"),
            })?
            .map_err(|err| FetchError {
                url: url.to_string(),
                message: format!("{err:#}"),
            })?;

        Ok(extract_visible_text(&html))
    }
}


#[cfg(test)]
mod tests {
    use super::testing::FakeRenderer;
    use super::{DEFAULT_PAGE_LOAD_TIMEOUT, TextExtractor};
    use std::time::Duration;

    #[tokio::test]
    async fn fetch_text_returns_visible_text_of_rendered_page() {
        let extractor = TextExtractor::new(FakeRenderer::serving(
            "<html><body><script>x()</script><p>Hello</p><p>World</p></body></html>",
        ));

        let text = extractor
            .fetch_text("https://example.com")
            .await
            .expect("fetch");
        assert_eq!(text, "Hello\nWorld");

        let seen = extractor.renderer.seen.lock().expect("seen lock");
        assert_eq!(
            seen.as_slice(),
            &[("https://example.com".to_string(), DEFAULT_PAGE_LOAD_TIMEOUT)]
        );
    }

    #[tokio::test]
    async fn fetch_text_passes_configured_load_timeout() {
        let extractor = TextExtractor::new(FakeRenderer::serving("<p>x</p>"))
            .with_load_timeout(Duration::from_secs(5));
        extractor.fetch_text("https://example.com").await.expect("fetch");

        let seen = extractor.renderer.seen.lock().expect("seen lock");
        assert_eq!(seen[0].1, Duration::from_secs(5));
    }

    #[tokio::test]
    async fn fetch_text_propagates_renderer_failure() {
        let extractor = TextExtractor::new(FakeRenderer::failing());
        let err = extractor
            .fetch_text("https://unreachable.invalid")
            .await
            .expect_err("should fail");

        assert_eq!(err.url, "https://unreachable.invalid");
        assert!(err.to_string().contains("ERR_NAME_NOT_RESOLVED"));
    }
}
