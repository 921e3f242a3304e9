//! Headless-browser fallback for JavaScript-rendered listing pages.
//!
//! Some listing pages ship an empty shell and render the calendar client
//! side. When the plain fetch yields an error for such a source we launch a
//! local Chrome/Chromium headless, navigate, wait a fixed settle period for
//! the client render, and hand the resulting DOM back to the same
//! extractors.

use std::time::Duration;

use crate::config::Settings;

/// Headless browser page renderer.
pub struct BrowserRenderer {
    settle: Duration,
    nav_timeout: Duration,
}

impl BrowserRenderer {
    pub fn new(settings: &Settings) -> Self {
        Self {
            settle: Duration::from_millis(settings.browser_settle_ms),
            nav_timeout: Duration::from_secs(settings.browser_nav_timeout_secs),
        }
    }
}

#[cfg(feature = "browser")]
mod render {
    use anyhow::Context;
    use chromiumoxide::cdp::browser_protocol::network::SetUserAgentOverrideParams;
    use chromiumoxide::{Browser, BrowserConfig};
    use futures::StreamExt;
    use tracing::{debug, info};

    use super::BrowserRenderer;
    use crate::scrapers::client::USER_AGENT;

    /// Common Chrome executable paths to check.
    const CHROME_PATHS: &[&str] = &[
        "/usr/bin/google-chrome",
        "/usr/bin/google-chrome-stable",
        "/usr/bin/chromium",
        "/usr/bin/chromium-browser",
        "/snap/bin/chromium",
        "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
        "/Applications/Chromium.app/Contents/MacOS/Chromium",
        "/opt/google/chrome/google-chrome",
    ];

    fn find_chrome() -> anyhow::Result<std::path::PathBuf> {
        for path in CHROME_PATHS {
            let p = std::path::Path::new(path);
            if p.exists() {
                debug!("Found Chrome at: {}", path);
                return Ok(p.to_path_buf());
            }
        }
        for cmd in &["google-chrome", "google-chrome-stable", "chromium", "chromium-browser"] {
            if let Ok(output) = std::process::Command::new("which").arg(cmd).output() {
                if output.status.success() {
                    let path = String::from_utf8_lossy(&output.stdout).trim().to_string();
                    if !path.is_empty() {
                        debug!("Found Chrome in PATH: {}", path);
                        return Ok(std::path::PathBuf::from(path));
                    }
                }
            }
        }
        Err(anyhow::anyhow!(
            "Chrome/Chromium not found; install it or disable the browser fallback"
        ))
    }

    impl BrowserRenderer {
        /// Render a page and return its post-settle DOM HTML.
        pub async fn render(&self, url: &str) -> anyhow::Result<String> {
            let chrome_path = find_chrome()?;
            let config = BrowserConfig::builder()
                .chrome_executable(chrome_path)
                .request_timeout(self.nav_timeout)
                .arg("--disable-blink-features=AutomationControlled")
                .arg("--disable-dev-shm-usage")
                .arg("--no-first-run")
                .arg("--no-sandbox")
                .arg("--disable-gpu")
                .build()
                .map_err(|e| anyhow::anyhow!("Failed to build browser config: {}", e))?;

            let (mut browser, mut handler) = Browser::launch(config)
                .await
                .context("Failed to launch browser")?;
            let handler_task = tokio::spawn(async move {
                while let Some(event) = handler.next().await {
                    if event.is_err() {
                        break;
                    }
                }
            });

            info!("Rendering {} in headless browser", url);
            let result = self.render_on(&browser, url).await;

            let _ = browser.close().await;
            let _ = browser.wait().await;
            handler_task.abort();
            result
        }

        async fn render_on(&self, browser: &chromiumoxide::Browser, url: &str) -> anyhow::Result<String> {
            let page = browser.new_page("about:blank").await?;
            page.execute(SetUserAgentOverrideParams::new(USER_AGENT.to_string()))
                .await?;
            page.goto(url).await.context("Navigation failed")?;

            // Fixed settle period for the client-side render
            tokio::time::sleep(self.settle).await;

            let content = page.content().await.context("Failed to read DOM")?;
            let _ = page.close().await;
            Ok(content)
        }
    }
}

#[cfg(not(feature = "browser"))]
impl BrowserRenderer {
    /// Render a page and return its post-settle DOM HTML.
    pub async fn render(&self, _url: &str) -> anyhow::Result<String> {
        let _ = (self.settle, self.nav_timeout);
        Err(anyhow::anyhow!(
            "Browser support not compiled. Rebuild with: cargo build --features browser"
        ))
    }
}
