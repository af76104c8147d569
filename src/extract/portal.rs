// src/extract/portal.rs
// Session handling against the placement portal: form login with a cookie
// jar, then plain GETs for the two listing pages. Thin glue; the interesting
// work happens in the row extractors.

use anyhow::{bail, Context, Result};
use once_cell::sync::OnceCell;
use regex::Regex;
use reqwest::Client;
use std::time::Duration;

use super::{extract_jobs, extract_notices, text_content, CandidateItem, ExtractError, ItemSource};

const USER_AGENT: &str = "Mozilla/5.0 (compatible; TNPMonitor/1.0)";

#[derive(Debug, Clone)]
pub struct PortalConfig {
    pub base_url: String,
    pub username: String,
    pub password: String,
}

pub struct PortalSource {
    cfg: PortalConfig,
    client: Client,
}

impl PortalSource {
    pub fn new(cfg: PortalConfig) -> Result<Self> {
        let client = Client::builder()
            .cookie_store(true)
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(30))
            .build()
            .context("build portal http client")?;
        Ok(Self { cfg, client })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.cfg.base_url.trim_end_matches('/'))
    }

    async fn login(&self) -> Result<()> {
        let login_url = self.url("/auth/login.html");
        self.client
            .get(&login_url)
            .send()
            .await
            .context("fetch login page")?
            .error_for_status()
            .context("login page non-2xx")?;

        let form = [
            ("identity", self.cfg.username.as_str()),
            ("password", self.cfg.password.as_str()),
            ("submit", "Login"),
        ];
        let body = self
            .client
            .post(&login_url)
            .form(&form)
            .send()
            .await
            .context("submit login form")?
            .error_for_status()
            .context("login submit non-2xx")?
            .text()
            .await
            .context("read login response")?;

        // A logged-in page carries a Logout control; otherwise surface the
        // portal's own error banner when present.
        if !body.contains("Logout") {
            let reason = login_error_message(&body)
                .unwrap_or_else(|| "no Logout control in response".to_string());
            bail!("portal rejected login: {reason}");
        }
        tracing::info!("portal login ok");
        Ok(())
    }

    async fn fetch_page(&self, path: &str) -> Result<String> {
        let url = self.url(path);
        self.client
            .get(&url)
            .send()
            .await
            .with_context(|| format!("fetch {url}"))?
            .error_for_status()
            .with_context(|| format!("{url} non-2xx"))?
            .text()
            .await
            .with_context(|| format!("read body of {url}"))
    }
}

fn login_error_message(body: &str) -> Option<String> {
    static RE_INFO: OnceCell<Regex> = OnceCell::new();
    let re = RE_INFO.get_or_init(|| {
        Regex::new(r#"(?is)id\s*=\s*"infoMessage"[^>]*>(.*?)</"#).unwrap()
    });
    re.captures(body)
        .map(|c| text_content(c.get(1).unwrap().as_str()))
        .filter(|s| !s.is_empty())
}

#[async_trait::async_trait]
impl ItemSource for PortalSource {
    async fn fetch_latest(&self) -> Result<Vec<Result<CandidateItem, ExtractError>>> {
        self.login().await?;
        let notices_html = self.fetch_page("/newsevents").await?;
        let jobs_html = self.fetch_page("/index").await?;

        let mut rows = extract_notices(&notices_html, &self.cfg.base_url);
        rows.extend(extract_jobs(&jobs_html, &self.cfg.base_url));
        Ok(rows)
    }

    fn name(&self) -> &'static str {
        "tnp-portal"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_banner_is_extracted() {
        let body = r#"<div id="infoMessage"><p>Invalid credentials.</p></div>"#;
        assert_eq!(
            login_error_message(body).as_deref(),
            Some("Invalid credentials.")
        );
        assert_eq!(login_error_message("<html></html>"), None);
    }
}
