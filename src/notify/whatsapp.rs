// src/notify/whatsapp.rs
// CallMeBot relay; single GET, no retry loop (the relay itself queues).

use anyhow::{Context, Result};
use reqwest::Client;
use std::time::Duration;

use super::Notifier;
use crate::config::AppConfig;

const CALLMEBOT_URL: &str = "https://api.callmebot.com/whatsapp.php";

pub struct WhatsappNotifier {
    phone: String,
    apikey: String,
    client: Client,
    timeout: Duration,
}

impl WhatsappNotifier {
    pub fn new(phone: String, apikey: String) -> Self {
        Self {
            phone,
            apikey,
            client: Client::new(),
            timeout: Duration::from_secs(15),
        }
    }

    pub fn from_config(cfg: &AppConfig) -> Option<Self> {
        let phone = cfg.whatsapp_phone.clone()?;
        let apikey = cfg.whatsapp_apikey.clone()?;
        let mut this = Self::new(phone, apikey);
        this.timeout = Duration::from_secs(cfg.notify_timeout_secs);
        Some(this)
    }
}

#[async_trait::async_trait]
impl Notifier for WhatsappNotifier {
    async fn send(&self, text: &str) -> Result<()> {
        self.client
            .get(CALLMEBOT_URL)
            .timeout(self.timeout)
            .query(&[
                ("phone", self.phone.as_str()),
                ("text", text),
                ("apikey", self.apikey.as_str()),
            ])
            .send()
            .await
            .context("callmebot request")?
            .error_for_status()
            .context("callmebot non-2xx")?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "whatsapp"
    }
}
