// src/notify/mod.rs
pub mod telegram;
pub mod whatsapp;

use anyhow::Result;

use crate::config::AppConfig;
use crate::extract::{ist_offset, CandidateItem, Category};

#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, text: &str) -> Result<()>;
    fn name(&self) -> &'static str;
}

/// Fans one message out to every configured sink. Individual failures are
/// logged and do not stop the fan-out.
pub struct NotifierMux {
    sinks: Vec<Box<dyn Notifier>>,
}

impl NotifierMux {
    pub fn new(sinks: Vec<Box<dyn Notifier>>) -> Self {
        Self { sinks }
    }

    pub fn from_config(cfg: &AppConfig) -> Self {
        let mut sinks: Vec<Box<dyn Notifier>> = Vec::new();
        if let Some(tg) = telegram::TelegramNotifier::from_config(cfg) {
            sinks.push(Box::new(tg));
        }
        if let Some(wa) = whatsapp::WhatsappNotifier::from_config(cfg) {
            sinks.push(Box::new(wa));
        }
        if sinks.is_empty() {
            tracing::warn!("no notification sinks configured, alerts will be logged only");
        }
        Self { sinks }
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    /// Returns true when at least one sink accepted the message.
    pub async fn notify(&self, text: &str) -> bool {
        let mut delivered = false;
        for sink in &self.sinks {
            match sink.send(text).await {
                Ok(()) => delivered = true,
                Err(e) => {
                    tracing::warn!(sink = sink.name(), error = ?e, "notification delivery failed");
                }
            }
        }
        delivered
    }

    /// Best-effort operator alert; its own failure is swallowed.
    pub async fn notify_error(&self, detail: &str) {
        let text = format!("❌ *Error in TNP Monitor:*\n{detail}");
        if !self.notify(&text).await && !self.sinks.is_empty() {
            tracing::error!("failed to deliver operator error alert");
        }
    }
}

/// Render the outbound message for one new item. The only place a UTC
/// instant is converted back to portal-local (IST) wall clock.
pub fn render_message(item: &CandidateItem) -> String {
    let local = item.published_at.with_timezone(&ist_offset());
    match item.category {
        Category::Notice => {
            let mut msg = format!(
                "📢 *New Notice:*\n🔹 {}\n🔗 {}\n📅 {}",
                item.title,
                item.link,
                local.format("%d/%m/%Y %H:%M"),
            );
            if !item.details.is_empty() {
                msg.push_str("\nℹ️ ");
                msg.push_str(&item.details);
            }
            msg
        }
        Category::Job => format!(
            "🏢 *New Company Listed:*\n🔹 {}\n📅 {}\n🔗 {}",
            item.title,
            local.format("%d/%m/%Y"),
            item.link,
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn renders_ist_wall_clock() {
        let item = CandidateItem {
            category: Category::Notice,
            title: "Campus Drive".into(),
            link: "https://tp.example/n/1".into(),
            // 04:00 UTC == 09:30 IST
            published_at: Utc.with_ymd_and_hms(2025, 3, 1, 4, 0, 0).unwrap(),
            details: "CSE only".into(),
        };
        let msg = render_message(&item);
        assert!(msg.contains("01/03/2025 09:30"), "{msg}");
        assert!(msg.contains("Campus Drive"));
        assert!(msg.contains("CSE only"));
    }

    #[test]
    fn job_message_crosses_date_line_in_ist() {
        let item = CandidateItem {
            category: Category::Job,
            title: "Acme Corp".into(),
            link: "https://tp.example/apply/7".into(),
            published_at: Utc.with_ymd_and_hms(2025, 2, 28, 18, 30, 0).unwrap(),
            details: String::new(),
        };
        // 18:30 UTC on Feb 28 is already March 1st in IST.
        assert!(render_message(&item).contains("01/03/2025"));
    }
}
