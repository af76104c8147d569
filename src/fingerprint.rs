// src/fingerprint.rs
// Content fingerprints for dedup. A fingerprint is computed over a normalized
// field subset (category + title + link + publish time), never over the
// rendered message text, so the same notice hashes identically no matter
// which extraction branch produced it.

use sha2::{Digest, Sha256};

use crate::extract::CandidateItem;

/// Hex-encoded 128-bit content digest.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Digest an arbitrary payload string. Total: any input, including empty,
    /// yields a digest.
    pub fn of_payload(payload: &str) -> Self {
        let digest = Sha256::digest(payload.as_bytes());
        // First 16 bytes of SHA-256; plenty for a non-adversarial dedup set.
        Fingerprint(hex::encode(&digest[..16]))
    }

    /// Canonical fingerprint of a scraped item.
    pub fn of_item(item: &CandidateItem) -> Self {
        Self::of_payload(&canonical_payload(item))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Rehydrate a digest read back from the store. No validation beyond
    /// taking the string as-is; the store only ever holds values we wrote.
    pub fn from_stored(s: String) -> Self {
        Fingerprint(s)
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Normalized field subset fed into the digest. Field order and separators
/// are part of the format; changing them invalidates every stored hash.
fn canonical_payload(item: &CandidateItem) -> String {
    format!(
        "{}\n{}\n{}\n{}",
        item.category.tag(),
        item.title.trim(),
        item.link.trim(),
        item.published_at.to_rfc3339(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::Category;
    use chrono::{TimeZone, Utc};

    fn item(title: &str, link: &str) -> CandidateItem {
        CandidateItem {
            category: Category::Notice,
            title: title.to_string(),
            link: link.to_string(),
            published_at: Utc.with_ymd_and_hms(2025, 3, 1, 9, 30, 0).unwrap(),
            details: String::new(),
        }
    }

    #[test]
    fn deterministic_for_same_payload() {
        let a = Fingerprint::of_payload("hello");
        let b = Fingerprint::of_payload("hello");
        assert_eq!(a, b);
        assert_eq!(a.as_str().len(), 32); // 128 bits, hex
    }

    #[test]
    fn empty_payload_is_fine() {
        let fp = Fingerprint::of_payload("");
        assert_eq!(fp.as_str().len(), 32);
    }

    #[test]
    fn ignores_display_details_and_whitespace() {
        // Two extraction branches may differ in decoration around the same
        // fields; the digest must not.
        let mut a = item("  Campus Drive: Acme  ", "https://tp.example/notice/1");
        let b = item("Campus Drive: Acme", "https://tp.example/notice/1");
        a.details = "Eligibility: CSE/IT".into();
        assert_eq!(Fingerprint::of_item(&a), Fingerprint::of_item(&b));
    }

    #[test]
    fn distinct_fields_distinct_digest() {
        let a = item("Campus Drive: Acme", "https://tp.example/notice/1");
        let b = item("Campus Drive: Acme", "https://tp.example/notice/2");
        assert_ne!(Fingerprint::of_item(&a), Fingerprint::of_item(&b));
    }

    #[test]
    fn category_is_part_of_identity() {
        let a = item("Acme", "https://tp.example/x");
        let mut b = a.clone();
        b.category = Category::Job;
        assert_ne!(Fingerprint::of_item(&a), Fingerprint::of_item(&b));
    }
}
