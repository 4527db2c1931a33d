//! Built-in pattern recognizer.
//!
//! Offline redaction backend: each supported entity type has one or more
//! regular expressions, optionally with a checksum validator. Detections
//! are rewritten to `<ENTITY_TYPE>`, the same output Presidio's default
//! replace operator produces, so the tools behave the same on either
//! backend for these entity types.
//!
//! Entity types that need a language model (PERSON, LOCATION, NRP, ...)
//! have no pattern and are skipped.

use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use tracing::debug;

use super::{AdapterError, Anonymizer};

/// A compiled entity pattern
pub struct EntityPattern {
    pub entity: &'static str,
    pub regex: &'static LazyLock<Option<Regex>>,
    pub score: f64,
    /// Extra check on the matched text (e.g. Luhn for card numbers)
    pub validate: Option<fn(&str) -> bool>,
}

macro_rules! entity_regex {
    ($name:ident, $regex_str:expr) => {
        static $name: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new($regex_str).ok());
    };
}

entity_regex!(
    RE_EMAIL,
    r"[A-Za-z0-9._%+\-]+@[A-Za-z0-9.\-]+\.[A-Za-z]{2,}"
);

entity_regex!(
    RE_URL,
    r"(?:https?://|www\.)[A-Za-z0-9\-._~:/?#@!$&*+,;=%]+[A-Za-z0-9/]"
);

entity_regex!(
    RE_DOMAIN,
    r"\b(?:[A-Za-z0-9](?:[A-Za-z0-9\-]{0,61}[A-Za-z0-9])?\.)+(?:com|net|org|edu|gov|mil|int|io|ai|co|cn|uk|de|jp|fr|info|biz|dev|app)\b"
);

entity_regex!(
    RE_IPV4,
    r"\b(?:(?:25[0-5]|2[0-4]\d|[01]?\d\d?)\.){3}(?:25[0-5]|2[0-4]\d|[01]?\d\d?)\b"
);

entity_regex!(RE_IPV6, r"\b(?:[0-9a-fA-F]{1,4}:){7}[0-9a-fA-F]{1,4}\b");

entity_regex!(
    RE_PHONE,
    r"(?:\+\d{1,3}[\s.\-]?)?(?:\(\d{2,4}\)[\s.\-]?|\b\d{2,4}[\s.\-])?\b\d{3,4}[.\-]\d{4}\b"
);

entity_regex!(
    RE_CREDIT_CARD,
    r"\b(?:4\d{3}|5[1-5]\d{2}|3[47]\d{2}|6(?:011|5\d{2}))[\-\s]?\d{4}[\-\s]?\d{4}[\-\s]?\d{3,4}\b"
);

entity_regex!(RE_SSN, r"\b\d{3}-\d{2}-\d{4}\b");

entity_regex!(RE_ITIN, r"\b9\d{2}-[78]\d-\d{4}\b");

entity_regex!(
    RE_IBAN,
    r"\b[A-Z]{2}\d{2}[A-Z0-9]{4}\d{7}(?:[A-Z0-9]?\d{0,16})\b"
);

entity_regex!(
    RE_CRYPTO,
    r"\b(?:bc1[a-z0-9]{25,59}|[13][a-km-zA-HJ-NP-Z1-9]{25,34})\b"
);

entity_regex!(
    RE_DATE_TIME,
    r"\d{4}年\d{1,2}月\d{1,2}日|\b\d{4}[\-/.]\d{1,2}[\-/.]\d{1,2}\b|\b\d{1,2}/\d{1,2}/\d{2,4}\b|\b\d{1,2}:\d{2}(?::\d{2})?\b"
);

/// Luhn checksum over the digits of a card number
fn luhn_valid(candidate: &str) -> bool {
    let digits: Vec<u32> = candidate.chars().filter_map(|c| c.to_digit(10)).collect();
    if digits.len() < 12 {
        return false;
    }

    let sum: u32 = digits
        .iter()
        .rev()
        .enumerate()
        .map(|(i, &d)| {
            if i % 2 == 1 {
                let doubled = d * 2;
                if doubled > 9 {
                    doubled - 9
                } else {
                    doubled
                }
            } else {
                d
            }
        })
        .sum();

    sum % 10 == 0
}

/// All patterns, grouped by entity type
pub fn all_patterns() -> Vec<EntityPattern> {
    vec![
        EntityPattern {
            entity: "EMAIL_ADDRESS",
            regex: &RE_EMAIL,
            score: 1.0,
            validate: None,
        },
        EntityPattern {
            entity: "URL",
            regex: &RE_URL,
            score: 0.6,
            validate: None,
        },
        EntityPattern {
            entity: "DOMAIN_NAME",
            regex: &RE_DOMAIN,
            score: 0.5,
            validate: None,
        },
        EntityPattern {
            entity: "IP_ADDRESS",
            regex: &RE_IPV4,
            score: 0.6,
            validate: None,
        },
        EntityPattern {
            entity: "IP_ADDRESS",
            regex: &RE_IPV6,
            score: 0.6,
            validate: None,
        },
        EntityPattern {
            entity: "PHONE_NUMBER",
            regex: &RE_PHONE,
            score: 0.4,
            validate: None,
        },
        EntityPattern {
            entity: "CREDIT_CARD",
            regex: &RE_CREDIT_CARD,
            score: 0.9,
            validate: Some(luhn_valid),
        },
        EntityPattern {
            entity: "US_SSN",
            regex: &RE_SSN,
            score: 0.85,
            validate: None,
        },
        EntityPattern {
            entity: "US_ITIN",
            regex: &RE_ITIN,
            score: 0.5,
            validate: None,
        },
        EntityPattern {
            entity: "IBAN_CODE",
            regex: &RE_IBAN,
            score: 0.85,
            validate: None,
        },
        EntityPattern {
            entity: "CRYPTO",
            regex: &RE_CRYPTO,
            score: 0.5,
            validate: None,
        },
        EntityPattern {
            entity: "DATE_TIME",
            regex: &RE_DATE_TIME,
            score: 0.6,
            validate: None,
        },
    ]
}

/// A detection in byte offsets, before conversion for callers
#[derive(Debug, Clone)]
struct Detection {
    entity: &'static str,
    start: usize,
    end: usize,
    score: f64,
}

/// Pattern-based anonymizer
pub struct PatternAnonymizer {
    patterns: Vec<EntityPattern>,
}

impl Default for PatternAnonymizer {
    fn default() -> Self {
        Self::new()
    }
}

impl PatternAnonymizer {
    pub fn new() -> Self {
        Self {
            patterns: all_patterns(),
        }
    }

    /// Find non-overlapping detections for the requested entity types
    ///
    /// Overlaps keep the higher score, then the longer match, then the
    /// earlier one. The result is ordered by position.
    fn detect(&self, text: &str, entities: &[String]) -> Vec<Detection> {
        let mut candidates = Vec::new();

        for entity in entities {
            let mut supported = false;
            for pattern in self.patterns.iter().filter(|p| p.entity == entity.as_str()) {
                supported = true;
                let Some(regex) = LazyLock::force(pattern.regex).as_ref() else {
                    continue;
                };

                for m in regex.find_iter(text) {
                    if pattern.validate.is_some_and(|check| !check(m.as_str())) {
                        continue;
                    }
                    candidates.push(Detection {
                        entity: pattern.entity,
                        start: m.start(),
                        end: m.end(),
                        score: pattern.score,
                    });
                }
            }

            if !supported {
                debug!(entity = %entity, "No pattern for entity type, skipping");
            }
        }

        candidates.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then((b.end - b.start).cmp(&(a.end - a.start)))
                .then(a.start.cmp(&b.start))
        });

        let mut accepted: Vec<Detection> = Vec::new();
        for candidate in candidates {
            let overlaps = accepted
                .iter()
                .any(|d| candidate.start < d.end && d.start < candidate.end);
            if !overlaps {
                accepted.push(candidate);
            }
        }

        accepted.sort_by_key(|d| d.start);
        accepted
    }

    /// Replace every detection with `<ENTITY_TYPE>`
    pub fn redact(&self, text: &str, entities: &[String]) -> String {
        let detections = self.detect(text, entities);
        if detections.is_empty() {
            return text.to_string();
        }

        let mut redacted = String::with_capacity(text.len());
        let mut cursor = 0;
        for detection in &detections {
            redacted.push_str(&text[cursor..detection.start]);
            redacted.push('<');
            redacted.push_str(detection.entity);
            redacted.push('>');
            cursor = detection.end;
        }
        redacted.push_str(&text[cursor..]);
        redacted
    }
}

#[async_trait]
impl Anonymizer for PatternAnonymizer {
    fn name(&self) -> &str {
        "patterns"
    }

    async fn anonymize(
        &self,
        text: &str,
        entities: &[String],
        _language: &str,
    ) -> Result<String, AdapterError> {
        Ok(self.redact(text, entities))
    }

    async fn health_check(&self) -> Result<(), AdapterError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entities(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_all_patterns_compile() {
        for pattern in all_patterns() {
            assert!(
                LazyLock::force(pattern.regex).is_some(),
                "pattern for {} failed to compile",
                pattern.entity
            );
        }
    }

    #[test]
    fn test_email_redaction() {
        let anonymizer = PatternAnonymizer::new();
        let redacted = anonymizer.redact(
            "Contact: alice@example.com today",
            &entities(&["EMAIL_ADDRESS"]),
        );
        assert_eq!(redacted, "Contact: <EMAIL_ADDRESS> today");
    }

    #[test]
    fn test_email_beats_domain() {
        let anonymizer = PatternAnonymizer::new();
        let redacted = anonymizer.redact(
            "mail a@b.com",
            &entities(&["DOMAIN_NAME", "EMAIL_ADDRESS"]),
        );
        assert_eq!(redacted, "mail <EMAIL_ADDRESS>");
    }

    #[test]
    fn test_unrequested_entities_are_kept() {
        let anonymizer = PatternAnonymizer::new();
        let text = "mail a@b.com from 10.0.0.1";
        let redacted = anonymizer.redact(text, &entities(&["IP_ADDRESS"]));
        assert_eq!(redacted, "mail a@b.com from <IP_ADDRESS>");
    }

    #[test]
    fn test_unsupported_entity_is_skipped() {
        let anonymizer = PatternAnonymizer::new();
        let text = "Bob lives in Paris";
        assert_eq!(anonymizer.redact(text, &entities(&["PERSON", "LOCATION"])), text);
    }

    #[test]
    fn test_phone_number() {
        let anonymizer = PatternAnonymizer::new();
        let redacted = anonymizer.redact(
            "绿色通道（021-5432-1867），请拨打",
            &entities(&["PHONE_NUMBER"]),
        );
        assert_eq!(redacted, "绿色通道（<PHONE_NUMBER>），请拨打");
    }

    #[test]
    fn test_credit_card_requires_luhn() {
        assert!(luhn_valid("4111 1111 1111 1111"));
        assert!(!luhn_valid("4111 1111 1111 1112"));

        let anonymizer = PatternAnonymizer::new();
        let cards = entities(&["CREDIT_CARD"]);
        assert_eq!(
            anonymizer.redact("card 4111-1111-1111-1111", &cards),
            "card <CREDIT_CARD>"
        );
        assert_eq!(
            anonymizer.redact("card 4111-1111-1111-1112", &cards),
            "card 4111-1111-1111-1112"
        );
    }
}
