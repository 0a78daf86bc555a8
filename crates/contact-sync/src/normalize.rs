/// Kind-specific sanitizing applied to a value before it is stored in a collection
use std::sync::Arc;

use crate::ContactKind;

pub trait ValueNormalizer: Send + Sync {
    fn normalize(&self, raw: &str) -> String;
}

/// Keeps digits, `+`, `(`, `)`, `-` and whitespace
#[derive(Debug, Clone, Copy, Default)]
pub struct PhoneNormalizer;

impl ValueNormalizer for PhoneNormalizer {
    fn normalize(&self, raw: &str) -> String {
        raw.chars()
            .filter(|c| c.is_ascii_digit() || matches!(c, '+' | '(' | ')' | '-') || c.is_whitespace())
            .collect()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Passthrough;

impl ValueNormalizer for Passthrough {
    fn normalize(&self, raw: &str) -> String {
        raw.to_string()
    }
}

pub fn default_normalizer(kind: ContactKind) -> Arc<dyn ValueNormalizer> {
    match kind {
        ContactKind::Phone => Arc::new(PhoneNormalizer),
        ContactKind::Email => Arc::new(Passthrough),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phone_strips_letters_and_punctuation() {
        let n = PhoneNormalizer;
        assert_eq!(n.normalize("+1 (555) 010-0abc"), "+1 (555) 010-0");
        assert_eq!(n.normalize("tel:555.0100#"), "5550100");
    }

    #[test]
    fn test_email_is_untouched() {
        let n = default_normalizer(ContactKind::Email);
        assert_eq!(n.normalize(" Front.Desk@Hotel.com "), " Front.Desk@Hotel.com ");
    }
}
