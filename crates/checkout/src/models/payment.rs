//! Payment domain types.
//!
//! Card number and CVV stay wrapped in `SecretString` until the moment they
//! are encrypted, so they never show up in `Debug` output or logs.

use chrono::{DateTime, Utc};
use secrecy::SecretString;
use serde::Serialize;

use securecart_core::{OrderId, OrderStatus, PaymentId, UserId};

/// Card data submitted with a payment.
#[derive(Debug, Clone)]
pub struct CardDetails {
    pub card_number: SecretString,
    pub card_holder: String,
    pub expiry_date: String,
    pub cvv: SecretString,
}

/// Payment row to insert. Card number and CVV are already encrypted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPaymentRecord {
    pub user_id: UserId,
    pub card_number: Option<String>,
    pub card_holder: String,
    pub expiry_date: String,
    pub cvv: Option<String>,
}

/// A stored payment record. Never updated.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct PaymentRecord {
    pub id: PaymentId,
    pub user_id: UserId,
    /// Encrypted card number.
    pub card_number: Option<String>,
    pub card_holder: String,
    pub expiry_date: String,
    /// Encrypted CVV.
    pub cvv: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Result of a recorded payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PaymentReceipt {
    pub order_id: OrderId,
    pub payment_id: PaymentId,
    pub status: OrderStatus,
}

/// Display-safe view of a stored card.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MaskedCard {
    pub payment_id: PaymentId,
    /// All but the last four digits replaced with `*`.
    pub card_number: Option<String>,
    pub card_holder: String,
    pub expiry_date: String,
}

impl MaskedCard {
    /// Mask all but the last four characters.
    #[must_use]
    pub fn mask(card_number: &str) -> String {
        let digits: Vec<char> = card_number.chars().filter(|c| !c.is_whitespace()).collect();
        let visible = digits.len().saturating_sub(4);
        digits
            .iter()
            .enumerate()
            .map(|(i, c)| if i < visible { '*' } else { *c })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_keeps_last_four() {
        assert_eq!(MaskedCard::mask("4111 1111 1111 1234"), "************1234");
        assert_eq!(MaskedCard::mask("123"), "123");
    }

    #[test]
    fn test_card_details_debug_redacts() {
        let card = CardDetails {
            card_number: SecretString::from("4111111111111111"),
            card_holder: "Ada Lovelace".to_string(),
            expiry_date: "12/30".to_string(),
            cvv: SecretString::from("737"),
        };
        let debug_output = format!("{card:?}");
        assert!(!debug_output.contains("4111111111111111"));
        assert!(!debug_output.contains("737"));
        assert!(debug_output.contains("Ada Lovelace"));
    }
}
