use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::user::{normalize_email, require_name};
use crate::{CoreError, CoreResult};

/// Minimum digits a phone number needs to be reachable.
pub const MIN_PHONE_DIGITS: usize = 10;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Customer {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub created_at: DateTime<Utc>,
}

impl Customer {
    pub fn new(owner_id: Uuid, draft: CustomerDraft) -> Self {
        Self {
            id: Uuid::new_v4(),
            owner_id,
            name: draft.name,
            email: draft.email,
            phone: draft.phone,
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CustomerDraft {
    pub name: String,
    pub email: String,
    pub phone: String,
}

impl CustomerDraft {
    /// Trims the name, normalises the email and keeps the phone as typed
    /// once it has enough digits.
    pub fn validated(self) -> CoreResult<Self> {
        let name = require_name(&self.name)?;
        let email = normalize_email(&self.email)?;
        let phone = self.phone.trim().to_string();
        if phone_digits(&phone).len() < MIN_PHONE_DIGITS {
            return Err(CoreError::Validation(format!(
                "phone needs at least {} digits",
                MIN_PHONE_DIGITS
            )));
        }
        Ok(Self { name, email, phone })
    }
}

pub fn phone_digits(phone: &str) -> String {
    phone.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// `(11) 98765-4321` style rendering for 11-digit numbers.
pub fn format_phone(phone: &str) -> String {
    let digits = phone_digits(phone);
    if digits.len() == 11 {
        return format!("({}) {}-{}", &digits[..2], &digits[2..7], &digits[7..]);
    }
    phone.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_customer_draft_validation() {
        let draft = CustomerDraft {
            name: " Maria ".into(),
            email: "Maria@Mail.com".into(),
            phone: "(11) 98765-4321".into(),
        }
        .validated()
        .unwrap();
        assert_eq!(draft.name, "Maria");
        assert_eq!(draft.email, "maria@mail.com");

        let short = CustomerDraft {
            name: "Maria".into(),
            email: "maria@mail.com".into(),
            phone: "12345".into(),
        }
        .validated();
        assert!(matches!(short, Err(CoreError::Validation(_))));
    }

    #[test]
    fn test_format_phone() {
        assert_eq!(format_phone("11987654321"), "(11) 98765-4321");
        assert_eq!(format_phone("+1 555 0100"), "+1 555 0100");
    }
}
