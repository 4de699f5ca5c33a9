//! Notification payloads.
//!
//! Each kind of email the academy sends has its own payload type carrying exactly
//! the fields that email needs. Payloads only become a [`Notification`] through
//! [`Notification::try_from`], which validates every field, so the formatter never
//! sees an incomplete or malformed payload.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::accounts::Account;
use crate::validation::{
    non_blank, validate_amount, validate_email, validate_http_url, validate_not_empty,
    validate_optional_email, validate_percentage, ValidationError, ValidationResult,
};

/// Who a notification is about and who receives it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recipient {
    pub student_name: String,
    pub student_email: String,
    #[serde(default)]
    pub guardian_name: Option<String>,
    #[serde(default)]
    pub guardian_email: Option<String>,
}

impl Recipient {
    /// Build the recipient block for a stored account.
    pub fn for_account(account: &Account) -> Self {
        Self {
            student_name: account.full_name(),
            student_email: account.email.clone(),
            guardian_name: account.guardian_name(),
            guardian_email: account.guardian_email(),
        }
    }

    /// `[student_email]`, plus the guardian's address when there is one.
    pub fn addresses(&self) -> Vec<String> {
        let mut addresses = vec![self.student_email.clone()];
        if let Some(guardian) = &self.guardian_email {
            addresses.push(guardian.clone());
        }
        addresses
    }

    fn normalized(self) -> ValidationResult<Self> {
        let recipient = Self {
            student_name: self.student_name.trim().to_string(),
            student_email: self.student_email.trim().to_string(),
            guardian_name: non_blank(self.guardian_name),
            guardian_email: non_blank(self.guardian_email).map(|e| e.trim().to_string()),
        };
        validate_not_empty(&recipient.student_name, "student_name")?;
        validate_email(&recipient.student_email, "student_email")?;
        validate_optional_email(recipient.guardian_email.as_deref(), "guardian_email")?;
        Ok(recipient)
    }
}

/// A payment was recorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentConfirmed {
    #[serde(flatten)]
    pub recipient: Recipient,
    pub payment_amount: f64,
    pub payment_date: NaiveDate,
    /// Balance still owed after this payment.
    #[serde(default)]
    pub amount_due: f64,
    /// Deadline for the remaining balance. Required when `amount_due > 0`.
    #[serde(default, alias = "new_due_date")]
    pub payment_deadline: Option<NaiveDate>,
}

/// Reminder that a payment is pending.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentReminder {
    #[serde(flatten)]
    pub recipient: Recipient,
    pub due_date: NaiveDate,
    pub amount_due: f64,
}

impl PaymentReminder {
    /// The reminder asks for the monthly fee, due on the account's payment date.
    pub fn for_account(account: &Account) -> Option<Self> {
        Some(Self {
            recipient: Recipient::for_account(account),
            due_date: account.next_payment_date?,
            amount_due: account.monthly_fee,
        })
    }
}

/// A scholarship was granted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScholarshipGranted {
    #[serde(flatten)]
    pub recipient: Recipient,
    pub percentage: u8,
    pub new_monthly_fee: f64,
    pub next_payment_date: NaiveDate,
}

/// Direction of a manual status change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StatusChange {
    #[serde(rename = "activada")]
    Activated,
    #[serde(rename = "desactivada")]
    Deactivated,
}

impl StatusChange {
    pub fn from_disabled(is_disabled: bool) -> Self {
        if is_disabled {
            StatusChange::Deactivated
        } else {
            StatusChange::Activated
        }
    }
}

/// An operator enabled or disabled the account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountStatusChanged {
    #[serde(flatten)]
    pub recipient: Recipient,
    pub status: StatusChange,
}

/// One study platform and where to log in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Platform {
    pub name: String,
    pub url: String,
}

/// Study platforms assigned at enrolment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlatformsAssigned {
    #[serde(flatten)]
    pub recipient: Recipient,
    pub platforms: Vec<Platform>,
}

/// The account was disabled by the overdue sweep.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountDeactivated {
    #[serde(flatten)]
    pub recipient: Recipient,
    pub amount_due: f64,
}

impl AccountDeactivated {
    pub fn for_account(account: &Account) -> Self {
        Self {
            recipient: Recipient::for_account(account),
            amount_due: account.debt,
        }
    }
}

/// Every kind of email the service sends.
#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    PaymentConfirmed(PaymentConfirmed),
    PaymentReminder(PaymentReminder),
    ScholarshipGranted(ScholarshipGranted),
    AccountStatusChanged(AccountStatusChanged),
    PlatformsAssigned(PlatformsAssigned),
    AccountDeactivated(AccountDeactivated),
}

impl Notification {
    pub fn recipient(&self) -> &Recipient {
        match self {
            Notification::PaymentConfirmed(p) => &p.recipient,
            Notification::PaymentReminder(p) => &p.recipient,
            Notification::ScholarshipGranted(p) => &p.recipient,
            Notification::AccountStatusChanged(p) => &p.recipient,
            Notification::PlatformsAssigned(p) => &p.recipient,
            Notification::AccountDeactivated(p) => &p.recipient,
        }
    }

    /// Short machine name, used in logs and task spans.
    pub fn kind(&self) -> &'static str {
        match self {
            Notification::PaymentConfirmed(_) => "payment_confirmed",
            Notification::PaymentReminder(_) => "payment_reminder",
            Notification::ScholarshipGranted(_) => "scholarship_granted",
            Notification::AccountStatusChanged(_) => "account_status_changed",
            Notification::PlatformsAssigned(_) => "platforms_assigned",
            Notification::AccountDeactivated(_) => "account_deactivated",
        }
    }
}

impl TryFrom<PaymentConfirmed> for Notification {
    type Error = ValidationError;

    fn try_from(mut p: PaymentConfirmed) -> ValidationResult<Self> {
        p.recipient = p.recipient.normalized()?;
        validate_amount(p.payment_amount, "payment_amount")?;
        validate_amount(p.amount_due, "amount_due")?;
        if p.amount_due > 0.0 && p.payment_deadline.is_none() {
            return Err(ValidationError::new(
                "payment_deadline",
                "required when amount_due is greater than zero",
            ));
        }
        Ok(Notification::PaymentConfirmed(p))
    }
}

impl TryFrom<PaymentReminder> for Notification {
    type Error = ValidationError;

    fn try_from(mut p: PaymentReminder) -> ValidationResult<Self> {
        p.recipient = p.recipient.normalized()?;
        validate_amount(p.amount_due, "amount_due")?;
        Ok(Notification::PaymentReminder(p))
    }
}

impl TryFrom<ScholarshipGranted> for Notification {
    type Error = ValidationError;

    fn try_from(mut p: ScholarshipGranted) -> ValidationResult<Self> {
        p.recipient = p.recipient.normalized()?;
        validate_percentage(p.percentage, "percentage")?;
        validate_amount(p.new_monthly_fee, "new_monthly_fee")?;
        Ok(Notification::ScholarshipGranted(p))
    }
}

impl TryFrom<AccountStatusChanged> for Notification {
    type Error = ValidationError;

    fn try_from(mut p: AccountStatusChanged) -> ValidationResult<Self> {
        p.recipient = p.recipient.normalized()?;
        Ok(Notification::AccountStatusChanged(p))
    }
}

impl TryFrom<PlatformsAssigned> for Notification {
    type Error = ValidationError;

    fn try_from(mut p: PlatformsAssigned) -> ValidationResult<Self> {
        p.recipient = p.recipient.normalized()?;
        if p.platforms.is_empty() {
            return Err(ValidationError::new(
                "platforms",
                "at least one platform is required",
            ));
        }
        for (i, platform) in p.platforms.iter_mut().enumerate() {
            platform.name = platform.name.trim().to_string();
            platform.url = platform.url.trim().to_string();
            validate_not_empty(&platform.name, &format!("platforms[{i}].name"))?;
            validate_http_url(&platform.url, &format!("platforms[{i}].url"))?;
        }
        Ok(Notification::PlatformsAssigned(p))
    }
}

impl TryFrom<AccountDeactivated> for Notification {
    type Error = ValidationError;

    fn try_from(mut p: AccountDeactivated) -> ValidationResult<Self> {
        p.recipient = p.recipient.normalized()?;
        validate_amount(p.amount_due, "amount_due")?;
        Ok(Notification::AccountDeactivated(p))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn recipient() -> Recipient {
        Recipient {
            student_name: " Diego Salas ".to_string(),
            student_email: "diego@example.com".to_string(),
            guardian_name: Some("".to_string()),
            guardian_email: Some("  ".to_string()),
        }
    }

    #[test]
    fn recipient_normalization_drops_blank_guardian() {
        let n = Notification::try_from(AccountStatusChanged {
            recipient: recipient(),
            status: StatusChange::Activated,
        })
        .unwrap();

        let r = n.recipient();
        assert_eq!(r.student_name, "Diego Salas");
        assert_eq!(r.guardian_name, None);
        assert_eq!(r.guardian_email, None);
        assert_eq!(r.addresses(), vec!["diego@example.com".to_string()]);
    }

    #[test]
    fn guardian_is_copied_when_present() {
        let r = Recipient {
            guardian_email: Some("madre@example.com".to_string()),
            ..recipient()
        };
        assert_eq!(
            r.addresses(),
            vec!["diego@example.com".to_string(), "madre@example.com".to_string()]
        );
    }

    #[test]
    fn invalid_student_email_is_rejected() {
        let err = Notification::try_from(PaymentReminder {
            recipient: Recipient {
                student_email: "diego-at-example".to_string(),
                ..recipient()
            },
            due_date: NaiveDate::from_ymd_opt(2026, 10, 1).unwrap(),
            amount_due: 180.0,
        })
        .unwrap_err();
        assert_eq!(err.field, "student_email");
    }

    #[test]
    fn payment_with_balance_requires_deadline() {
        let payment = PaymentConfirmed {
            recipient: recipient(),
            payment_amount: 100.0,
            payment_date: NaiveDate::from_ymd_opt(2026, 10, 5).unwrap(),
            amount_due: 80.0,
            payment_deadline: None,
        };
        let err = Notification::try_from(payment.clone()).unwrap_err();
        assert_eq!(err.field, "payment_deadline");

        let settled = PaymentConfirmed {
            amount_due: 0.0,
            ..payment
        };
        assert!(Notification::try_from(settled).is_ok());
    }

    #[test]
    fn payment_accepts_new_due_date_alias() {
        let payment: PaymentConfirmed = serde_json::from_value(json!({
            "student_name": "Diego Salas",
            "student_email": "diego@example.com",
            "payment_amount": 100.0,
            "payment_date": "2026-10-05",
            "amount_due": 80.0,
            "new_due_date": "2026-10-20"
        }))
        .unwrap();
        assert_eq!(
            payment.payment_deadline,
            NaiveDate::from_ymd_opt(2026, 10, 20)
        );
    }

    #[test]
    fn scholarship_percentage_bounds() {
        let grant = ScholarshipGranted {
            recipient: recipient(),
            percentage: 0,
            new_monthly_fee: 90.0,
            next_payment_date: NaiveDate::from_ymd_opt(2026, 11, 1).unwrap(),
        };
        assert_eq!(
            Notification::try_from(grant.clone()).unwrap_err().field,
            "percentage"
        );
        assert!(Notification::try_from(ScholarshipGranted {
            percentage: 100,
            ..grant
        })
        .is_ok());
    }

    #[test]
    fn platforms_must_be_present_and_linked() {
        let empty = PlatformsAssigned {
            recipient: recipient(),
            platforms: vec![],
        };
        assert_eq!(Notification::try_from(empty).unwrap_err().field, "platforms");

        let bad_url = PlatformsAssigned {
            recipient: recipient(),
            platforms: vec![Platform {
                name: "Flyfar".to_string(),
                url: "flyfar.example.com".to_string(),
            }],
        };
        assert_eq!(
            Notification::try_from(bad_url).unwrap_err().field,
            "platforms[0].url"
        );
    }

    #[test]
    fn status_change_wire_names() {
        assert_eq!(
            serde_json::to_value(StatusChange::Activated).unwrap(),
            json!("activada")
        );
        assert_eq!(StatusChange::from_disabled(true), StatusChange::Deactivated);
    }
}
