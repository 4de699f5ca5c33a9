//! Student account records as stored in the `students` collection.
//!
//! The store is written by the academy's frontend, so records are parsed leniently:
//! amounts may arrive as numbers or numeric strings, and dates that fail to parse are
//! treated as absent rather than as errors.

use chrono::{NaiveDate, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Deserializer, Serialize};

use crate::validation::non_blank;

/// Date format used by every date field in the store.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Account status as stored in the `status` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountStatus {
    Active,
    Inactive,
}

impl AccountStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountStatus::Active => "active",
            AccountStatus::Inactive => "inactive",
        }
    }
}

impl std::fmt::Display for AccountStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The student's guardian (apoderado).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Guardian {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone_number: Option<String>,
}

impl Guardian {
    /// Guardian email to copy on notifications. Blank addresses count as absent.
    pub fn notify_email(&self) -> Option<&str> {
        self.email.as_deref().filter(|e| !e.trim().is_empty())
    }

    pub fn display_name(&self) -> Option<&str> {
        self.name.as_deref().filter(|n| !n.trim().is_empty())
    }
}

/// A scholarship exempts the account from overdue processing while it is in force.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scholarship {
    #[serde(default, deserialize_with = "lenient_percentage")]
    pub percentage: u8,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

impl Scholarship {
    /// Whether `day` falls inside the closed interval `[start_date, end_date]`.
    pub fn covers(&self, day: NaiveDate) -> bool {
        self.start_date <= day && day <= self.end_date
    }
}

/// A student account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    #[serde(default)]
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[serde(default)]
    pub phone_number: Option<String>,
    #[serde(default, deserialize_with = "lenient_amount")]
    pub monthly_fee: f64,
    #[serde(default, deserialize_with = "lenient_amount")]
    pub debt: f64,
    pub status: AccountStatus,
    #[serde(default, deserialize_with = "lenient_date")]
    pub next_payment_date: Option<NaiveDate>,
    #[serde(default, deserialize_with = "lenient_scholarship")]
    pub scholarship: Option<Scholarship>,
    #[serde(default, deserialize_with = "normalized_guardian")]
    pub guardian: Option<Guardian>,
    #[serde(default)]
    pub assigned_platforms: Vec<String>,
}

impl Account {
    /// Parse an account from a plain JSON document body and attach its store id.
    pub fn from_document(id: &str, data: serde_json::Value) -> Result<Self, serde_json::Error> {
        let mut account: Account = serde_json::from_value(data)?;
        account.id = id.to_string();
        Ok(account)
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name.trim(), self.last_name.trim())
    }

    pub fn guardian_name(&self) -> Option<String> {
        self.guardian
            .as_ref()
            .and_then(|g| g.display_name())
            .map(str::to_string)
    }

    pub fn guardian_email(&self) -> Option<String> {
        self.guardian
            .as_ref()
            .and_then(|g| g.notify_email())
            .map(str::to_string)
    }

    pub fn has_active_scholarship(&self, today: NaiveDate) -> bool {
        self.scholarship.as_ref().is_some_and(|s| s.covers(today))
    }

    /// The overdue predicate, evaluated against `today`.
    ///
    /// Checked in order, stopping at the first failing condition: the account is
    /// active, no scholarship covers `today`, the next payment date has passed, and
    /// there is outstanding debt. A missing payment date is never overdue.
    pub fn is_overdue(&self, today: NaiveDate) -> bool {
        if self.status != AccountStatus::Active {
            return false;
        }
        if self.has_active_scholarship(today) {
            return false;
        }
        let Some(due) = self.next_payment_date else {
            return false;
        };
        due < today && self.debt > 0.0
    }
}

/// Today's calendar date in the academy's timezone.
pub fn today_in(tz: Tz) -> NaiveDate {
    Utc::now().with_timezone(&tz).date_naive()
}

fn lenient_amount<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    let amount = match value {
        Some(serde_json::Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(serde_json::Value::String(s)) => s.trim().parse::<f64>().map_err(|_| {
            serde::de::Error::custom(format!("amount '{s}' is not a number"))
        })?,
        Some(serde_json::Value::Null) | None => 0.0,
        Some(other) => {
            return Err(serde::de::Error::custom(format!(
                "amount has unexpected type: {other}"
            )))
        }
    };
    Ok(amount)
}

fn lenient_percentage<'de, D>(deserializer: D) -> Result<u8, D::Error>
where
    D: Deserializer<'de>,
{
    let value = lenient_amount(deserializer)?;
    if (0.0..=100.0).contains(&value) {
        Ok(value.round() as u8)
    } else {
        Err(serde::de::Error::custom(format!(
            "percentage {value} is out of range"
        )))
    }
}

fn lenient_date<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(s)) => NaiveDate::parse_from_str(s.trim(), DATE_FORMAT)
            .ok()
            .or_else(|| {
                chrono::DateTime::parse_from_rfc3339(s.trim())
                    .ok()
                    .map(|dt| dt.date_naive())
            }),
        _ => None,
    })
}

fn lenient_scholarship<'de, D>(deserializer: D) -> Result<Option<Scholarship>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| serde_json::from_value::<Scholarship>(v).ok()))
}

fn normalized_guardian<'de, D>(deserializer: D) -> Result<Option<Guardian>, D::Error>
where
    D: Deserializer<'de>,
{
    let guardian = Option::<Guardian>::deserialize(deserializer)?;
    Ok(guardian.map(|g| Guardian {
        name: non_blank(g.name),
        email: non_blank(g.email),
        phone_number: non_blank(g.phone_number),
    }))
}
