//! Invoice status state machine (pure).
//!
//! `Pending -> DueSoon -> Overdue` as time passes, `Paid` once the balance is
//! gone. Status is always a function of `(balance, due_date, now, threshold)`.

use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use backoffice_core::{DomainError, DomainResult};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InvoiceStatus {
    Pending,
    DueSoon,
    Overdue,
    Paid,
}

impl InvoiceStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            InvoiceStatus::Pending => "PENDING",
            InvoiceStatus::DueSoon => "DUE_SOON",
            InvoiceStatus::Overdue => "OVERDUE",
            InvoiceStatus::Paid => "PAID",
        }
    }
}

impl FromStr for InvoiceStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .trim()
            .chars()
            .filter(|c| !matches!(c, '_' | '-' | ' '))
            .collect::<String>()
            .to_ascii_uppercase();
        match normalized.as_str() {
            "PENDING" => Ok(InvoiceStatus::Pending),
            "DUESOON" => Ok(InvoiceStatus::DueSoon),
            "OVERDUE" => Ok(InvoiceStatus::Overdue),
            "PAID" => Ok(InvoiceStatus::Paid),
            _ => Err(DomainError::validation(format!("invalid invoice status '{s}'"))),
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentType {
    Cash,
    Credit,
}

impl PaymentType {
    pub fn as_str(self) -> &'static str {
        match self {
            PaymentType::Cash => "CASH",
            PaymentType::Credit => "CREDIT",
        }
    }
}

impl FromStr for PaymentType {
    type Err = DomainError;

    /// Accepts the English and Spanish spellings used by clients.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "CASH" | "CONTADO" => Ok(PaymentType::Cash),
            "CREDIT" | "CREDITO" | "CRÉDITO" => Ok(PaymentType::Credit),
            _ => Err(DomainError::validation("invalid payment type")),
        }
    }
}

/// Credit days applied to an invoice, always within `0..=365`.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CreditDays(u16);

impl CreditDays {
    pub const MAX: u16 = 365;
    pub const ZERO: CreditDays = CreditDays(0);

    pub fn new(days: i64) -> DomainResult<Self> {
        if !(0..=i64::from(Self::MAX)).contains(&days) {
            return Err(DomainError::validation(format!(
                "credit days must be between 0 and {}",
                Self::MAX
            )));
        }
        Ok(Self(days as u16))
    }

    pub fn get(self) -> u16 {
        self.0
    }
}

/// Cash is due on issue; credit is due `credit_days` after issue.
pub fn resolve_due_date(
    issued_at: DateTime<Utc>,
    payment_type: PaymentType,
    credit_days: CreditDays,
) -> DateTime<Utc> {
    match payment_type {
        PaymentType::Cash => issued_at,
        PaymentType::Credit => issued_at + Duration::days(i64::from(credit_days.get())),
    }
}

/// Whole calendar days from `now` until `due_date` (negative once past due).
pub fn days_until_due(due_date: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    (due_date.date_naive() - now.date_naive()).num_days()
}

pub fn resolve_status(
    balance: i64,
    due_date: DateTime<Utc>,
    now: DateTime<Utc>,
    threshold_days: u32,
) -> InvoiceStatus {
    if balance <= 0 {
        return InvoiceStatus::Paid;
    }
    let days = days_until_due(due_date, now);
    if days < 0 {
        InvoiceStatus::Overdue
    } else if days <= i64::from(threshold_days) {
        InvoiceStatus::DueSoon
    } else {
        InvoiceStatus::Pending
    }
}
