//! Core domain types for the reconciliation engine.
//!
//! Statuses are stored as plain text columns; the enums here own the
//! canonical string forms so every crate binds the same values.

use serde::{Deserialize, Serialize};

/// Normalize an email to its natural-key form: trimmed, lowercased.
///
/// Every write keyed by email goes through this, so redelivered events and
/// differently-cased signups land on the same row.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Internal plan tier sold by the dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanTier {
    Starter,
    Professional,
    Unlimited,
}

impl PlanTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlanTier::Starter => "starter",
            PlanTier::Professional => "professional",
            PlanTier::Unlimited => "unlimited",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "starter" => Some(PlanTier::Starter),
            "professional" => Some(PlanTier::Professional),
            "unlimited" => Some(PlanTier::Unlimited),
            _ => None,
        }
    }
}

impl std::fmt::Display for PlanTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Per-customer subscription state machine states.
///
/// `pending → active → {refunded, chargeback, cancelled}`, with
/// `active ⇄ cancelled` re-enterable on renewal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountStatus {
    Pending,
    Active,
    Refunded,
    Chargeback,
    Cancelled,
}

impl AccountStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountStatus::Pending => "pending",
            AccountStatus::Active => "active",
            AccountStatus::Refunded => "refunded",
            AccountStatus::Chargeback => "chargeback",
            AccountStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(AccountStatus::Pending),
            "active" => Some(AccountStatus::Active),
            "refunded" => Some(AccountStatus::Refunded),
            "chargeback" => Some(AccountStatus::Chargeback),
            "cancelled" => Some(AccountStatus::Cancelled),
            _ => None,
        }
    }
}

impl std::fmt::Display for AccountStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Subscription-record states. Only one current record per email is
/// authoritative; it is never deleted, only flipped between these two.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionStatus {
    Active,
    Cancelled,
}

impl SubscriptionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionStatus::Active => "active",
            SubscriptionStatus::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Payment method attempted for a not-yet-completed checkout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Pix,
    BankSlip,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Pix => "pix",
            PaymentMethod::BankSlip => "bank_slip",
        }
    }
}

impl std::fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Abandoned-cart lifecycle, one state pair per payment method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CartStatus {
    PixGenerated,
    PixExpired,
    SlipGenerated,
    SlipExpired,
}

impl CartStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CartStatus::PixGenerated => "pix_generated",
            CartStatus::PixExpired => "pix_expired",
            CartStatus::SlipGenerated => "slip_generated",
            CartStatus::SlipExpired => "slip_expired",
        }
    }

    /// Status recorded when a payment intent is first generated.
    pub fn generated_for(method: PaymentMethod) -> Self {
        match method {
            PaymentMethod::Pix => CartStatus::PixGenerated,
            PaymentMethod::BankSlip => CartStatus::SlipGenerated,
        }
    }

    /// Status recorded when a payment intent expires unpaid.
    pub fn expired_for(method: PaymentMethod) -> Self {
        match method {
            PaymentMethod::Pix => CartStatus::PixExpired,
            PaymentMethod::BankSlip => CartStatus::SlipExpired,
        }
    }
}

impl std::fmt::Display for CartStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Purchase type as sent by the payment processor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PurchaseKind {
    OneTime,
    Recurring,
}

impl PurchaseKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PurchaseKind::OneTime => "ONE_TIME",
            PurchaseKind::Recurring => "RECURRING",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "ONE_TIME" => Some(PurchaseKind::OneTime),
            "RECURRING" => Some(PurchaseKind::Recurring),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_email_trims_and_lowercases() {
        assert_eq!(normalize_email("  Ana.Souza@Example.COM  "), "ana.souza@example.com");
        assert_eq!(normalize_email("plain@example.com"), "plain@example.com");
    }

    #[test]
    fn plan_tier_round_trips_through_strings() {
        for tier in [PlanTier::Starter, PlanTier::Professional, PlanTier::Unlimited] {
            assert_eq!(PlanTier::parse(tier.as_str()), Some(tier));
        }
        assert_eq!(PlanTier::parse("enterprise"), None);
    }

    #[test]
    fn account_status_round_trips_through_strings() {
        for status in [
            AccountStatus::Pending,
            AccountStatus::Active,
            AccountStatus::Refunded,
            AccountStatus::Chargeback,
            AccountStatus::Cancelled,
        ] {
            assert_eq!(AccountStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(AccountStatus::parse("suspended"), None);
    }

    #[test]
    fn cart_status_pairs_follow_payment_method() {
        assert_eq!(CartStatus::generated_for(PaymentMethod::Pix), CartStatus::PixGenerated);
        assert_eq!(CartStatus::expired_for(PaymentMethod::Pix), CartStatus::PixExpired);
        assert_eq!(
            CartStatus::generated_for(PaymentMethod::BankSlip),
            CartStatus::SlipGenerated
        );
        assert_eq!(CartStatus::expired_for(PaymentMethod::BankSlip), CartStatus::SlipExpired);
    }

    #[test]
    fn purchase_kind_parses_wire_values() {
        assert_eq!(PurchaseKind::parse("ONE_TIME"), Some(PurchaseKind::OneTime));
        assert_eq!(PurchaseKind::parse("RECURRING"), Some(PurchaseKind::Recurring));
        assert_eq!(PurchaseKind::parse("recurring"), None);
    }
}
