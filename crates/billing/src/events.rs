//! Payment-processor wire payloads and the typed events parsed from them.
//!
//! Inbound bodies arrive as loose JSON with mostly-optional fields. They are
//! parsed exactly once, at the ingress boundary, into [`PaymentEvent`]
//! variants that carry only the fields their handlers need; the raw JSON is
//! preserved verbatim in the event store, so narrowing here loses nothing.

use serde::Deserialize;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use scalazap_shared::{normalize_email, parse_brl_cents, PaymentMethod, PurchaseKind};

use crate::error::{BillingError, BillingResult};

// ==== wire shape ====

/// Raw webhook body as sent by the payment processor. Only `event` is
/// required at the JSON level; each [`PaymentEvent`] variant states its own
/// field requirements.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookPayload {
    pub event: String,
    #[serde(default)]
    pub checkout_id: Option<String>,
    #[serde(default)]
    pub sale_id: Option<String>,
    #[serde(default)]
    pub payment_method: Option<String>,
    #[serde(default, rename = "type")]
    pub purchase_type: Option<String>,
    #[serde(default)]
    pub total_price: Option<String>,
    #[serde(default)]
    pub customer: Option<WireCustomer>,
    #[serde(default)]
    pub products: Vec<WireProduct>,
    #[serde(default)]
    pub plan: Option<WirePlan>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WireCustomer {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone_number: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WireProduct {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub offer_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WirePlan {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub charge_frequency: Option<String>,
    // Kept as a string on the wire; an unparseable date must not reject the
    // event, it only costs the renewal-date update.
    #[serde(default)]
    pub next_charge_date: Option<String>,
}

// ==== typed events ====

/// Contact block common to every event; the email is normalized at parse
/// time and is the natural key for every downstream write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomerInfo {
    pub email: String,
    pub name: Option<String>,
    pub phone: Option<String>,
}

/// An approved sale, one-time or recurring.
#[derive(Debug, Clone)]
pub struct SaleDetails {
    pub customer: CustomerInfo,
    pub product_name: Option<String>,
    pub offer_name: Option<String>,
    pub amount_cents: Option<i64>,
    pub kind: PurchaseKind,
    pub payment_method: Option<String>,
    pub plan_name: Option<String>,
    pub next_charge_date: Option<OffsetDateTime>,
    pub processor_reference: Option<String>,
}

/// Subscription lifecycle change (renewal or cancellation).
#[derive(Debug, Clone)]
pub struct SubscriptionDetails {
    pub customer: CustomerInfo,
    pub plan_name: Option<String>,
    pub next_charge_date: Option<OffsetDateTime>,
    pub processor_reference: Option<String>,
}

/// A generated-but-unpaid payment intent (pix or bank slip).
#[derive(Debug, Clone)]
pub struct IntentDetails {
    pub customer: CustomerInfo,
    pub method: PaymentMethod,
    pub product_name: Option<String>,
    pub amount_cents: Option<i64>,
}

/// One inbound webhook, parsed. Unrecognized event strings become
/// [`PaymentEvent::Unrecognized`], a deliberate forward-compatible no-op.
#[derive(Debug, Clone)]
pub enum PaymentEvent {
    SaleApproved(SaleDetails),
    SaleRefused(CustomerInfo),
    SaleRefunded(CustomerInfo),
    SaleChargeback(CustomerInfo),
    SubscriptionCanceled(SubscriptionDetails),
    SubscriptionRenewed(SubscriptionDetails),
    PaymentIntentGenerated(IntentDetails),
    PaymentIntentExpired {
        customer: CustomerInfo,
        method: PaymentMethod,
    },
    Unrecognized {
        event: String,
    },
}

impl PaymentEvent {
    /// Parse a decoded payload into its tagged variant.
    ///
    /// Fails only when a recognized event is missing the fields its handler
    /// cannot run without (in practice: the customer email, the natural key).
    pub fn from_payload(payload: &WebhookPayload) -> BillingResult<Self> {
        let event = match payload.event.trim() {
            "SALE_APPROVED" => PaymentEvent::SaleApproved(SaleDetails::from_payload(payload)?),
            "SALE_REFUSED" => PaymentEvent::SaleRefused(required_customer(payload)?),
            "SALE_REFUNDED" => PaymentEvent::SaleRefunded(required_customer(payload)?),
            "SALE_CHARGEBACK" => PaymentEvent::SaleChargeback(required_customer(payload)?),
            "SUBSCRIPTION_CANCELED" => {
                PaymentEvent::SubscriptionCanceled(SubscriptionDetails::from_payload(payload)?)
            }
            "SUBSCRIPTION_RENEWED" => {
                PaymentEvent::SubscriptionRenewed(SubscriptionDetails::from_payload(payload)?)
            }
            "PIX_GENERATED" => PaymentEvent::PaymentIntentGenerated(IntentDetails::from_payload(
                payload,
                PaymentMethod::Pix,
            )?),
            "PIX_EXPIRED" => PaymentEvent::PaymentIntentExpired {
                customer: required_customer(payload)?,
                method: PaymentMethod::Pix,
            },
            "BANK_SLIP_GENERATED" => PaymentEvent::PaymentIntentGenerated(
                IntentDetails::from_payload(payload, PaymentMethod::BankSlip)?,
            ),
            "BANK_SLIP_EXPIRED" => PaymentEvent::PaymentIntentExpired {
                customer: required_customer(payload)?,
                method: PaymentMethod::BankSlip,
            },
            other => PaymentEvent::Unrecognized {
                event: other.to_string(),
            },
        };
        Ok(event)
    }

    /// Canonical event-type string, used for logging and gap records.
    pub fn event_type(&self) -> &str {
        match self {
            PaymentEvent::SaleApproved(_) => "SALE_APPROVED",
            PaymentEvent::SaleRefused(_) => "SALE_REFUSED",
            PaymentEvent::SaleRefunded(_) => "SALE_REFUNDED",
            PaymentEvent::SaleChargeback(_) => "SALE_CHARGEBACK",
            PaymentEvent::SubscriptionCanceled(_) => "SUBSCRIPTION_CANCELED",
            PaymentEvent::SubscriptionRenewed(_) => "SUBSCRIPTION_RENEWED",
            PaymentEvent::PaymentIntentGenerated(intent) => match intent.method {
                PaymentMethod::Pix => "PIX_GENERATED",
                PaymentMethod::BankSlip => "BANK_SLIP_GENERATED",
            },
            PaymentEvent::PaymentIntentExpired { method, .. } => match method {
                PaymentMethod::Pix => "PIX_EXPIRED",
                PaymentMethod::BankSlip => "BANK_SLIP_EXPIRED",
            },
            PaymentEvent::Unrecognized { event } => event,
        }
    }

    /// Customer block, when the variant carries one.
    pub fn customer(&self) -> Option<&CustomerInfo> {
        match self {
            PaymentEvent::SaleApproved(sale) => Some(&sale.customer),
            PaymentEvent::SaleRefused(c)
            | PaymentEvent::SaleRefunded(c)
            | PaymentEvent::SaleChargeback(c) => Some(c),
            PaymentEvent::SubscriptionCanceled(sub) | PaymentEvent::SubscriptionRenewed(sub) => {
                Some(&sub.customer)
            }
            PaymentEvent::PaymentIntentGenerated(intent) => Some(&intent.customer),
            PaymentEvent::PaymentIntentExpired { customer, .. } => Some(customer),
            PaymentEvent::Unrecognized { .. } => None,
        }
    }
}

impl SaleDetails {
    fn from_payload(payload: &WebhookPayload) -> BillingResult<Self> {
        let customer = required_customer(payload)?;
        let product = payload.products.first();

        Ok(SaleDetails {
            customer,
            product_name: product.and_then(|p| clean(&p.name)),
            offer_name: product.and_then(|p| clean(&p.offer_name)),
            amount_cents: payload.total_price.as_deref().and_then(parse_brl_cents),
            kind: payload
                .purchase_type
                .as_deref()
                .and_then(PurchaseKind::parse)
                .unwrap_or(PurchaseKind::OneTime),
            payment_method: clean(&payload.payment_method),
            plan_name: payload
                .plan
                .as_ref()
                .and_then(|p| clean(&p.name))
                .or_else(|| product.and_then(|p| clean(&p.name))),
            next_charge_date: payload.plan.as_ref().and_then(plan_next_charge),
            processor_reference: clean(&payload.sale_id).or_else(|| clean(&payload.checkout_id)),
        })
    }
}

impl SubscriptionDetails {
    fn from_payload(payload: &WebhookPayload) -> BillingResult<Self> {
        Ok(SubscriptionDetails {
            customer: required_customer(payload)?,
            plan_name: payload.plan.as_ref().and_then(|p| clean(&p.name)),
            next_charge_date: payload.plan.as_ref().and_then(plan_next_charge),
            processor_reference: clean(&payload.sale_id).or_else(|| clean(&payload.checkout_id)),
        })
    }
}

impl IntentDetails {
    fn from_payload(payload: &WebhookPayload, method: PaymentMethod) -> BillingResult<Self> {
        Ok(IntentDetails {
            customer: required_customer(payload)?,
            method,
            product_name: payload.products.first().and_then(|p| clean(&p.name)),
            amount_cents: payload.total_price.as_deref().and_then(parse_brl_cents),
        })
    }
}

fn required_customer(payload: &WebhookPayload) -> BillingResult<CustomerInfo> {
    let wire = payload.customer.as_ref().ok_or_else(|| {
        BillingError::Parse(format!("{} payload has no customer block", payload.event))
    })?;

    let email = wire
        .email
        .as_deref()
        .map(normalize_email)
        .filter(|e| !e.is_empty())
        .ok_or_else(|| {
            BillingError::Parse(format!("{} payload has no customer email", payload.event))
        })?;

    Ok(CustomerInfo {
        email,
        name: clean(&wire.name),
        phone: clean(&wire.phone_number),
    })
}

fn plan_next_charge(plan: &WirePlan) -> Option<OffsetDateTime> {
    let raw = plan.next_charge_date.as_deref()?;
    match OffsetDateTime::parse(raw, &Rfc3339) {
        Ok(date) => Some(date),
        Err(_) => {
            tracing::warn!(next_charge_date = %raw, "Unparseable renewal date in payload; ignoring");
            None
        }
    }
}

fn clean(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
