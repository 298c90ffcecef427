//! Applies parsed payment events to the account, subscription, cart and
//! payment tables.
//!
//! Every write is an upsert keyed on the normalized customer email, so
//! out-of-order and duplicate deliveries converge on the same row instead of
//! conflicting. Write failures never abort the event: each one becomes a
//! reconciliation gap and the remaining writes still run.

use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

use scalazap_shared::{
    AccountStatus, CartStatus, PaymentMethod, PlanTier, PurchaseKind, SubscriptionStatus,
};

use crate::classifier::classify;
use crate::events::{CustomerInfo, IntentDetails, PaymentEvent, SaleDetails, SubscriptionDetails};
use crate::gaps::{GapRecorder, NewGap, WriteTarget};

/// What applying one event did, from the caller's point of view: only the
/// number of writes that failed and were recorded as gaps.
#[derive(Debug, Default)]
pub struct ApplyOutcome {
    pub gaps: usize,
}

impl ApplyOutcome {
    pub fn clean(&self) -> bool {
        self.gaps == 0
    }
}

/// Account status an event drives the customer toward, if any.
///
/// `None` means the event never touches account status: refusals and intent
/// expiries are recorded elsewhere, unrecognized events are no-ops.
pub fn target_account_status(event: &PaymentEvent) -> Option<AccountStatus> {
    match event {
        PaymentEvent::SaleApproved(_) | PaymentEvent::SubscriptionRenewed(_) => {
            Some(AccountStatus::Active)
        }
        PaymentEvent::SaleRefunded(_) => Some(AccountStatus::Refunded),
        PaymentEvent::SaleChargeback(_) => Some(AccountStatus::Chargeback),
        PaymentEvent::SubscriptionCanceled(_) => Some(AccountStatus::Cancelled),
        PaymentEvent::PaymentIntentGenerated(_) => Some(AccountStatus::Pending),
        PaymentEvent::SaleRefused(_)
        | PaymentEvent::PaymentIntentExpired { .. }
        | PaymentEvent::Unrecognized { .. } => None,
    }
}

/// Applies payment events to the billing tables.
#[derive(Clone)]
pub struct SubscriptionReconciler {
    pool: PgPool,
    gaps: GapRecorder,
}

impl SubscriptionReconciler {
    pub fn new(pool: PgPool) -> Self {
        let gaps = GapRecorder::new(pool.clone());
        Self { pool, gaps }
    }

    /// Apply one event. Infallible by contract: every failed write is
    /// recorded as a gap and counted in the outcome instead of propagating.
    pub async fn apply(&self, event: &PaymentEvent, source_event_id: Option<Uuid>) -> ApplyOutcome {
        let mut outcome = ApplyOutcome::default();

        match event {
            PaymentEvent::SaleApproved(sale) => {
                self.on_sale_approved(sale, source_event_id, &mut outcome)
                    .await;
            }
            PaymentEvent::SaleRefunded(customer) => {
                self.on_status_event(
                    customer,
                    AccountStatus::Refunded,
                    event.event_type(),
                    source_event_id,
                    &mut outcome,
                )
                .await;
            }
            PaymentEvent::SaleChargeback(customer) => {
                self.on_status_event(
                    customer,
                    AccountStatus::Chargeback,
                    event.event_type(),
                    source_event_id,
                    &mut outcome,
                )
                .await;
            }
            PaymentEvent::SubscriptionCanceled(sub) => {
                self.on_subscription_canceled(sub, source_event_id, &mut outcome)
                    .await;
            }
            PaymentEvent::SubscriptionRenewed(sub) => {
                self.on_subscription_renewed(sub, source_event_id, &mut outcome)
                    .await;
            }
            PaymentEvent::PaymentIntentGenerated(intent) => {
                self.on_intent_generated(intent, source_event_id, &mut outcome)
                    .await;
            }
            PaymentEvent::PaymentIntentExpired { customer, method } => {
                self.on_intent_expired(customer, *method, source_event_id, &mut outcome)
                    .await;
            }
            PaymentEvent::SaleRefused(customer) => {
                tracing::info!(
                    customer_email = %customer.email,
                    "Sale refused; no state change"
                );
            }
            PaymentEvent::Unrecognized { event } => {
                tracing::info!(event_type = %event, "Ignoring unrecognized payment event");
            }
        }

        outcome
    }

    async fn on_sale_approved(
        &self,
        sale: &SaleDetails,
        source_event_id: Option<Uuid>,
        outcome: &mut ApplyOutcome,
    ) {
        let tier = classify(
            sale.product_name.as_deref().unwrap_or_default(),
            sale.offer_name.as_deref().unwrap_or_default(),
            sale.amount_cents,
        );

        if let Err(e) = self.activate_account(&sale.customer, tier).await {
            self.gap(
                source_event_id,
                "SALE_APPROVED",
                Some(&sale.customer.email),
                WriteTarget::CustomerAccount,
                format!("activating account failed: {e}"),
                outcome,
            )
            .await;
        }

        if let Err(e) = self.append_payment(sale, tier).await {
            self.gap(
                source_event_id,
                "SALE_APPROVED",
                Some(&sale.customer.email),
                WriteTarget::Payment,
                format!("appending payment failed: {e}"),
                outcome,
            )
            .await;
        }

        if sale.kind == PurchaseKind::Recurring {
            let plan_name = sale.plan_name.as_deref().or(sale.product_name.as_deref());
            if let Err(e) = self
                .upsert_subscription(
                    &sale.customer.email,
                    plan_name,
                    SubscriptionStatus::Active,
                    sale.next_charge_date,
                    sale.processor_reference.as_deref(),
                )
                .await
            {
                self.gap(
                    source_event_id,
                    "SALE_APPROVED",
                    Some(&sale.customer.email),
                    WriteTarget::Subscription,
                    format!("upserting subscription failed: {e}"),
                    outcome,
                )
                .await;
            }
        }

        tracing::info!(
            customer_email = %sale.customer.email,
            plan_tier = %tier,
            amount_cents = ?sale.amount_cents,
            gaps = outcome.gaps,
            "Applied approved sale"
        );
    }

    async fn on_status_event(
        &self,
        customer: &CustomerInfo,
        status: AccountStatus,
        event_type: &str,
        source_event_id: Option<Uuid>,
        outcome: &mut ApplyOutcome,
    ) {
        if let Err(e) = self.set_account_status(customer, status).await {
            self.gap(
                source_event_id,
                event_type,
                Some(&customer.email),
                WriteTarget::CustomerAccount,
                format!("setting account status to {status} failed: {e}"),
                outcome,
            )
            .await;
            return;
        }

        tracing::info!(
            customer_email = %customer.email,
            status = %status,
            "Updated account status"
        );
    }

    async fn on_subscription_canceled(
        &self,
        sub: &SubscriptionDetails,
        source_event_id: Option<Uuid>,
        outcome: &mut ApplyOutcome,
    ) {
        if let Err(e) = self
            .set_account_status(&sub.customer, AccountStatus::Cancelled)
            .await
        {
            self.gap(
                source_event_id,
                "SUBSCRIPTION_CANCELED",
                Some(&sub.customer.email),
                WriteTarget::CustomerAccount,
                format!("cancelling account failed: {e}"),
                outcome,
            )
            .await;
        }

        if let Err(e) = self
            .upsert_subscription(
                &sub.customer.email,
                sub.plan_name.as_deref(),
                SubscriptionStatus::Cancelled,
                None,
                sub.processor_reference.as_deref(),
            )
            .await
        {
            self.gap(
                source_event_id,
                "SUBSCRIPTION_CANCELED",
                Some(&sub.customer.email),
                WriteTarget::Subscription,
                format!("cancelling subscription failed: {e}"),
                outcome,
            )
            .await;
        }

        tracing::info!(
            customer_email = %sub.customer.email,
            gaps = outcome.gaps,
            "Applied subscription cancellation"
        );
    }

    async fn on_subscription_renewed(
        &self,
        sub: &SubscriptionDetails,
        source_event_id: Option<Uuid>,
        outcome: &mut ApplyOutcome,
    ) {
        if let Err(e) = self
            .set_account_status(&sub.customer, AccountStatus::Active)
            .await
        {
            self.gap(
                source_event_id,
                "SUBSCRIPTION_RENEWED",
                Some(&sub.customer.email),
                WriteTarget::CustomerAccount,
                format!("reactivating account failed: {e}"),
                outcome,
            )
            .await;
        }

        if let Err(e) = self
            .upsert_subscription(
                &sub.customer.email,
                sub.plan_name.as_deref(),
                SubscriptionStatus::Active,
                sub.next_charge_date,
                sub.processor_reference.as_deref(),
            )
            .await
        {
            self.gap(
                source_event_id,
                "SUBSCRIPTION_RENEWED",
                Some(&sub.customer.email),
                WriteTarget::Subscription,
                format!("renewing subscription failed: {e}"),
                outcome,
            )
            .await;
        }

        tracing::info!(
            customer_email = %sub.customer.email,
            next_charge = ?sub.next_charge_date,
            gaps = outcome.gaps,
            "Applied subscription renewal"
        );
    }

    async fn on_intent_generated(
        &self,
        intent: &IntentDetails,
        source_event_id: Option<Uuid>,
        outcome: &mut ApplyOutcome,
    ) {
        let event_type = match intent.method {
            PaymentMethod::Pix => "PIX_GENERATED",
            PaymentMethod::BankSlip => "BANK_SLIP_GENERATED",
        };

        if let Err(e) = self.ensure_pending_account(&intent.customer).await {
            self.gap(
                source_event_id,
                event_type,
                Some(&intent.customer.email),
                WriteTarget::CustomerAccount,
                format!("creating pending account failed: {e}"),
                outcome,
            )
            .await;
        }

        if let Err(e) = self.upsert_cart(intent).await {
            self.gap(
                source_event_id,
                event_type,
                Some(&intent.customer.email),
                WriteTarget::AbandonedCart,
                format!("recording open cart failed: {e}"),
                outcome,
            )
            .await;
        }

        tracing::info!(
            customer_email = %intent.customer.email,
            method = %intent.method,
            gaps = outcome.gaps,
            "Recorded payment intent"
        );
    }

    async fn on_intent_expired(
        &self,
        customer: &CustomerInfo,
        method: PaymentMethod,
        source_event_id: Option<Uuid>,
        outcome: &mut ApplyOutcome,
    ) {
        let event_type = match method {
            PaymentMethod::Pix => "PIX_EXPIRED",
            PaymentMethod::BankSlip => "BANK_SLIP_EXPIRED",
        };

        match self.expire_cart(&customer.email, method).await {
            Ok(0) => {
                // An expiry with no open cart is normal when the generation
                // event was never delivered.
                tracing::debug!(
                    customer_email = %customer.email,
                    method = %method,
                    "No open cart to expire"
                );
            }
            Ok(_) => {
                tracing::info!(
                    customer_email = %customer.email,
                    method = %method,
                    "Expired open cart"
                );
            }
            Err(e) => {
                self.gap(
                    source_event_id,
                    event_type,
                    Some(&customer.email),
                    WriteTarget::AbandonedCart,
                    format!("expiring cart failed: {e}"),
                    outcome,
                )
                .await;
            }
        }
    }

    // ==== SQL ====

    async fn activate_account(
        &self,
        customer: &CustomerInfo,
        tier: PlanTier,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO customer_accounts (id, email, name, phone, plan_tier, status)
            VALUES ($1, $2, $3, $4, $5, 'active')
            ON CONFLICT (email) DO UPDATE SET
                name = COALESCE(EXCLUDED.name, customer_accounts.name),
                phone = COALESCE(EXCLUDED.phone, customer_accounts.phone),
                plan_tier = EXCLUDED.plan_tier,
                status = 'active',
                updated_at = NOW()
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&customer.email)
        .bind(&customer.name)
        .bind(&customer.phone)
        .bind(tier.as_str())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn set_account_status(
        &self,
        customer: &CustomerInfo,
        status: AccountStatus,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO customer_accounts (id, email, name, phone, status)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (email) DO UPDATE SET
                name = COALESCE(EXCLUDED.name, customer_accounts.name),
                phone = COALESCE(EXCLUDED.phone, customer_accounts.phone),
                status = EXCLUDED.status,
                updated_at = NOW()
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&customer.email)
        .bind(&customer.name)
        .bind(&customer.phone)
        .bind(status.as_str())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Create the account in `pending` only when no row exists yet. An
    /// intent must never downgrade a customer who already paid.
    async fn ensure_pending_account(&self, customer: &CustomerInfo) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO customer_accounts (id, email, name, phone, status)
            VALUES ($1, $2, $3, $4, 'pending')
            ON CONFLICT (email) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&customer.email)
        .bind(&customer.name)
        .bind(&customer.phone)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Payments are append-only; duplicate deliveries produce duplicate rows
    /// on purpose, mirroring what the processor actually sent.
    async fn append_payment(&self, sale: &SaleDetails, tier: PlanTier) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO payments
                (id, customer_email, customer_name, product_name, plan_tier,
                 amount_cents, purchase_type, payment_method, processor_reference)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&sale.customer.email)
        .bind(&sale.customer.name)
        .bind(&sale.product_name)
        .bind(tier.as_str())
        .bind(sale.amount_cents)
        .bind(sale.kind.as_str())
        .bind(&sale.payment_method)
        .bind(&sale.processor_reference)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn upsert_subscription(
        &self,
        email: &str,
        plan_name: Option<&str>,
        status: SubscriptionStatus,
        next_renewal_at: Option<OffsetDateTime>,
        processor_reference: Option<&str>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO subscriptions
                (id, customer_email, plan_name, status, next_renewal_at, processor_reference)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (customer_email) DO UPDATE SET
                plan_name = COALESCE(EXCLUDED.plan_name, subscriptions.plan_name),
                status = EXCLUDED.status,
                next_renewal_at = COALESCE(EXCLUDED.next_renewal_at, subscriptions.next_renewal_at),
                processor_reference = COALESCE(EXCLUDED.processor_reference, subscriptions.processor_reference),
                updated_at = NOW()
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(email)
        .bind(plan_name)
        .bind(status.as_str())
        .bind(next_renewal_at)
        .bind(processor_reference)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn upsert_cart(&self, intent: &IntentDetails) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO abandoned_carts
                (id, customer_email, customer_name, payment_method, product_name, amount_cents, status)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (customer_email) DO UPDATE SET
                customer_name = COALESCE(EXCLUDED.customer_name, abandoned_carts.customer_name),
                payment_method = EXCLUDED.payment_method,
                product_name = COALESCE(EXCLUDED.product_name, abandoned_carts.product_name),
                amount_cents = COALESCE(EXCLUDED.amount_cents, abandoned_carts.amount_cents),
                status = EXCLUDED.status,
                updated_at = NOW()
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&intent.customer.email)
        .bind(&intent.customer.name)
        .bind(intent.method.as_str())
        .bind(&intent.product_name)
        .bind(intent.amount_cents)
        .bind(CartStatus::generated_for(intent.method).as_str())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn expire_cart(&self, email: &str, method: PaymentMethod) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE abandoned_carts
            SET status = $3, updated_at = NOW()
            WHERE customer_email = $1 AND status = $2
            "#,
        )
        .bind(email)
        .bind(CartStatus::generated_for(method).as_str())
        .bind(CartStatus::expired_for(method).as_str())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn gap(
        &self,
        webhook_event_id: Option<Uuid>,
        event_type: &str,
        customer_email: Option<&str>,
        target: WriteTarget,
        detail: String,
        outcome: &mut ApplyOutcome,
    ) {
        outcome.gaps += 1;
        tracing::error!(
            event_type = %event_type,
            target = %target.as_str(),
            detail = %detail,
            "Reconciliation write failed"
        );
        self.gaps
            .record(NewGap {
                webhook_event_id,
                event_type,
                customer_email,
                target,
                detail,
            })
            .await;
    }
}
