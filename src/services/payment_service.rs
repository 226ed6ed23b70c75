use chrono::Utc;
use sea_orm::sea_query::LockType;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QuerySelect, Set, TransactionTrait,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    audit::log_audit,
    auth::{AuthUser, ensure_owner_or_admin},
    entity::{
        orders::{ActiveModel as OrderActive, Entity as Orders},
        payments::{ActiveModel as PaymentActive, Column as PaymentCol, Entity as Payments},
    },
    error::{AppError, AppResult},
    gateway::signature::verify_payment_signature,
    models::{OrderStatus, Payment, PaymentStatus},
    notify::NotificationEvent,
    state::AppState,
};

#[derive(Debug, Deserialize)]
pub struct VerifyPaymentRequest {
    pub order_id: Uuid,
    pub gateway_order_id: String,
    pub gateway_payment_id: String,
    pub gateway_signature: String,
}

/// Validate the gateway's payment callback against the shared-secret digest
/// and transition Payment/Order state accordingly. A mismatch records the
/// failure but leaves the order PENDING so the client can retry.
pub async fn verify_payment(
    state: &AppState,
    user: &AuthUser,
    payload: VerifyPaymentRequest,
) -> AppResult<Payment> {
    let txn = state.orm.begin().await?;

    let order = Orders::find_by_id(payload.order_id)
        .lock(LockType::Update)
        .one(&txn)
        .await?
        .ok_or(AppError::NotFound)?;
    ensure_owner_or_admin(user, order.user_id)?;

    let payment = Payments::find()
        .filter(PaymentCol::OrderId.eq(order.id))
        .lock(LockType::Update)
        .one(&txn)
        .await?
        .ok_or_else(|| {
            AppError::Internal(anyhow::anyhow!("order {} has no payment record", order.id))
        })?;

    let status = PaymentStatus::parse(&payment.status).ok_or_else(|| {
        AppError::Internal(anyhow::anyhow!(
            "payment {} has unknown status {:?}",
            payment.id,
            payment.status
        ))
    })?;
    if status == PaymentStatus::Completed {
        return Err(AppError::InvalidState(
            "payment has already been completed".into(),
        ));
    }
    if payload.gateway_order_id != payment.gateway_order_id {
        return Err(AppError::BadRequest(
            "gateway order id does not match the payment".into(),
        ));
    }

    let valid = verify_payment_signature(
        &payload.gateway_order_id,
        &payload.gateway_payment_id,
        &payload.gateway_signature,
        &state.config.gateway.signature_secret,
    );

    if valid {
        let order_id = order.id;
        let mut payment_active: PaymentActive = payment.into();
        payment_active.gateway_payment_id = Set(Some(payload.gateway_payment_id));
        payment_active.gateway_signature = Set(Some(payload.gateway_signature));
        payment_active.status = Set(PaymentStatus::Completed.as_str().to_string());
        payment_active.failure_reason = Set(None);
        payment_active.updated_at = Set(Utc::now().into());
        let payment = payment_active.update(&txn).await?;

        let mut order_active: OrderActive = order.into();
        order_active.status = Set(OrderStatus::Confirmed.as_str().to_string());
        order_active.updated_at = Set(Utc::now().into());
        order_active.update(&txn).await?;

        txn.commit().await?;

        if let Err(err) = log_audit(
            &state.pool,
            Some(user.user_id),
            "payment_verified",
            Some("payments"),
            Some(serde_json::json!({ "order_id": order_id, "payment_id": payment.id })),
        )
        .await
        {
            tracing::warn!(error = %err, "audit log failed");
        }

        state
            .notifier
            .notify(order_id, NotificationEvent::PaymentCompleted)
            .await;

        Ok(payment.into())
    } else {
        let order_id = order.id;
        let payment_id = payment.id;
        let mut payment_active: PaymentActive = payment.into();
        payment_active.status = Set(PaymentStatus::Failed.as_str().to_string());
        payment_active.failure_reason = Set(Some("Invalid signature".to_string()));
        payment_active.updated_at = Set(Utc::now().into());
        payment_active.update(&txn).await?;

        txn.commit().await?;

        tracing::warn!(order_id = %order_id, payment_id = %payment_id, "payment signature mismatch");

        if let Err(err) = log_audit(
            &state.pool,
            Some(user.user_id),
            "payment_failed",
            Some("payments"),
            Some(serde_json::json!({ "order_id": order_id, "payment_id": payment_id })),
        )
        .await
        {
            tracing::warn!(error = %err, "audit log failed");
        }

        Err(AppError::SignatureMismatch)
    }
}
