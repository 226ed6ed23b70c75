use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::prelude::DateTimeWithTimeZone;
use sea_orm::sea_query::Expr;
use sea_orm::ActiveValue::NotSet;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set, TransactionTrait,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    audit::log_audit,
    auth::{AuthUser, ensure_owner_or_admin},
    entity::{
        order_refunds::{
            ActiveModel as RefundActive, Column as RefundCol, Entity as OrderRefunds,
            Model as RefundModel,
        },
        orders::{ActiveModel as OrderActive, Entity as Orders},
        payments::{ActiveModel as PaymentActive, Column as PaymentCol, Entity as Payments},
        refund_retry_schedules::{
            ActiveModel as ScheduleActive, Column as ScheduleCol, Entity as RefundRetrySchedules,
        },
    },
    error::{AppError, AppResult},
    gateway::{GatewayError, RefundStatusReport, RemoteRefundStatus},
    models::{OrderRefund, OrderStatus, PaymentStatus, RefundStatus, RefundType, ScheduleStatus},
    money::{round_money, to_minor_units},
    notify::NotificationEvent,
    state::AppState,
};

/// Fund-settlement window the gateway enforces before a captured payment can
/// be refunded.
pub const SETTLEMENT_WINDOW_DAYS: i64 = 11;

#[derive(Debug, Deserialize)]
pub struct RefundRequest {
    pub refund_type: RefundType,
    pub amount: Option<Decimal>,
}

fn ensure_transition(from: RefundStatus, to: RefundStatus) -> AppResult<()> {
    if from.can_transition_to(to) {
        return Ok(());
    }
    Err(AppError::InvalidState(format!(
        "refund cannot move from {} to {}",
        from.as_str(),
        to.as_str()
    )))
}

fn parse_refund_status(refund: &RefundModel) -> AppResult<RefundStatus> {
    RefundStatus::parse(&refund.refund_status).ok_or_else(|| {
        AppError::Internal(anyhow::anyhow!(
            "refund {} has unknown status {:?}",
            refund.id,
            refund.refund_status
        ))
    })
}

/// Create a refund record for a cancelled/returned order and submit it to
/// the gateway. The record is never deleted afterwards; every outcome leaves
/// it in a well-defined state.
pub async fn create_refund(
    state: &AppState,
    user: &AuthUser,
    order_id: Uuid,
    payload: RefundRequest,
) -> AppResult<OrderRefund> {
    let order = Orders::find_by_id(order_id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;
    ensure_owner_or_admin(user, order.user_id)?;

    let payment = Payments::find()
        .filter(PaymentCol::OrderId.eq(order.id))
        .one(&state.orm)
        .await?
        .ok_or_else(|| {
            AppError::Internal(anyhow::anyhow!("order {} has no payment record", order.id))
        })?;
    if PaymentStatus::parse(&payment.status) != Some(PaymentStatus::Completed) {
        return Err(AppError::InvalidState(
            "order has no completed payment to refund".into(),
        ));
    }

    let refund_amount = match payload.refund_type {
        RefundType::Full => payment.amount,
        RefundType::Partial => {
            let amount = payload.amount.ok_or_else(|| {
                AppError::BadRequest("partial refund requires an amount".into())
            })?;
            if amount <= Decimal::ZERO {
                return Err(AppError::BadRequest("refund amount must be positive".into()));
            }
            if amount > payment.amount {
                return Err(AppError::BadRequest(
                    "refund amount exceeds the paid amount".into(),
                ));
            }
            round_money(amount)
        }
    };

    let refund = RefundActive {
        id: Set(Uuid::new_v4()),
        order_id: Set(order.id),
        refund_type: Set(payload.refund_type.as_str().to_string()),
        refund_amount: Set(refund_amount),
        gateway_refund_id: Set(None),
        refund_status: Set(RefundStatus::Pending.as_str().to_string()),
        failure_reason: Set(None),
        settlement_expected_date: Set(None),
        created_at: NotSet,
        updated_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "refund_created",
        Some("order_refunds"),
        Some(serde_json::json!({ "order_id": order.id, "refund_id": refund.id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    submit_refund(state, refund.id).await
}

/// Run the PENDING -> PROCESSING step: build the gateway refund request and
/// apply the outcome. Re-entrant for refunds parked in PENDING_SETTLEMENT
/// (operator action or the retry scheduler).
pub async fn submit_refund(state: &AppState, refund_id: Uuid) -> AppResult<OrderRefund> {
    let mut refund = OrderRefunds::find_by_id(refund_id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;
    let mut status = parse_refund_status(&refund)?;

    // A parked refund is first re-claimed atomically so two submitters
    // cannot both send it to the gateway.
    if status == RefundStatus::PendingSettlement {
        ensure_transition(status, RefundStatus::Pending)?;
        let rows = OrderRefunds::update_many()
            .col_expr(
                RefundCol::RefundStatus,
                Expr::value(RefundStatus::Pending.as_str()),
            )
            .col_expr(
                RefundCol::UpdatedAt,
                Expr::value(DateTimeWithTimeZone::from(Utc::now())),
            )
            .filter(RefundCol::Id.eq(refund.id))
            .filter(
                RefundCol::RefundStatus.eq(RefundStatus::PendingSettlement.as_str()),
            )
            .exec(&state.orm)
            .await?
            .rows_affected;
        if rows == 0 {
            return Err(AppError::InvalidState(
                "refund was claimed by another submitter".into(),
            ));
        }
        refund = OrderRefunds::find_by_id(refund_id)
            .one(&state.orm)
            .await?
            .ok_or(AppError::NotFound)?;
        status = parse_refund_status(&refund)?;
    }

    if status != RefundStatus::Pending {
        return Err(AppError::InvalidState(format!(
            "refund {} cannot be submitted from status {}",
            refund.id, refund.refund_status
        )));
    }

    let payment = Payments::find()
        .filter(PaymentCol::OrderId.eq(refund.order_id))
        .one(&state.orm)
        .await?
        .ok_or_else(|| {
            AppError::Internal(anyhow::anyhow!(
                "order {} has no payment record",
                refund.order_id
            ))
        })?;
    let gateway_payment_id = payment.gateway_payment_id.clone().ok_or_else(|| {
        AppError::Internal(anyhow::anyhow!(
            "payment {} has no gateway payment id",
            payment.id
        ))
    })?;

    let refund_type = RefundType::parse(&refund.refund_type).ok_or_else(|| {
        AppError::Internal(anyhow::anyhow!(
            "refund {} has unknown type {:?}",
            refund.id,
            refund.refund_type
        ))
    })?;
    let amount_minor = match refund_type {
        RefundType::Full => None,
        RefundType::Partial => Some(to_minor_units(refund.refund_amount)?),
    };

    match state
        .gateway
        .create_refund(&gateway_payment_id, amount_minor)
        .await
    {
        Ok(gateway_refund_id) => {
            ensure_transition(status, RefundStatus::Processing)?;
            let refund_id = refund.id;
            let mut active: RefundActive = refund.into();
            active.gateway_refund_id = Set(Some(gateway_refund_id));
            active.refund_status = Set(RefundStatus::Processing.as_str().to_string());
            active.failure_reason = Set(None);
            active.updated_at = Set(Utc::now().into());
            let refund = active.update(&state.orm).await?;

            if let Err(err) = log_audit(
                &state.pool,
                None,
                "refund_submitted",
                Some("order_refunds"),
                Some(serde_json::json!({ "refund_id": refund_id })),
            )
            .await
            {
                tracing::warn!(error = %err, "audit log failed");
            }

            Ok(refund.into())
        }
        Err(GatewayError::SettlementHold(description)) => {
            ensure_transition(status, RefundStatus::PendingSettlement)?;
            let expected = Utc::now() + chrono::Duration::days(SETTLEMENT_WINDOW_DAYS);

            let txn = state.orm.begin().await?;
            let refund_id = refund.id;
            let mut active: RefundActive = refund.into();
            active.refund_status = Set(RefundStatus::PendingSettlement.as_str().to_string());
            active.settlement_expected_date = Set(Some(expected.into()));
            active.updated_at = Set(Utc::now().into());
            let refund = active.update(&txn).await?;

            // One schedule row per settlement-hold event; a retry that hits
            // the hold again reuses the existing pending row.
            let existing = RefundRetrySchedules::find()
                .filter(ScheduleCol::RefundId.eq(refund_id))
                .filter(ScheduleCol::Status.eq(ScheduleStatus::Pending.as_str()))
                .one(&txn)
                .await?;
            if existing.is_none() {
                ScheduleActive {
                    id: Set(Uuid::new_v4()),
                    refund_id: Set(refund_id),
                    retry_at: Set(expected.into()),
                    status: Set(ScheduleStatus::Pending.as_str().to_string()),
                    retry_count: Set(0),
                    last_error: Set(None),
                    created_at: NotSet,
                    updated_at: NotSet,
                }
                .insert(&txn)
                .await?;
            }
            txn.commit().await?;

            tracing::info!(
                refund_id = %refund_id,
                expected = %expected,
                reason = %description,
                "refund deferred by settlement hold"
            );

            Ok(refund.into())
        }
        Err(GatewayError::Rejected { code, description }) => {
            ensure_transition(status, RefundStatus::Failed)?;
            let refund_id = refund.id;
            let mut active: RefundActive = refund.into();
            active.refund_status = Set(RefundStatus::Failed.as_str().to_string());
            active.failure_reason = Set(Some(description.clone()));
            active.updated_at = Set(Utc::now().into());
            let refund = active.update(&state.orm).await?;

            tracing::warn!(
                refund_id = %refund_id,
                code = %code,
                reason = %description,
                "gateway rejected refund"
            );

            Ok(refund.into())
        }
        Err(err) => {
            // Transient: no definitive answer, so no state transition.
            tracing::warn!(refund_id = %refund.id, error = %err, "refund submission failed transiently");
            Err(AppError::GatewayUnavailable(err.to_string()))
        }
    }
}

/// Apply a gateway-reported status to a PROCESSING refund. The conditional
/// update doubles as the claim: whichever worker flips the row first wins,
/// so concurrent pollers never apply a terminal state twice. Returns the
/// applied status, or None when nothing changed.
pub async fn apply_refund_status(
    state: &AppState,
    refund_id: Uuid,
    report: RefundStatusReport,
) -> AppResult<Option<RefundStatus>> {
    match report.status {
        RemoteRefundStatus::Processed => {
            let txn = state.orm.begin().await?;
            let rows = OrderRefunds::update_many()
                .col_expr(
                    RefundCol::RefundStatus,
                    Expr::value(RefundStatus::Success.as_str()),
                )
                .col_expr(
                    RefundCol::UpdatedAt,
                    Expr::value(DateTimeWithTimeZone::from(Utc::now())),
                )
                .filter(RefundCol::Id.eq(refund_id))
                .filter(RefundCol::RefundStatus.eq(RefundStatus::Processing.as_str()))
                .exec(&txn)
                .await?
                .rows_affected;
            if rows == 0 {
                return Ok(None);
            }

            let refund = OrderRefunds::find_by_id(refund_id)
                .one(&txn)
                .await?
                .ok_or(AppError::NotFound)?;
            let order_id = refund.order_id;
            mark_order_refunded_if_covered(&txn, order_id).await?;
            txn.commit().await?;

            if let Err(err) = log_audit(
                &state.pool,
                None,
                "refund_succeeded",
                Some("order_refunds"),
                Some(serde_json::json!({ "refund_id": refund_id, "order_id": order_id })),
            )
            .await
            {
                tracing::warn!(error = %err, "audit log failed");
            }

            state
                .notifier
                .notify(order_id, NotificationEvent::RefundSucceeded)
                .await;

            Ok(Some(RefundStatus::Success))
        }
        RemoteRefundStatus::Failed => {
            let reason = report
                .failure_reason
                .unwrap_or_else(|| "Refund failed at gateway".to_string());
            let rows = OrderRefunds::update_many()
                .col_expr(
                    RefundCol::RefundStatus,
                    Expr::value(RefundStatus::Failed.as_str()),
                )
                .col_expr(RefundCol::FailureReason, Expr::value(reason.clone()))
                .col_expr(
                    RefundCol::UpdatedAt,
                    Expr::value(DateTimeWithTimeZone::from(Utc::now())),
                )
                .filter(RefundCol::Id.eq(refund_id))
                .filter(RefundCol::RefundStatus.eq(RefundStatus::Processing.as_str()))
                .exec(&state.orm)
                .await?
                .rows_affected;
            if rows == 0 {
                return Ok(None);
            }

            tracing::warn!(refund_id = %refund_id, reason = %reason, "refund failed at gateway");
            Ok(Some(RefundStatus::Failed))
        }
        RemoteRefundStatus::Pending => Ok(None),
        RemoteRefundStatus::Unknown(label) => {
            tracing::warn!(
                refund_id = %refund_id,
                status = %label,
                "unknown refund status from gateway, leaving state unchanged"
            );
            Ok(None)
        }
    }
}

/// Once successful refunds cover the paid amount, the order and payment flip
/// to REFUNDED.
async fn mark_order_refunded_if_covered(
    txn: &sea_orm::DatabaseTransaction,
    order_id: Uuid,
) -> AppResult<()> {
    let payment = Payments::find()
        .filter(PaymentCol::OrderId.eq(order_id))
        .one(txn)
        .await?
        .ok_or_else(|| {
            AppError::Internal(anyhow::anyhow!("order {order_id} has no payment record"))
        })?;

    let refunded: Decimal = OrderRefunds::find()
        .filter(RefundCol::OrderId.eq(order_id))
        .filter(RefundCol::RefundStatus.eq(RefundStatus::Success.as_str()))
        .all(txn)
        .await?
        .into_iter()
        .map(|r| r.refund_amount)
        .sum();

    if refunded < payment.amount {
        return Ok(());
    }

    let order = Orders::find_by_id(order_id)
        .one(txn)
        .await?
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("order {order_id} is missing")))?;

    let mut order_active: OrderActive = order.into();
    order_active.status = Set(OrderStatus::Refunded.as_str().to_string());
    order_active.updated_at = Set(Utc::now().into());
    order_active.update(txn).await?;

    let mut payment_active: PaymentActive = payment.into();
    payment_active.status = Set(PaymentStatus::Refunded.as_str().to_string());
    payment_active.updated_at = Set(Utc::now().into());
    payment_active.update(txn).await?;

    tracing::info!(order_id = %order_id, "order fully refunded");
    Ok(())
}
