use std::time::Duration;

use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};

use crate::{
    entity::order_refunds::{Column as RefundCol, Entity as OrderRefunds},
    error::AppResult,
    models::RefundStatus,
    services::refund_service,
    state::AppState,
};

pub async fn run(state: AppState) {
    let interval = Duration::from_secs(state.config.scheduler.poll_interval_secs);
    tracing::info!(interval_secs = interval.as_secs(), "refund status poller started");

    let mut ticker = tokio::time::interval(interval);
    loop {
        ticker.tick().await;
        match tick(&state).await {
            Ok(0) => {}
            Ok(applied) => tracing::info!(applied, "refund status poll applied updates"),
            Err(err) => tracing::error!(error = %err, "refund status poll failed"),
        }
    }
}

/// One polling pass: fetch the gateway status of every in-flight refund and
/// apply terminal results. Transient fetch errors leave the refund in
/// PROCESSING for the next pass.
pub async fn tick(state: &AppState) -> AppResult<u64> {
    let in_flight = OrderRefunds::find()
        .filter(RefundCol::RefundStatus.eq(RefundStatus::Processing.as_str()))
        .filter(RefundCol::GatewayRefundId.is_not_null())
        .all(&state.orm)
        .await?;

    let mut applied = 0;
    for refund in in_flight {
        let Some(gateway_refund_id) = refund.gateway_refund_id.as_deref() else {
            continue;
        };
        match state.gateway.fetch_refund_status(gateway_refund_id).await {
            Ok(report) => match refund_service::apply_refund_status(state, refund.id, report).await
            {
                Ok(Some(status)) => {
                    applied += 1;
                    tracing::info!(
                        refund_id = %refund.id,
                        status = status.as_str(),
                        "refund reached terminal status"
                    );
                }
                Ok(None) => {}
                Err(err) => {
                    tracing::error!(refund_id = %refund.id, error = %err, "failed to apply refund status");
                }
            },
            Err(err) => {
                tracing::warn!(
                    refund_id = %refund.id,
                    error = %err,
                    "refund status fetch failed, leaving state unchanged"
                );
            }
        }
    }

    Ok(applied)
}
