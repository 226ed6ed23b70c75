use std::time::Duration;

use chrono::Utc;
use sea_orm::prelude::DateTimeWithTimeZone;
use sea_orm::sea_query::Expr;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set};

use crate::{
    entity::{
        order_refunds::{Column as RefundCol, Entity as OrderRefunds},
        refund_retry_schedules::{
            ActiveModel as ScheduleActive, Column as ScheduleCol, Entity as RefundRetrySchedules,
            Model as ScheduleModel,
        },
    },
    error::AppResult,
    models::{RefundStatus, ScheduleStatus},
    services::refund_service,
    state::AppState,
};

/// A schedule row is abandoned permanently after this many failed attempts;
/// the refund then needs manual intervention.
pub const MAX_RETRY_COUNT: i32 = 5;

pub async fn run(state: AppState) {
    let interval = Duration::from_secs(state.config.scheduler.retry_interval_secs);
    tracing::info!(interval_secs = interval.as_secs(), "settlement retry worker started");

    let mut ticker = tokio::time::interval(interval);
    loop {
        ticker.tick().await;
        match tick(&state).await {
            Ok(0) => {}
            Ok(attempted) => tracing::info!(attempted, "settlement retries attempted"),
            Err(err) => tracing::error!(error = %err, "settlement retry pass failed"),
        }
    }
}

/// One retry pass over all due schedule rows.
pub async fn tick(state: &AppState) -> AppResult<u64> {
    let now: DateTimeWithTimeZone = Utc::now().into();
    let due = RefundRetrySchedules::find()
        .filter(ScheduleCol::Status.eq(ScheduleStatus::Pending.as_str()))
        .filter(ScheduleCol::RetryAt.lte(now))
        .all(&state.orm)
        .await?;

    let mut attempted = 0;
    for schedule in due {
        attempted += 1;
        if let Err(err) = process_schedule(state, schedule).await {
            tracing::error!(error = %err, "settlement retry failed for schedule row");
        }
    }

    Ok(attempted)
}

async fn process_schedule(state: &AppState, schedule: ScheduleModel) -> AppResult<()> {
    let refund_id = schedule.refund_id;

    // Atomically re-claim the refund so a concurrent worker (or an operator
    // resubmission racing us) cannot send it to the gateway twice. PENDING is
    // included to pick refunds stranded by an earlier transient failure.
    let rows = OrderRefunds::update_many()
        .col_expr(
            RefundCol::RefundStatus,
            Expr::value(RefundStatus::Pending.as_str()),
        )
        .col_expr(
            RefundCol::UpdatedAt,
            Expr::value(DateTimeWithTimeZone::from(Utc::now())),
        )
        .filter(RefundCol::Id.eq(refund_id))
        .filter(RefundCol::RefundStatus.is_in([
            RefundStatus::PendingSettlement.as_str(),
            RefundStatus::Pending.as_str(),
        ]))
        .exec(&state.orm)
        .await?
        .rows_affected;

    if rows == 0 {
        // The refund moved on without us; nothing left for this row to do.
        tracing::info!(refund_id = %refund_id, "refund no longer awaiting settlement, closing schedule row");
        close_schedule(state, schedule, ScheduleStatus::Completed).await?;
        return Ok(());
    }

    match refund_service::submit_refund(state, refund_id).await {
        Ok(refund) => match RefundStatus::parse(&refund.refund_status) {
            Some(RefundStatus::Processing) => {
                tracing::info!(refund_id = %refund_id, "settlement retry succeeded");
                close_schedule(state, schedule, ScheduleStatus::Completed).await
            }
            Some(RefundStatus::PendingSettlement) => {
                record_failure(state, schedule, "payment still within settlement window").await
            }
            Some(RefundStatus::Failed) => {
                // Terminal gateway rejection; retrying cannot help.
                tracing::warn!(
                    refund_id = %refund_id,
                    reason = refund.failure_reason.as_deref().unwrap_or("unknown"),
                    "refund failed terminally during settlement retry"
                );
                close_schedule(state, schedule, ScheduleStatus::Completed).await
            }
            _ => record_failure(state, schedule, "refund left in unexpected state").await,
        },
        Err(err) => {
            let message = err.to_string();
            record_failure(state, schedule, &message).await
        }
    }
}

fn status_after_failure(attempts: i32) -> ScheduleStatus {
    if attempts >= MAX_RETRY_COUNT {
        ScheduleStatus::Failed
    } else {
        ScheduleStatus::Pending
    }
}

async fn close_schedule(
    state: &AppState,
    schedule: ScheduleModel,
    status: ScheduleStatus,
) -> AppResult<()> {
    let mut active: ScheduleActive = schedule.into();
    active.status = Set(status.as_str().to_string());
    active.updated_at = Set(Utc::now().into());
    active.update(&state.orm).await?;
    Ok(())
}

async fn record_failure(
    state: &AppState,
    schedule: ScheduleModel,
    error: &str,
) -> AppResult<()> {
    let refund_id = schedule.refund_id;
    let attempts = schedule.retry_count + 1;
    let status = status_after_failure(attempts);

    let mut active: ScheduleActive = schedule.into();
    active.retry_count = Set(attempts);
    active.last_error = Set(Some(error.to_string()));
    active.status = Set(status.as_str().to_string());
    active.updated_at = Set(Utc::now().into());
    active.update(&state.orm).await?;

    if status == ScheduleStatus::Failed {
        tracing::error!(
            refund_id = %refund_id,
            attempts,
            error,
            "settlement retry cap reached, manual intervention required"
        );
    } else {
        tracing::warn!(refund_id = %refund_id, attempts, error, "settlement retry attempt failed");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schedule_fails_permanently_on_the_fifth_attempt() {
        assert_eq!(status_after_failure(1), ScheduleStatus::Pending);
        assert_eq!(status_after_failure(4), ScheduleStatus::Pending);
        assert_eq!(status_after_failure(5), ScheduleStatus::Failed);
        assert_eq!(status_after_failure(6), ScheduleStatus::Failed);
    }
}
