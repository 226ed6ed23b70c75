use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::ActiveValue::NotSet;
use sea_orm::sea_query::LockType;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QuerySelect, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    audit::log_audit,
    auth::{AuthUser, ensure_owner_or_admin},
    entity::{
        order_items::{ActiveModel as OrderItemActive, Column as OrderItemCol, Entity as OrderItems},
        orders::{ActiveModel as OrderActive, Column as OrderCol, Entity as Orders},
        payments::ActiveModel as PaymentActive,
    },
    error::{AppError, AppResult},
    models::{Order, OrderItem, OrderStatus, PaymentStatus},
    money::{round_money, to_minor_units},
    notify::NotificationEvent,
    services::{cart_service, cart_service::CartLine, stock_service},
    state::AppState,
};

/// Flat 10% tax applied to every line.
fn tax_rate() -> Decimal {
    Decimal::new(10, 2)
}

/// Flat shipping fee for any non-empty cart.
fn flat_shipping_fee() -> Decimal {
    Decimal::new(5000, 2)
}

#[derive(Debug, Deserialize)]
pub struct CheckoutRequest {
    pub shipping_address: String,
    pub billing_address: Option<String>,
    pub payment_method: String,
    pub discount: Option<Decimal>,
}

#[derive(Debug, Serialize)]
pub struct OrderWithItems {
    pub order: Order,
    pub items: Vec<OrderItem>,
}

#[derive(Debug, PartialEq)]
pub struct Totals {
    pub subtotal: Decimal,
    pub tax_amount: Decimal,
    pub shipping_cost: Decimal,
    pub discount: Decimal,
    pub total_amount: Decimal,
}

/// Effective unit price: sale price when present, else regular price, plus
/// the variant's adjustment.
pub fn unit_price(line: &CartLine) -> Decimal {
    line.sale_price.unwrap_or(line.price) + line.price_adjustment
}

pub fn compute_totals(lines: &[CartLine], discount: Decimal) -> Totals {
    let mut subtotal = Decimal::ZERO;
    let mut tax_amount = Decimal::ZERO;
    for line in lines {
        let line_subtotal = unit_price(line) * Decimal::from(line.quantity);
        subtotal += line_subtotal;
        tax_amount += round_money(line_subtotal * tax_rate());
    }
    let shipping_cost = if lines.is_empty() {
        Decimal::ZERO
    } else {
        flat_shipping_fee()
    };
    let subtotal = round_money(subtotal);
    let total_amount = round_money(subtotal + tax_amount + shipping_cost - discount);
    Totals {
        subtotal,
        tax_amount,
        shipping_cost,
        discount,
        total_amount,
    }
}

/// Turn the user's cart into an Order + pending Payment, deducting stock and
/// clearing the cart in one all-or-nothing transaction.
pub async fn checkout(
    state: &AppState,
    user: &AuthUser,
    payload: CheckoutRequest,
) -> AppResult<OrderWithItems> {
    let discount = round_money(payload.discount.unwrap_or(Decimal::ZERO));
    if discount < Decimal::ZERO {
        return Err(AppError::BadRequest("discount must not be negative".into()));
    }

    let txn = state.orm.begin().await?;

    let lines = cart_service::lines_for_user(&txn, user.user_id).await?;
    if lines.is_empty() && !state.config.allow_empty_cart {
        return Err(AppError::EmptyCart);
    }

    // Validate every line before any deduction; the first failure aborts the
    // whole checkout without a partial order.
    for line in &lines {
        if line.quantity <= 0 {
            return Err(AppError::BadRequest("Cart has invalid quantity".into()));
        }
        if line.track_inventory {
            stock_service::check_available(
                line.product_id,
                line.variant_option_id,
                line.quantity,
                line.available_stock,
            )?;
        }
    }

    let totals = compute_totals(&lines, discount);
    if totals.total_amount < Decimal::ZERO {
        return Err(AppError::BadRequest(
            "discount exceeds the order total".into(),
        ));
    }

    let order_id = Uuid::new_v4();
    let order_number = build_order_number(order_id);

    // Register the order with the gateway before any local row exists; a
    // gateway failure aborts with nothing to roll back.
    let amount_minor = to_minor_units(totals.total_amount)?;
    let gateway_order_id = state
        .gateway
        .create_order(amount_minor, &state.config.gateway.currency, &order_number)
        .await
        .map_err(AppError::from)?;

    let order = OrderActive {
        id: Set(order_id),
        user_id: Set(user.user_id),
        order_number: Set(order_number),
        status: Set(OrderStatus::Pending.as_str().to_string()),
        subtotal: Set(totals.subtotal),
        tax_amount: Set(totals.tax_amount),
        shipping_cost: Set(totals.shipping_cost),
        discount: Set(totals.discount),
        total_amount: Set(totals.total_amount),
        shipping_address: Set(payload.shipping_address),
        billing_address: Set(payload.billing_address),
        payment_method: Set(payload.payment_method),
        created_at: NotSet,
        updated_at: NotSet,
    }
    .insert(&txn)
    .await?;

    let mut order_items: Vec<OrderItem> = Vec::new();
    for line in &lines {
        let unit = unit_price(line);
        let line_subtotal = round_money(unit * Decimal::from(line.quantity));
        let line_tax = round_money(line_subtotal * tax_rate());

        let item = OrderItemActive {
            id: Set(Uuid::new_v4()),
            order_id: Set(order.id),
            product_id: Set(line.product_id),
            variant_option_id: Set(line.variant_option_id),
            quantity: Set(line.quantity),
            unit_price: Set(unit),
            subtotal: Set(line_subtotal),
            tax_amount: Set(line_tax),
            total_price: Set(line_subtotal + line_tax),
            created_at: NotSet,
        }
        .insert(&txn)
        .await?;
        order_items.push(item.into());

        stock_service::deduct(&txn, line.product_id, line.variant_option_id, line.quantity)
            .await?;
    }

    PaymentActive {
        id: Set(Uuid::new_v4()),
        order_id: Set(order.id),
        gateway_order_id: Set(gateway_order_id),
        gateway_payment_id: Set(None),
        gateway_signature: Set(None),
        status: Set(PaymentStatus::Pending.as_str().to_string()),
        amount: Set(totals.total_amount),
        currency: Set(state.config.gateway.currency.clone()),
        failure_reason: Set(None),
        created_at: NotSet,
        updated_at: NotSet,
    }
    .insert(&txn)
    .await?;

    cart_service::clear(&txn, user.user_id).await?;

    txn.commit().await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "checkout",
        Some("orders"),
        Some(serde_json::json!({ "order_id": order.id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(OrderWithItems {
        order: order.into(),
        items: order_items,
    })
}

/// Cancel a PENDING or CONFIRMED order, restoring stock for every item. The
/// status guard makes the restoration happen exactly once.
pub async fn cancel_order(state: &AppState, user: &AuthUser, order_id: Uuid) -> AppResult<Order> {
    let txn = state.orm.begin().await?;

    let order = Orders::find()
        .filter(OrderCol::Id.eq(order_id))
        .lock(LockType::Update)
        .one(&txn)
        .await?
        .ok_or(AppError::NotFound)?;
    ensure_owner_or_admin(user, order.user_id)?;

    let status = OrderStatus::parse(&order.status).ok_or_else(|| {
        AppError::Internal(anyhow::anyhow!(
            "order {} has unknown status {:?}",
            order.id,
            order.status
        ))
    })?;
    if !matches!(status, OrderStatus::Pending | OrderStatus::Confirmed) {
        return Err(AppError::InvalidState(format!(
            "order {} cannot be cancelled from status {}",
            order.order_number, order.status
        )));
    }

    let items = OrderItems::find()
        .filter(OrderItemCol::OrderId.eq(order.id))
        .all(&txn)
        .await?;
    for item in &items {
        stock_service::restore(&txn, item.product_id, item.variant_option_id, item.quantity)
            .await?;
    }

    let mut active: OrderActive = order.into();
    active.status = Set(OrderStatus::Cancelled.as_str().to_string());
    active.updated_at = Set(Utc::now().into());
    let order = active.update(&txn).await?;

    txn.commit().await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "order_cancelled",
        Some("orders"),
        Some(serde_json::json!({ "order_id": order.id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    state
        .notifier
        .notify(order.id, NotificationEvent::OrderCancelled)
        .await;

    Ok(order.into())
}

fn build_order_number(order_id: Uuid) -> String {
    let date = Utc::now().format("%Y%m%d");
    let suffix = order_id.to_string();
    let short = &suffix[..8];
    format!("ORD-{}-{}", date, short)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(price: &str, sale: Option<&str>, adjustment: &str, qty: i32) -> CartLine {
        CartLine {
            product_id: Uuid::new_v4(),
            variant_option_id: None,
            quantity: qty,
            price: price.parse().unwrap(),
            sale_price: sale.map(|s| s.parse().unwrap()),
            price_adjustment: adjustment.parse().unwrap(),
            available_stock: 100,
            track_inventory: true,
        }
    }

    #[test]
    fn unit_price_prefers_sale_price_and_adds_adjustment() {
        assert_eq!(unit_price(&line("100", None, "0", 1)), Decimal::from(100));
        assert_eq!(unit_price(&line("100", Some("80"), "0", 1)), Decimal::from(80));
        assert_eq!(
            unit_price(&line("100", Some("80"), "5.50", 1)),
            "85.50".parse::<Decimal>().unwrap()
        );
    }

    #[test]
    fn totals_satisfy_the_order_invariant() {
        let lines = vec![
            line("100", None, "0", 2),   // 200.00
            line("50", Some("40"), "0", 1), // 40.00
        ];
        let discount = "15".parse().unwrap();
        let totals = compute_totals(&lines, discount);

        assert_eq!(totals.subtotal, Decimal::from(240));
        assert_eq!(totals.tax_amount, Decimal::from(24)); // flat 10% per line
        assert_eq!(totals.shipping_cost, flat_shipping_fee());
        assert_eq!(
            totals.total_amount,
            totals.subtotal + totals.tax_amount + totals.shipping_cost - totals.discount
        );
    }

    #[test]
    fn empty_cart_has_no_shipping() {
        let totals = compute_totals(&[], Decimal::ZERO);
        assert_eq!(totals.shipping_cost, Decimal::ZERO);
        assert_eq!(totals.total_amount, Decimal::ZERO);
    }

    #[test]
    fn line_tax_rounds_per_line() {
        // 33.33 * 1 -> tax 3.333 rounds to 3.33
        let totals = compute_totals(&[line("33.33", None, "0", 1)], Decimal::ZERO);
        assert_eq!(totals.tax_amount, "3.33".parse::<Decimal>().unwrap());
    }
}
