use sea_orm::sea_query::Expr;
use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter};
use uuid::Uuid;

use crate::{
    entity::{
        products::{Column as ProdCol, Entity as Products},
        variant_options::{Column as VarCol, Entity as VariantOptions},
    },
    error::{AppError, AppResult},
};

/// Check whether `requested` units can be taken from the authoritative
/// counter. When a variant option is supplied its own counter is consulted;
/// the parent product counter is left alone. Callers updating an existing
/// cart line must pass the combined (existing + new) quantity.
pub async fn validate<C: ConnectionTrait>(
    conn: &C,
    product_id: Uuid,
    variant_option_id: Option<Uuid>,
    requested: i32,
) -> AppResult<()> {
    if requested <= 0 {
        return Err(AppError::BadRequest(
            "quantity must be greater than 0".to_string(),
        ));
    }

    let product = Products::find_by_id(product_id)
        .one(conn)
        .await?
        .ok_or(AppError::NotFound)?;

    if !product.track_inventory {
        return Ok(());
    }

    let available = match variant_option_id {
        Some(variant_id) => {
            VariantOptions::find_by_id(variant_id)
                .one(conn)
                .await?
                .ok_or(AppError::NotFound)?
                .stock_quantity
        }
        None => product.stock_quantity,
    };

    check_available(product_id, variant_option_id, requested, available)
}

/// Atomically decrement the counter: `SET qty = qty - n WHERE qty >= n`.
/// Zero rows affected means a concurrent checkout beat us to the stock and
/// the caller's transaction must abort. Untracked products are a no-op.
pub async fn deduct<C: ConnectionTrait>(
    conn: &C,
    product_id: Uuid,
    variant_option_id: Option<Uuid>,
    qty: i32,
) -> AppResult<()> {
    let product = Products::find_by_id(product_id)
        .one(conn)
        .await?
        .ok_or_else(|| {
            AppError::Internal(anyhow::anyhow!("referenced product {product_id} is missing"))
        })?;

    if !product.track_inventory {
        return Ok(());
    }

    let rows_affected = match variant_option_id {
        Some(variant_id) => {
            VariantOptions::update_many()
                .col_expr(
                    VarCol::StockQuantity,
                    Expr::col(VarCol::StockQuantity).sub(qty),
                )
                .filter(VarCol::Id.eq(variant_id))
                .filter(VarCol::StockQuantity.gte(qty))
                .exec(conn)
                .await?
                .rows_affected
        }
        None => {
            Products::update_many()
                .col_expr(
                    ProdCol::StockQuantity,
                    Expr::col(ProdCol::StockQuantity).sub(qty),
                )
                .filter(ProdCol::Id.eq(product_id))
                .filter(ProdCol::StockQuantity.gte(qty))
                .exec(conn)
                .await?
                .rows_affected
        }
    };

    if rows_affected == 0 {
        let available = current_stock(conn, product_id, variant_option_id).await?;
        return Err(AppError::InsufficientStock {
            product_id,
            variant_option_id,
            requested: qty,
            available,
        });
    }

    Ok(())
}

/// Credit the counter back after a cancellation. Not idempotent: the caller
/// guards against double restoration via the order status transition.
pub async fn restore<C: ConnectionTrait>(
    conn: &C,
    product_id: Uuid,
    variant_option_id: Option<Uuid>,
    qty: i32,
) -> AppResult<()> {
    let product = Products::find_by_id(product_id)
        .one(conn)
        .await?
        .ok_or_else(|| {
            AppError::Internal(anyhow::anyhow!("referenced product {product_id} is missing"))
        })?;

    if !product.track_inventory {
        return Ok(());
    }

    let rows_affected = match variant_option_id {
        Some(variant_id) => {
            VariantOptions::update_many()
                .col_expr(
                    VarCol::StockQuantity,
                    Expr::col(VarCol::StockQuantity).add(qty),
                )
                .filter(VarCol::Id.eq(variant_id))
                .exec(conn)
                .await?
                .rows_affected
        }
        None => {
            Products::update_many()
                .col_expr(
                    ProdCol::StockQuantity,
                    Expr::col(ProdCol::StockQuantity).add(qty),
                )
                .filter(ProdCol::Id.eq(product_id))
                .exec(conn)
                .await?
                .rows_affected
        }
    };

    if rows_affected == 0 {
        return Err(AppError::Internal(anyhow::anyhow!(
            "stock restore touched no rows for product {product_id}"
        )));
    }

    Ok(())
}

pub fn check_available(
    product_id: Uuid,
    variant_option_id: Option<Uuid>,
    requested: i32,
    available: i32,
) -> AppResult<()> {
    if available < requested {
        return Err(AppError::InsufficientStock {
            product_id,
            variant_option_id,
            requested,
            available,
        });
    }
    Ok(())
}

async fn current_stock<C: ConnectionTrait>(
    conn: &C,
    product_id: Uuid,
    variant_option_id: Option<Uuid>,
) -> AppResult<i32> {
    match variant_option_id {
        Some(variant_id) => Ok(VariantOptions::find_by_id(variant_id)
            .one(conn)
            .await?
            .map(|v| v.stock_quantity)
            .unwrap_or(0)),
        None => Ok(Products::find_by_id(product_id)
            .one(conn)
            .await?
            .map(|p| p.stock_quantity)
            .unwrap_or(0)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn check_available_reports_requested_and_available() {
        let product_id = Uuid::new_v4();
        let err = check_available(product_id, None, 3, 1).unwrap_err();
        match err {
            AppError::InsufficientStock {
                product_id: reported,
                requested,
                available,
                ..
            } => {
                assert_eq!(reported, product_id);
                assert_eq!(requested, 3);
                assert_eq!(available, 1);
            }
            other => panic!("expected InsufficientStock, got {other:?}"),
        }
    }

    #[test]
    fn check_available_passes_at_the_boundary() {
        assert!(check_available(Uuid::new_v4(), None, 2, 2).is_ok());
        assert!(check_available(Uuid::new_v4(), None, 0, 0).is_ok());
    }
}
