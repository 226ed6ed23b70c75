use std::collections::HashMap;

use rust_decimal::Decimal;
use sea_orm::sea_query::LockType;
use sea_orm::{
    ColumnTrait, DatabaseTransaction, EntityTrait, FromQueryResult, JoinType, QueryFilter,
    QuerySelect, RelationTrait,
};
use uuid::Uuid;

use crate::{
    entity::{
        cart_items::{self, Column as CartCol, Entity as CartItems},
        products::Column as ProdCol,
        variant_options::{Column as VarCol, Entity as VariantOptions},
    },
    error::{AppError, AppResult},
};

/// One materialized cart line with the pricing and stock fields checkout
/// needs. `available_stock` is the authoritative counter: the variant's when
/// the line references one, the product's otherwise.
#[derive(Debug)]
pub struct CartLine {
    pub product_id: Uuid,
    pub variant_option_id: Option<Uuid>,
    pub quantity: i32,
    pub price: Decimal,
    pub sale_price: Option<Decimal>,
    pub price_adjustment: Decimal,
    pub available_stock: i32,
    pub track_inventory: bool,
}

#[derive(Debug, FromQueryResult)]
struct CartProductRow {
    product_id: Uuid,
    variant_option_id: Option<Uuid>,
    quantity: i32,
    price: Decimal,
    sale_price: Option<Decimal>,
    stock_quantity: i32,
    track_inventory: bool,
}

/// Load a user's cart joined with product pricing, locking the cart and
/// product rows. Variant rows are locked in a second query because `FOR
/// UPDATE` cannot span the nullable side of an outer join.
pub async fn lines_for_user(
    txn: &DatabaseTransaction,
    user_id: Uuid,
) -> AppResult<Vec<CartLine>> {
    let rows = CartItems::find()
        .select_only()
        .column_as(CartCol::ProductId, "product_id")
        .column_as(CartCol::VariantOptionId, "variant_option_id")
        .column_as(CartCol::Quantity, "quantity")
        .column_as(ProdCol::Price, "price")
        .column_as(ProdCol::SalePrice, "sale_price")
        .column_as(ProdCol::StockQuantity, "stock_quantity")
        .column_as(ProdCol::TrackInventory, "track_inventory")
        .join(JoinType::InnerJoin, cart_items::Relation::Products.def())
        .filter(CartCol::UserId.eq(user_id))
        .lock(LockType::Update)
        .into_model::<CartProductRow>()
        .all(txn)
        .await?;

    let variant_ids: Vec<Uuid> = rows.iter().filter_map(|r| r.variant_option_id).collect();
    let variants: HashMap<Uuid, (Decimal, i32)> = if variant_ids.is_empty() {
        HashMap::new()
    } else {
        VariantOptions::find()
            .filter(VarCol::Id.is_in(variant_ids))
            .lock(LockType::Update)
            .all(txn)
            .await?
            .into_iter()
            .map(|v| (v.id, (v.price_adjustment, v.stock_quantity)))
            .collect()
    };

    let mut lines = Vec::with_capacity(rows.len());
    for row in rows {
        let (price_adjustment, available_stock) = match row.variant_option_id {
            Some(variant_id) => *variants.get(&variant_id).ok_or_else(|| {
                AppError::Internal(anyhow::anyhow!(
                    "cart references missing variant option {variant_id}"
                ))
            })?,
            None => (Decimal::ZERO, row.stock_quantity),
        };
        lines.push(CartLine {
            product_id: row.product_id,
            variant_option_id: row.variant_option_id,
            quantity: row.quantity,
            price: row.price,
            sale_price: row.sale_price,
            price_adjustment,
            available_stock,
            track_inventory: row.track_inventory,
        });
    }

    Ok(lines)
}

pub async fn clear(txn: &DatabaseTransaction, user_id: Uuid) -> AppResult<()> {
    CartItems::delete_many()
        .filter(CartCol::UserId.eq(user_id))
        .exec(txn)
        .await?;
    Ok(())
}
