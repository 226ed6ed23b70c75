use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "order_refunds")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: Uuid,
    pub order_id: Uuid,
    pub refund_type: String,
    pub refund_amount: Decimal,
    pub gateway_refund_id: Option<String>,
    pub refund_status: String,
    pub failure_reason: Option<String>,
    pub settlement_expected_date: Option<DateTimeWithTimeZone>,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::orders::Entity",
        from = "Column::OrderId",
        to = "super::orders::Column::Id"
    )]
    Orders,
    #[sea_orm(has_many = "super::refund_retry_schedules::Entity")]
    RefundRetrySchedules,
}

impl Related<super::orders::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Orders.def()
    }
}

impl Related<super::refund_retry_schedules::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::RefundRetrySchedules.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
