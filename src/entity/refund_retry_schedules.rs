use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "refund_retry_schedules")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: Uuid,
    pub refund_id: Uuid,
    pub retry_at: DateTimeWithTimeZone,
    pub status: String,
    pub retry_count: i32,
    pub last_error: Option<String>,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::order_refunds::Entity",
        from = "Column::RefundId",
        to = "super::order_refunds::Column::Id"
    )]
    OrderRefunds,
}

impl Related<super::order_refunds::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::OrderRefunds.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
