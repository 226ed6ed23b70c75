use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not Found")]
    NotFound,

    #[error("Bad Request {0}")]
    BadRequest(String),

    #[error("Forbidden")]
    Forbidden,

    #[error("Cart is empty")]
    EmptyCart,

    #[error(
        "Insufficient stock for product {product_id}: requested {requested}, available {available}"
    )]
    InsufficientStock {
        product_id: Uuid,
        variant_option_id: Option<Uuid>,
        requested: i32,
        available: i32,
    },

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Invalid signature")]
    SignatureMismatch,

    #[error("Gateway rejected the request: {0}")]
    GatewayRejected(String),

    #[error("Gateway unavailable: {0}")]
    GatewayUnavailable(String),

    #[error("Database error")]
    DbError(#[from] sqlx::Error),

    #[error("ORM error")]
    OrmError(#[from] sea_orm::DbErr),

    #[error("Internal Server Error")]
    Internal(#[from] anyhow::Error),
}

pub type AppResult<T> = Result<T, AppError>;
