#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rust_decimal::Decimal;
use sea_orm::ActiveValue::NotSet;
use sea_orm::{ActiveModelTrait, ConnectionTrait, Set, Statement};
use uuid::Uuid;

use order_fulfillment_api::{
    config::{AppConfig, GatewayConfig, SchedulerConfig},
    db::{create_orm_conn, create_pool, run_migrations},
    entity::{
        cart_items::ActiveModel as CartItemActive, products::ActiveModel as ProductActive,
        users::ActiveModel as UserActive, variant_options::ActiveModel as VariantActive,
    },
    gateway::{GatewayError, PaymentGateway, RefundStatusReport, RemoteRefundStatus},
    notify::{NotificationEvent, Notifier},
    state::AppState,
};

pub const SIGNATURE_SECRET: &str = "test_signature_secret";

/// Database URL from the environment, or None to skip the test (no local
/// database configured).
pub fn test_database_url() -> Option<String> {
    std::env::var("TEST_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
        .ok()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefundMode {
    Accept,
    SettlementHold,
    Reject,
    Unavailable,
}

/// In-memory gateway double. Refund submission behavior and the reported
/// refund status are switchable mid-test.
pub struct MockGateway {
    pub refund_mode: Mutex<RefundMode>,
    pub refund_status: Mutex<(RemoteRefundStatus, Option<String>)>,
    pub refund_calls: Mutex<u32>,
}

impl MockGateway {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            refund_mode: Mutex::new(RefundMode::Accept),
            refund_status: Mutex::new((RemoteRefundStatus::Pending, None)),
            refund_calls: Mutex::new(0),
        })
    }

    pub fn set_refund_mode(&self, mode: RefundMode) {
        *self.refund_mode.lock().unwrap() = mode;
    }

    pub fn set_refund_status(&self, status: RemoteRefundStatus, reason: Option<&str>) {
        *self.refund_status.lock().unwrap() = (status, reason.map(String::from));
    }

    pub fn refund_calls(&self) -> u32 {
        *self.refund_calls.lock().unwrap()
    }
}

#[async_trait]
impl PaymentGateway for MockGateway {
    async fn create_order(
        &self,
        _amount_minor: i64,
        _currency: &str,
        _receipt: &str,
    ) -> Result<String, GatewayError> {
        Ok(format!("order_{}", Uuid::new_v4().simple()))
    }

    async fn create_refund(
        &self,
        _gateway_payment_id: &str,
        _amount_minor: Option<i64>,
    ) -> Result<String, GatewayError> {
        *self.refund_calls.lock().unwrap() += 1;
        match *self.refund_mode.lock().unwrap() {
            RefundMode::Accept => Ok(format!("rfnd_{}", Uuid::new_v4().simple())),
            RefundMode::SettlementHold => Err(GatewayError::SettlementHold(
                "Payment has not settled yet".to_string(),
            )),
            RefundMode::Reject => Err(GatewayError::Rejected {
                code: "BAD_REQUEST_ERROR".to_string(),
                description: "payment already fully refunded".to_string(),
            }),
            RefundMode::Unavailable => {
                Err(GatewayError::Malformed("connection reset by peer".to_string()))
            }
        }
    }

    async fn fetch_refund_status(
        &self,
        _gateway_refund_id: &str,
    ) -> Result<RefundStatusReport, GatewayError> {
        let (status, reason) = self.refund_status.lock().unwrap().clone();
        Ok(RefundStatusReport {
            status,
            failure_reason: reason,
        })
    }
}

/// Captures notification triggers for assertions.
pub struct RecordingNotifier {
    pub events: Mutex<Vec<(Uuid, NotificationEvent)>>,
}

impl RecordingNotifier {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            events: Mutex::new(Vec::new()),
        })
    }

    pub fn events_for(&self, order_id: Uuid) -> Vec<NotificationEvent> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|(id, _)| *id == order_id)
            .map(|(_, event)| *event)
            .collect()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, order_id: Uuid, event: NotificationEvent) {
        self.events.lock().unwrap().push((order_id, event));
    }
}

pub async fn setup_state(
    database_url: &str,
    gateway: Arc<MockGateway>,
    notifier: Arc<RecordingNotifier>,
) -> anyhow::Result<AppState> {
    let pool = create_pool(database_url).await?;
    let orm = create_orm_conn(database_url).await?;
    run_migrations(&orm).await?;

    // Clean tables between runs
    let backend = orm.get_database_backend();
    orm.execute(Statement::from_string(
        backend,
        "TRUNCATE TABLE refund_retry_schedules, order_refunds, payments, order_items, orders, \
         cart_items, variant_options, products, audit_logs, users RESTART IDENTITY CASCADE",
    ))
    .await?;

    let config = AppConfig {
        database_url: database_url.to_string(),
        host: "127.0.0.1".to_string(),
        port: 0,
        allow_empty_cart: false,
        gateway: GatewayConfig {
            base_url: "http://127.0.0.1:0".to_string(),
            key_id: "test_key".to_string(),
            key_secret: "test_key_secret".to_string(),
            signature_secret: SIGNATURE_SECRET.to_string(),
            currency: "INR".to_string(),
            timeout_secs: 5,
        },
        scheduler: SchedulerConfig {
            poll_interval_secs: 300,
            retry_interval_secs: 3600,
        },
    };

    Ok(AppState {
        pool,
        orm,
        config,
        gateway,
        notifier,
    })
}

pub async fn create_user(state: &AppState, role: &str, email: &str) -> anyhow::Result<Uuid> {
    let user = UserActive {
        id: Set(Uuid::new_v4()),
        email: Set(email.to_string()),
        role: Set(role.to_string()),
        created_at: NotSet,
    }
    .insert(&state.orm)
    .await?;
    Ok(user.id)
}

pub async fn create_product(
    state: &AppState,
    name: &str,
    price: Decimal,
    sale_price: Option<Decimal>,
    stock: i32,
    track_inventory: bool,
) -> anyhow::Result<Uuid> {
    let product = ProductActive {
        id: Set(Uuid::new_v4()),
        name: Set(name.to_string()),
        description: Set(None),
        price: Set(price),
        sale_price: Set(sale_price),
        stock_quantity: Set(stock),
        track_inventory: Set(track_inventory),
        created_at: NotSet,
    }
    .insert(&state.orm)
    .await?;
    Ok(product.id)
}

pub async fn create_variant(
    state: &AppState,
    product_id: Uuid,
    name: &str,
    price_adjustment: Decimal,
    stock: i32,
) -> anyhow::Result<Uuid> {
    let variant = VariantActive {
        id: Set(Uuid::new_v4()),
        product_id: Set(product_id),
        name: Set(name.to_string()),
        price_adjustment: Set(price_adjustment),
        stock_quantity: Set(stock),
        created_at: NotSet,
    }
    .insert(&state.orm)
    .await?;
    Ok(variant.id)
}

pub async fn add_cart_line(
    state: &AppState,
    user_id: Uuid,
    product_id: Uuid,
    variant_option_id: Option<Uuid>,
    quantity: i32,
) -> anyhow::Result<()> {
    CartItemActive {
        id: Set(Uuid::new_v4()),
        user_id: Set(user_id),
        product_id: Set(product_id),
        variant_option_id: Set(variant_option_id),
        quantity: Set(quantity),
        created_at: NotSet,
    }
    .insert(&state.orm)
    .await?;
    Ok(())
}
