pub mod audit_logs;
pub mod cart_items;
pub mod order_items;
pub mod order_refunds;
pub mod orders;
pub mod payments;
pub mod products;
pub mod refund_retry_schedules;
pub mod users;
pub mod variant_options;

pub use audit_logs::Entity as AuditLogs;
pub use cart_items::Entity as CartItems;
pub use order_items::Entity as OrderItems;
pub use order_refunds::Entity as OrderRefunds;
pub use orders::Entity as Orders;
pub use payments::Entity as Payments;
pub use products::Entity as Products;
pub use refund_retry_schedules::Entity as RefundRetrySchedules;
pub use users::Entity as Users;
pub use variant_options::Entity as VariantOptions;
