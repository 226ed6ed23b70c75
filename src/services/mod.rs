pub mod cart_service;
pub mod checkout_service;
pub mod payment_service;
pub mod refund_service;
pub mod stock_service;
