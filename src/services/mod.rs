pub mod booking_service;
pub mod payment_service;
pub mod pricing;
pub mod slots;
pub mod voucher_service;
