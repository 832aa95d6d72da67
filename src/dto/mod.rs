pub mod bookings;
pub mod payments;
pub mod vouchers;
