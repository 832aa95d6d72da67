pub mod addons;
pub mod booking_addons;
pub mod bookings;
pub mod customers;
pub mod packages;
pub mod payments;
pub mod studios;
pub mod vouchers;

pub use addons::Entity as Addons;
pub use booking_addons::Entity as BookingAddons;
pub use bookings::Entity as Bookings;
pub use customers::Entity as Customers;
pub use packages::Entity as Packages;
pub use payments::Entity as Payments;
pub use studios::Entity as Studios;
pub use vouchers::Entity as Vouchers;
