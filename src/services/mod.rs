pub mod cart;
pub mod catalog;
pub mod customers;
pub mod orders;
pub mod payments;

pub use cart::CartService;
pub use catalog::CatalogService;
pub use customers::CustomerService;
pub use orders::OrderService;
pub use payments::PaymentService;
