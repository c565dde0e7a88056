/// Storefront entities
pub mod category;
pub mod product;
pub mod customer;
pub mod cart_item;
pub mod order;
pub mod ordered_product;
pub mod payment_attempt;

// Re-export entities
pub use category::{Entity as Category, Model as CategoryModel};
pub use product::{Entity as Product, Model as ProductModel, ProductStatus};
pub use customer::{Entity as Customer, Model as CustomerModel};
pub use cart_item::{Entity as CartItem, Model as CartItemModel};
pub use order::{Entity as Order, Model as OrderModel, OrderStatus};
pub use ordered_product::{Entity as OrderedProduct, Model as OrderedProductModel};
pub use payment_attempt::{
    Entity as PaymentAttempt, Model as PaymentAttemptModel, PayMethod, PayStatus,
};
