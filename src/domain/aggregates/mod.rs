//! Aggregates module
pub mod product;
pub mod order;
pub mod cart;

pub use product::{Product, ProductDetail, ProductDraft, ProductId, StockTarget, Variant, VariantDraft};
pub use order::{DeliveryAddress, LineItem, NewOrder, Order, OrderStatus, Transition};
pub use cart::{Cart, CartLine};
