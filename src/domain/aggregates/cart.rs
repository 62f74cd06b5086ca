//! Cart Aggregate

use serde::Deserialize;
use std::collections::BTreeSet;
use validator::Validate;

use crate::domain::aggregates::product::ProductId;
use crate::EcommerceError;

/// One line of a submitted cart. Price and image sent by the client are ignored;
/// snapshots are taken from the live product.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
    pub product_id: ProductId,
    /// Client-side display name, used only to describe a product that no longer exists.
    #[serde(default)]
    pub name: Option<String>,
    #[validate(range(min = 1, message = "Quantity must be at least 1"))]
    pub quantity: u32,
    #[serde(default)]
    pub selected_size: Option<String>,
    #[serde(default)]
    pub selected_color: Option<String>,
}

impl CartLine {
    pub fn new(product_id: ProductId, quantity: u32) -> Self {
        Self { product_id, name: None, quantity, selected_size: None, selected_color: None }
    }

    pub fn with_variant(mut self, size: impl Into<String>, color: impl Into<String>) -> Self {
        self.selected_size = Some(size.into());
        self.selected_color = Some(color.into());
        self
    }

    fn same_selection(&self, other: &CartLine) -> bool {
        self.product_id == other.product_id && self.selected_size == other.selected_size && self.selected_color == other.selected_color
    }

    /// How the line refers to its product in error messages.
    pub fn describe(&self) -> String {
        self.name.clone().filter(|n| !n.trim().is_empty()).unwrap_or_else(|| self.product_id.to_string())
    }
}

/// A validated, non-empty cart with identical selections merged.
#[derive(Clone, Debug, Default)]
pub struct Cart {
    lines: Vec<CartLine>,
}

impl Cart {
    pub fn from_lines(lines: Vec<CartLine>) -> Result<Self, EcommerceError> {
        let mut cart = Self::default();
        for mut line in lines {
            line.validate()?;
            line.selected_size = line.selected_size.map(|s| s.trim().to_string()).filter(|s| !s.is_empty());
            line.selected_color = line.selected_color.map(|s| s.trim().to_string()).filter(|s| !s.is_empty());
            cart.add_item(line);
        }
        if cart.is_empty() {
            return Err(EcommerceError::validation("Cart is empty"));
        }
        Ok(cart)
    }

    pub fn lines(&self) -> &[CartLine] { &self.lines }
    pub fn is_empty(&self) -> bool { self.lines.is_empty() }

    /// Distinct product ids in ascending order, the order rows are locked in.
    pub fn product_ids(&self) -> Vec<ProductId> {
        self.lines.iter().map(|l| l.product_id).collect::<BTreeSet<_>>().into_iter().collect()
    }

    fn add_item(&mut self, item: CartLine) {
        if let Some(existing) = self.lines.iter_mut().find(|l| l.same_selection(&item)) {
            existing.quantity = existing.quantity.saturating_add(item.quantity);
        } else {
            self.lines.push(item);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_identical_lines_merge() {
        let p = Uuid::now_v7();
        let cart = Cart::from_lines(vec![
            CartLine::new(p, 1).with_variant("M", "Red"),
            CartLine::new(p, 2).with_variant("M", "Red"),
            CartLine::new(p, 1).with_variant("S", "Red"),
        ]).unwrap();
        assert_eq!(cart.lines().len(), 2);
        assert_eq!(cart.lines()[0].quantity, 3);
        assert_eq!(cart.product_ids(), vec![p]);
    }

    #[test]
    fn test_empty_cart_and_zero_quantity_rejected() {
        assert!(matches!(Cart::from_lines(vec![]), Err(EcommerceError::Validation(_))));
        let err = Cart::from_lines(vec![CartLine::new(Uuid::now_v7(), 0)]).unwrap_err();
        assert_eq!(err.to_string(), "Quantity must be at least 1");
    }

    #[test]
    fn test_blank_selection_is_no_selection() {
        let mut line = CartLine::new(Uuid::now_v7(), 1);
        line.selected_size = Some("  ".into());
        let cart = Cart::from_lines(vec![line]).unwrap();
        assert_eq!(cart.lines()[0].selected_size, None);
    }

    #[test]
    fn test_product_ids_sorted() {
        let (a, b) = (Uuid::from_u128(1), Uuid::from_u128(2));
        let cart = Cart::from_lines(vec![CartLine::new(b, 1), CartLine::new(a, 1), CartLine::new(b, 1)]).unwrap();
        assert_eq!(cart.product_ids(), vec![a, b]);
    }
}
