//! Product Aggregate

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;
use validator::Validate;

use crate::domain::value_objects::{Quantity, VariantKey};
use crate::EcommerceError;

pub type ProductId = Uuid;

/// A sellable item. Stock lives either on the product itself or, when
/// `has_variants` is set, on each size x color variant.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    #[serde(rename = "_id")]
    pub id: ProductId,
    pub name: String,
    pub description: String,
    pub category: String,
    pub price: Decimal,
    pub image: String,
    pub images: Vec<String>,
    pub stock: Quantity,
    pub featured: bool,
    pub has_variants: bool,
    pub variants: Vec<Variant>,
    pub available_sizes: Vec<String>,
    pub available_colors: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Variant {
    pub size: String,
    pub color: String,
    pub stock: Quantity,
    pub available: bool,
}

impl Variant {
    pub fn key(&self) -> VariantKey { VariantKey::new(self.size.clone(), self.color.clone()) }
    pub fn is(&self, key: &VariantKey) -> bool { self.size == key.size && self.color == key.color }
}

/// The counter a cart line draws on, with its stock at the time it was checked.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct StockTarget {
    pub product_id: ProductId,
    pub variant: Option<VariantKey>,
    pub available: Quantity,
}

/// Product fields resolved onto order line items for display.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductDetail {
    #[serde(rename = "_id")]
    pub id: ProductId,
    pub name: String,
    pub category: String,
    pub price: Decimal,
    pub image: String,
    pub has_variants: bool,
}

/// Admin-supplied write model for creating or replacing a product.
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ProductDraft {
    #[validate(length(min = 1, message = "Product name is required"))]
    pub name: String,
    #[validate(length(min = 1, message = "Product description is required"))]
    pub description: String,
    #[validate(length(min = 1, message = "Product category is required"))]
    pub category: String,
    pub price: Decimal,
    #[validate(length(min = 1, message = "Product image is required"))]
    pub image: String,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub stock: u32,
    #[serde(default)]
    pub featured: bool,
    #[serde(default)]
    pub has_variants: bool,
    #[serde(default)]
    pub available_sizes: Vec<String>,
    #[serde(default)]
    pub available_colors: Vec<String>,
    #[serde(default)]
    pub variants: Vec<VariantDraft>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct VariantDraft {
    pub size: String,
    pub color: String,
    #[serde(default)]
    pub stock: u32,
    #[serde(default = "available_by_default")]
    pub available: bool,
}

fn available_by_default() -> bool { true }

impl Product {
    pub fn create(draft: ProductDraft) -> Result<Self, EcommerceError> {
        let now = Utc::now();
        let mut product = Self {
            id: Uuid::now_v7(), name: String::new(), description: String::new(), category: String::new(),
            price: Decimal::ZERO, image: String::new(), images: vec![], stock: Quantity::ZERO, featured: false,
            has_variants: false, variants: vec![], available_sizes: vec![], available_colors: vec![],
            created_at: now, updated_at: now,
        };
        product.apply(draft)?;
        Ok(product)
    }

    /// Replaces every editable field. Identity and `created_at` are kept.
    pub fn apply(&mut self, draft: ProductDraft) -> Result<(), EcommerceError> {
        draft.validate()?;
        if draft.price.is_sign_negative() {
            return Err(EcommerceError::validation("Price must not be negative"));
        }

        let sizes = normalize_axis(draft.available_sizes);
        let colors = normalize_axis(draft.available_colors);
        let (stock, variants) = if draft.has_variants {
            (Quantity::ZERO, variant_matrix(&sizes, &colors, draft.variants)?)
        } else {
            (stock_count(draft.stock)?, vec![])
        };

        self.name = draft.name.trim().to_string();
        self.description = draft.description;
        self.category = draft.category.trim().to_string();
        self.price = draft.price;
        self.image = draft.image;
        self.images = draft.images.into_iter().map(|u| u.trim().to_string()).filter(|u| !u.is_empty()).collect();
        self.stock = stock;
        self.featured = draft.featured;
        self.has_variants = draft.has_variants;
        self.variants = variants;
        self.available_sizes = sizes;
        self.available_colors = colors;
        self.touch();
        Ok(())
    }

    pub fn variant(&self, key: &VariantKey) -> Option<&Variant> { self.variants.iter().find(|v| v.is(key)) }

    /// Display label used in cart errors, e.g. `Widget (M, Red)`.
    pub fn label(&self, variant: Option<&VariantKey>) -> String {
        match variant {
            Some(key) => format!("{} ({})", self.name, key),
            None => self.name.clone(),
        }
    }

    /// Decides whether `requested` units can be drawn for the given selection.
    ///
    /// `requested` is the whole cart's demand on the resolved counter, so two
    /// lines hitting the same variant are checked against their sum.
    pub fn reservation_target(&self, size: Option<&str>, color: Option<&str>, requested: u32) -> Result<StockTarget, EcommerceError> {
        if !self.has_variants {
            if !self.stock.covers(requested) {
                return Err(EcommerceError::InsufficientStock { item: self.label(None), available: self.stock.value() });
            }
            return Ok(StockTarget { product_id: self.id, variant: None, available: self.stock });
        }

        let key = VariantKey::from_selection(size, color).ok_or_else(|| {
            EcommerceError::validation(format!("Size and color must be selected for {}", self.name))
        })?;
        let variant = self.variant(&key).filter(|v| v.available)
            .ok_or_else(|| EcommerceError::VariantUnavailable { name: self.name.clone() })?;
        if !variant.stock.covers(requested) {
            return Err(EcommerceError::InsufficientStock { item: self.label(Some(&key)), available: variant.stock.value() });
        }
        Ok(StockTarget { product_id: self.id, variant: Some(key), available: variant.stock })
    }

    /// Conditional decrement. Returns the remaining stock, or `None` when the
    /// counter is missing, unavailable or too low.
    pub fn take_stock(&mut self, variant: Option<&VariantKey>, quantity: u32) -> Option<Quantity> {
        let counter = match variant {
            Some(key) => &mut self.variants.iter_mut().find(|v| v.is(key) && v.available)?.stock,
            None => &mut self.stock,
        };
        *counter = counter.subtract(quantity)?;
        let remaining = *counter;
        self.touch();
        Some(remaining)
    }

    /// Increment. Returns the new stock, or `None` when the variant is missing.
    pub fn put_stock(&mut self, variant: Option<&VariantKey>, quantity: u32) -> Option<Quantity> {
        let counter = match variant {
            Some(key) => &mut self.variants.iter_mut().find(|v| v.is(key))?.stock,
            None => &mut self.stock,
        };
        *counter = counter.add(quantity);
        let stock = *counter;
        self.touch();
        Some(stock)
    }

    pub fn detail(&self) -> ProductDetail {
        ProductDetail {
            id: self.id, name: self.name.clone(), category: self.category.clone(),
            price: self.price, image: self.image.clone(), has_variants: self.has_variants,
        }
    }

    fn touch(&mut self) { self.updated_at = Utc::now(); }
}

fn stock_count(value: u32) -> Result<Quantity, EcommerceError> {
    if value > Quantity::MAX.value() {
        return Err(EcommerceError::validation(format!("Stock must be at most {}", Quantity::MAX)));
    }
    Ok(Quantity::new(value))
}

fn normalize_axis(values: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    values.into_iter()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty() && seen.insert(v.clone()))
        .collect()
}

/// Builds the full size x color matrix, keeping supplied variants and filling
/// the gaps with empty, available entries.
fn variant_matrix(sizes: &[String], colors: &[String], drafts: Vec<VariantDraft>) -> Result<Vec<Variant>, EcommerceError> {
    if sizes.is_empty() || colors.is_empty() {
        return Err(EcommerceError::validation("Variant products need at least one size and one color"));
    }

    let mut supplied: Vec<Variant> = Vec::with_capacity(drafts.len());
    for draft in drafts {
        let variant = Variant { size: draft.size.trim().to_string(), color: draft.color.trim().to_string(), stock: stock_count(draft.stock)?, available: draft.available };
        if !sizes.contains(&variant.size) || !colors.contains(&variant.color) {
            return Err(EcommerceError::validation(format!("Variant ({}) uses an undeclared size or color", variant.key())));
        }
        if supplied.iter().any(|v| v.is(&variant.key())) {
            return Err(EcommerceError::validation(format!("Variant ({}) is listed more than once", variant.key())));
        }
        supplied.push(variant);
    }

    let mut matrix = Vec::with_capacity(sizes.len() * colors.len());
    for size in sizes {
        for color in colors {
            let key = VariantKey::new(size.clone(), color.clone());
            let variant = match supplied.iter().position(|v| v.is(&key)) {
                Some(i) => supplied.swap_remove(i),
                None => Variant { size: key.size, color: key.color, stock: Quantity::ZERO, available: true },
            };
            matrix.push(variant);
        }
    }
    Ok(matrix)
}
