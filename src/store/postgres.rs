//! PostgreSQL store.
//!
//! Products touched by a transaction are locked `FOR UPDATE`. Stock is only
//! ever decremented through a conditional `UPDATE ... WHERE stock >= $n`, and
//! the schema's `CHECK (stock >= 0)` backs that up.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::PgConnection;
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, Transaction};
use std::collections::HashMap;
use uuid::Uuid;

use crate::domain::aggregates::{DeliveryAddress, LineItem, Order, OrderStatus, Product, ProductDetail, ProductId, Variant};
use crate::domain::value_objects::{OrderNumber, Quantity, VariantKey};
use crate::store::{Store, StoreError, StoreTransaction};

const PRODUCT_COLUMNS: &str = "id, name, description, category, price, image, images, stock, featured, has_variants, available_sizes, available_colors, created_at, updated_at";
const ORDER_COLUMNS: &str = "id, order_id, user_id, user_email, delivery_address, payment_method, total_amount, status, admin_notes, created_at, updated_at";

const SELECT_VARIANTS_SQL: &str = "SELECT product_id, size, color, stock, available FROM product_variants WHERE product_id = ANY($1) ORDER BY product_id, position";
const SELECT_ITEMS_SQL: &str = r#"
    SELECT oi.order_id, oi.product_id, oi.name, oi.price, oi.quantity, oi.image, oi.selected_size, oi.selected_color,
           p.name AS product_name, p.category AS product_category, p.price AS product_price,
           p.image AS product_image, p.has_variants AS product_has_variants
    FROM order_items oi
    LEFT JOIN products p ON p.id = oi.product_id
    WHERE oi.order_id = ANY($1)
    ORDER BY oi.order_id, oi.position"#;
const INSERT_VARIANT_SQL: &str = "INSERT INTO product_variants (product_id, position, size, color, stock, available) VALUES ($1, $2, $3, $4, $5, $6)";
const TAKE_PRODUCT_STOCK_SQL: &str = "UPDATE products SET stock = stock - $2, updated_at = NOW() WHERE id = $1 AND stock >= $2 RETURNING stock";
const TAKE_VARIANT_STOCK_SQL: &str = "UPDATE product_variants SET stock = stock - $4 WHERE product_id = $1 AND size = $2 AND color = $3 AND available AND stock >= $4 RETURNING stock";
const PUT_PRODUCT_STOCK_SQL: &str = "UPDATE products SET stock = LEAST(stock::bigint + $2, 2147483647)::int, updated_at = NOW() WHERE id = $1 RETURNING stock";
const PUT_VARIANT_STOCK_SQL: &str = "UPDATE product_variants SET stock = LEAST(stock::bigint + $4, 2147483647)::int WHERE product_id = $1 AND size = $2 AND color = $3 RETURNING stock";
const TOUCH_PRODUCT_SQL: &str = "UPDATE products SET updated_at = NOW() WHERE id = $1";

#[derive(Debug, sqlx::FromRow)]
struct ProductRow {
    id: Uuid, name: String, description: String, category: String, price: Decimal, image: String, images: Vec<String>,
    stock: i32, featured: bool, has_variants: bool, available_sizes: Vec<String>, available_colors: Vec<String>,
    created_at: DateTime<Utc>, updated_at: DateTime<Utc>,
}

#[derive(Debug, sqlx::FromRow)]
struct VariantRow { product_id: Uuid, size: String, color: String, stock: i32, available: bool }

#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    id: Uuid, order_id: String, user_id: String, user_email: String, delivery_address: Json<DeliveryAddress>,
    payment_method: String, total_amount: Decimal, status: String, admin_notes: String,
    created_at: DateTime<Utc>, updated_at: DateTime<Utc>,
}

#[derive(Debug, sqlx::FromRow)]
struct ItemRow {
    order_id: Uuid, product_id: Uuid, name: String, price: Decimal, quantity: i32, image: String,
    selected_size: Option<String>, selected_color: Option<String>,
    product_name: Option<String>, product_category: Option<String>, product_price: Option<Decimal>,
    product_image: Option<String>, product_has_variants: Option<bool>,
}

fn to_u32(value: i32, field: &str) -> Result<u32, StoreError> {
    u32::try_from(value).map_err(|_| StoreError::Corrupt(format!("{field} is negative: {value}")))
}

fn to_i32(value: u32, field: &str) -> Result<i32, StoreError> {
    i32::try_from(value).map_err(|_| StoreError::Corrupt(format!("{field} out of range: {value}")))
}

impl ItemRow {
    fn into_line_item(self) -> Result<LineItem, StoreError> {
        let product = match (self.product_name, self.product_category, self.product_price, self.product_image, self.product_has_variants) {
            (Some(name), Some(category), Some(price), Some(image), Some(has_variants)) => {
                Some(ProductDetail { id: self.product_id, name, category, price, image, has_variants })
            }
            _ => None,
        };
        Ok(LineItem {
            product_id: self.product_id, name: self.name, price: self.price, quantity: to_u32(self.quantity, "quantity")?,
            image: self.image, selected_size: self.selected_size, selected_color: self.selected_color, product,
        })
    }
}

impl OrderRow {
    fn into_order(self, items: Vec<LineItem>) -> Result<Order, StoreError> {
        Ok(Order {
            id: self.id, order_id: OrderNumber::from_stored(self.order_id), user_id: self.user_id, user_email: self.user_email,
            items, delivery_address: self.delivery_address.0,
            payment_method: self.payment_method.parse().map_err(|e| StoreError::Corrupt(format!("payment_method: {e}")))?,
            total_amount: self.total_amount,
            status: self.status.parse::<OrderStatus>().map_err(|e| StoreError::Corrupt(format!("status: {e}")))?,
            admin_notes: self.admin_notes, created_at: self.created_at, updated_at: self.updated_at, events: vec![],
        })
    }
}

async fn load_products(conn: &mut PgConnection, rows: Vec<ProductRow>) -> Result<Vec<Product>, StoreError> {
    let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
    let mut variants: HashMap<Uuid, Vec<Variant>> = HashMap::new();
    for v in sqlx::query_as::<_, VariantRow>(SELECT_VARIANTS_SQL).bind(&ids[..]).fetch_all(&mut *conn).await? {
        variants.entry(v.product_id).or_default().push(Variant {
            size: v.size, color: v.color, stock: Quantity::new(to_u32(v.stock, "variant stock")?), available: v.available,
        });
    }
    rows.into_iter()
        .map(|r| -> Result<Product, StoreError> { Ok(Product {
            id: r.id, name: r.name, description: r.description, category: r.category, price: r.price,
            image: r.image, images: r.images, stock: Quantity::new(to_u32(r.stock, "stock")?), featured: r.featured,
            has_variants: r.has_variants, variants: variants.remove(&r.id).unwrap_or_default(),
            available_sizes: r.available_sizes, available_colors: r.available_colors,
            created_at: r.created_at, updated_at: r.updated_at,
        }) })
        .collect()
}

async fn load_orders(conn: &mut PgConnection, rows: Vec<OrderRow>) -> Result<Vec<Order>, StoreError> {
    let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
    let mut items: HashMap<Uuid, Vec<LineItem>> = HashMap::new();
    for row in sqlx::query_as::<_, ItemRow>(SELECT_ITEMS_SQL).bind(&ids[..]).fetch_all(&mut *conn).await? {
        items.entry(row.order_id).or_default().push(row.into_line_item()?);
    }
    rows.into_iter().map(|r| {
        let lines = items.remove(&r.id).unwrap_or_default();
        r.into_order(lines)
    }).collect()
}

async fn insert_variants(conn: &mut PgConnection, product: &Product) -> Result<(), StoreError> {
    for (position, v) in product.variants.iter().enumerate() {
        sqlx::query(INSERT_VARIANT_SQL)
            .bind(product.id).bind(to_i32(position as u32, "position")?).bind(&v.size).bind(&v.color)
            .bind(to_i32(v.stock.value(), "variant stock")?).bind(v.available)
            .execute(&mut *conn).await?;
    }
    Ok(())
}

#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self { Self { pool } }

    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }
}

#[async_trait]
impl Store for PgStore {
    async fn begin(&self) -> Result<Box<dyn StoreTransaction>, StoreError> {
        Ok(Box::new(PgTransaction { tx: self.pool.begin().await? }))
    }

    async fn list_products(&self, featured_only: bool) -> Result<Vec<Product>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let rows = sqlx::query_as::<_, ProductRow>(&format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE ($1 = FALSE OR featured) ORDER BY created_at DESC"))
            .bind(featured_only)
            .fetch_all(&mut *conn).await?;
        load_products(&mut *conn, rows).await
    }

    async fn get_product(&self, id: ProductId) -> Result<Option<Product>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let rows = sqlx::query_as::<_, ProductRow>(&format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1"))
            .bind(id)
            .fetch_all(&mut *conn).await?;
        Ok(load_products(&mut *conn, rows).await?.pop())
    }

    async fn list_orders(&self, user_id: Option<&str>) -> Result<Vec<Order>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let rows = sqlx::query_as::<_, OrderRow>(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE ($1::TEXT IS NULL OR user_id = $1) ORDER BY created_at DESC"))
            .bind(user_id)
            .fetch_all(&mut *conn).await?;
        load_orders(&mut *conn, rows).await
    }
}

pub struct PgTransaction {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl StoreTransaction for PgTransaction {
    async fn lock_product(&mut self, id: ProductId) -> Result<Option<Product>, StoreError> {
        let rows = sqlx::query_as::<_, ProductRow>(&format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1 FOR UPDATE"))
            .bind(id)
            .fetch_all(&mut *self.tx).await?;
        Ok(load_products(&mut *self.tx, rows).await?.pop())
    }

    async fn take_stock(&mut self, id: ProductId, variant: Option<&VariantKey>, quantity: u32) -> Result<Option<Quantity>, StoreError> {
        let quantity = to_i32(quantity, "quantity")?;
        let remaining: Option<(i32,)> = match variant {
            None => sqlx::query_as(TAKE_PRODUCT_STOCK_SQL).bind(id).bind(quantity).fetch_optional(&mut *self.tx).await?,
            Some(key) => {
                let remaining: Option<(i32,)> = sqlx::query_as(TAKE_VARIANT_STOCK_SQL)
                    .bind(id).bind(&key.size).bind(&key.color).bind(quantity)
                    .fetch_optional(&mut *self.tx).await?;
                if remaining.is_some() {
                    sqlx::query(TOUCH_PRODUCT_SQL).bind(id).execute(&mut *self.tx).await?;
                }
                remaining
            }
        };
        remaining.map(|(stock,)| to_u32(stock, "stock").map(Quantity::new)).transpose()
    }

    async fn put_stock(&mut self, id: ProductId, variant: Option<&VariantKey>, quantity: u32) -> Result<Option<Quantity>, StoreError> {
        let quantity = to_i32(quantity, "quantity")?;
        let stock: Option<(i32,)> = match variant {
            None => sqlx::query_as(PUT_PRODUCT_STOCK_SQL).bind(id).bind(quantity).fetch_optional(&mut *self.tx).await?,
            Some(key) => {
                let stock: Option<(i32,)> = sqlx::query_as(PUT_VARIANT_STOCK_SQL)
                    .bind(id).bind(&key.size).bind(&key.color).bind(quantity)
                    .fetch_optional(&mut *self.tx).await?;
                if stock.is_some() {
                    sqlx::query(TOUCH_PRODUCT_SQL).bind(id).execute(&mut *self.tx).await?;
                }
                stock
            }
        };
        stock.map(|(stock,)| to_u32(stock, "stock").map(Quantity::new)).transpose()
    }

    async fn insert_product(&mut self, product: &Product) -> Result<(), StoreError> {
        sqlx::query(&format!("INSERT INTO products ({PRODUCT_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)"))
            .bind(product.id).bind(&product.name).bind(&product.description).bind(&product.category).bind(product.price)
            .bind(&product.image).bind(&product.images[..]).bind(to_i32(product.stock.value(), "stock")?).bind(product.featured)
            .bind(product.has_variants).bind(&product.available_sizes[..]).bind(&product.available_colors[..])
            .bind(product.created_at).bind(product.updated_at)
            .execute(&mut *self.tx).await?;
        insert_variants(&mut *self.tx, product).await
    }

    async fn save_product(&mut self, product: &Product) -> Result<(), StoreError> {
        sqlx::query(
            "UPDATE products SET name = $2, description = $3, category = $4, price = $5, image = $6, images = $7, stock = $8, \
             featured = $9, has_variants = $10, available_sizes = $11, available_colors = $12, updated_at = $13 WHERE id = $1",
        )
            .bind(product.id).bind(&product.name).bind(&product.description).bind(&product.category).bind(product.price)
            .bind(&product.image).bind(&product.images[..]).bind(to_i32(product.stock.value(), "stock")?).bind(product.featured)
            .bind(product.has_variants).bind(&product.available_sizes[..]).bind(&product.available_colors[..])
            .bind(product.updated_at)
            .execute(&mut *self.tx).await?;
        sqlx::query("DELETE FROM product_variants WHERE product_id = $1").bind(product.id).execute(&mut *self.tx).await?;
        insert_variants(&mut *self.tx, product).await
    }

    async fn delete_product(&mut self, id: ProductId) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM products WHERE id = $1").bind(id).execute(&mut *self.tx).await?;
        Ok(result.rows_affected() > 0)
    }

    async fn lock_order(&mut self, id: Uuid) -> Result<Option<Order>, StoreError> {
        let rows = sqlx::query_as::<_, OrderRow>(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1 FOR UPDATE"))
            .bind(id)
            .fetch_all(&mut *self.tx).await?;
        Ok(load_orders(&mut *self.tx, rows).await?.pop())
    }

    async fn insert_order(&mut self, order: &Order) -> Result<(), StoreError> {
        sqlx::query(&format!("INSERT INTO orders ({ORDER_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)"))
            .bind(order.id).bind(order.order_id.as_str()).bind(&order.user_id).bind(&order.user_email)
            .bind(Json(&order.delivery_address)).bind(order.payment_method.as_str()).bind(order.total_amount)
            .bind(order.status.as_str()).bind(&order.admin_notes).bind(order.created_at).bind(order.updated_at)
            .execute(&mut *self.tx).await?;
        for (position, item) in order.items.iter().enumerate() {
            sqlx::query(
                "INSERT INTO order_items (order_id, position, product_id, name, price, quantity, image, selected_size, selected_color) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
            )
                .bind(order.id).bind(to_i32(position as u32, "position")?).bind(item.product_id).bind(&item.name).bind(item.price)
                .bind(to_i32(item.quantity, "quantity")?).bind(&item.image).bind(&item.selected_size).bind(&item.selected_color)
                .execute(&mut *self.tx).await?;
        }
        Ok(())
    }

    async fn save_order(&mut self, order: &Order) -> Result<(), StoreError> {
        sqlx::query("UPDATE orders SET status = $2, admin_notes = $3, updated_at = $4 WHERE id = $1")
            .bind(order.id).bind(order.status.as_str()).bind(&order.admin_notes).bind(order.updated_at)
            .execute(&mut *self.tx).await?;
        Ok(())
    }

    async fn delete_order(&mut self, id: Uuid) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM orders WHERE id = $1").bind(id).execute(&mut *self.tx).await?;
        Ok(result.rows_affected() > 0)
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let PgTransaction { tx } = *self;
        tx.commit().await?;
        Ok(())
    }
}
