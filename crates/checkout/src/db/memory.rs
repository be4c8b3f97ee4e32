//! In-process store.
//!
//! Each transaction works on a private copy of the tables taken at `begin`.
//! Every row it reads or writes is recorded with the version it saw; at
//! commit the versions are compared against the shared tables and the commit
//! fails with `StoreError::Conflict` if any of them moved. This gives the same
//! outcome as `SERIALIZABLE` for the rows checkout touches: of two
//! transactions that both read a product's stock and then write it, only the
//! first to commit succeeds.
//!
//! Ids come from shared sequences and are never reused, even when the
//! transaction that drew them rolls back.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::Utc;

use securecart_core::{OrderId, OrderLineId, OrderStatus, PaymentId, Price, ProductId, UserId};

use super::{CheckoutStore, StoreError, StoreTx};
use crate::models::{
    CartItem, CartLine, CheckoutLine, NewOrderLine, NewPaymentRecord, NewProduct, Order,
    OrderLine, OrderLineView, PaymentRecord, Product,
};

#[derive(Debug, Clone, Default)]
struct Tables {
    products: BTreeMap<ProductId, Product>,
    carts: BTreeMap<UserId, BTreeMap<ProductId, i32>>,
    orders: BTreeMap<OrderId, Order>,
    order_lines: BTreeMap<OrderId, Vec<OrderLine>>,
    payments: BTreeMap<PaymentId, PaymentRecord>,
}

/// Unit of conflict detection. A cart is versioned as a whole, and an order
/// together with its lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum RowKey {
    Product(ProductId),
    Cart(UserId),
    Order(OrderId),
    Payment(PaymentId),
}

#[derive(Debug, Default)]
struct Shared {
    tables: Tables,
    versions: HashMap<RowKey, u64>,
    injected_conflicts: u32,
}

#[derive(Debug, Default)]
struct Sequences {
    product: AtomicI32,
    order: AtomicI32,
    order_line: AtomicI32,
    payment: AtomicI32,
}

fn next_id(counter: &AtomicI32) -> i32 {
    counter.fetch_add(1, Ordering::Relaxed) + 1
}

/// In-memory store with optimistic serializable commits.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    shared: Arc<Mutex<Shared>>,
    sequences: Arc<Sequences>,
    latency: Duration,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleep for `latency` before every operation, which widens the window
    /// in which concurrent transactions overlap.
    #[must_use]
    pub const fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Make the next `count` writing commits fail with `StoreError::Conflict`.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::DataCorruption` if the store lock is poisoned.
    pub fn inject_commit_conflicts(&self, count: u32) -> Result<(), StoreError> {
        self.lock()?.injected_conflicts = count;
        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Shared>, StoreError> {
        self.shared
            .lock()
            .map_err(|_| StoreError::DataCorruption("memory store lock poisoned".to_owned()))
    }

    async fn pause(&self) {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
    }

    fn snapshot(&self) -> Result<MemoryTx, StoreError> {
        let shared = self.lock()?;
        Ok(MemoryTx {
            store: self.clone(),
            tables: shared.tables.clone(),
            versions: shared.versions.clone(),
            reads: HashSet::new(),
            writes: HashSet::new(),
        })
    }

    fn apply(&self, tx: &MemoryTx) -> Result<(), StoreError> {
        if tx.writes.is_empty() {
            return Ok(());
        }

        let mut shared = self.lock()?;
        if shared.injected_conflicts > 0 {
            shared.injected_conflicts -= 1;
            return Err(StoreError::Conflict);
        }

        for key in tx.reads.iter().chain(tx.writes.iter()) {
            let seen = tx.versions.get(key).copied().unwrap_or(0);
            let current = shared.versions.get(key).copied().unwrap_or(0);
            if seen != current {
                return Err(StoreError::Conflict);
            }
        }

        for key in &tx.writes {
            copy_row(&tx.tables, &mut shared.tables, *key);
            *shared.versions.entry(*key).or_insert(0) += 1;
        }
        Ok(())
    }
}

fn copy_row(from: &Tables, to: &mut Tables, key: RowKey) {
    match key {
        RowKey::Product(id) => match from.products.get(&id) {
            Some(product) => {
                to.products.insert(id, product.clone());
            }
            None => {
                to.products.remove(&id);
            }
        },
        RowKey::Cart(user_id) => match from.carts.get(&user_id) {
            Some(cart) if !cart.is_empty() => {
                to.carts.insert(user_id, cart.clone());
            }
            _ => {
                to.carts.remove(&user_id);
            }
        },
        RowKey::Order(id) => {
            match from.orders.get(&id) {
                Some(order) => {
                    to.orders.insert(id, order.clone());
                }
                None => {
                    to.orders.remove(&id);
                }
            }
            match from.order_lines.get(&id) {
                Some(lines) => {
                    to.order_lines.insert(id, lines.clone());
                }
                None => {
                    to.order_lines.remove(&id);
                }
            }
        }
        RowKey::Payment(id) => match from.payments.get(&id) {
            Some(payment) => {
                to.payments.insert(id, payment.clone());
            }
            None => {
                to.payments.remove(&id);
            }
        },
    }
}

impl CheckoutStore for MemoryStore {
    type Tx = MemoryTx;

    async fn begin(&self) -> Result<MemoryTx, StoreError> {
        self.pause().await;
        self.snapshot()
    }
}

/// An open in-memory transaction. Dropping it discards its writes.
#[derive(Debug)]
pub struct MemoryTx {
    store: MemoryStore,
    tables: Tables,
    versions: HashMap<RowKey, u64>,
    reads: HashSet<RowKey>,
    writes: HashSet<RowKey>,
}

impl MemoryTx {
    fn read(&mut self, key: RowKey) {
        self.reads.insert(key);
    }

    fn write(&mut self, key: RowKey) {
        self.reads.insert(key);
        self.writes.insert(key);
    }

    fn read_product(&mut self, id: ProductId) -> Option<Product> {
        self.read(RowKey::Product(id));
        self.tables.products.get(&id).cloned()
    }

    fn read_cart(&mut self, user_id: UserId) -> Vec<(ProductId, i32)> {
        self.read(RowKey::Cart(user_id));
        self.tables
            .carts
            .get(&user_id)
            .map(|cart| cart.iter().map(|(id, qty)| (*id, *qty)).collect())
            .unwrap_or_default()
    }
}

impl StoreTx for MemoryTx {
    async fn list_products(&mut self) -> Result<Vec<Product>, StoreError> {
        self.store.pause().await;
        let ids: Vec<ProductId> = self.tables.products.keys().copied().collect();
        Ok(ids.into_iter().filter_map(|id| self.read_product(id)).collect())
    }

    async fn product(&mut self, id: ProductId) -> Result<Option<Product>, StoreError> {
        self.store.pause().await;
        Ok(self.read_product(id))
    }

    async fn insert_product(&mut self, product: &NewProduct) -> Result<Product, StoreError> {
        self.store.pause().await;
        let id = ProductId::new(next_id(&self.store.sequences.product));
        let row = Product {
            id,
            name: product.name.clone(),
            description: product.description.clone(),
            price: product.price,
            stock: product.stock,
            image_url: product.image_url.clone(),
            created_at: Utc::now(),
        };
        self.tables.products.insert(id, row.clone());
        self.write(RowKey::Product(id));
        Ok(row)
    }

    async fn update_product(
        &mut self,
        id: ProductId,
        product: &NewProduct,
    ) -> Result<Option<Product>, StoreError> {
        self.store.pause().await;
        self.read(RowKey::Product(id));
        let Some(row) = self.tables.products.get_mut(&id) else {
            return Ok(None);
        };
        row.name.clone_from(&product.name);
        row.description.clone_from(&product.description);
        row.price = product.price;
        row.stock = product.stock;
        row.image_url.clone_from(&product.image_url);
        let updated = row.clone();
        self.write(RowKey::Product(id));
        Ok(Some(updated))
    }

    async fn delete_product(&mut self, id: ProductId) -> Result<bool, StoreError> {
        self.store.pause().await;
        if self.read_product(id).is_none() {
            return Ok(false);
        }
        let referenced = self
            .tables
            .order_lines
            .values()
            .flatten()
            .any(|line| line.product_id == id);
        if referenced {
            return Err(StoreError::Constraint(format!(
                "product {id} is referenced by order lines"
            )));
        }

        self.tables.products.remove(&id);
        self.write(RowKey::Product(id));

        let holders: Vec<UserId> = self
            .tables
            .carts
            .iter()
            .filter(|(_, cart)| cart.contains_key(&id))
            .map(|(user_id, _)| *user_id)
            .collect();
        for user_id in holders {
            if let Some(cart) = self.tables.carts.get_mut(&user_id) {
                cart.remove(&id);
            }
            self.write(RowKey::Cart(user_id));
        }
        Ok(true)
    }

    async fn decrement_stock(&mut self, id: ProductId, quantity: i32) -> Result<bool, StoreError> {
        self.store.pause().await;
        self.read(RowKey::Product(id));
        let Some(row) = self.tables.products.get_mut(&id) else {
            return Ok(false);
        };
        if row.stock < quantity {
            return Ok(false);
        }
        row.stock -= quantity;
        self.write(RowKey::Product(id));
        Ok(true)
    }

    async fn cart_items(&mut self, user_id: UserId) -> Result<Vec<CartItem>, StoreError> {
        self.store.pause().await;
        let lines = self.read_cart(user_id);
        Ok(lines
            .into_iter()
            .filter_map(|(product_id, quantity)| {
                self.read_product(product_id).map(|p| CartItem {
                    product_id,
                    name: p.name,
                    price: p.price,
                    image_url: p.image_url,
                    quantity,
                })
            })
            .collect())
    }

    async fn cart_line(
        &mut self,
        user_id: UserId,
        product_id: ProductId,
    ) -> Result<Option<CartLine>, StoreError> {
        self.store.pause().await;
        Ok(self
            .read_cart(user_id)
            .into_iter()
            .find(|(id, _)| *id == product_id)
            .map(|(product_id, quantity)| CartLine {
                user_id,
                product_id,
                quantity,
            }))
    }

    async fn upsert_cart_line(
        &mut self,
        user_id: UserId,
        product_id: ProductId,
        quantity: i32,
    ) -> Result<CartLine, StoreError> {
        self.store.pause().await;
        if self.read_product(product_id).is_none() {
            return Err(StoreError::Constraint(format!(
                "cart line references missing product {product_id}"
            )));
        }
        if quantity <= 0 {
            return Err(StoreError::Constraint(format!(
                "cart quantity must be positive (got {quantity})"
            )));
        }
        self.tables
            .carts
            .entry(user_id)
            .or_default()
            .insert(product_id, quantity);
        self.write(RowKey::Cart(user_id));
        Ok(CartLine {
            user_id,
            product_id,
            quantity,
        })
    }

    async fn delete_cart_line(
        &mut self,
        user_id: UserId,
        product_id: ProductId,
    ) -> Result<bool, StoreError> {
        self.store.pause().await;
        self.read(RowKey::Cart(user_id));
        let removed = self
            .tables
            .carts
            .get_mut(&user_id)
            .and_then(|cart| cart.remove(&product_id))
            .is_some();
        if removed {
            self.write(RowKey::Cart(user_id));
        }
        Ok(removed)
    }

    async fn clear_cart(&mut self, user_id: UserId) -> Result<u64, StoreError> {
        self.store.pause().await;
        self.read(RowKey::Cart(user_id));
        let removed = self
            .tables
            .carts
            .remove(&user_id)
            .map_or(0, |cart| cart.len() as u64);
        if removed > 0 {
            self.write(RowKey::Cart(user_id));
        }
        Ok(removed)
    }

    async fn lock_checkout_lines(&mut self, user_id: UserId) -> Result<Vec<CheckoutLine>, StoreError> {
        self.store.pause().await;
        let lines = self.read_cart(user_id);
        Ok(lines
            .into_iter()
            .filter_map(|(product_id, quantity)| {
                self.read_product(product_id).map(|p| CheckoutLine {
                    product_id,
                    quantity,
                    price: p.price,
                    stock: p.stock,
                })
            })
            .collect())
    }

    async fn insert_order(&mut self, user_id: UserId, total_price: Price) -> Result<Order, StoreError> {
        self.store.pause().await;
        let id = OrderId::new(next_id(&self.store.sequences.order));
        let order = Order {
            id,
            user_id,
            total_price,
            status: OrderStatus::Processing,
            created_at: Utc::now(),
            payment_id: None,
        };
        self.tables.orders.insert(id, order.clone());
        self.write(RowKey::Order(id));
        Ok(order)
    }

    async fn insert_order_line(
        &mut self,
        order_id: OrderId,
        line: &NewOrderLine,
    ) -> Result<OrderLine, StoreError> {
        self.store.pause().await;
        if !self.tables.orders.contains_key(&order_id) {
            return Err(StoreError::Constraint(format!(
                "order line references missing order {order_id}"
            )));
        }
        let row = OrderLine {
            id: OrderLineId::new(next_id(&self.store.sequences.order_line)),
            order_id,
            product_id: line.product_id,
            quantity: line.quantity,
            unit_price: line.unit_price,
        };
        self.tables.order_lines.entry(order_id).or_default().push(row);
        self.write(RowKey::Order(order_id));
        Ok(row)
    }

    async fn order_for_user(
        &mut self,
        order_id: OrderId,
        user_id: UserId,
    ) -> Result<Option<Order>, StoreError> {
        self.store.pause().await;
        self.read(RowKey::Order(order_id));
        Ok(self
            .tables
            .orders
            .get(&order_id)
            .filter(|order| order.user_id == user_id)
            .cloned())
    }

    async fn orders_for_user(&mut self, user_id: UserId) -> Result<Vec<Order>, StoreError> {
        self.store.pause().await;
        let mut orders: Vec<Order> = self
            .tables
            .orders
            .values()
            .filter(|order| order.user_id == user_id)
            .cloned()
            .collect();
        for order in &orders {
            self.reads.insert(RowKey::Order(order.id));
        }
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(orders)
    }

    async fn order_lines(&mut self, order_id: OrderId) -> Result<Vec<OrderLineView>, StoreError> {
        self.store.pause().await;
        self.read(RowKey::Order(order_id));
        let lines = self.tables.order_lines.get(&order_id).cloned().unwrap_or_default();
        Ok(lines
            .into_iter()
            .filter_map(|line| {
                self.read_product(line.product_id).map(|p| OrderLineView {
                    id: line.id,
                    product_id: line.product_id,
                    quantity: line.quantity,
                    unit_price: line.unit_price,
                    name: p.name,
                    image_url: p.image_url,
                })
            })
            .collect())
    }

    async fn mark_order_paid(
        &mut self,
        order_id: OrderId,
        payment_id: PaymentId,
    ) -> Result<bool, StoreError> {
        self.store.pause().await;
        self.read(RowKey::Order(order_id));
        let Some(order) = self.tables.orders.get_mut(&order_id) else {
            return Ok(false);
        };
        order.status = OrderStatus::Paid;
        order.payment_id = Some(payment_id);
        self.write(RowKey::Order(order_id));
        Ok(true)
    }

    async fn insert_payment(&mut self, payment: &NewPaymentRecord) -> Result<PaymentRecord, StoreError> {
        self.store.pause().await;
        let id = PaymentId::new(next_id(&self.store.sequences.payment));
        let row = PaymentRecord {
            id,
            user_id: payment.user_id,
            card_number: payment.card_number.clone(),
            card_holder: payment.card_holder.clone(),
            expiry_date: payment.expiry_date.clone(),
            cvv: payment.cvv.clone(),
            created_at: Utc::now(),
        };
        self.tables.payments.insert(id, row.clone());
        self.write(RowKey::Payment(id));
        Ok(row)
    }

    async fn payment_for_user(
        &mut self,
        payment_id: PaymentId,
        user_id: UserId,
    ) -> Result<Option<PaymentRecord>, StoreError> {
        self.store.pause().await;
        self.read(RowKey::Payment(payment_id));
        Ok(self
            .tables
            .payments
            .get(&payment_id)
            .filter(|payment| payment.user_id == user_id)
            .cloned())
    }

    async fn commit(self) -> Result<(), StoreError> {
        self.store.pause().await;
        self.store.apply(&self)
    }

    async fn rollback(self) -> Result<(), StoreError> {
        Ok(())
    }
}
