use std::{
    fs,
    path::{Path, PathBuf},
};

use chrono::{SecondsFormat, Utc};
use serde::Deserialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::{
    domain::{
        Order, OrderItem, OrderStatus, validate_items, validate_table_number, validate_total,
    },
    id::new_order_id,
    state::{ORDERS_FILE, StoreError, init_json_file, load_json, save_json},
};

#[derive(Debug, Clone)]
pub struct NewOrder {
    pub table_number: i64,
    pub items: Vec<OrderItem>,
    pub total: i64,
    pub timestamp: Option<String>,
    pub status: Option<OrderStatus>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderFilter {
    pub table_number: Option<u32>,
    pub status: Option<OrderStatus>,
}

impl OrderFilter {
    fn matches(&self, order: &Order) -> bool {
        self.table_number.is_none_or(|n| order.table_number == n)
            && self.status.is_none_or(|s| order.status == s)
    }
}

/// Records exactly as they sit on disk. The file is meant to be edited by
/// hand, so a record that no longer parses as an [`Order`] is skipped on read
/// (with a warning) and written back untouched.
type PersistedOrders = Vec<Value>;

/// Append-mostly order list backed by a single JSON array file.
#[derive(Debug)]
pub struct OrderStore {
    path: PathBuf,
}

impl OrderStore {
    pub fn open(data_dir: &Path) -> Result<Self, StoreError> {
        fs::create_dir_all(data_dir)?;
        let path = data_dir.join(ORDERS_FILE);
        init_json_file(&path, &PersistedOrders::new())?;
        Ok(Self { path })
    }

    #[cfg(test)]
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn create(&mut self, new: NewOrder) -> Result<Order, StoreError> {
        let table_number = validate_table_number(new.table_number)?;
        validate_items(&new.items)?;
        validate_total(new.total)?;

        let mut orders = self.load()?;
        let order_id = loop {
            let id = new_order_id();
            if !orders.iter().any(|raw| record_id(raw) == Some(id.as_str())) {
                break id;
            }
        };

        let order = Order {
            order_id,
            table_number,
            items: new.items,
            total: new.total,
            timestamp: new.timestamp.unwrap_or_else(now_timestamp),
            status: new.status.unwrap_or_default(),
        };
        orders.push(serde_json::to_value(&order)?);
        save_json(&self.path, &orders)?;

        info!(
            order_id = %order.order_id,
            table_number,
            total = order.total,
            "order created"
        );
        Ok(order)
    }

    /// Orders in insertion order, oldest first.
    pub fn list(&self, filter: &OrderFilter) -> Result<Vec<Order>, StoreError> {
        Ok(self
            .load()?
            .iter()
            .filter_map(parse_record)
            .filter(|o| filter.matches(o))
            .collect())
    }

    pub fn get(&self, order_id: &str) -> Result<Option<Order>, StoreError> {
        Ok(self
            .load()?
            .iter()
            .find(|raw| record_id(raw) == Some(order_id))
            .and_then(parse_record))
    }

    /// Sets the status of one record. A record whose stored status is not a
    /// known value is repaired by this, as long as the rest of it is valid.
    pub fn update_status(
        &mut self,
        order_id: &str,
        status: OrderStatus,
    ) -> Result<Option<Order>, StoreError> {
        let mut orders = self.load()?;
        let Some(record) = orders
            .iter_mut()
            .filter_map(Value::as_object_mut)
            .find(|r| r.get("order_id").and_then(Value::as_str) == Some(order_id))
        else {
            return Ok(None);
        };
        let previous = record
            .get("status")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        record.insert("status".to_string(), Value::from(status.as_str()));
        let order: Order = serde_json::from_value(Value::Object(record.clone()))?;

        save_json(&self.path, &orders)?;
        info!(
            order_id,
            from = %previous,
            to = %status,
            "order status updated"
        );
        Ok(Some(order))
    }

    fn load(&self) -> Result<PersistedOrders, StoreError> {
        load_json(&self.path)
    }
}

fn record_id(raw: &Value) -> Option<&str> {
    raw.get("order_id").and_then(Value::as_str)
}

fn parse_record(raw: &Value) -> Option<Order> {
    match Order::deserialize(raw) {
        Ok(order) => Some(order),
        Err(e) => {
            warn!(
                order_id = record_id(raw).unwrap_or("<missing>"),
                error = %e,
                "skipping unreadable order record"
            );
            None
        }
    }
}

fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}
