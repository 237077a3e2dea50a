use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const MIN_TOTAL_TABLES: u32 = 1;
pub const MAX_TOTAL_TABLES: u32 = 100;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    InvalidTotalTables { total_tables: i64 },
    InvalidTableNumber { table_number: i64 },
    DuplicateTableNumber { table_number: u32 },
    DuplicateToken { token: String },
    EmptyToken,
    InvalidQuantity { item: String, quantity: i64 },
    InvalidTotal { total: i64 },
    InvalidStatus { status: String },
}

impl std::fmt::Display for DomainError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidTotalTables { total_tables }
                if *total_tables < MIN_TOTAL_TABLES as i64 =>
            {
                write!(
                    f,
                    "total tables must be at least {MIN_TOTAL_TABLES}, got {total_tables}"
                )
            }
            Self::InvalidTotalTables { total_tables } => write!(
                f,
                "total tables cannot exceed {MAX_TOTAL_TABLES}, got {total_tables}"
            ),
            Self::InvalidTableNumber { table_number } => {
                write!(f, "table_number must be a positive integer, got {table_number}")
            }
            Self::DuplicateTableNumber { table_number } => write!(
                f,
                "duplicate table number {table_number}: each table number must be unique"
            ),
            Self::DuplicateToken { token } => write!(f, "duplicate table token {token:?}"),
            Self::EmptyToken => write!(f, "table token cannot be empty"),
            Self::InvalidQuantity { item, quantity } => {
                write!(f, "invalid quantity for item {item:?}: {quantity}")
            }
            Self::InvalidTotal { total } => write!(f, "total cannot be negative, got {total}"),
            Self::InvalidStatus { status } => write!(
                f,
                "invalid status {status:?}, expected one of: {}",
                OrderStatus::ALL
                    .iter()
                    .map(|s| s.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
        }
    }
}

impl std::error::Error for DomainError {}

pub fn validate_total_tables(total_tables: i64) -> Result<u32, DomainError> {
    if (MIN_TOTAL_TABLES as i64..=MAX_TOTAL_TABLES as i64).contains(&total_tables) {
        Ok(total_tables as u32)
    } else {
        Err(DomainError::InvalidTotalTables { total_tables })
    }
}

pub fn validate_table_number(table_number: i64) -> Result<u32, DomainError> {
    match u32::try_from(table_number) {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(DomainError::InvalidTableNumber { table_number }),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableMapping {
    pub token: String,
    pub table_number: u32,
}

/// Sorts mappings by table number and rejects repeated numbers, repeated
/// tokens or blank tokens.
pub fn validate_mappings(
    mut mappings: Vec<TableMapping>,
) -> Result<Vec<TableMapping>, DomainError> {
    {
        let mut numbers = BTreeSet::new();
        let mut tokens = BTreeSet::new();
        for mapping in &mappings {
            if mapping.token.trim().is_empty() {
                return Err(DomainError::EmptyToken);
            }
            if !tokens.insert(mapping.token.as_str()) {
                return Err(DomainError::DuplicateToken {
                    token: mapping.token.clone(),
                });
            }
            if mapping.table_number == 0 {
                return Err(DomainError::InvalidTableNumber { table_number: 0 });
            }
            if !numbers.insert(mapping.table_number) {
                return Err(DomainError::DuplicateTableNumber {
                    table_number: mapping.table_number,
                });
            }
        }
    }
    mappings.sort_by_key(|m| m.table_number);
    Ok(mappings)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    #[default]
    Pending,
    Preparing,
    Ready,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 5] = [
        Self::Pending,
        Self::Preparing,
        Self::Ready,
        Self::Delivered,
        Self::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Preparing => "preparing",
            Self::Ready => "ready",
            Self::Delivered => "delivered",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn parse(raw: &str) -> Result<Self, DomainError> {
        Self::ALL
            .into_iter()
            .find(|s| s.as_str() == raw)
            .ok_or_else(|| DomainError::InvalidStatus {
                status: raw.to_string(),
            })
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A line item as submitted by the menu frontend. Only `name`, `price` and
/// `quantity` are interpreted; everything else is stored verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderItem {
    pub name: String,
    pub price: i64,
    pub quantity: i64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub order_id: String,
    pub table_number: u32,
    pub items: Vec<OrderItem>,
    pub total: i64,
    pub timestamp: String,
    pub status: OrderStatus,
}

pub fn validate_items(items: &[OrderItem]) -> Result<(), DomainError> {
    for item in items {
        if item.quantity <= 0 {
            return Err(DomainError::InvalidQuantity {
                item: item.name.clone(),
                quantity: item.quantity,
            });
        }
    }
    Ok(())
}

pub fn validate_total(total: i64) -> Result<(), DomainError> {
    if total < 0 {
        return Err(DomainError::InvalidTotal { total });
    }
    Ok(())
}
