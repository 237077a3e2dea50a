use uuid::Uuid;

const TOKEN_SUFFIX_LEN: usize = 12;

pub fn new_order_id() -> String {
    Uuid::new_v4().to_string()
}

#[cfg(test)]
pub fn is_order_id(s: &str) -> bool {
    Uuid::parse_str(s).is_ok()
}

/// `table{N}_token_{12 hex}`; the table number only aids humans reading the
/// mapping file, lookups treat the whole string as opaque.
pub fn new_table_token(table_number: u32) -> String {
    let simple = Uuid::new_v4().simple().to_string();
    format!("table{table_number}_token_{}", &simple[..TOKEN_SUFFIX_LEN])
}
