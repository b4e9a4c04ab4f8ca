use redb::TableDefinition;

/// Short keys: key -> KeyEntry (msgpack)
pub const KEYS: TableDefinition<&str, &[u8]> = TableDefinition::new("keys");
