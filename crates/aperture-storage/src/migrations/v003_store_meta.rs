//! V003: store_meta gains default size_limit and compression rows.
//! Reversible (the rows are deleted on rollback).

use super::MigrationOp;

pub const VERSION: u32 = 3;
pub const NAME: &str = "store_meta defaults";

pub fn ops() -> Vec<MigrationOp> {
    vec![
        MigrationOp::SetMeta {
            key: "size_limit",
            value_sql: "'1073741824'",
        },
        MigrationOp::SetMeta {
            key: "compression",
            value_sql: "'false'",
        },
    ]
}
