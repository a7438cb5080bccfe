//! V002: file_info gains a file_type column (image/video/sidecar/other).
//! Fully reversible.

use super::MigrationOp;

pub const VERSION: u32 = 2;
pub const NAME: &str = "file_info.file_type";

pub fn ops() -> Vec<MigrationOp> {
    vec![
        MigrationOp::AddColumn {
            table: "file_info",
            column: "file_type",
            decl: "TEXT",
        },
        MigrationOp::Backfill {
            table: "file_info",
            forward: "UPDATE file_info SET file_type = 'other' WHERE file_type IS NULL",
            reverse: Some("UPDATE file_info SET file_type = NULL"),
        },
        MigrationOp::Reindex {
            name: "idx_file_info_type",
            table: "file_info",
            columns: "file_type",
        },
    ]
}
