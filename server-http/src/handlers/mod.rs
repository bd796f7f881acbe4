pub mod health;
pub mod records;

pub use health::health_check;
pub use records::{delete_record, get_record, insert_record, patch_record, query_records};
