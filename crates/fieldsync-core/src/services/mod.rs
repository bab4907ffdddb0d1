//! Services shared by every front end

mod field_store;

pub use field_store::FieldStore;
