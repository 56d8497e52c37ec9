pub mod digest;
pub mod favorite;
pub mod types;
