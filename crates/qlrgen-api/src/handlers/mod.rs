mod collections;
mod health;
mod qlr;

pub use collections::list_collections;
pub use health::health_check;
pub use qlr::get_qlr;
