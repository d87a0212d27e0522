pub mod dtos;
pub mod tokens;
pub mod use_cases;

pub use tokens::{demo_user_id, Claims};
