pub mod dtos;
pub mod use_cases;

pub use use_cases::{active_member_ids, is_active_member};
