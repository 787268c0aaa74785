pub mod duplicate_set;
pub mod match_config;
pub mod pair;
pub mod record;

pub use duplicate_set::*;
pub use match_config::*;
pub use pair::*;
pub use record::*;
