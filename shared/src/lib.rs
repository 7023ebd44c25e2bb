pub mod i18n;
pub mod models;

pub use i18n::*;
pub use models::*;
