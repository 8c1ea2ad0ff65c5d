mod money;

pub mod helpers;
pub mod op;
mod secret;

pub use money::{Cents, CentsConversionError, KES_CURRENCY_CODE, KES_CURRENCY_CODE_LOWER};
pub use secret::Secret;
