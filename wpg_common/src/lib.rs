mod amount;

pub mod helpers;
pub mod op;
mod secret;

pub use amount::{TokenAmount, TokenAmountConversionError, DEFAULT_TOKEN_DECIMALS};
pub use secret::Secret;
