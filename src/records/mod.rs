//! Output record types: valuation records and supply adjustments.

pub mod token_record;
pub mod token_supply;

pub use token_record::{RecordContext, TokenRecord};
pub use token_supply::{SupplyCategory, SupplySign, TokenSupply};
