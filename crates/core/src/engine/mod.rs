//! Retrieval engine - the orchestrator behind `get_prices`.

mod assembler;
mod price_service;


pub use assembler::assemble;
pub use price_service::{PriceData, PriceRequest, PriceService};
