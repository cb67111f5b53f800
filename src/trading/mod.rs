//! Trading module - swap execution
//!
//! The execution gateway is an opaque, retryable external service:
//! the HTTP client talks to a swap-routing API, the retry wrapper adds
//! backoff, and the simulated gateway fills orders at quoted prices
//! for dry runs and tests.

pub mod gateway;
pub mod retry;
pub mod swap_api;

pub use gateway::{ExecutionGateway, SimulatedGateway, SwapDirection, SwapReceipt, SwapRequest};
pub use retry::RetryingGateway;
pub use swap_api::SwapApiClient;
