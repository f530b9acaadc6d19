//! Core business logic abstractions

pub mod config;
pub mod error;
pub mod log;
pub mod provider;
pub mod rates;
pub mod resolver;
pub mod store;
pub mod validator;

// Re-export main types for cleaner imports
pub use error::RateError;
pub use provider::RateProvider;
pub use rates::{CurrencyPair, PairQuote, RateSnapshot};
pub use resolver::RateResolver;
pub use store::{RateStore, RequestLog};
