//! Execution module - from a quote to a signed, submitted transaction

pub mod cancel;
pub mod chain;
pub mod confirmation;
pub mod delay;
pub mod executor;

pub use cancel::{CancelHandle, CancelSignal};
pub use chain::{ChainClient, RpcChainClient, SignatureState};
pub use confirmation::{ConfirmationOutcome, ConfirmationPoller};
pub use delay::AntiFrontRunDelay;
pub use executor::{ExecutionOptions, TradeExecutor};
