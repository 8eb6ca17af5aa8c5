//! Holdings module - token listings and the chat actions that page through them

pub mod action;
pub mod ledger;

pub use action::{Action, Command, ParseError, SortBy, HELP_TEXT};
pub use ledger::{HoldingsLedger, HoldingsPage, TokenHolding, PAGE_SIZE};
