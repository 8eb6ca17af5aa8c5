//! Chat commands and inline-button callback actions.
//!
//! Callback payloads are plain strings of the form `list_<page>_<sort>`, so
//! they round-trip through whatever chat transport sits in front of us.

use solana_sdk::pubkey::Pubkey;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

pub const HELP_TEXT: &str = "\
Available commands:
/start - Show this help
/createwallet - Create a new wallet
/buy <mint> <lamports> - Buy a token with SOL
/sell <mint> <amount> - Sell a token for SOL
/list [page] [value|date] - List your tokens";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("unknown command: {0}")]
    UnknownCommand(String),

    #[error("unknown action: {0}")]
    UnknownAction(String),

    #[error("missing argument: {0}")]
    MissingArgument(&'static str),

    #[error("invalid {field}: {value}")]
    InvalidArgument { field: &'static str, value: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortBy {
    #[default]
    Value,
    Date,
}

impl SortBy {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortBy::Value => "value",
            SortBy::Date => "date",
        }
    }
}

impl fmt::Display for SortBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortBy {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "value" => Ok(SortBy::Value),
            "date" => Ok(SortBy::Date),
            other => Err(ParseError::InvalidArgument {
                field: "sort",
                value: other.to_string(),
            }),
        }
    }
}

/// Payload attached to an inline button.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    ListPage { page: u32, sort_by: SortBy },
}

impl Action {
    pub fn list(page: u32, sort_by: SortBy) -> Self {
        Action::ListPage {
            page: page.max(1),
            sort_by,
        }
    }

    pub fn encode(&self) -> String {
        match self {
            Action::ListPage { page, sort_by } => format!("list_{}_{}", page, sort_by),
        }
    }

    pub fn next(&self) -> Self {
        match *self {
            Action::ListPage { page, sort_by } => Action::list(page.saturating_add(1), sort_by),
        }
    }

    /// Never goes below page 1.
    pub fn previous(&self) -> Self {
        match *self {
            Action::ListPage { page, sort_by } => Action::list(page.saturating_sub(1), sort_by),
        }
    }

    pub fn sorted_by(&self, sort_by: SortBy) -> Self {
        match *self {
            Action::ListPage { page, .. } => Action::list(page, sort_by),
        }
    }

    /// Previous/next and the two sort buttons for a listing page.
    pub fn navigation(&self) -> [Action; 4] {
        [
            self.previous(),
            self.next(),
            self.sorted_by(SortBy::Value),
            self.sorted_by(SortBy::Date),
        ]
    }
}

impl FromStr for Action {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.splitn(3, '_');
        match parts.next() {
            Some("list") => {
                let page = parts.next().ok_or(ParseError::MissingArgument("page"))?;
                let page: u32 = page.parse().map_err(|_| ParseError::InvalidArgument {
                    field: "page",
                    value: page.to_string(),
                })?;
                let sort_by = parts.next().ok_or(ParseError::MissingArgument("sort"))?.parse()?;
                Ok(Action::list(page, sort_by))
            }
            _ => Err(ParseError::UnknownAction(s.to_string())),
        }
    }
}

/// A slash command typed by a user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start,
    CreateWallet,
    Buy { mint: Pubkey, lamports: u64 },
    Sell { mint: Pubkey, amount: u64 },
    List(Action),
}

impl FromStr for Command {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut words = s.split_whitespace();
        let name = words.next().unwrap_or_default();
        match name.trim_start_matches('/') {
            "start" | "help" => Ok(Command::Start),
            "createwallet" => Ok(Command::CreateWallet),
            "buy" => {
                let (mint, lamports) = mint_and_amount(&mut words)?;
                Ok(Command::Buy { mint, lamports })
            }
            "sell" => {
                let (mint, amount) = mint_and_amount(&mut words)?;
                Ok(Command::Sell { mint, amount })
            }
            "list" => {
                let page = match words.next() {
                    Some(p) => p.parse().map_err(|_| ParseError::InvalidArgument {
                        field: "page",
                        value: p.to_string(),
                    })?,
                    None => 1,
                };
                let sort_by = match words.next() {
                    Some(s) => s.parse()?,
                    None => SortBy::default(),
                };
                Ok(Command::List(Action::list(page, sort_by)))
            }
            _ => Err(ParseError::UnknownCommand(name.to_string())),
        }
    }
}

fn mint_and_amount<'a>(words: &mut impl Iterator<Item = &'a str>) -> Result<(Pubkey, u64), ParseError> {
    let mint = words.next().ok_or(ParseError::MissingArgument("mint"))?;
    let mint = Pubkey::from_str(mint).map_err(|_| ParseError::InvalidArgument {
        field: "mint",
        value: mint.to_string(),
    })?;
    let amount = words.next().ok_or(ParseError::MissingArgument("amount"))?;
    let amount = match amount.parse::<u64>() {
        Ok(a) if a > 0 => a,
        _ => {
            return Err(ParseError::InvalidArgument {
                field: "amount",
                value: amount.to_string(),
            })
        }
    };
    Ok((mint, amount))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_encoding() {
        let action = Action::list(3, SortBy::Date);
        assert_eq!(action.encode(), "list_3_date");
        assert_eq!("list_3_date".parse::<Action>().unwrap(), action);
        assert_eq!("list_1_value".parse::<Action>().unwrap(), Action::list(1, SortBy::Value));
    }

    #[test]
    fn test_previous_clamps_at_first_page() {
        let first = Action::list(1, SortBy::Value);
        assert_eq!(first.previous(), first);
        assert_eq!(first.next(), Action::list(2, SortBy::Value));
        assert_eq!("list_0_value".parse::<Action>().unwrap(), first);
    }

    #[test]
    fn test_navigation_buttons() {
        let nav = Action::list(2, SortBy::Value).navigation();
        let encoded: Vec<String> = nav.iter().map(Action::encode).collect();
        assert_eq!(encoded, vec!["list_1_value", "list_3_value", "list_2_value", "list_2_date"]);
    }

    #[test]
    fn test_malformed_actions() {
        assert!(matches!("buy_1_value".parse::<Action>(), Err(ParseError::UnknownAction(_))));
        assert!(matches!("list_x_value".parse::<Action>(), Err(ParseError::InvalidArgument { field: "page", .. })));
        assert!(matches!("list_2_price".parse::<Action>(), Err(ParseError::InvalidArgument { field: "sort", .. })));
        assert_eq!("list_2".parse::<Action>(), Err(ParseError::MissingArgument("sort")));
    }

    #[test]
    fn test_command_parsing() {
        let mint = Pubkey::new_unique();
        assert_eq!("/start".parse::<Command>().unwrap(), Command::Start);
        assert_eq!("/createwallet".parse::<Command>().unwrap(), Command::CreateWallet);
        assert_eq!(
            format!("/buy {} 5000", mint).parse::<Command>().unwrap(),
            Command::Buy { mint, lamports: 5_000 }
        );
        assert_eq!(
            format!("/sell {} 7", mint).parse::<Command>().unwrap(),
            Command::Sell { mint, amount: 7 }
        );
        assert_eq!(
            "/list".parse::<Command>().unwrap(),
            Command::List(Action::list(1, SortBy::Value))
        );
        assert_eq!(
            "/list 4 date".parse::<Command>().unwrap(),
            Command::List(Action::list(4, SortBy::Date))
        );
    }

    #[test]
    fn test_command_errors() {
        assert!(matches!("/withdraw".parse::<Command>(), Err(ParseError::UnknownCommand(_))));
        assert_eq!("/buy".parse::<Command>(), Err(ParseError::MissingArgument("mint")));
        assert!(matches!(
            format!("/buy {} 0", Pubkey::new_unique()).parse::<Command>(),
            Err(ParseError::InvalidArgument { field: "amount", .. })
        ));
        assert!(matches!(
            "/sell not-a-mint 5".parse::<Command>(),
            Err(ParseError::InvalidArgument { field: "mint", .. })
        ));
    }
}
