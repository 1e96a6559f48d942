use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use std::{
    fmt::{Display, Formatter},
    str::FromStr,
};
use thiserror::Error;

/// Cash-equity venue a [`Symbol`] is listed on.
///
/// Deliberately a closed enum, not a free-form string: every [`crate::mapping::BrokerMapping`]
/// table is keyed against these variants, so adding a venue is a compile-time exhaustiveness
/// check everywhere an `Exchange` is matched on.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Deserialize, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Exchange {
    /// National Stock Exchange of India.
    Nse,
    /// Bombay Stock Exchange.
    Bse,
    /// London Stock Exchange.
    #[serde(alias = "LON")]
    Lse,
    /// Deutsche Börse Xetra.
    Xetra,
    /// New York Stock Exchange.
    Nyse,
    /// Nasdaq.
    Nasdaq,
}

impl Display for Exchange {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Exchange::Nse => "NSE",
            Exchange::Bse => "BSE",
            Exchange::Lse => "LSE",
            Exchange::Xetra => "XETRA",
            Exchange::Nyse => "NYSE",
            Exchange::Nasdaq => "NASDAQ",
        };
        write!(f, "{s}")
    }
}

impl FromStr for Exchange {
    type Err = ParseSymbolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "NSE" => Ok(Exchange::Nse),
            "BSE" => Ok(Exchange::Bse),
            "LSE" | "LON" => Ok(Exchange::Lse),
            "XETRA" => Ok(Exchange::Xetra),
            "NYSE" => Ok(Exchange::Nyse),
            "NASDAQ" => Ok(Exchange::Nasdaq),
            other => Err(ParseSymbolError::UnknownExchange(other.to_string())),
        }
    }
}

/// Broker-agnostic ticker bound to a venue, eg/ `RELIANCE:NSE`.
#[derive(Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Deserialize, Serialize)]
#[serde(try_from = "String", into = "String")]
pub struct Symbol {
    pub ticker: SmolStr,
    pub exchange: Exchange,
}

impl Symbol {
    pub fn new(ticker: impl AsRef<str>, exchange: Exchange) -> Self {
        Self {
            ticker: SmolStr::new(ticker.as_ref().to_ascii_uppercase()),
            exchange,
        }
    }
}

impl Display for Symbol {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.ticker, self.exchange)
    }
}

impl FromStr for Symbol {
    type Err = ParseSymbolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (ticker, exchange) = s
            .split_once(':')
            .ok_or_else(|| ParseSymbolError::MissingExchange(s.to_string()))?;

        if ticker.is_empty() {
            return Err(ParseSymbolError::EmptyTicker(s.to_string()));
        }

        Ok(Self::new(ticker, exchange.parse()?))
    }
}

impl TryFrom<String> for Symbol {
    type Error = ParseSymbolError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Symbol> for String {
    fn from(value: Symbol) -> Self {
        value.to_string()
    }
}

/// Error parsing a [`Symbol`] from its `"TICKER:EXCHANGE"` wire representation.
#[derive(Debug, Clone, Eq, PartialEq, Error)]
pub enum ParseSymbolError {
    #[error("symbol '{0}' is missing a ':EXCHANGE' suffix")]
    MissingExchange(String),
    #[error("symbol '{0}' has an empty ticker")]
    EmptyTicker(String),
    #[error("unrecognised exchange '{0}'")]
    UnknownExchange(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_valid_symbol() {
        let symbol: Symbol = "RELIANCE:NSE".parse().unwrap();
        assert_eq!(symbol.ticker.as_str(), "RELIANCE");
        assert_eq!(symbol.exchange, Exchange::Nse);
    }

    #[test]
    fn lowercases_are_uppercased() {
        let symbol: Symbol = "reliance:nse".parse().unwrap();
        assert_eq!(symbol.ticker.as_str(), "RELIANCE");
    }

    #[test]
    fn rejects_missing_exchange() {
        assert!(matches!(
            "RELIANCE".parse::<Symbol>(),
            Err(ParseSymbolError::MissingExchange(_))
        ));
    }

    #[test]
    fn rejects_unknown_exchange() {
        assert!(matches!(
            "RELIANCE:MOON".parse::<Symbol>(),
            Err(ParseSymbolError::UnknownExchange(_))
        ));
    }

    #[test]
    fn display_roundtrips_through_parse() {
        let symbol = Symbol::new("INFY", Exchange::Nse);
        let roundtripped: Symbol = symbol.to_string().parse().unwrap();
        assert_eq!(symbol, roundtripped);
    }
}
