//! Common schema primitives

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Free-form per-article metadata. Stage additions nest under a reserved
/// subkey (`normalization`, `enrichment`) and never overwrite earlier keys.
pub type Metadata = HashMap<String, serde_json::Value>;

/// Sentiment classification. The wire form is the lowercase string.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Positive,
    Negative,
    Neutral,
}

impl Sentiment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sentiment::Positive => "positive",
            Sentiment::Negative => "negative",
            Sentiment::Neutral => "neutral",
        }
    }
}

impl std::str::FromStr for Sentiment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "positive" => Ok(Sentiment::Positive),
            "negative" => Ok(Sentiment::Negative),
            "neutral" => Ok(Sentiment::Neutral),
            other => Err(format!("unknown sentiment: {}", other)),
        }
    }
}

impl std::fmt::Display for Sentiment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sentiment_wire_form() {
        let json = serde_json::to_string(&Sentiment::Positive).unwrap();
        assert_eq!(json, "\"positive\"");

        let parsed: Sentiment = serde_json::from_str("\"neutral\"").unwrap();
        assert_eq!(parsed, Sentiment::Neutral);
    }

    #[test]
    fn test_sentiment_rejects_unknown() {
        assert!(serde_json::from_str::<Sentiment>("\"bullish\"").is_err());
        assert!("mixed".parse::<Sentiment>().is_err());
    }
}
