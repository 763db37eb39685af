use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A tracked ticker symbol and its metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instrument {
    pub id: i64,
    pub symbol: String,
    pub name: String,
    pub sector: Option<String>,
    pub industry: Option<String>,
    pub is_active: bool,
    /// Member of the default watch-list swept daily
    pub is_default: bool,
    pub last_synced_at: Option<DateTime<Utc>>,
}

/// Seed row for an instrument that does not exist yet
#[derive(Debug, Clone)]
pub struct NewInstrument {
    pub symbol: String,
    pub name: String,
    pub sector: Option<String>,
    pub industry: Option<String>,
    pub is_default: bool,
}

impl NewInstrument {
    pub fn new(symbol: &str, name: &str) -> Self {
        Self {
            symbol: symbol.to_uppercase(),
            name: name.to_string(),
            sector: None,
            industry: None,
            is_default: true,
        }
    }

    pub fn with_classification(mut self, sector: &str, industry: &str) -> Self {
        self.sector = Some(sector.to_string());
        self.industry = Some(industry.to_string());
        self
    }

    pub fn not_default(mut self) -> Self {
        self.is_default = false;
        self
    }
}
