//! Creative records: a piece of ad markup that line items can serve.

use lineitem_core::{EngineError, EngineResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum CreativeType {
    Banner,
    Video,
    Native,
}

impl CreativeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Banner => "banner",
            Self::Video => "video",
            Self::Native => "native",
        }
    }
}

impl fmt::Display for CreativeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CreativeType {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "banner" => Ok(Self::Banner),
            "video" => Ok(Self::Video),
            "native" => Ok(Self::Native),
            other => Err(EngineError::validation(format!(
                "invalid creative type:{other}"
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Creative {
    pub id: u64,
    /// Opaque markup returned verbatim to the auction.
    pub adm: String,
    #[serde(rename = "type")]
    pub creative_type: CreativeType,
}

/// Unvalidated input for `AddCreative`.
#[derive(Debug, Clone, Deserialize)]
pub struct CreativeSpec {
    pub id: i64,
    #[serde(default)]
    pub adm: String,
    #[serde(rename = "type")]
    pub creative_type: String,
}

impl Creative {
    pub fn new(id: i64, adm: impl Into<String>, creative_type: &str) -> EngineResult<Self> {
        if id <= 0 {
            return Err(EngineError::validation("invalid creative id"));
        }
        let creative_type = creative_type.parse::<CreativeType>()?;
        Ok(Self {
            id: id as u64,
            adm: adm.into(),
            creative_type,
        })
    }

    pub fn from_spec(spec: CreativeSpec) -> EngineResult<Self> {
        Self::new(spec.id, spec.adm, &spec.creative_type)
    }
}
