use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::EngineError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HeaderDimension {
    ModelType,
    Portfolio,
    Purpose,
}

impl HeaderDimension {
    pub fn label(&self) -> &'static str {
        match self {
            Self::ModelType => "model_type",
            Self::Portfolio => "portfolio",
            Self::Purpose => "purpose",
        }
    }

    pub fn allowed_values(&self) -> &'static [&'static str] {
        match self {
            Self::ModelType => &["PD", "LGD", "EAD"],
            Self::Portfolio => &["Retail", "Commercial", "Wholesale"],
            Self::Purpose => &["IFRS9", "AIRB", "Adjudication"],
        }
    }
}

impl fmt::Display for HeaderDimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModelType {
    #[serde(rename = "PD")]
    Pd,
    #[serde(rename = "LGD")]
    Lgd,
    #[serde(rename = "EAD")]
    Ead,
}

impl ModelType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pd => "PD",
            Self::Lgd => "LGD",
            Self::Ead => "EAD",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Pd => "PD (Probability of Default)",
            Self::Lgd => "LGD (Loss Given Default)",
            Self::Ead => "EAD (Exposure at Default)",
        }
    }
}

impl FromStr for ModelType {
    type Err = EngineError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match leading_token(value).as_str() {
            "PD" => Ok(Self::Pd),
            "LGD" => Ok(Self::Lgd),
            "EAD" => Ok(Self::Ead),
            _ => Err(invalid(HeaderDimension::ModelType, value)),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Portfolio {
    Retail,
    Commercial,
    Wholesale,
}

impl Portfolio {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Retail => "Retail",
            Self::Commercial => "Commercial",
            Self::Wholesale => "Wholesale",
        }
    }

    pub fn display_name(&self) -> &'static str {
        self.as_str()
    }
}

impl FromStr for Portfolio {
    type Err = EngineError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match leading_token(value).as_str() {
            "RETAIL" => Ok(Self::Retail),
            "COMMERCIAL" => Ok(Self::Commercial),
            "WHOLESALE" => Ok(Self::Wholesale),
            _ => Err(invalid(HeaderDimension::Portfolio, value)),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Purpose {
    #[serde(rename = "IFRS9")]
    Ifrs9,
    #[serde(rename = "AIRB")]
    Airb,
    Adjudication,
}

impl Purpose {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ifrs9 => "IFRS9",
            Self::Airb => "AIRB",
            Self::Adjudication => "Adjudication",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Ifrs9 => "IFRS 9",
            Self::Airb => "AIRB (Advanced Internal Ratings-Based)",
            Self::Adjudication => "Adjudication",
        }
    }

    /// Upper-cased spelling used in schema keys (`ADJUDICATION_PD_Requirements`).
    pub fn key_segment(&self) -> String {
        self.as_str().to_ascii_uppercase()
    }
}

impl FromStr for Purpose {
    type Err = EngineError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let token = leading_token(value);
        // "IFRS 9" arrives from the selector as two tokens.
        let token = if token == "IFRS" && value.trim().to_ascii_uppercase().starts_with("IFRS 9") {
            "IFRS9".to_string()
        } else {
            token
        };

        match token.as_str() {
            "IFRS9" => Ok(Self::Ifrs9),
            "AIRB" => Ok(Self::Airb),
            "ADJUDICATION" => Ok(Self::Adjudication),
            _ => Err(invalid(HeaderDimension::Purpose, value)),
        }
    }
}

/// The three categorical choices that pick a requirement schema. Never
/// mutated once built; a different header means a new session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HeaderSelection {
    pub model_type: ModelType,
    pub portfolio: Portfolio,
    pub purpose: Purpose,
}

impl HeaderSelection {
    pub fn new(model_type: ModelType, portfolio: Portfolio, purpose: Purpose) -> Self {
        Self { model_type, portfolio, purpose }
    }

    pub fn parse(model_type: &str, portfolio: &str, purpose: &str) -> Result<Self, EngineError> {
        let mut draft = HeaderDraft::default();
        draft.select_model_type(model_type)?;
        draft.select_portfolio(portfolio)?;
        draft.select_purpose(purpose)?;
        draft.complete().ok_or_else(|| invalid(HeaderDimension::ModelType, model_type))
    }
}

/// Partial header while the session is still collecting selections.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeaderDraft {
    pub model_type: Option<ModelType>,
    pub portfolio: Option<Portfolio>,
    pub purpose: Option<Purpose>,
}

impl HeaderDraft {
    pub fn select_model_type(&mut self, value: &str) -> Result<ModelType, EngineError> {
        let parsed = non_empty(HeaderDimension::ModelType, value)?.parse::<ModelType>()?;
        self.model_type = Some(parsed);
        Ok(parsed)
    }

    pub fn select_portfolio(&mut self, value: &str) -> Result<Portfolio, EngineError> {
        let parsed = non_empty(HeaderDimension::Portfolio, value)?.parse::<Portfolio>()?;
        self.portfolio = Some(parsed);
        Ok(parsed)
    }

    pub fn select_purpose(&mut self, value: &str) -> Result<Purpose, EngineError> {
        let parsed = non_empty(HeaderDimension::Purpose, value)?.parse::<Purpose>()?;
        self.purpose = Some(parsed);
        Ok(parsed)
    }

    pub fn missing(&self) -> Vec<HeaderDimension> {
        let mut missing = Vec::new();
        if self.model_type.is_none() {
            missing.push(HeaderDimension::ModelType);
        }
        if self.portfolio.is_none() {
            missing.push(HeaderDimension::Portfolio);
        }
        if self.purpose.is_none() {
            missing.push(HeaderDimension::Purpose);
        }
        missing
    }

    pub fn complete(&self) -> Option<HeaderSelection> {
        Some(HeaderSelection::new(self.model_type?, self.portfolio?, self.purpose?))
    }
}

fn non_empty(dimension: HeaderDimension, value: &str) -> Result<&str, EngineError> {
    if value.trim().is_empty() {
        return Err(invalid(dimension, value));
    }
    Ok(value)
}

fn invalid(dimension: HeaderDimension, value: &str) -> EngineError {
    EngineError::InvalidSelection { dimension, value: value.to_string() }
}

/// First word of a selector label, upper-cased, with any parenthetical dropped.
fn leading_token(value: &str) -> String {
    let upper = value.trim().to_ascii_uppercase();
    let first = upper.split_whitespace().next().unwrap_or_default();
    first.split('(').next().unwrap_or_default().trim().to_string()
}
