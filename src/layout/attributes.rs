//! String-keyed attribute channel.
//!
//! Values arrive in a loose, JSON-like form. Numeric keys accept numbers
//! and numeric strings; anything else is rejected with
//! `InvalidAttribute` and leaves the previous setting in place.

use serde::{Deserialize, Serialize};

use super::force::ForceLayout;
use super::law::LawKind;
use crate::error::{NuiError, Result};

/// A loosely typed attribute value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Null,
    Bool(bool),
    Number(f64),
    Vector(Vec<f64>),
    Text(String),
}

impl From<f64> for AttributeValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<bool> for AttributeValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<Vec<f64>> for AttributeValue {
    fn from(value: Vec<f64>) -> Self {
        Self::Vector(value)
    }
}

impl AttributeValue {
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Coerce to a finite number.
    pub fn to_number(&self, key: &str) -> Result<f64> {
        let number = match self {
            Self::Number(n) => Some(*n),
            Self::Text(text) => text.trim().parse::<f64>().ok(),
            _ => None,
        };
        match number {
            Some(n) if n.is_finite() => Ok(n),
            _ => Err(self.rejected(key)),
        }
    }

    /// Coerce to a flag. A null value reads as `default`.
    pub fn to_flag(&self, key: &str, default: bool) -> Result<bool> {
        match self {
            Self::Null => Ok(default),
            Self::Bool(b) => Ok(*b),
            Self::Number(n) => Ok(*n != 0.0),
            Self::Text(text) => match text.trim() {
                "true" | "on" | "yes" => Ok(true),
                "false" | "off" | "no" => Ok(false),
                _ => Err(self.rejected(key)),
            },
            Self::Vector(_) => Err(self.rejected(key)),
        }
    }

    /// Coerce to a point; two components leave `z` at zero.
    pub fn to_point(&self, key: &str) -> Result<[f64; 3]> {
        match self {
            Self::Vector(v) if (2..=3).contains(&v.len()) && v.iter().all(|c| c.is_finite()) => {
                Ok([v[0], v[1], v.get(2).copied().unwrap_or(0.0)])
            }
            _ => Err(self.rejected(key)),
        }
    }

    /// Coerce to text.
    pub fn to_text(&self, key: &str) -> Result<&str> {
        match self {
            Self::Text(text) => Ok(text),
            _ => Err(self.rejected(key)),
        }
    }

    pub(crate) fn rejected(&self, key: &str) -> NuiError {
        NuiError::InvalidAttribute {
            key: key.to_owned(),
            value: format!("{self:?}"),
        }
    }
}

impl ForceLayout {
    /// Apply a layout-wide attribute.
    ///
    /// Returns `Ok(false)` for keys the layout does not know. A rejected
    /// value leaves the setting unchanged.
    pub fn set_attribute(&mut self, key: &str, value: &AttributeValue) -> Result<bool> {
        match key {
            "force" => self.set_force(value.to_number(key)?),
            "quality" => self.set_quality(value.to_number(key)?),
            "gravity" => self.set_gravity(value.to_number(key)?),
            "boundaryWeight" => self.set_boundary_weight(value.to_number(key)?),
            "theta" => self.set_theta(value.to_number(key)?),
            "stabilizationLimit" => self.set_stabilization_limit(value.to_number(key)?),
            "randomSeed" => {
                let seed = value.to_number(key)?;
                if seed < 0.0 || seed.fract() != 0.0 {
                    return Err(value.rejected(key));
                }
                self.set_random_seed(seed as u64);
            }
            "law" => {
                let kind = LawKind::parse(value.to_text(key)?).ok_or_else(|| value.rejected(key))?;
                self.set_law(kind);
            }
            _ => return Ok(false),
        }
        Ok(true)
    }
}
