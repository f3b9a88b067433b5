//! Administrative division records as served by the upstream API
//!
//! These are transient view records: they are decoded from the upstream
//! payload, serialized into the cache and decoded again by lookups. Unknown
//! JSON fields are ignored at every level so upstream schema additions do
//! not break ingestion.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One level of the administrative hierarchy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DivisionLevel {
    Province,
    District,
    Ward,
}

impl DivisionLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            DivisionLevel::Province => "province",
            DivisionLevel::District => "district",
            DivisionLevel::Ward => "ward",
        }
    }
}

impl fmt::Display for DivisionLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Province {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub division_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub codename: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone_code: Option<u32>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub districts: Vec<District>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct District {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub division_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub codename: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub province_code: Option<u32>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub wards: Vec<Ward>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ward {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub division_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub codename: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub district_code: Option<u32>,
}

/// Upstream sends `null` instead of `[]` for leaf levels below the requested depth
fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

impl Province {
    /// Copy of this province without its nested districts
    pub fn without_children(&self) -> Self {
        Self {
            districts: Vec::new(),
            ..self.clone()
        }
    }
}

impl District {
    /// Copy of this district without its nested wards
    pub fn without_children(&self) -> Self {
        Self {
            wards: Vec::new(),
            ..self.clone()
        }
    }
}
