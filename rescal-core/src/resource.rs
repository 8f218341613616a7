//! Bookable resources (rooms, equipment, groups of those).
//!
//! Every resource is backed by its own calendar; booking a resource places a
//! copy of the event in that calendar.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{RescalError, RescalResult};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    /// Assigned on first save
    pub id: Option<i64>,
    pub name: String,
    /// Backing calendar; synthesized on first save when empty
    pub calendar: String,
    pub category: Option<String>,
    pub description: Option<String>,
    pub response_type: ResponseType,
    pub kind: ResourceKind,
}

impl Resource {
    pub fn single(name: impl Into<String>) -> Self {
        Resource {
            id: None,
            name: name.into(),
            calendar: String::new(),
            category: None,
            description: None,
            response_type: ResponseType::Auto,
            kind: ResourceKind::Single,
        }
    }

    pub fn group(name: impl Into<String>, members: Vec<i64>) -> Self {
        Resource {
            kind: ResourceKind::Group { members },
            ..Resource::single(name)
        }
    }

    pub fn is_group(&self) -> bool {
        matches!(self.kind, ResourceKind::Group { .. })
    }

    /// Member resource ids; empty for single resources.
    pub fn members(&self) -> &[i64] {
        match &self.kind {
            ResourceKind::Single => &[],
            ResourceKind::Group { members } => members,
        }
    }
}

/// Closed set of resource variants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResourceKind {
    Single,
    /// Booking a group books one free member
    Group { members: Vec<i64> },
}

impl ResourceKind {
    /// Stored discriminator.
    pub fn discriminator(&self) -> &'static str {
        match self {
            ResourceKind::Single => "Single",
            ResourceKind::Group { .. } => "Group",
        }
    }
}

/// How a resource answers invitations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseType {
    None,
    /// Accept when free, decline otherwise
    Auto,
    AlwaysAccept,
    AlwaysDecline,
    Manual,
}

impl ResponseType {
    pub fn code(self) -> i64 {
        match self {
            ResponseType::None => 0,
            ResponseType::Auto => 1,
            ResponseType::AlwaysAccept => 2,
            ResponseType::AlwaysDecline => 3,
            ResponseType::Manual => 4,
        }
    }

    pub fn from_code(code: i64) -> RescalResult<Self> {
        match code {
            0 => Ok(ResponseType::None),
            1 => Ok(ResponseType::Auto),
            2 => Ok(ResponseType::AlwaysAccept),
            3 => Ok(ResponseType::AlwaysDecline),
            4 => Ok(ResponseType::Manual),
            other => Err(RescalError::Serialization(format!(
                "Unknown response type {}",
                other
            ))),
        }
    }
}

impl FromStr for ResponseType {
    type Err = RescalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "none" => Ok(ResponseType::None),
            "auto" => Ok(ResponseType::Auto),
            "always_accept" => Ok(ResponseType::AlwaysAccept),
            "always_decline" => Ok(ResponseType::AlwaysDecline),
            "manual" => Ok(ResponseType::Manual),
            other => Err(RescalError::Validation(format!(
                "Unknown response type '{}'",
                other
            ))),
        }
    }
}

/// Resource columns that can be filtered on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ResourceField {
    Name,
    Calendar,
    Category,
    Description,
    ResponseType,
    Kind,
}

impl ResourceField {
    pub(crate) fn column(self) -> &'static str {
        match self {
            ResourceField::Name => "resource_name",
            ResourceField::Calendar => "resource_calendar",
            ResourceField::Category => "resource_category",
            ResourceField::Description => "resource_description",
            ResourceField::ResponseType => "resource_response_type",
            ResourceField::Kind => "resource_type",
        }
    }
}

impl FromStr for ResourceField {
    type Err = RescalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "name" => Ok(ResourceField::Name),
            "calendar" => Ok(ResourceField::Calendar),
            "category" => Ok(ResourceField::Category),
            "description" => Ok(ResourceField::Description),
            "response_type" => Ok(ResourceField::ResponseType),
            "type" | "kind" => Ok(ResourceField::Kind),
            other => Err(RescalError::Validation(format!(
                "Unknown resource field '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for ResourceField {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.column().trim_start_matches("resource_"))
    }
}

/// Equality filter; all clauses must hold.
#[derive(Debug, Clone, Default)]
pub struct ResourceFilter {
    clauses: Vec<(ResourceField, String)>,
}

impl ResourceFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, field: ResourceField, value: impl Into<String>) -> Self {
        self.clauses.push((field, value.into()));
        self
    }

    /// Parse `field=value` pairs, e.g. from the command line.
    pub fn parse<'a>(pairs: impl IntoIterator<Item = &'a str>) -> RescalResult<Self> {
        let mut filter = Self::new();
        for pair in pairs {
            let (field, value) = pair.split_once('=').ok_or_else(|| {
                RescalError::Validation(format!("Expected field=value, got '{}'", pair))
            })?;
            filter = filter.with(field.trim().parse()?, value.trim());
        }
        Ok(filter)
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    pub(crate) fn clauses(&self) -> &[(ResourceField, String)] {
        &self.clauses
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_parse() {
        let filter = ResourceFilter::parse(["category=rooms", "type = Group"]).unwrap();
        assert_eq!(
            filter.clauses(),
            &[
                (ResourceField::Category, "rooms".to_string()),
                (ResourceField::Kind, "Group".to_string()),
            ]
        );
    }

    #[test]
    fn test_filter_rejects_unknown_field() {
        let err = ResourceFilter::parse(["colour=red"]).unwrap_err();
        assert!(matches!(err, RescalError::Validation(_)));

        let err = ResourceFilter::parse(["category"]).unwrap_err();
        assert!(matches!(err, RescalError::Validation(_)));
    }

    #[test]
    fn test_group_members() {
        let group = Resource::group("Meeting rooms", vec![1, 2]);
        assert!(group.is_group());
        assert_eq!(group.members(), &[1, 2]);
        assert!(Resource::single("Beamer").members().is_empty());
    }
}
