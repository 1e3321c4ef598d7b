//! Issue category taxonomy.
//!
//! A fixed, ordered set of categories. The order is the order every listing
//! presents them in, and the first entry is the default for new pins.

use crate::error::InspectError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Opaque RGB marker color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// CSS-style `#rrggbb` form.
    pub fn to_hex(self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl Serialize for Color {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Category {
    #[default]
    Observation,
    Defect,
    SafetyHazard,
    IncompleteWork,
    QualityIssue,
    Completed,
}

impl Category {
    pub const ALL: [Category; 6] = [
        Category::Observation,
        Category::Defect,
        Category::SafetyHazard,
        Category::IncompleteWork,
        Category::QualityIssue,
        Category::Completed,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::Observation => "Observation",
            Self::Defect => "Defect",
            Self::SafetyHazard => "Safety Hazard",
            Self::IncompleteWork => "Incomplete Work",
            Self::QualityIssue => "Quality Issue",
            Self::Completed => "Completed",
        }
    }

    pub fn color(self) -> Color {
        match self {
            Self::Observation => Color::rgb(0x3b, 0x82, 0xf6),
            Self::Defect => Color::rgb(0xef, 0x44, 0x44),
            Self::SafetyHazard => Color::rgb(0xf9, 0x73, 0x16),
            Self::IncompleteWork => Color::rgb(0xea, 0xb3, 0x08),
            Self::QualityIssue => Color::rgb(0xa8, 0x55, 0xf7),
            Self::Completed => Color::rgb(0x22, 0xc5, 0x5e),
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Category {
    type Err = InspectError;

    /// Matches display names exactly.
    fn from_str(name: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|category| category.name() == name)
            .ok_or_else(|| InspectError::UnknownCategory(name.to_owned()))
    }
}

impl TryFrom<String> for Category {
    type Error = InspectError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Category> for String {
    fn from(value: Category) -> Self {
        value.name().to_owned()
    }
}

/// One row of the category listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CategoryEntry {
    pub name: &'static str,
    pub color: Color,
}

pub fn list_categories() -> Vec<CategoryEntry> {
    Category::ALL
        .into_iter()
        .map(|category| CategoryEntry { name: category.name(), color: category.color() })
        .collect()
}

pub fn color_of(name: &str) -> Result<Color, InspectError> {
    name.parse::<Category>().map(Category::color)
}
