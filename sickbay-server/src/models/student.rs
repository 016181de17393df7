//! Student (patient) fields: matric number and medical enums

use std::fmt;

use serde::{Deserialize, Serialize};

use super::ValidationError;

const MAX_MATRIC_LEN: usize = 32;

/// Validated matriculation number.
///
/// Stored uppercase so `csc/2021/001` and `CSC/2021/001` collide on the
/// per-warehouse unique index.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MatricNumber(String);

impl MatricNumber {
    pub fn new(s: &str) -> Result<Self, ValidationError> {
        let value = s.trim().to_uppercase();

        if value.is_empty() {
            return Err(ValidationError::Empty {
                field: "matric number",
            });
        }

        if value.len() > MAX_MATRIC_LEN {
            return Err(ValidationError::TooLong {
                field: "matric number",
                max: MAX_MATRIC_LEN,
            });
        }

        if !value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '/' | '-' | '_' | '.'))
        {
            return Err(ValidationError::InvalidFormat {
                field: "matric number",
                reason: "only letters, digits, '/', '-', '_' and '.' are allowed",
            });
        }

        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// ABO/Rh blood group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BloodGroup {
    #[serde(rename = "A+")]
    APos,
    #[serde(rename = "A-")]
    ANeg,
    #[serde(rename = "B+")]
    BPos,
    #[serde(rename = "B-")]
    BNeg,
    #[serde(rename = "AB+")]
    AbPos,
    #[serde(rename = "AB-")]
    AbNeg,
    #[serde(rename = "O+")]
    OPos,
    #[serde(rename = "O-")]
    ONeg,
}

impl BloodGroup {
    const ALL: [BloodGroup; 8] = [
        Self::APos,
        Self::ANeg,
        Self::BPos,
        Self::BNeg,
        Self::AbPos,
        Self::AbNeg,
        Self::OPos,
        Self::ONeg,
    ];

    pub fn parse(s: &str) -> Result<Self, ValidationError> {
        let wanted = s.trim().to_uppercase();
        Self::ALL
            .into_iter()
            .find(|g| g.as_str() == wanted)
            .ok_or_else(|| ValidationError::InvalidVariant {
                field: "blood group",
                value: s.to_owned(),
            })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::APos => "A+",
            Self::ANeg => "A-",
            Self::BPos => "B+",
            Self::BNeg => "B-",
            Self::AbPos => "AB+",
            Self::AbNeg => "AB-",
            Self::OPos => "O+",
            Self::ONeg => "O-",
        }
    }
}

/// Haemoglobin genotype
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Genotype {
    Aa,
    As,
    Ac,
    Ss,
    Sc,
    Cc,
}

impl Genotype {
    const ALL: [Genotype; 6] = [Self::Aa, Self::As, Self::Ac, Self::Ss, Self::Sc, Self::Cc];

    pub fn parse(s: &str) -> Result<Self, ValidationError> {
        let wanted = s.trim().to_uppercase();
        Self::ALL
            .into_iter()
            .find(|g| g.as_str() == wanted)
            .ok_or_else(|| ValidationError::InvalidVariant {
                field: "genotype",
                value: s.to_owned(),
            })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Aa => "AA",
            Self::As => "AS",
            Self::Ac => "AC",
            Self::Ss => "SS",
            Self::Sc => "SC",
            Self::Cc => "CC",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
    Other,
}

impl Gender {
    pub fn parse(s: &str) -> Result<Self, ValidationError> {
        match s.trim().to_lowercase().as_str() {
            "male" | "m" => Ok(Self::Male),
            "female" | "f" => Ok(Self::Female),
            "other" => Ok(Self::Other),
            _ => Err(ValidationError::InvalidVariant {
                field: "gender",
                value: s.to_owned(),
            }),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Male => "male",
            Self::Female => "female",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for BloodGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for Genotype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parse an optional enum-valued field, treating blank input as absent.
pub fn parse_optional<T>(
    s: Option<&str>,
    parse: impl Fn(&str) -> Result<T, ValidationError>,
) -> Result<Option<T>, ValidationError> {
    match s.map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => parse(value).map(Some),
    }
}
