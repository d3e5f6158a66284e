//! Field declarations
//!
//! A field is declared once, with builder calls, and carries everything the
//! validation, indexing, listing and population layers need to know about it.

use serde::Serialize;
use std::fmt;

/// Entity types a reference field can point at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum RefTarget {
    /// Incident type catalog entry (external)
    IncidentType,
    /// Administrative or geographic boundary (external)
    Feature,
    /// Organisation or person from the party directory (external)
    Party,
    /// Emergency response plan (this service)
    Plan,
    /// Plan activity (this service)
    Activity,
}

impl RefTarget {
    pub fn name(&self) -> &'static str {
        match self {
            Self::IncidentType => "IncidentType",
            Self::Feature => "Feature",
            Self::Party => "Party",
            Self::Plan => "Plan",
            Self::Activity => "Activity",
        }
    }
}

impl fmt::Display for RefTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Read-time population directive for a reference
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Populate {
    /// Fields of the target embedded in place of the id (`_id` is always kept)
    pub select: Vec<String>,
    /// Reference hops expanded; references inside the embedded document stay raw
    pub max_depth: u8,
}

/// Maximum reference hops expanded on reads
pub const MAX_POPULATE_DEPTH: u8 = 1;

impl Populate {
    pub fn select<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            select: fields.into_iter().map(Into::into).collect(),
            max_depth: MAX_POPULATE_DEPTH,
        }
    }
}

/// Foreign-key style declaration on a reference field
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferenceSpec {
    pub target: RefTarget,
    /// Writes fail when the id does not resolve in the target store
    pub exists: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub populate: Option<Populate>,
}

/// Value kind of a field
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum FieldKind {
    #[serde(rename_all = "camelCase")]
    String {
        trim: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        max_length: Option<usize>,
    },
    Integer {
        #[serde(skip_serializing_if = "Option::is_none")]
        min: Option<i64>,
    },
    Date,
    Enum {
        values: Vec<String>,
    },
    Reference(ReferenceSpec),
}

/// A single entry of an entity's field manifest
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldSpec {
    pub name: String,
    pub kind: FieldKind,
    pub required: bool,
    /// Backed by a database index
    pub index: bool,
    /// Included in free-text `q` search
    pub searchable: bool,
    /// Usable as a categorical list filter
    pub taggable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<serde_json::Value>,
    /// Generator hint for synthetic data tooling
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fake: Option<String>,
}

impl FieldSpec {
    fn with_kind(name: &str, kind: FieldKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
            required: false,
            index: false,
            searchable: false,
            taggable: false,
            default: None,
            fake: None,
        }
    }

    /// Trimmed string field
    pub fn string(name: &str) -> Self {
        Self::with_kind(
            name,
            FieldKind::String {
                trim: true,
                max_length: None,
            },
        )
    }

    pub fn integer(name: &str) -> Self {
        Self::with_kind(name, FieldKind::Integer { min: None })
    }

    pub fn date(name: &str) -> Self {
        Self::with_kind(name, FieldKind::Date)
    }

    pub fn enumeration<I, S>(name: &str, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::with_kind(
            name,
            FieldKind::Enum {
                values: values.into_iter().map(Into::into).collect(),
            },
        )
    }

    pub fn reference(name: &str, target: RefTarget) -> Self {
        Self::with_kind(
            name,
            FieldKind::Reference(ReferenceSpec {
                target,
                exists: false,
                populate: None,
            }),
        )
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn index(mut self) -> Self {
        self.index = true;
        self
    }

    pub fn searchable(mut self) -> Self {
        self.searchable = true;
        self
    }

    pub fn taggable(mut self) -> Self {
        self.taggable = true;
        self
    }

    pub fn default_value(mut self, value: impl Into<serde_json::Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn fake(mut self, hint: &str) -> Self {
        self.fake = Some(hint.to_string());
        self
    }

    /// Maximum length in characters; strings only
    pub fn max_length(mut self, max: usize) -> Self {
        if let FieldKind::String { max_length, .. } = &mut self.kind {
            *max_length = Some(max);
        }
        self
    }

    /// Inclusive lower bound; integers only
    pub fn min(mut self, bound: i64) -> Self {
        if let FieldKind::Integer { min } = &mut self.kind {
            *min = Some(bound);
        }
        self
    }

    /// Require the referenced id to exist; references only
    pub fn exists(mut self) -> Self {
        if let FieldKind::Reference(reference) = &mut self.kind {
            reference.exists = true;
        }
        self
    }

    /// Embed the selected target fields on reads; references only
    pub fn populate(mut self, populate: Populate) -> Self {
        if let FieldKind::Reference(reference) = &mut self.kind {
            reference.populate = Some(populate);
        }
        self
    }

    pub fn as_reference(&self) -> Option<&ReferenceSpec> {
        match &self.kind {
            FieldKind::Reference(reference) => Some(reference),
            _ => None,
        }
    }

    /// Whether the field may be used as a list filter
    pub fn is_filterable(&self) -> bool {
        self.index || self.taggable
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builders_only_touch_matching_kinds() {
        let name = FieldSpec::string("name").max_length(200).min(3).exists();
        assert_eq!(
            name.kind,
            FieldKind::String {
                trim: true,
                max_length: Some(200)
            }
        );

        let owner = FieldSpec::reference("owner", RefTarget::Party)
            .exists()
            .max_length(10)
            .populate(Populate::select(["name", "email"]));
        let reference = owner.as_reference().unwrap();
        assert!(reference.exists);
        assert_eq!(reference.target, RefTarget::Party);
        assert_eq!(reference.populate.as_ref().unwrap().max_depth, 1);
    }

    #[test]
    fn test_manifest_serialization() {
        let field = FieldSpec::reference("boundary", RefTarget::Feature)
            .index()
            .taggable()
            .exists()
            .populate(Populate::select(["name"]));
        let json = serde_json::to_value(&field).unwrap();

        assert_eq!(json["name"], "boundary");
        assert_eq!(json["kind"]["type"], "reference");
        assert_eq!(json["kind"]["target"], "Feature");
        assert_eq!(json["kind"]["populate"]["maxDepth"], 1);
        assert_eq!(json["taggable"], true);
        assert!(json.get("fake").is_none());
    }

    #[test]
    fn test_filterable() {
        assert!(FieldSpec::date("publishedAt").index().is_filterable());
        assert!(FieldSpec::enumeration("phase", ["Response"]).taggable().is_filterable());
        assert!(!FieldSpec::string("description").searchable().is_filterable());
    }
}
