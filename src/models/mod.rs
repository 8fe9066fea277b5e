use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ── Profile record ────────────────────────────────────────────────────────────

/// One fully parsed profile. Field order is the serialized key order; keep it sorted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProfileRecord {
    pub avatar_url: String,
    pub display_name: String,
    pub extra_attributes: BTreeMap<ExtraKey, String>,
    pub gender: Gender,
    pub thanks_count: u64,
    pub upvote_count: u64,
    pub url: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
    #[default]
    Unknown,
}

impl Gender {
    /// Classify the icon class token of the gender marker, e.g. `icon-profile-female`.
    pub fn from_marker_class(token: &str) -> Self {
        // "female" contains "male", so it must be checked first.
        if token.contains("female") {
            Gender::Female
        } else if token.contains("male") {
            Gender::Male
        } else {
            Gender::Unknown
        }
    }
}

/// Optional profile categories. Declaration order is the alphabetical key order.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum ExtraKey {
    Education,
    EducationExtra,
    Employment,
    Location,
    Position,
}

impl ExtraKey {
    pub const ALL: [ExtraKey; 5] = [
        ExtraKey::Education,
        ExtraKey::EducationExtra,
        ExtraKey::Employment,
        ExtraKey::Location,
        ExtraKey::Position,
    ];

    /// CSS class carried by the category's `<span class="... item">` node.
    pub fn css_class(self) -> &'static str {
        match self {
            ExtraKey::Education => "education",
            ExtraKey::EducationExtra => "education-extra",
            ExtraKey::Employment => "employment",
            ExtraKey::Location => "location",
            ExtraKey::Position => "position",
        }
    }
}

// ── Listing page ──────────────────────────────────────────────────────────────

/// Entries of one follower listing page, in server order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListingPage {
    pub entry_ids: Vec<u64>,
    pub profile_urls: Vec<String>,
}

impl ListingPage {
    pub fn len(&self) -> usize {
        self.entry_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entry_ids.is_empty()
    }

    pub fn last_id(&self) -> Option<u64> {
        self.entry_ids.last().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gender_marker_classification() {
        assert_eq!(Gender::from_marker_class("icon-profile-female"), Gender::Female);
        assert_eq!(Gender::from_marker_class("icon-profile-male"), Gender::Male);
        assert_eq!(Gender::from_marker_class("icon-profile-other"), Gender::Unknown);
        assert_eq!(Gender::from_marker_class(""), Gender::Unknown);
    }

    #[test]
    fn record_serializes_with_sorted_keys() {
        let mut extra = BTreeMap::new();
        extra.insert(ExtraKey::Position, "流程设计".to_string());
        extra.insert(ExtraKey::EducationExtra, "CS".to_string());
        let record = ProfileRecord {
            avatar_url: "https://pic/a.jpg".into(),
            display_name: "alice".into(),
            extra_attributes: extra,
            gender: Gender::Female,
            thanks_count: 3,
            upvote_count: 12,
            url: "https://www.zhihu.com/people/alice".into(),
        };

        let json = serde_json::to_string(&record).unwrap();
        assert_eq!(
            json,
            r#"{"avatar_url":"https://pic/a.jpg","display_name":"alice","extra_attributes":{"education-extra":"CS","position":"流程设计"},"gender":"female","thanks_count":3,"upvote_count":12,"url":"https://www.zhihu.com/people/alice"}"#
        );
    }
}
