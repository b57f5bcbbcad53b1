//! Proposal data models
//!
//! Defines the structures for talk proposals, reviews and tags.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Proposal status in the moderation workflow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProposalStatus {
    /// Awaiting an admin decision
    Pending,
    /// Accepted for the conference
    Approved,
    /// Declined
    Rejected,
}

impl Default for ProposalStatus {
    fn default() -> Self {
        ProposalStatus::Pending
    }
}

impl ProposalStatus {
    pub fn values() -> [&'static str; 3] {
        ["pending", "approved", "rejected"]
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(ProposalStatus::Pending),
            "approved" => Some(ProposalStatus::Approved),
            "rejected" => Some(ProposalStatus::Rejected),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ProposalStatus::Pending => "pending",
            ProposalStatus::Approved => "approved",
            ProposalStatus::Rejected => "rejected",
        }
    }
}

/// A submitted talk proposal
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Proposal {
    pub id: Uuid,
    /// Owning speaker
    pub user_id: Uuid,
    pub title: String,
    pub description: String,
    /// Attached PDF, once one has been stored
    pub file_path: Option<String>,
    pub status: ProposalStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Proposal {
    pub fn new(user_id: Uuid, title: String, description: String, file_path: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id,
            title,
            description,
            file_path,
            status: ProposalStatus::Pending,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Review rating scale
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum ReviewRating {
    One,
    Two,
    Three,
    Four,
    Five,
    Ten,
}

impl ReviewRating {
    pub fn value(&self) -> u8 {
        match self {
            ReviewRating::One => 1,
            ReviewRating::Two => 2,
            ReviewRating::Three => 3,
            ReviewRating::Four => 4,
            ReviewRating::Five => 5,
            ReviewRating::Ten => 10,
        }
    }

    pub fn values() -> [u8; 6] {
        [1, 2, 3, 4, 5, 10]
    }

    pub fn min() -> u8 {
        1
    }

    pub fn max() -> u8 {
        10
    }

    pub fn from_value(value: u8) -> Option<Self> {
        match value {
            1 => Some(ReviewRating::One),
            2 => Some(ReviewRating::Two),
            3 => Some(ReviewRating::Three),
            4 => Some(ReviewRating::Four),
            5 => Some(ReviewRating::Five),
            10 => Some(ReviewRating::Ten),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ReviewRating::One => "1 - Poor",
            ReviewRating::Two => "2 - Fair",
            ReviewRating::Three => "3 - Good",
            ReviewRating::Four => "4 - Very Good",
            ReviewRating::Five => "5 - Excellent",
            ReviewRating::Ten => "10 - Outstanding",
        }
    }
}

impl From<ReviewRating> for u8 {
    fn from(rating: ReviewRating) -> u8 {
        rating.value()
    }
}

impl TryFrom<u8> for ReviewRating {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        ReviewRating::from_value(value).ok_or_else(|| format!("Invalid rating value: {}", value))
    }
}

/// A single reviewer's rating of one proposal. Immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Review {
    pub id: Uuid,
    pub proposal_id: Uuid,
    pub reviewer_id: Uuid,
    pub rating: ReviewRating,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Review {
    pub fn new(
        proposal_id: Uuid,
        reviewer_id: Uuid,
        rating: ReviewRating,
        comment: Option<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            proposal_id,
            reviewer_id,
            rating,
            comment,
            created_at: Utc::now(),
        }
    }
}

/// A topic tag, unique by name
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tag {
    pub id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

impl Tag {
    pub fn new(name: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            name,
            created_at: Utc::now(),
        }
    }
}

/// Proposal aggregate with relations loaded, as returned by the API
#[derive(Debug, Clone, Serialize)]
pub struct ProposalView {
    #[serde(flatten)]
    pub proposal: Proposal,
    pub author: AuthorView,
    pub tags: Vec<Tag>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avg_rating: Option<f64>,
    pub reviews_count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct AuthorView {
    pub id: Uuid,
    pub name: String,
    pub email: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_parse_round_trip() {
        for value in ProposalStatus::values() {
            let status = ProposalStatus::parse(value).unwrap();
            assert_eq!(status.as_str(), value);
        }
        assert!(ProposalStatus::parse("draft").is_none());
    }

    #[test]
    fn test_new_proposal_is_pending() {
        let p = Proposal::new(Uuid::new_v4(), "Title".into(), "Desc".into(), None);
        assert_eq!(p.status, ProposalStatus::Pending);
        assert!(p.file_path.is_none());
    }

    #[test]
    fn test_rating_values() {
        assert_eq!(ReviewRating::values(), [1, 2, 3, 4, 5, 10]);
        assert_eq!(ReviewRating::min(), 1);
        assert_eq!(ReviewRating::max(), 10);
        assert!(ReviewRating::from_value(6).is_none());
        assert!(ReviewRating::from_value(0).is_none());
        assert_eq!(ReviewRating::from_value(10), Some(ReviewRating::Ten));
    }

    #[test]
    fn test_rating_labels() {
        assert_eq!(ReviewRating::Five.label(), "5 - Excellent");
        assert_eq!(ReviewRating::Ten.label(), "10 - Outstanding");
    }

    #[test]
    fn test_rating_serde_as_number() {
        let json = serde_json::to_string(&ReviewRating::Ten).unwrap();
        assert_eq!(json, "10");
        let parsed: ReviewRating = serde_json::from_str("5").unwrap();
        assert_eq!(parsed, ReviewRating::Five);
        assert!(serde_json::from_str::<ReviewRating>("7").is_err());
    }
}
