//! Proposal domain: models, stores and lifecycle orchestration

pub mod models;
pub mod service;
pub mod store;

pub use models::{AuthorView, Proposal, ProposalStatus, ProposalView, Review, ReviewRating, Tag};
pub use service::{
    CreateProposalInput, ProposalListQuery, ProposalService, UpdateProposalInput,
};
pub use store::{ProposalStore, ReviewStore, TagStore};
