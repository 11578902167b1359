// Governance module - admission of new entities by proposal and vote

mod admission;
mod proposal;

pub use proposal::{Proposal, ProposalGovernance, VoteOutcome};
