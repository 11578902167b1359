// Proposal governance - entities are admitted by vote
//
// open --vote--> open (tally updated)
// open --vote reaching threshold--> approved: entity launched, proposal removed
//
// There is no rejection transition; a proposal short of the threshold stays open.

use crate::error::LedgerError;
use crate::ledger::EntityDescriptor;
use crate::model::{AccountId, ProposalId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// An open admission proposal
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proposal {
    id: ProposalId,
    candidate: EntityDescriptor,
    proposer: AccountId,
    votes: BTreeMap<AccountId, bool>,
    yes_votes: u64,
    no_votes: u64,
}

impl Proposal {
    pub fn new(id: ProposalId, candidate: EntityDescriptor, proposer: AccountId) -> Self {
        Self {
            id,
            candidate,
            proposer,
            votes: BTreeMap::new(),
            yes_votes: 0,
            no_votes: 0,
        }
    }

    pub fn id(&self) -> &ProposalId {
        &self.id
    }

    pub fn candidate(&self) -> &EntityDescriptor {
        &self.candidate
    }

    pub fn proposer(&self) -> &AccountId {
        &self.proposer
    }

    pub fn yes_votes(&self) -> u64 {
        self.yes_votes
    }

    pub fn no_votes(&self) -> u64 {
        self.no_votes
    }

    pub fn has_voted(&self, voter: &AccountId) -> bool {
        self.votes.contains_key(voter)
    }

    pub fn vote_of(&self, voter: &AccountId) -> Option<bool> {
        self.votes.get(voter).copied()
    }

    /// Whether one more vote with this choice reaches the threshold
    pub fn would_approve(&self, choice: bool, threshold: u64) -> bool {
        choice && self.yes_votes.saturating_add(1) >= threshold
    }

    fn record(&mut self, voter: AccountId, choice: bool) {
        self.votes.insert(voter, choice);
        if choice {
            self.yes_votes += 1;
        } else {
            self.no_votes += 1;
        }
    }
}

/// Result of a successful vote
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum VoteOutcome {
    /// Tally updated, proposal still open
    Recorded { yes: u64, no: u64 },
    /// Threshold reached; the proposal is gone and its candidate must be launched
    Approved(EntityDescriptor),
}

/// Owns every open proposal
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposalGovernance {
    proposals: BTreeMap<ProposalId, Proposal>,
}

impl ProposalGovernance {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.proposals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.proposals.is_empty()
    }

    pub fn get(&self, id: &ProposalId) -> Option<&Proposal> {
        self.proposals.get(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Proposal> {
        self.proposals.values()
    }

    /// Whether an open proposal already names this candidate
    pub fn has_open_for(&self, name: &str) -> bool {
        self.proposals.values().any(|p| p.candidate.name == name)
    }

    /// Open a proposal. The caller checks the entity registry.
    pub(crate) fn submit(&mut self, proposal: Proposal) -> Result<(), LedgerError> {
        if self.has_open_for(&proposal.candidate.name) {
            return Err(LedgerError::ProposalAlreadyOpen(proposal.candidate.name.clone()));
        }
        if self.proposals.contains_key(&proposal.id) {
            return Err(LedgerError::ProposalAlreadyOpen(proposal.id.to_string()));
        }
        self.proposals.insert(proposal.id.clone(), proposal);
        Ok(())
    }

    /// Check that a vote would be accepted, without recording it
    pub fn validate_vote(&self, id: &ProposalId, voter: &AccountId) -> Result<&Proposal, LedgerError> {
        let proposal = self
            .proposals
            .get(id)
            .ok_or_else(|| LedgerError::ProposalNotFound(id.to_string()))?;
        if proposal.has_voted(voter) {
            return Err(LedgerError::DuplicateVote {
                proposal: id.to_string(),
                voter: voter.to_string(),
            });
        }
        Ok(proposal)
    }

    /// Record a vote; on reaching the threshold the proposal is removed
    pub(crate) fn vote(
        &mut self,
        id: &ProposalId,
        voter: &AccountId,
        choice: bool,
        threshold: u64,
    ) -> Result<VoteOutcome, LedgerError> {
        self.validate_vote(id, voter)?;
        let proposal = self
            .proposals
            .get_mut(id)
            .ok_or_else(|| LedgerError::ProposalNotFound(id.to_string()))?;
        proposal.record(voter.clone(), choice);

        if proposal.yes_votes >= threshold {
            let candidate = proposal.candidate.clone();
            self.proposals.remove(id);
            return Ok(VoteOutcome::Approved(candidate));
        }
        Ok(VoteOutcome::Recorded {
            yes: proposal.yes_votes,
            no: proposal.no_votes,
        })
    }
}
