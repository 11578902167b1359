// Admission handlers - proposals and votes against the ledger state

use crate::config::EngineConfig;
use crate::error::{EngineFault, LedgerError, TxError};
use crate::governance::proposal::{Proposal, VoteOutcome};
use crate::ledger::{EntityDescriptor, LedgerState};
use crate::model::{AccountId, ProposalId};
use tracing::info;

impl LedgerState {
    /// Open an admission proposal for a new entity
    pub fn propose_entity(
        &mut self,
        proposer: &AccountId,
        candidate: EntityDescriptor,
    ) -> Result<ProposalId, TxError> {
        if candidate.name.is_empty() {
            return Err(LedgerError::InvalidField("candidate name is empty".to_string()).into());
        }
        if candidate.region.is_empty() {
            return Err(LedgerError::InvalidField("candidate region is empty".to_string()).into());
        }
        if candidate.party.is_empty() {
            return Err(LedgerError::InvalidField("candidate party is empty".to_string()).into());
        }
        if self.entities.contains(&candidate.id()) {
            return Err(LedgerError::EntityExists(candidate.name).into());
        }
        if self.governance.has_open_for(&candidate.name) {
            return Err(LedgerError::ProposalAlreadyOpen(candidate.name).into());
        }

        let sequence = self.next_sequence()?;
        let id = ProposalId::derive(proposer, sequence);
        self.governance
            .submit(Proposal::new(id.clone(), candidate, proposer.clone()))?;
        Ok(id)
    }

    /// Record a vote; the vote that reaches the threshold launches the entity
    pub fn vote_on_proposal(
        &mut self,
        config: &EngineConfig,
        id: &ProposalId,
        voter: &AccountId,
        choice: bool,
    ) -> Result<VoteOutcome, TxError> {
        let proposal = self.governance.validate_vote(id, voter)?;
        let candidate = proposal.candidate().id();
        if proposal.would_approve(choice, config.vote_threshold) && self.entities.contains(&candidate) {
            // submission refuses names already in the registry
            return Err(EngineFault::Invariant(format!(
                "proposal {} approves existing entity {}",
                id, candidate
            ))
            .into());
        }

        let outcome = self
            .governance
            .vote(id, voter, choice, config.vote_threshold)?;
        if let VoteOutcome::Approved(descriptor) = &outcome {
            let entity = self
                .entities
                .launch(descriptor.clone(), config.launch_supply)
                .map_err(|e| EngineFault::Invariant(e.to_string()))?;
            info!(proposal = %id, entity = %entity, supply = config.launch_supply, "entity promoted");
        }
        Ok(outcome)
    }
}
