// Entity registry - supply accounting for admitted entities

use crate::error::{EngineFault, LedgerError};
use crate::model::{checked_add, EntityId, Quantity};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Descriptor of a candidate entity
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityDescriptor {
    pub name: String,
    #[serde(default)]
    pub region: String,
    #[serde(default)]
    pub party: String,
}

impl EntityDescriptor {
    pub fn new(name: &str, region: &str, party: &str) -> Self {
        Self {
            name: name.trim().to_string(),
            region: region.trim().to_string(),
            party: party.trim().to_string(),
        }
    }

    pub fn id(&self) -> EntityId {
        EntityId::from(self.name.as_str())
    }
}

/// Token accounting for one entity.
///
/// `remaining + distributed == minted <= cap` holds at all times.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityToken {
    id: EntityId,
    descriptor: EntityDescriptor,
    cap: Quantity,
    minted: Quantity,
    remaining: Quantity,
    distributed: Quantity,
}

impl EntityToken {
    /// Launch with the whole supply minted into the distribution pool
    pub fn launch(descriptor: EntityDescriptor, supply: Quantity) -> Self {
        Self {
            id: descriptor.id(),
            descriptor,
            cap: supply,
            minted: supply,
            remaining: supply,
            distributed: 0,
        }
    }

    pub fn id(&self) -> &EntityId {
        &self.id
    }

    pub fn descriptor(&self) -> &EntityDescriptor {
        &self.descriptor
    }

    pub fn cap(&self) -> Quantity {
        self.cap
    }

    pub fn minted(&self) -> Quantity {
        self.minted
    }

    pub fn remaining(&self) -> Quantity {
        self.remaining
    }

    pub fn distributed(&self) -> Quantity {
        self.distributed
    }

    /// Whether `unit` tokens can still be handed out
    pub fn can_distribute(&self, unit: Quantity) -> bool {
        self.remaining >= unit
    }

    /// Move `unit` from the pool to distributed
    fn distribute(&mut self, unit: Quantity) -> Result<(), LedgerError> {
        if self.remaining < unit {
            return Err(LedgerError::InsufficientSupply {
                entity: self.id.to_string(),
                remaining: self.remaining,
                required: unit,
            });
        }
        self.remaining -= unit;
        self.distributed += unit;
        Ok(())
    }

    /// Supply conservation check
    pub fn check_supply(&self) -> Result<(), EngineFault> {
        let total = checked_add(self.remaining, self.distributed, "supply total")?;
        if total != self.minted || self.minted > self.cap {
            return Err(EngineFault::Invariant(format!(
                "supply of {} broken: remaining {} + distributed {} vs minted {} (cap {})",
                self.id, self.remaining, self.distributed, self.minted, self.cap
            )));
        }
        Ok(())
    }
}

/// Owns every admitted entity
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityRegistry {
    entities: BTreeMap<EntityId, EntityToken>,
}

impl EntityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn contains(&self, id: &EntityId) -> bool {
        self.entities.contains_key(id)
    }

    pub fn get(&self, id: &EntityId) -> Option<&EntityToken> {
        self.entities.get(id)
    }

    pub fn require(&self, id: &EntityId) -> Result<&EntityToken, LedgerError> {
        self.entities
            .get(id)
            .ok_or_else(|| LedgerError::EntityNotFound(id.to_string()))
    }

    pub fn iter(&self) -> impl Iterator<Item = &EntityToken> {
        self.entities.values()
    }

    /// Admit a new entity with its launch supply
    pub(crate) fn launch(&mut self, descriptor: EntityDescriptor, supply: Quantity) -> Result<EntityId, LedgerError> {
        let id = descriptor.id();
        if self.entities.contains_key(&id) {
            return Err(LedgerError::EntityExists(id.to_string()));
        }
        self.entities.insert(id.clone(), EntityToken::launch(descriptor, supply));
        Ok(id)
    }

    /// Take one allotment unit out of an entity's pool
    pub(crate) fn distribute(&mut self, id: &EntityId, unit: Quantity) -> Result<(), LedgerError> {
        self.entities
            .get_mut(id)
            .ok_or_else(|| LedgerError::EntityNotFound(id.to_string()))?
            .distribute(unit)
    }
}
