use tracing::{debug, info, instrument};

use core_kernel::FeeStructureId;

use crate::error::{BillingError, BillingResult};
use crate::fee::{FeeStructure, FeeStructureKey};

use super::{found, BillingContext};

/// Maintains fee structures
#[derive(Clone)]
pub struct FeeCatalog {
    ctx: BillingContext,
}

impl FeeCatalog {
    pub fn new(ctx: BillingContext) -> Self {
        Self { ctx }
    }

    /// Creates a structure, or replaces the one already saved under its key
    ///
    /// Replacing keeps the existing identity and swaps in the incoming rate,
    /// status and complete item list.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` if the structure fails validation.
    #[instrument(skip(self, structure), fields(key = %structure.key))]
    pub async fn save(&self, structure: FeeStructure) -> BillingResult<FeeStructure> {
        structure.validate()?;
        let now = self.ctx.now();

        let mut tx = self.ctx.begin().await?;
        let saved = match tx.find_fee_structure(&structure.key).await? {
            Some(mut existing) => {
                existing.replace_with(structure, now);
                tx.replace_fee_structure(&existing).await?;
                info!(fee_structure_id = %existing.id, items = existing.items.len(), "Fee structure replaced");
                existing
            }
            None => {
                let structure = structure.created(now);
                tx.insert_fee_structure(&structure).await?;
                info!(fee_structure_id = %structure.id, items = structure.items.len(), "Fee structure created");
                structure
            }
        };
        tx.commit().await?;
        Ok(saved)
    }

    /// Finds the structure saved under a key, whatever its status
    #[instrument(skip(self, key), fields(key = %key))]
    pub async fn lookup(&self, key: &FeeStructureKey) -> BillingResult<FeeStructure> {
        let mut tx = self.ctx.begin().await?;
        let structure = tx.find_fee_structure(key).await?;
        debug!(found = structure.is_some(), "Fee structure lookup");
        found(structure, "Fee structure", key)
    }

    pub async fn get(&self, id: FeeStructureId) -> BillingResult<FeeStructure> {
        let mut tx = self.ctx.begin().await?;
        found(tx.get_fee_structure(id).await?, "Fee structure", id)
    }

    pub async fn list(&self) -> BillingResult<Vec<FeeStructure>> {
        let mut tx = self.ctx.begin().await?;
        Ok(tx.list_fee_structures().await?)
    }

    /// Deletes a structure together with its items
    #[instrument(skip(self, id), fields(fee_structure_id = %id))]
    pub async fn delete(&self, id: FeeStructureId) -> BillingResult<()> {
        let mut tx = self.ctx.begin().await?;
        if !tx.delete_fee_structure(id).await? {
            return Err(BillingError::not_found("Fee structure", id));
        }
        tx.commit().await?;
        info!("Fee structure deleted");
        Ok(())
    }
}
