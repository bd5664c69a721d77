use super::*;

impl AccessControlService {
    /// Registers a resource owned by the caller.
    pub async fn register_resource(
        &self,
        ctx: &TransactionContext,
        request: RegisterResourceRequest,
    ) -> AppResult<ResourceRecord> {
        let mut tx = self.ledger.begin().await?;
        let record = self
            .registry
            .register(
                tx.as_mut(),
                ctx,
                request.resource_id.as_str(),
                request.resource_type.as_str(),
            )
            .await?;

        self.audit
            .record(
                tx.as_mut(),
                ctx,
                AuditRecord::new(AuditAction::ResourceRegistered, record.resource_id())
                    .with_metadata("resource_type", record.resource_type()),
            )
            .await;
        tx.commit().await?;

        info!(
            resource_id = record.resource_id(),
            owner_id = record.owner_id(),
            tx_id = ctx.tx_id(),
            "registered resource"
        );
        Ok(record)
    }

    /// Returns one registered resource.
    pub async fn get_resource(
        &self,
        _ctx: &TransactionContext,
        resource_id: &str,
    ) -> AppResult<ResourceRecord> {
        validate_identifier("resource_id", resource_id)?;
        let mut tx = self.ledger.begin().await?;
        self.registry.get(tx.as_mut(), resource_id).await
    }

    pub(super) async fn require_administrator(
        &self,
        tx: &mut dyn LedgerTransaction,
        ctx: &TransactionContext,
        resource_id: &str,
    ) -> AppResult<ResourceRecord> {
        let resource = self.registry.get(tx, resource_id).await?;
        self.authorizer
            .authorize_administration(tx, ctx.caller().subject(), &resource, ctx.timestamp())
            .await?;
        Ok(resource)
    }
}
