use super::*;

impl AccessControlService {
    /// Returns the newest audit entries for a resource to its owner or an administrator.
    pub async fn resource_audit_trail(
        &self,
        ctx: &TransactionContext,
        resource_id: &str,
        limit: usize,
    ) -> AppResult<Vec<AuditEntry>> {
        validate_identifier("resource_id", resource_id)?;
        if limit == 0 || limit > MAX_AUDIT_PAGE {
            return Err(AppError::Validation(format!(
                "limit must be between 1 and {MAX_AUDIT_PAGE}"
            )));
        }

        let mut tx = self.ledger.begin().await?;
        self.require_administrator(tx.as_mut(), ctx, resource_id).await?;
        self.audit
            .list_for_resource(tx.as_mut(), resource_id, limit)
            .await
    }

    /// Returns entries in `[from, to)` for resources the caller owns or administers.
    pub async fn audit_window(
        &self,
        ctx: &TransactionContext,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> AppResult<Vec<AuditEntry>> {
        let mut tx = self.ledger.begin().await?;
        let entries = self.audit.list_between(tx.as_mut(), from, to).await?;

        let caller = ctx.caller().subject();
        let mut visible: BTreeMap<String, bool> = BTreeMap::new();
        let mut permitted = Vec::with_capacity(entries.len());

        for entry in entries {
            let allowed = match visible.get(entry.resource_id.as_str()) {
                Some(allowed) => *allowed,
                None => {
                    let resource = self
                        .registry
                        .find(tx.as_mut(), entry.resource_id.as_str())
                        .await?;
                    let allowed = self
                        .authorizer
                        .is_administrator(
                            tx.as_mut(),
                            caller,
                            entry.resource_id.as_str(),
                            resource.as_ref(),
                            ctx.timestamp(),
                        )
                        .await?;
                    visible.insert(entry.resource_id.clone(), allowed);
                    allowed
                }
            };

            if allowed {
                permitted.push(entry);
            }
        }

        Ok(permitted)
    }
}
