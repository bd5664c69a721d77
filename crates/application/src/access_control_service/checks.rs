use super::*;

impl AccessControlService {
    /// Decides whether the subject may perform the action on the resource.
    ///
    /// Denial is a normal result. Errors are raised only for malformed input
    /// or an unreachable store. Every check is audited, including cache hits.
    pub async fn check_access(
        &self,
        ctx: &TransactionContext,
        request: CheckAccessRequest,
    ) -> AppResult<AccessDecision> {
        validate_identifier("subject_id", request.subject_id.as_str())?;
        validate_identifier("resource_id", request.resource_id.as_str())?;
        let action = Permission::new(request.action.as_str())?;
        let resource_type = request
            .resource_type
            .as_deref()
            .map(str::trim)
            .filter(|resource_type| !resource_type.is_empty());
        if let Some(resource_type) = resource_type {
            validate_identifier("resource_type", resource_type)?;
        }

        let query = AccessQuery {
            subject_id: request.subject_id.as_str(),
            resource_id: request.resource_id.as_str(),
            action: &action,
            resource_type,
        };

        let mut tx = self.ledger.begin().await?;
        let decision = match self
            .decision_cache
            .lookup(
                tx.as_mut(),
                query.subject_id,
                query.resource_id,
                query.action,
                query.resource_type,
                ctx.timestamp(),
            )
            .await?
        {
            Some(cached) => {
                debug!(
                    subject_id = query.subject_id,
                    resource_id = query.resource_id,
                    action = query.action.as_str(),
                    "decision cache hit"
                );
                AccessDecision {
                    allowed: cached.allowed,
                    reason: cached.reason,
                    grant_id: cached.grant_id,
                    source: DecisionSource::Cache,
                }
            }
            None => {
                debug!(
                    subject_id = query.subject_id,
                    resource_id = query.resource_id,
                    action = query.action.as_str(),
                    "decision cache miss"
                );
                self.evaluate_and_cache(tx.as_mut(), ctx, query).await?
            }
        };

        self.audit
            .record(tx.as_mut(), ctx, decision_audit_record(query, &decision))
            .await;
        tx.commit().await?;

        Ok(decision)
    }

    async fn evaluate_and_cache(
        &self,
        tx: &mut dyn LedgerTransaction,
        ctx: &TransactionContext,
        query: AccessQuery<'_>,
    ) -> AppResult<AccessDecision> {
        let evaluation = self.evaluator.evaluate(tx, query, ctx.timestamp()).await?;

        if evaluation.emergency.is_none() {
            self.decision_cache
                .store(
                    tx,
                    query.subject_id,
                    query.resource_id,
                    query.action,
                    query.resource_type,
                    &CachedDecision {
                        allowed: evaluation.decision.allowed,
                        reason: evaluation.decision.reason.clone(),
                        grant_id: evaluation.decision.grant_id.clone(),
                        decided_at: ctx.timestamp(),
                        stable_until: evaluation.stable_until,
                    },
                )
                .await?;
        }

        Ok(evaluation.decision)
    }
}

fn decision_audit_record(query: AccessQuery<'_>, decision: &AccessDecision) -> AuditRecord {
    let action = match (decision.allowed, decision.source) {
        (true, DecisionSource::Emergency) => AuditAction::EmergencyAccess,
        (true, _) => AuditAction::AccessAllowed,
        (false, _) => AuditAction::AccessDenied,
    };

    let record = AuditRecord::new(action, query.resource_id)
        .with_target(query.subject_id)
        .with_grant(decision.grant_id.clone())
        .with_metadata("action", query.action.as_str())
        .with_metadata("reason", decision.reason.as_str())
        .with_metadata("source", decision.source.as_str());

    match query.resource_type {
        Some(resource_type) => record.with_metadata("resource_type", resource_type),
        None => record,
    }
}
