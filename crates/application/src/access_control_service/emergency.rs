use super::*;

impl AccessControlService {
    /// Issues a time-bounded emergency override for a subject on a resource.
    pub async fn grant_emergency_access(
        &self,
        ctx: &TransactionContext,
        request: EmergencyAccessRequest,
    ) -> AppResult<EmergencyOverride> {
        validate_identifier("subject_id", request.subject_id.as_str())?;
        validate_identifier("resource_id", request.resource_id.as_str())?;

        let duration = Duration::minutes(i64::from(request.duration_minutes));
        if request.duration_minutes == 0 || duration > self.policy.max_emergency_duration {
            return Err(AppError::Validation(format!(
                "duration_minutes must be between 1 and {}",
                self.policy.max_emergency_duration.num_minutes()
            )));
        }

        let emergency = EmergencyOverride::new(
            request.subject_id.as_str(),
            request.resource_id.as_str(),
            ctx.caller().subject(),
            request.reason.as_str(),
            ctx.timestamp(),
            ctx.timestamp() + duration,
        )?;

        let mut tx = self.ledger.begin().await?;
        self.require_administrator(tx.as_mut(), ctx, emergency.resource_id())
            .await?;
        self.emergency_overrides.put(tx.as_mut(), &emergency).await?;
        self.decision_cache
            .invalidate_all(tx.as_mut(), emergency.subject_id(), emergency.resource_id())
            .await?;

        self.audit
            .record(
                tx.as_mut(),
                ctx,
                AuditRecord::new(AuditAction::EmergencyGranted, emergency.resource_id())
                    .with_target(emergency.subject_id())
                    .with_metadata("reason", emergency.reason())
                    .with_metadata("duration_minutes", request.duration_minutes.to_string())
                    .with_metadata("expires_at", emergency.expires_at().to_rfc3339()),
            )
            .await;
        tx.commit().await?;

        info!(
            subject_id = emergency.subject_id(),
            resource_id = emergency.resource_id(),
            granted_by = emergency.granted_by(),
            expires_at = %emergency.expires_at(),
            "issued emergency override"
        );
        Ok(emergency)
    }

    /// Withdraws the emergency override for a subject on a resource.
    pub async fn revoke_emergency_access(
        &self,
        ctx: &TransactionContext,
        subject_id: &str,
        resource_id: &str,
    ) -> AppResult<()> {
        validate_identifier("subject_id", subject_id)?;
        validate_identifier("resource_id", resource_id)?;

        let mut tx = self.ledger.begin().await?;
        self.require_administrator(tx.as_mut(), ctx, resource_id).await?;

        let emergency = self
            .emergency_overrides
            .find(tx.as_mut(), subject_id, resource_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!(
                    "no emergency override for '{subject_id}' on resource '{resource_id}'"
                ))
            })?;

        self.emergency_overrides
            .remove(tx.as_mut(), subject_id, resource_id)
            .await?;
        self.decision_cache
            .invalidate_all(tx.as_mut(), subject_id, resource_id)
            .await?;

        self.audit
            .record(
                tx.as_mut(),
                ctx,
                AuditRecord::new(AuditAction::EmergencyRevoked, resource_id)
                    .with_target(subject_id)
                    .with_metadata("granted_by", emergency.granted_by())
                    .with_metadata("was_active", emergency.is_active(ctx.timestamp()).to_string()),
            )
            .await;
        tx.commit().await?;

        info!(subject_id, resource_id, "withdrew emergency override");
        Ok(())
    }
}
