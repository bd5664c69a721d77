use std::collections::BTreeSet;

use super::*;

impl AccessControlService {
    /// Issues a grant after confirming the caller may hand out the permissions.
    pub async fn grant_access(
        &self,
        ctx: &TransactionContext,
        request: GrantAccessRequest,
    ) -> AppResult<AccessGrant> {
        let input = self.validate_grant_request(ctx, request)?;

        let mut tx = self.ledger.begin().await?;
        let resource = self.registry.get(tx.as_mut(), input.resource_id.as_str()).await?;
        let authority = self
            .authorizer
            .authorize_grant(
                tx.as_mut(),
                ctx.caller().subject(),
                &resource,
                &input.permissions,
                &input.resource_types,
                ctx.timestamp(),
            )
            .await?;

        let grant = self.grant_store.create_grant(tx.as_mut(), ctx, input).await?;
        self.decision_cache
            .invalidate_all(tx.as_mut(), grant.grantee_id(), grant.resource_id())
            .await?;

        self.audit
            .record(
                tx.as_mut(),
                ctx,
                AuditRecord::new(AuditAction::GrantCreated, grant.resource_id())
                    .with_target(grant.grantee_id())
                    .with_grant(Some(grant.grant_id().as_str().to_owned()))
                    .with_metadata("permissions", join_permissions(&grant))
                    .with_metadata("authority", authority.as_str())
                    .with_metadata("valid_from", grant.valid_from().to_rfc3339())
                    .with_metadata("expires_at", grant.expires_at().to_rfc3339()),
            )
            .await;
        tx.commit().await?;

        info!(
            grant_id = grant.grant_id().as_str(),
            resource_id = grant.resource_id(),
            grantee_id = grant.grantee_id(),
            grantor_id = grant.grantor_id(),
            expires_at = %grant.expires_at(),
            "created access grant"
        );
        self.publish(grant_event(&grant, GrantEventAction::Granted, ctx.timestamp()))
            .await;

        Ok(grant)
    }

    /// Revokes a grant immediately or at the end of the current UTC day.
    pub async fn revoke_access(
        &self,
        ctx: &TransactionContext,
        request: RevokeAccessRequest,
    ) -> AppResult<AccessGrant> {
        let grant_id = GrantId::new(request.grant_id)?;
        let reason = request.reason.trim();
        if reason.is_empty() {
            return Err(AppError::Validation(
                "revocation reason must not be empty".to_owned(),
            ));
        }

        let mut tx = self.ledger.begin().await?;
        let grant = self.grant_store.get_grant(tx.as_mut(), &grant_id).await?;
        let resource = self.registry.find(tx.as_mut(), grant.resource_id()).await?;
        self.authorizer
            .authorize_revoke(
                tx.as_mut(),
                ctx.caller().subject(),
                &grant,
                resource.as_ref(),
                ctx.timestamp(),
            )
            .await?;

        let revoked = self
            .grant_store
            .revoke_grant(
                tx.as_mut(),
                &grant_id,
                ctx.caller().subject(),
                reason,
                request.immediate,
                ctx.timestamp(),
            )
            .await?;
        self.decision_cache
            .invalidate_all(tx.as_mut(), revoked.grantee_id(), revoked.resource_id())
            .await?;

        self.audit
            .record(
                tx.as_mut(),
                ctx,
                AuditRecord::new(AuditAction::GrantRevoked, revoked.resource_id())
                    .with_target(revoked.grantee_id())
                    .with_grant(Some(grant_id.as_str().to_owned()))
                    .with_metadata("immediate", request.immediate.to_string())
                    .with_metadata("reason", reason)
                    .with_metadata("expires_at", revoked.expires_at().to_rfc3339()),
            )
            .await;
        tx.commit().await?;

        info!(
            grant_id = grant_id.as_str(),
            resource_id = revoked.resource_id(),
            grantee_id = revoked.grantee_id(),
            immediate = request.immediate,
            expires_at = %revoked.expires_at(),
            "revoked access grant"
        );
        self.publish(grant_event(&revoked, GrantEventAction::Revoked, ctx.timestamp()))
            .await;

        Ok(revoked)
    }

    /// Returns one grant to its grantor, its grantee or a resource administrator.
    pub async fn get_grant(&self, ctx: &TransactionContext, grant_id: &str) -> AppResult<GrantView> {
        let grant_id = GrantId::new(grant_id)?;
        let caller = ctx.caller().subject();

        let mut tx = self.ledger.begin().await?;
        let grant = self.grant_store.get_grant(tx.as_mut(), &grant_id).await?;

        if grant.grantor_id() != caller && grant.grantee_id() != caller {
            let resource = self.registry.find(tx.as_mut(), grant.resource_id()).await?;
            let is_administrator = self
                .authorizer
                .is_administrator(
                    tx.as_mut(),
                    caller,
                    grant.resource_id(),
                    resource.as_ref(),
                    ctx.timestamp(),
                )
                .await?;
            if !is_administrator {
                return Err(AppError::NotAuthorized(format!(
                    "'{caller}' may not read grant '{grant_id}'"
                )));
            }
        }

        Ok(GrantView::at(grant, ctx.timestamp()))
    }

    /// Lists every grant held by the subject; only the subject may ask.
    pub async fn query_grants(
        &self,
        ctx: &TransactionContext,
        subject_id: &str,
    ) -> AppResult<Vec<GrantView>> {
        validate_identifier("subject_id", subject_id)?;
        if ctx.caller().subject() != subject_id {
            return Err(AppError::NotAuthorized(format!(
                "'{}' may not list grants held by '{subject_id}'",
                ctx.caller().subject()
            )));
        }

        let mut tx = self.ledger.begin().await?;
        let grants = self
            .grant_store
            .list_grants_for_grantee(tx.as_mut(), subject_id)
            .await?;

        Ok(grants
            .into_iter()
            .map(|grant| GrantView::at(grant, ctx.timestamp()))
            .collect())
    }

    /// Lists every grant issued on a resource to its owner or an administrator.
    pub async fn query_resource_grants(
        &self,
        ctx: &TransactionContext,
        resource_id: &str,
    ) -> AppResult<Vec<GrantView>> {
        validate_identifier("resource_id", resource_id)?;

        let mut tx = self.ledger.begin().await?;
        self.require_administrator(tx.as_mut(), ctx, resource_id).await?;
        let grants = self
            .grant_store
            .list_grants_for_resource(tx.as_mut(), resource_id)
            .await?;

        Ok(grants
            .into_iter()
            .map(|grant| GrantView::at(grant, ctx.timestamp()))
            .collect())
    }

    fn validate_grant_request(
        &self,
        ctx: &TransactionContext,
        request: GrantAccessRequest,
    ) -> AppResult<CreateGrantInput> {
        validate_identifier("resource_id", request.resource_id.as_str())?;
        validate_identifier("grantee_id", request.grantee_id.as_str())?;
        let permissions = parse_permission_set(&request.permissions)?;

        let resource_types: BTreeSet<String> = request
            .resource_types
            .iter()
            .map(|resource_type| -> AppResult<String> {
                let resource_type = resource_type.trim();
                validate_identifier("resource_type", resource_type)?;
                Ok(resource_type.to_owned())
            })
            .collect::<AppResult<_>>()?;

        if request.conditions.keys().any(|key| key.trim().is_empty()) {
            return Err(AppError::Validation(
                "condition keys must not be empty".to_owned(),
            ));
        }

        let expires_at = match (request.expiration_hours, request.expires_at) {
            (Some(_), Some(_)) => {
                return Err(AppError::Validation(
                    "expiration_hours and expires_at are mutually exclusive".to_owned(),
                ));
            }
            (Some(0), None) => {
                return Err(AppError::Validation(
                    "expiration_hours must be greater than zero".to_owned(),
                ));
            }
            (Some(hours), None) => {
                let start = request.valid_from.unwrap_or(ctx.timestamp());
                let expires_at = start
                    .checked_add_signed(Duration::hours(i64::from(hours)))
                    .ok_or_else(|| {
                        AppError::InvalidTimeRange(format!(
                            "expiration_hours {hours} overflows the calendar"
                        ))
                    })?;
                Some(expires_at)
            }
            (None, expires_at) => expires_at,
        };

        Ok(CreateGrantInput {
            resource_id: request.resource_id,
            grantor_id: ctx.caller().subject().to_owned(),
            grantee_id: request.grantee_id,
            permissions,
            resource_types,
            valid_from: request.valid_from,
            expires_at,
            conditions: request.conditions,
        })
    }
}

fn join_permissions(grant: &AccessGrant) -> String {
    grant
        .permissions()
        .iter()
        .map(Permission::as_str)
        .collect::<Vec<_>>()
        .join(",")
}
