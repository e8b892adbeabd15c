// Credit ledger: admin grants and the per-user statement. Consumption rows
// are written only by the billing engine on successful guarded debits.

use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::app::AppState;
use crate::config::{Action, PolicyTable};
use crate::db::DieselPool;
use crate::middleware::AuthenticatedUser;
use crate::models::credit::{CreditTransaction, GrantCreditsRequest, NewCreditTransaction};
use crate::utils::audit_logger::{AuditAction, AuditLogger};
use crate::utils::service_error::ServiceError;

const STATEMENT_LIMIT: i64 = 50;

pub struct CreditService {
    pool: DieselPool,
}

impl CreditService {
    pub fn new(state: &AppState) -> Self {
        Self {
            pool: state.diesel_pool.clone(),
        }
    }

    /// Admin grant: balance increment and recharge ledger row in one
    /// transaction. Returns the new balance.
    #[instrument(skip(self, principal, request))]
    pub async fn grant(
        &self,
        principal: &AuthenticatedUser,
        target_user: Uuid,
        request: GrantCreditsRequest,
    ) -> Result<i64, ServiceError> {
        use crate::schema::users::dsl as u;

        if !PolicyTable::is_allowed(Action::GrantCredits, principal.role) {
            return Err(ServiceError::Forbidden(
                "Credit grants require an admin".to_string(),
            ));
        }

        if request.amount <= 0 {
            return Err(ServiceError::ValidationError(
                "Amount must be positive".to_string(),
            ));
        }

        let amount = request.amount;
        let description = request
            .description
            .unwrap_or_else(|| "Crédito adicionado pela equipe".to_string());

        let mut conn = self.pool.get().await?;
        let new_balance = conn
            .build_transaction()
            .run::<_, ServiceError, _>(|conn| {
                Box::pin(async move {
                    let balance: i64 = diesel::update(
                        u::users
                            .filter(u::id.eq(target_user))
                            .filter(u::deleted_at.is_null()),
                    )
                    .set(u::balance.eq(u::balance + amount))
                    .returning(u::balance)
                    .get_result(conn)
                    .await
                    .optional()?
                    .ok_or(ServiceError::NotFound)?;

                    let row = NewCreditTransaction::recharge(target_user, amount, description);
                    diesel::insert_into(crate::schema::credit_transactions::table)
                        .values(&row)
                        .execute(conn)
                        .await?;

                    Ok(balance)
                })
            })
            .await?;

        info!(
            "Granted {} credits to {} (balance now {})",
            amount, target_user, new_balance
        );
        AuditLogger::log_user_action(
            AuditAction::CreditsGranted,
            principal.user_id,
            target_user,
            Some(format!("Granted {} credits", amount)),
        );

        Ok(new_balance)
    }

    /// Latest ledger rows for the requesting user, newest first
    #[instrument(skip(self, principal))]
    pub async fn statement(
        &self,
        principal: &AuthenticatedUser,
    ) -> Result<Vec<CreditTransaction>, ServiceError> {
        use crate::schema::credit_transactions::dsl;

        let mut conn = self.pool.get().await?;
        let rows = dsl::credit_transactions
            .filter(dsl::user_id.eq(principal.user_id))
            .order(dsl::created_at.desc())
            .limit(STATEMENT_LIMIT)
            .select(CreditTransaction::as_select())
            .load(&mut conn)
            .await?;

        Ok(rows)
    }
}
