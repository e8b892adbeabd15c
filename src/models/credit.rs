// Credit ledger: immutable rows, negative amounts are consumption

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::schema::credit_transactions;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum TransactionKind {
    Recharge,
    Consumption,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::Recharge => "recharge",
            TransactionKind::Consumption => "consumption",
        }
    }
}

#[derive(Debug, Clone, Queryable, Selectable, Identifiable, Serialize, ToSchema)]
#[diesel(table_name = credit_transactions)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct CreditTransaction {
    pub id: Uuid,
    pub user_id: Uuid,
    pub ad_id: Option<Uuid>,
    pub amount: i64,
    pub kind: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = credit_transactions)]
pub struct NewCreditTransaction {
    pub id: Uuid,
    pub user_id: Uuid,
    pub ad_id: Option<Uuid>,
    pub amount: i64,
    pub kind: String,
    pub description: String,
}

impl NewCreditTransaction {
    /// Ledger row for a successful guarded debit
    pub fn consumption(user_id: Uuid, ad_id: Uuid, cost: i64, event: &str) -> Self {
        NewCreditTransaction {
            id: Uuid::new_v4(),
            user_id,
            ad_id: Some(ad_id),
            amount: -cost,
            kind: TransactionKind::Consumption.as_str().to_string(),
            description: format!("Ad {} charge", event),
        }
    }

    pub fn recharge(user_id: Uuid, amount: i64, description: String) -> Self {
        NewCreditTransaction {
            id: Uuid::new_v4(),
            user_id,
            ad_id: None,
            amount,
            kind: TransactionKind::Recharge.as_str().to_string(),
            description,
        }
    }
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct GrantCreditsRequest {
    pub amount: i64,
    pub description: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn consumption_amount_is_negative() {
        let user = Uuid::new_v4();
        let ad = Uuid::new_v4();
        let row = NewCreditTransaction::consumption(user, ad, 3, "CLICK");
        assert_eq!(row.amount, -3);
        assert_eq!(row.kind, "consumption");
        assert_eq!(row.ad_id, Some(ad));
    }

    #[test]
    fn recharge_amount_stays_positive() {
        let row = NewCreditTransaction::recharge(Uuid::new_v4(), 100, "Manual credit".into());
        assert_eq!(row.amount, 100);
        assert_eq!(row.kind, "recharge");
        assert!(row.ad_id.is_none());
    }
}
