// Central policy table: every role gate in the system goes through here.
// Ownership checks stay next to the data they protect; this table only
// answers "may this role perform this action at all".

use crate::models::user::UserRole;

/// Every role-gated operation in the system
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    CreateFreight,
    UpdateFreight,
    DeleteFreight,
    AssignDriver,
    ConfirmPayment,
    FinishFreight,
    ViewLeads,
    ManageAds,
    ApproveFreight,
    VerifyUser,
    GrantCredits,
    ManageSettings,
}

pub struct PolicyTable;

impl PolicyTable {
    pub fn is_allowed(action: Action, role: UserRole) -> bool {
        use Action::*;
        use UserRole::*;

        match (action, role) {
            (_, Admin) => true,

            (CreateFreight, Company) => true,
            (UpdateFreight, Company) => true,
            (DeleteFreight, Company) => true,
            (AssignDriver, Company) => true,
            (ConfirmPayment, Company) => true,
            (ViewLeads, Company) => true,

            // Drivers close out their own deliveries
            (FinishFreight, Driver) | (FinishFreight, Company) => true,

            (ManageAds, Advertiser) | (ManageAds, Company) => true,

            // Moderation and treasury are admin-only
            (ApproveFreight, _) | (VerifyUser, _) | (GrantCredits, _) | (ManageSettings, _) => {
                false
            },

            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admin_passes_every_gate() {
        for action in [
            Action::CreateFreight,
            Action::UpdateFreight,
            Action::DeleteFreight,
            Action::AssignDriver,
            Action::ConfirmPayment,
            Action::FinishFreight,
            Action::ViewLeads,
            Action::ManageAds,
            Action::ApproveFreight,
            Action::VerifyUser,
            Action::GrantCredits,
            Action::ManageSettings,
        ] {
            assert!(PolicyTable::is_allowed(action, UserRole::Admin));
        }
    }

    #[test]
    fn freight_creation_is_company_or_admin() {
        assert!(PolicyTable::is_allowed(Action::CreateFreight, UserRole::Company));
        assert!(PolicyTable::is_allowed(Action::CreateFreight, UserRole::Admin));
        assert!(!PolicyTable::is_allowed(Action::CreateFreight, UserRole::Driver));
        assert!(!PolicyTable::is_allowed(
            Action::CreateFreight,
            UserRole::Advertiser
        ));
    }

    #[test]
    fn drivers_can_finish_but_not_assign() {
        assert!(PolicyTable::is_allowed(Action::FinishFreight, UserRole::Driver));
        assert!(!PolicyTable::is_allowed(Action::AssignDriver, UserRole::Driver));
    }

    #[test]
    fn moderation_is_admin_only() {
        for role in [UserRole::Driver, UserRole::Company, UserRole::Advertiser] {
            assert!(!PolicyTable::is_allowed(Action::ApproveFreight, role));
            assert!(!PolicyTable::is_allowed(Action::VerifyUser, role));
            assert!(!PolicyTable::is_allowed(Action::GrantCredits, role));
            assert!(!PolicyTable::is_allowed(Action::ManageSettings, role));
        }
    }

    #[test]
    fn advertisers_manage_ads_only() {
        assert!(PolicyTable::is_allowed(Action::ManageAds, UserRole::Advertiser));
        assert!(!PolicyTable::is_allowed(
            Action::CreateFreight,
            UserRole::Advertiser
        ));
        assert!(!PolicyTable::is_allowed(Action::ViewLeads, UserRole::Advertiser));
    }
}
