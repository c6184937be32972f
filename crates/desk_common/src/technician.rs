//! Technician records backing assignment decisions.

use serde::{Deserialize, Serialize};

/// Ceiling on open tickets per technician. A technician at or above
/// the cap is not eligible for new assignments.
pub const PENDING_TICKET_CAP: i64 = 150;

/// A technician row from the directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Technician {
    pub technician_id: i64,
    pub name: String,
    pub email: String,
    /// Free-text specialization; matched by substring against the
    /// ticket category
    pub specialization: String,
    pub active_status: bool,
    /// Cumulative count of tickets ever assigned
    pub tickets_assigned: i64,
    /// Current open-load counter, kept below [`PENDING_TICKET_CAP`]
    pub pending_ticket_count: i64,
    /// Account id in the external ticketing system, if linked
    pub external_account_id: Option<String>,
}

impl Technician {
    /// Eligible to take a ticket of the given category: active,
    /// specialization covers the category, and below the cap.
    pub fn eligible_for(&self, category: &str) -> bool {
        self.active_status
            && self.specialization.contains(category)
            && self.pending_ticket_count < PENDING_TICKET_CAP
    }
}

/// Subset of technician fields surfaced on timeline entries.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TechnicianSummary {
    pub name: String,
    pub specialization: String,
    pub email: String,
}

impl From<&Technician> for TechnicianSummary {
    fn from(t: &Technician) -> Self {
        Self {
            name: t.name.clone(),
            specialization: t.specialization.clone(),
            email: t.email.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tech(specialization: &str, pending: i64, active: bool) -> Technician {
        Technician {
            technician_id: 1,
            name: "Dana".to_string(),
            email: "dana@msp.example".to_string(),
            specialization: specialization.to_string(),
            active_status: active,
            tickets_assigned: 10,
            pending_ticket_count: pending,
            external_account_id: None,
        }
    }

    #[test]
    fn test_eligibility_substring_match() {
        let t = tech("Network & Connectivity Support, VPN & Remote Access Support", 3, true);
        assert!(t.eligible_for("VPN & Remote Access Support"));
        assert!(!t.eligible_for("Printer & Peripheral Support"));
    }

    #[test]
    fn test_eligibility_cap_and_active() {
        assert!(!tech("Network & Connectivity Support", PENDING_TICKET_CAP, true)
            .eligible_for("Network & Connectivity Support"));
        assert!(!tech("Network & Connectivity Support", 0, false)
            .eligible_for("Network & Connectivity Support"));
    }
}
