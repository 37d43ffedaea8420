// service/negotiation.rs
//
// The two proposal shapes a professional can send and the rules that fold
// them into the job state machine. Nothing here touches storage.
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    models::jobmodel::*,
    service::error::ServiceError,
};

pub const MIN_PROPOSAL_MESSAGE_CHARS: usize = 10;
pub const MIN_VISIT_NOTES_CHARS: usize = 10;
pub const MIN_QUOTE_DESCRIPTION_CHARS: usize = 10;
/// Upper bound for any amount a professional can quote, in whole currency
/// units. Keeps per-professional totals far from `i64` overflow.
pub const MAX_PRICE: i64 = 1_000_000_000;

/// Platform commission held as basis points so the math stays in integers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CommissionRate {
    basis_points: u32,
}

impl CommissionRate {
    pub const DEFAULT: CommissionRate = CommissionRate { basis_points: 1_500 };

    pub fn from_fraction(rate: f64) -> Result<Self, String> {
        if !rate.is_finite() || !(0.0..1.0).contains(&rate) {
            return Err(format!("commission rate must be in [0, 1), got {}", rate));
        }
        Ok(Self {
            basis_points: (rate * 10_000.0).round() as u32,
        })
    }

    pub fn basis_points(&self) -> u32 {
        self.basis_points
    }

    pub fn as_fraction(&self) -> f64 {
        f64::from(self.basis_points) / 10_000.0
    }

    /// Rounded half up to whole currency units.
    pub fn commission_for(&self, price: i64) -> i64 {
        let price = i128::from(price.max(0));
        let commission = (price * i128::from(self.basis_points) + 5_000) / 10_000;
        commission as i64
    }

    pub fn net_for(&self, price: i64) -> i64 {
        price.max(0) - self.commission_for(price)
    }

    pub fn breakdown(&self, price: i64) -> CommissionBreakdown {
        CommissionBreakdown {
            price,
            rate: self.as_fraction(),
            commission: self.commission_for(price),
            net: self.net_for(price),
        }
    }
}

impl Default for CommissionRate {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Informational split shown next to a quote. Never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CommissionBreakdown {
    pub price: i64,
    pub rate: f64,
    pub commission: i64,
    pub net: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "proposal_type", rename_all = "snake_case")]
pub enum ProposalDraft {
    Price {
        quoted_price: i64,
        message: String,
    },
    Visit {
        visit_date: NaiveDate,
        visit_time_slot: VisitSlot,
        #[serde(default)]
        visit_cost: i64,
        visit_notes: String,
    },
}

fn char_len(value: &str) -> usize {
    value.trim().chars().count()
}

impl ProposalDraft {
    pub fn proposal_type(&self) -> ProposalType {
        match self {
            ProposalDraft::Price { .. } => ProposalType::Price,
            ProposalDraft::Visit { .. } => ProposalType::Visit,
        }
    }

    pub fn validate(&self, today: NaiveDate) -> Result<(), ServiceError> {
        match self {
            ProposalDraft::Price { quoted_price, message } => {
                validate_amount("quoted_price", *quoted_price)?;
                if char_len(message) < MIN_PROPOSAL_MESSAGE_CHARS {
                    return Err(ServiceError::Validation(format!(
                        "message must have at least {} characters",
                        MIN_PROPOSAL_MESSAGE_CHARS
                    )));
                }
            }
            ProposalDraft::Visit {
                visit_date,
                visit_cost,
                visit_notes,
                ..
            } => {
                if *visit_date < today {
                    return Err(ServiceError::Validation(
                        "visit_date cannot be in the past".to_string(),
                    ));
                }
                if *visit_cost < 0 || *visit_cost > MAX_PRICE {
                    return Err(ServiceError::Validation(format!(
                        "visit_cost must be between 0 and {}",
                        MAX_PRICE
                    )));
                }
                if char_len(visit_notes) < MIN_VISIT_NOTES_CHARS {
                    return Err(ServiceError::Validation(format!(
                        "visit_notes must have at least {} characters",
                        MIN_VISIT_NOTES_CHARS
                    )));
                }
            }
        }
        Ok(())
    }

    pub fn into_new_proposal(self, job_id: Uuid, professional_id: Uuid) -> NewProposal {
        match self {
            ProposalDraft::Price { quoted_price, message } => NewProposal {
                job_id,
                professional_id,
                proposal_type: ProposalType::Price,
                quoted_price: Some(quoted_price),
                message: Some(message.trim().to_string()),
                visit_date: None,
                visit_time_slot: None,
                visit_cost: None,
                visit_notes: None,
            },
            ProposalDraft::Visit {
                visit_date,
                visit_time_slot,
                visit_cost,
                visit_notes,
            } => NewProposal {
                job_id,
                professional_id,
                proposal_type: ProposalType::Visit,
                quoted_price: None,
                message: None,
                visit_date: Some(visit_date),
                visit_time_slot: Some(visit_time_slot),
                visit_cost: Some(visit_cost),
                visit_notes: Some(visit_notes.trim().to_string()),
            },
        }
    }
}

fn validate_amount(field: &str, amount: i64) -> Result<(), ServiceError> {
    if amount <= 0 || amount > MAX_PRICE {
        return Err(ServiceError::Validation(format!(
            "{} must be between 1 and {}",
            field, MAX_PRICE
        )));
    }
    Ok(())
}

pub fn validate_final_quote(price: i64, description: &str) -> Result<(), ServiceError> {
    validate_amount("price", price)?;
    if char_len(description) < MIN_QUOTE_DESCRIPTION_CHARS {
        return Err(ServiceError::Validation(format!(
            "description must have at least {} characters",
            MIN_QUOTE_DESCRIPTION_CHARS
        )));
    }
    Ok(())
}

/// Job status reached when a pending proposal of this type is taken.
pub fn accepted_status_for(proposal_type: ProposalType) -> JobStatus {
    match proposal_type {
        ProposalType::Price => JobStatus::Accepted,
        ProposalType::Visit => JobStatus::VisitScheduled,
    }
}

/// A proposal can only be taken while pending and on its own track.
pub fn ensure_takeable(proposal: &Proposal, expected: ProposalType) -> Result<(), ServiceError> {
    if proposal.proposal_type != expected {
        return Err(ServiceError::WrongProposalType(
            proposal.id,
            proposal.proposal_type,
        ));
    }
    if proposal.status != ProposalStatus::Pending {
        return Err(ServiceError::InvalidProposalStatus(proposal.id, proposal.status));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn today() -> NaiveDate {
        Utc::now().date_naive()
    }

    #[test]
    fn commission_rounds_half_up() {
        let rate = CommissionRate::from_fraction(0.15).unwrap();
        assert_eq!(rate.basis_points(), 1_500);
        assert_eq!(rate.commission_for(10_000), 1_500);
        assert_eq!(rate.net_for(10_000), 8_500);
        // 15% of 3 = 0.45 -> 0, 15% of 10 = 1.5 -> 2
        assert_eq!(rate.commission_for(3), 0);
        assert_eq!(rate.commission_for(10), 2);
    }

    #[test]
    fn commission_rate_rejects_out_of_range() {
        assert!(CommissionRate::from_fraction(1.0).is_err());
        assert!(CommissionRate::from_fraction(-0.1).is_err());
        assert!(CommissionRate::from_fraction(f64::NAN).is_err());
        assert_eq!(CommissionRate::from_fraction(0.10).unwrap().commission_for(12_000), 1_200);
    }

    #[test]
    fn price_proposal_needs_positive_price_and_message() {
        let zero = ProposalDraft::Price {
            quoted_price: 0,
            message: "Lo hago mañana temprano".to_string(),
        };
        assert!(matches!(zero.validate(today()), Err(ServiceError::Validation(_))));

        let short = ProposalDraft::Price {
            quoted_price: 10_000,
            message: "   ok     ".to_string(),
        };
        assert!(matches!(short.validate(today()), Err(ServiceError::Validation(_))));

        let good = ProposalDraft::Price {
            quoted_price: 10_000,
            message: "Lo hago mañana temprano".to_string(),
        };
        assert!(good.validate(today()).is_ok());
    }

    #[test]
    fn prices_above_the_cap_are_rejected() {
        let huge = ProposalDraft::Price {
            quoted_price: MAX_PRICE + 1,
            message: "Lo hago mañana temprano".to_string(),
        };
        assert!(matches!(huge.validate(today()), Err(ServiceError::Validation(_))));

        let at_cap = ProposalDraft::Price {
            quoted_price: MAX_PRICE,
            message: "Lo hago mañana temprano".to_string(),
        };
        assert!(at_cap.validate(today()).is_ok());

        assert!(matches!(
            validate_final_quote(i64::MAX, "Cambio de caños y mano de obra"),
            Err(ServiceError::Validation(_))
        ));
        assert!(validate_final_quote(MAX_PRICE, "Cambio de caños y mano de obra").is_ok());
    }

    #[test]
    fn visit_proposal_rejects_past_dates() {
        let past = ProposalDraft::Visit {
            visit_date: today() - Duration::days(1),
            visit_time_slot: VisitSlot::Morning,
            visit_cost: 0,
            visit_notes: "Necesito ver la instalación".to_string(),
        };
        assert!(matches!(past.validate(today()), Err(ServiceError::Validation(_))));

        let same_day = ProposalDraft::Visit {
            visit_date: today(),
            visit_time_slot: VisitSlot::Evening,
            visit_cost: 0,
            visit_notes: "Necesito ver la instalación".to_string(),
        };
        assert!(same_day.validate(today()).is_ok());
    }

    #[test]
    fn visit_cost_defaults_to_free() {
        let json = serde_json::json!({
            "proposal_type": "visit",
            "visit_date": today().to_string(),
            "visit_time_slot": "afternoon",
            "visit_notes": "Paso a medir el techo"
        });
        let draft: ProposalDraft = serde_json::from_value(json).unwrap();
        let new = draft.into_new_proposal(Uuid::new_v4(), Uuid::new_v4());
        assert_eq!(new.visit_cost, Some(0));
        assert_eq!(new.proposal_type, ProposalType::Visit);
    }

    #[test]
    fn tracks_map_to_distinct_job_states() {
        assert_eq!(accepted_status_for(ProposalType::Price), JobStatus::Accepted);
        assert_eq!(accepted_status_for(ProposalType::Visit), JobStatus::VisitScheduled);
    }

    #[test]
    fn final_quote_validation() {
        assert!(validate_final_quote(0, "Cambio de caño completo").is_err());
        assert!(validate_final_quote(20_000, "corto").is_err());
        assert!(validate_final_quote(20_000, "Cambio de caño completo").is_ok());
    }
}
