// Records owned by the record store: camp events and beneficiaries

pub mod aid;
pub mod beneficiary;
pub mod event;

pub use aid::{TypeOfAid, AID_FLAGS};
pub use beneficiary::{age_on, Beneficiary, BeneficiaryId, BeneficiaryRef, RegNumber, RegistrationDetails};
pub use event::{CampEvent, EventDraft, EventId};
