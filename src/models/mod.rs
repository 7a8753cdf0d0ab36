pub mod application;
pub mod candidate;
pub mod form_field;
pub mod job;
pub mod job_filter;
pub mod loaders;

pub use application::{ApplicationOutcome, ApplicationStatus};
pub use candidate::Candidate;
pub use form_field::{FieldInput, FieldKind, FormField, RadioOption};
pub use job::{job_id_from_url, JobListing};
pub use job_filter::JobFilter;
pub use loaders::{load_profile, Profile};
