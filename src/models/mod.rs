pub mod action;
pub mod credential;
pub mod email;
pub mod envelope;
pub mod schedule;
pub mod session;

pub use action::{ActionResult, ActionStatus, CommandReply};
pub use credential::Credential;
pub use email::ExtractedEmail;
pub use envelope::{
    CalendarDetails, CallDetails, CommandEnvelope, Details, EmailDetails, Intent, Service,
};
pub use schedule::{AvailableSlot, BusyInterval, TimeRange};
pub use session::{CallSession, CallTurn, Speaker};
