pub mod ai;
pub mod calendar;
pub mod calls;
pub mod confirmation;
pub mod credentials;
pub mod datetime;
pub mod email;
pub mod email_address;
pub mod google_api;
pub mod router;
pub mod scheduling;
pub mod sessions;
pub mod twiml;
