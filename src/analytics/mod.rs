pub mod events;

pub use events::{ClientEvent, EventLog, Outcome};
