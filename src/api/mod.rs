// Inbound HTTP endpoint

mod listener;

pub use listener::{create_router, ListenerState};
