// HTTP inspection API over hub state

pub mod sessions;

pub use sessions::{create_inspect_router, InspectAppState};
