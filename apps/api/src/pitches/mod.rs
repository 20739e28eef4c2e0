// Pitch submission, scoring and history.
// Scoring goes through `AppState::analyzer`; nothing here calls the model directly.

pub mod handlers;
pub mod stats;
pub mod store;
