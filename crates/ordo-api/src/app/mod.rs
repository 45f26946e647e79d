//! Application wiring shared by the HTTP handlers.

/// Handler state.
pub mod state;
