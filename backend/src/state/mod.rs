// State management module
// Holds the shared application state handed to every request handler

pub mod app_state;

pub use app_state::AppState;
