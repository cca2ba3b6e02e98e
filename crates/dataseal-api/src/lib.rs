mod error;
mod handlers;
mod server;
mod state;

pub use error::ApiError;
pub use handlers::MAX_EVENT_PAGE;
pub use server::create_app;
pub use state::{AppState, Clock};

#[cfg(test)]
mod tests;
