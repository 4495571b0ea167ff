pub mod errors;
pub mod events;
pub mod models;
pub mod scheduler;
pub mod state;
