mod events;
mod models;

pub use events::*;
pub use models::*;
