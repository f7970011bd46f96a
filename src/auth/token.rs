//! Token models.

pub mod record;
pub mod secret;
