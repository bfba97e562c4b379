//! External service integrations.

pub mod ipluc_client {
    pub use crate::ipluc_client::*;
}

pub mod webhook_models {
    pub use crate::webhook_models::*;
}
