//! OAuth identity linking: profile normalization and account resolution.

mod linker;
pub mod profile;

pub use linker::{resolve, LinkError};
pub use profile::{
    is_placeholder, placeholder_email, preferred_email, ExternalProfile, ProfileEmail, Provider,
};
