// ABOUTME: Value types shared by the engine and pull modules.
// ABOUTME: Image references, phantom-typed ids, and registry credentials.

mod credentials;
mod id;
mod image_ref;

pub use credentials::RegistryCredentials;
pub use id::{Id, ImageId, LayerId};
pub use image_ref::{ImageRef, ParseImageRefError};
