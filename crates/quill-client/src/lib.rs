pub mod client;
pub mod credentials;
pub mod error;

pub use client::ChatClient;
pub use credentials::{credentials_from_config, CredentialProvider, EnvToken, NoCredentials, StaticToken};
pub use error::{ClientError, Result};
