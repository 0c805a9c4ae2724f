use common::config::Environment;

use crate::config::{Credentials, CredentialsError};

/// Logout flow entrypoint.
pub(crate) fn logout(environment: Environment) -> Result<(), CredentialsError> {
    Credentials::remove(environment)?;

    println!("Logged out, stored credentials were removed from this computer.");

    Ok(())
}
