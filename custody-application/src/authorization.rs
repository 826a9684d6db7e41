use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::{AppError, AppState};
use custody_domain::{AccessDecision, ActorId, Principal};

/// Gate for privileged entry points: the auto-approval trigger and ops
/// endpoints. Admits the holder of the system secret or a signed-in
/// administrator. Runs before any ledger access.
pub async fn authorize_privileged(
    state: &AppState,
    credential: Option<&str>,
) -> Result<AccessDecision, AppError> {
    let Some(credential) = credential.map(str::trim).filter(|value| !value.is_empty()) else {
        return Ok(AccessDecision::Unauthorized);
    };

    if let Some(secret) = &state.config.system_secret {
        if secrets_match(secret, credential) {
            return Ok(AccessDecision::Admit(Principal::System));
        }
    }

    let Some(user) = state.identity.verify_session(credential).await? else {
        debug!("privileged call with unknown credential");
        return Ok(AccessDecision::Unauthorized);
    };
    if state.roles.is_admin(&user).await? {
        Ok(AccessDecision::Admit(Principal::User(user)))
    } else {
        warn!(user = %user, "non-admin attempted a privileged call");
        Ok(AccessDecision::Forbidden)
    }
}

/// Like [`authorize_privileged`] but turns refusals into errors.
pub async fn require_privileged(
    state: &AppState,
    credential: Option<&str>,
) -> Result<Principal, AppError> {
    match authorize_privileged(state, credential).await? {
        AccessDecision::Admit(principal) => Ok(principal),
        AccessDecision::Forbidden => Err(AppError::Forbidden),
        AccessDecision::Unauthorized => Err(AppError::Unauthorized),
    }
}

/// Resolves a session for the manual routes. Any signed-in user may act;
/// the system secret is not accepted here.
pub async fn authenticate_user(
    state: &AppState,
    credential: Option<&str>,
) -> Result<ActorId, AppError> {
    let credential = credential
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or(AppError::Unauthorized)?;
    state
        .identity
        .verify_session(credential)
        .await?
        .ok_or(AppError::Unauthorized)
}

/// Compares SHA-256 digests so the running time does not depend on where the
/// inputs first differ.
pub fn secrets_match(expected: &str, provided: &str) -> bool {
    let expected = Sha256::digest(expected.as_bytes());
    let provided = Sha256::digest(provided.as_bytes());
    expected
        .iter()
        .zip(provided.iter())
        .fold(0u8, |acc, (a, b)| acc | (a ^ b))
        == 0
}
