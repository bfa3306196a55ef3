//! Validation helpers for DTOs.

use validator::ValidationError;

use crate::state::room::Team;

/// Validates that a team is either `left` or `right`.
///
/// # Examples
///
/// ```ignore
/// validate_team("left")  // Ok
/// validate_team("Left")  // Err - case sensitive
/// validate_team("")      // Err - missing
/// ```
pub fn validate_team(team: &str) -> Result<(), ValidationError> {
    if team.is_empty() {
        let mut err = ValidationError::new("team_required");
        err.message = Some("team is required".into());
        return Err(err);
    }

    if Team::parse(team).is_none() {
        let mut err = ValidationError::new("team_unknown");
        err.message = Some(format!("team must be `left` or `right` (got `{team}`)").into());
        return Err(err);
    }

    Ok(())
}
