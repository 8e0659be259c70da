//! Validation helpers for workflow creation requests.
//!
//! These checks run synchronously before anything is stored, so a rejected
//! request never leaves a record behind.

use super::CreateWorkflowRequest;

/// Longest accepted caller-supplied workflow identifier.
pub const MAX_WORKFLOW_ID_LENGTH: usize = 128;

/// Validate a caller-supplied workflow identifier.
///
/// Identifiers appear in URL paths, so they are restricted to
/// `[A-Za-z0-9._-]` and must not be empty.
pub fn validate_workflow_id(workflow_id: &str) -> Result<(), String> {
    if workflow_id.is_empty() {
        return Err("workflow_id must not be empty".to_string());
    }
    if workflow_id.chars().count() > MAX_WORKFLOW_ID_LENGTH {
        return Err(format!("workflow_id must be at most {} characters", MAX_WORKFLOW_ID_LENGTH));
    }
    if let Some(invalid) = workflow_id
        .chars()
        .find(|character| !(character.is_ascii_alphanumeric() || matches!(character, '.' | '_' | '-')))
    {
        return Err(format!("workflow_id contains invalid character '{}'", invalid));
    }
    Ok(())
}

/// Validate the free-text design request.
pub fn validate_user_input(user_input: &str) -> Result<(), String> {
    if user_input.trim().is_empty() {
        return Err("user_input must not be empty".to_string());
    }
    Ok(())
}

/// Validate a complete creation request.
pub fn validate_create_request(request: &CreateWorkflowRequest) -> Result<(), String> {
    validate_user_input(&request.user_input)?;
    if let Some(workflow_id) = request.workflow_id.as_deref() {
        validate_workflow_id(workflow_id)?;
    }
    Ok(())
}
