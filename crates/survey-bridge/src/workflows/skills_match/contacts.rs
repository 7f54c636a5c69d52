use std::collections::HashSet;

use super::response::RawResponse;

/// Respondent address, taken from the last answered question.
///
/// The email question closes the survey. When it was skipped this yields
/// whatever text the last answered question carried, which validation then
/// rejects.
pub fn email_address(response: &RawResponse) -> Option<String> {
    response
        .last_answer_text()
        .map(str::trim)
        .filter(|address| !address.is_empty())
        .map(str::to_string)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EmailStatus {
    Valid,
    Missing,
    AlreadyContacted,
    Invalid(String),
}

impl EmailStatus {
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid)
    }

    /// `"y"` for a usable address, otherwise the reason it was skipped.
    pub fn valid_status(&self) -> String {
        match self {
            Self::Valid => "y".to_string(),
            Self::Missing => "Email Missing".to_string(),
            Self::AlreadyContacted => "Email Already Contacted".to_string(),
            Self::Invalid(reason) => reason.clone(),
        }
    }
}

pub fn check_email_address(address: Option<&str>, contacted: &HashSet<String>) -> EmailStatus {
    let Some(address) = address else {
        return EmailStatus::Missing;
    };
    if contacted.contains(address) {
        return EmailStatus::AlreadyContacted;
    }
    if validator::validate_email(address) {
        EmailStatus::Valid
    } else {
        EmailStatus::Invalid(format!("The email address {address} is not valid."))
    }
}
