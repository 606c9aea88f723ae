use serde::{Deserialize, Serialize};

/// What the platform shows while asking the user to authenticate, plus the
/// enrollment policy for keys created behind the prompt.
///
/// Absent text fields are empty strings and the policy flag is off unless a
/// caller sets it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PromptConfig {
    /// Prompt title.
    pub title: String,
    /// Line under the title.
    pub subtitle: String,
    /// Longer explanation of why authentication is needed.
    pub description: String,
    /// Label of the dismiss button.
    pub negative_button: String,
    /// Whether enrolling a new biometric invalidates a key created with this
    /// prompt.
    pub invalidated_by_biometric_enrollment: bool,
}

impl PromptConfig {
    /// A prompt with only a title.
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    /// Set the subtitle.
    pub fn with_subtitle(mut self, subtitle: impl Into<String>) -> Self {
        self.subtitle = subtitle.into();
        self
    }

    /// Set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Set the dismiss button label.
    pub fn with_negative_button(mut self, label: impl Into<String>) -> Self {
        self.negative_button = label.into();
        self
    }

    /// Set whether a new enrollment invalidates keys created behind this
    /// prompt.
    pub fn invalidated_by_biometric_enrollment(mut self, invalidated: bool) -> Self {
        self.invalidated_by_biometric_enrollment = invalidated;
        self
    }
}
