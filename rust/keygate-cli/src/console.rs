use std::io::{BufRead, Write};

use async_trait::async_trait;
use keygate::{AuthMethod, AuthOutcome, AuthenticationRequest, BiometricPlatform};
use keygate_common::Fingerprint;

/// A [`BiometricPlatform`] that asks on the terminal.
///
/// The "biometric" is the operator confirming on stdin. The enrollment set is
/// identified by a label, so passing a different label simulates enrolling a
/// new biometric.
pub struct ConsoleAuthenticator {
    enrollment: Fingerprint,
}

impl ConsoleAuthenticator {
    pub fn new(enrollment_label: &str) -> Self {
        Self {
            enrollment: Fingerprint::digest(enrollment_label.as_bytes()),
        }
    }

    /// Map an answer typed at the prompt to an outcome.
    pub fn interpret(answer: Option<&str>) -> AuthOutcome {
        match answer.map(|answer| answer.trim().to_ascii_lowercase()) {
            None => AuthOutcome::Canceled,
            Some(answer) => match answer.as_str() {
                "y" | "yes" => AuthOutcome::Matched,
                "" | "c" | "cancel" => AuthOutcome::Canceled,
                _ => AuthOutcome::Mismatch,
            },
        }
    }

    fn ask(request: &AuthenticationRequest) -> AuthOutcome {
        let mut stderr = std::io::stderr().lock();
        let credential = match request.method {
            AuthMethod::Biometric => "biometric",
            AuthMethod::DeviceCredential => "device credential",
        };
        let prompt = &request.prompt;
        let _ = writeln!(stderr, "{}", prompt.title);
        if !prompt.subtitle.is_empty() {
            let _ = writeln!(stderr, "{}", prompt.subtitle);
        }
        if !prompt.description.is_empty() {
            let _ = writeln!(stderr, "{}", prompt.description);
        }
        let _ = write!(
            stderr,
            "Confirm {credential} for '{}' [y = match, n = mismatch, enter = {}]: ",
            request.alias,
            if prompt.negative_button.is_empty() {
                "cancel"
            } else {
                prompt.negative_button.as_str()
            }
        );
        let _ = stderr.flush();

        let mut line = String::new();
        match std::io::stdin().lock().read_line(&mut line) {
            Ok(0) => Self::interpret(None),
            Ok(_) => Self::interpret(Some(&line)),
            Err(error) => AuthOutcome::Error(error.to_string()),
        }
    }
}

#[async_trait]
impl BiometricPlatform for ConsoleAuthenticator {
    async fn authenticate(&self, request: &AuthenticationRequest) -> AuthOutcome {
        let request = request.clone();
        match tokio::task::spawn_blocking(move || Self::ask(&request)).await {
            Ok(outcome) => outcome,
            Err(error) => AuthOutcome::Error(error.to_string()),
        }
    }

    fn enrollment(&self) -> Option<Fingerprint> {
        Some(self.enrollment)
    }
}
