use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use keygate::{
    BiometricPlatform, KeyAlias, KeyGate, KeyGateError, KeyStore, Method, PromptConfig, Request,
    StorageBackend,
};

#[derive(Debug, Parser)]
#[command(name = "keygate")]
#[command(bin_name = "keygate")]
#[command(about = "Biometric-gated signing keys", long_about = None)]
pub struct KeyGateCli {
    /// JSON configuration file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Directory holding key records and change baselines
    #[arg(long, global = true, default_value = ".keygate")]
    pub store: PathBuf,

    /// Label identifying the current enrollment set; changing it simulates
    /// enrolling a new biometric
    #[arg(long, global = true, default_value = "default")]
    pub enrollment: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Args)]
pub struct PromptArgs {
    #[arg(long, default_value = "Confirm it's you")]
    pub title: String,

    #[arg(long, default_value = "")]
    pub subtitle: String,

    #[arg(long, default_value = "")]
    pub description: String,

    #[arg(long, default_value = "Cancel")]
    pub negative_button: String,
}

impl From<&PromptArgs> for PromptConfig {
    fn from(args: &PromptArgs) -> Self {
        PromptConfig::titled(args.title.as_str())
            .with_subtitle(args.subtitle.as_str())
            .with_description(args.description.as_str())
            .with_negative_button(args.negative_button.as_str())
    }
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Create a key pair and print its public key
    Create {
        alias: String,
        /// Invalidate the key when the enrollment set changes
        #[arg(long)]
        bind_to_enrollment: bool,
        #[command(flatten)]
        prompt: PromptArgs,
    },
    /// Sign a payload and print the base64 signature
    Sign {
        alias: String,
        payload: String,
        #[command(flatten)]
        prompt: PromptArgs,
    },
    /// Verify a base64 signature over a payload
    Verify {
        alias: String,
        payload: String,
        signature: String,
        /// Prompt before verifying
        #[arg(long)]
        authenticate: bool,
        #[command(flatten)]
        prompt: PromptArgs,
    },
    /// Print the base64 SPKI public key
    PublicKey { alias: String },
    /// Delete a key pair
    Delete { alias: String },
    /// Report whether the enrollment changed since the baseline
    Changed {
        alias: String,
        /// Compare against this base64 public key instead of the baseline
        #[arg(long)]
        public_key: Option<String>,
    },
    /// Accept the current enrollment as the new baseline
    Reset { alias: String },
    /// Lift a lockout with the device credential
    Recover {
        alias: String,
        #[command(flatten)]
        prompt: PromptArgs,
    },
}

impl Command {
    /// The method call this command maps to, if it is one of the dispatchable
    /// methods.
    pub fn request(&self) -> Option<Request> {
        Some(match self {
            Command::Create {
                alias,
                bind_to_enrollment,
                prompt,
            } => Request::new(Method::CreateKeyPair)
                .key(alias.as_str())
                .prompt(PromptConfig::from(prompt).invalidated_by_biometric_enrollment(*bind_to_enrollment)),
            Command::Sign {
                alias,
                payload,
                prompt,
            } => Request::new(Method::Sign)
                .key(alias.as_str())
                .payload(payload.as_str())
                .prompt(prompt.into()),
            Command::Verify {
                alias,
                payload,
                signature,
                authenticate,
                prompt,
            } => Request::new(Method::Verify)
                .key(alias.as_str())
                .payload(payload.as_str())
                .signature(signature.as_str())
                .authenticate(*authenticate)
                .prompt(prompt.into()),
            Command::Changed { alias, public_key } => {
                let request = Request::new(Method::IsBiometricChanged).key(alias.as_str());
                match public_key {
                    Some(public_key) => request.public_key(public_key.as_str()),
                    None => request,
                }
            }
            Command::Reset { alias } => {
                Request::new(Method::ResetBiometricChanged).key(alias.as_str())
            }
            Command::PublicKey { .. } | Command::Delete { .. } | Command::Recover { .. } => {
                return None;
            }
        })
    }
}

/// Run `command` and return what to print.
pub async fn run<K, P, B>(keygate: &KeyGate<K, P, B>, command: Command) -> Result<String, KeyGateError>
where
    K: KeyStore,
    P: BiometricPlatform,
    B: StorageBackend<Key = String, Value = Vec<u8>>,
{
    match command {
        Command::PublicKey { alias } => {
            let public_key = keygate.public_key(&KeyAlias::new(alias)?).await?;
            Ok(public_key.to_base64())
        }
        Command::Delete { alias } => {
            keygate.delete_key_pair(&KeyAlias::new(alias)?).await?;
            Ok(String::new())
        }
        Command::Recover { alias, prompt } => {
            keygate
                .recover_with_device_credential(&KeyAlias::new(alias)?, &(&prompt).into())
                .await?;
            Ok(String::new())
        }
        dispatchable => {
            let request = dispatchable.request().ok_or_else(|| {
                KeyGateError::Platform(format!("{dispatchable:?} is not a method call"))
            })?;
            Ok(keygate.call(request).await?.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keygate::{AuthOutcome, KeyGateConfig, SimulatedPlatform};
    use testresult::TestResult;

    fn parse(args: &[&str]) -> KeyGateCli {
        KeyGateCli::parse_from(std::iter::once("keygate").chain(args.iter().copied()))
    }

    #[test]
    fn it_parses_global_flags_after_the_subcommand() {
        let cli = parse(&["sign", "user-42", "hello", "--store", "/tmp/keys", "--title", "Pay"]);
        assert_eq!(cli.store, PathBuf::from("/tmp/keys"));
        let request = cli.command.request().unwrap();
        assert_eq!(request.method, Method::Sign);
        assert_eq!(request.arguments.prompt.title, "Pay");
        assert_eq!(request.arguments.payload.as_deref(), Some("hello"));
    }

    #[tokio::test]
    async fn it_runs_a_session() -> TestResult {
        let keygate = KeyGate::in_memory(KeyGateConfig::default(), SimulatedPlatform::default());

        let public_key = run(&keygate, parse(&["create", "user-42"]).command).await?;
        assert_eq!(run(&keygate, parse(&["public-key", "user-42"]).command).await?, public_key);

        let signature = run(&keygate, parse(&["sign", "user-42", "hello"]).command).await?;
        assert_eq!(
            run(&keygate, parse(&["verify", "user-42", "hello", &signature]).command).await?,
            "true"
        );
        assert_eq!(
            run(&keygate, parse(&["verify", "user-42", "hellp", &signature]).command).await?,
            "false"
        );
        assert_eq!(
            run(
                &keygate,
                parse(&["changed", "user-42", "--public-key", &public_key]).command
            )
            .await?,
            "unchanged"
        );

        run(&keygate, parse(&["delete", "user-42"]).command).await?;
        assert_eq!(run(&keygate, parse(&["changed", "user-42"]).command).await?, "changed");
        Ok(())
    }

    #[tokio::test]
    async fn it_notices_a_new_enrollment_between_runs() -> TestResult {
        let store = tempfile::tempdir()?;

        let keygate = KeyGate::open(
            KeyGateConfig::default(),
            SimulatedPlatform::enrolled("thumb"),
            store.path(),
        )
        .await?;
        run(&keygate, parse(&["create", "user-42"]).command).await?;
        assert_eq!(run(&keygate, parse(&["changed", "user-42"]).command).await?, "unchanged");
        drop(keygate);

        let keygate = KeyGate::open(
            KeyGateConfig::default(),
            SimulatedPlatform::enrolled("thumb+index"),
            store.path(),
        )
        .await?;
        assert_eq!(run(&keygate, parse(&["changed", "user-42"]).command).await?, "changed");

        run(&keygate, parse(&["reset", "user-42"]).command).await?;
        assert_eq!(run(&keygate, parse(&["changed", "user-42"]).command).await?, "unchanged");
        Ok(())
    }

    #[tokio::test]
    async fn it_reports_error_codes() -> TestResult {
        let keygate = KeyGate::in_memory(KeyGateConfig::default(), SimulatedPlatform::default());
        run(&keygate, parse(&["create", "user-42"]).command).await?;

        keygate.platform().push_outcome(AuthOutcome::Canceled);
        let error = run(&keygate, parse(&["sign", "user-42", "x"]).command)
            .await
            .unwrap_err();
        assert_eq!(error.code(), "Canceled");

        let error = run(&keygate, parse(&["reset", "user-7"]).command)
            .await
            .unwrap_err();
        assert_eq!(error.code(), "KeyNotFound");
        Ok(())
    }
}
