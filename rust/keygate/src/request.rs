//! Method-name dispatch for hosts that speak in strings.
//!
//! Embedders that bridge keygate to another runtime receive a method name and
//! a bag of optional string arguments. [`KeyGate::call`] validates those in
//! a fixed order (key, payload, signature) before anything reaches the
//! platform, so a missing argument never shows a prompt.

use std::{fmt, str::FromStr};

use keygate_credentials::{P256PublicKey, P256Signature};
use keygate_storage::StorageBackend;
use serde::{Deserialize, Serialize};

use crate::{
    alias::KeyAlias,
    detector::ChangeStatus,
    error::{Field, KeyGateError},
    keystore::KeyStore,
    manager::KeyGate,
    platform::BiometricPlatform,
    prompt::PromptConfig,
};

/// An operation name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Method {
    /// `createKeyPair`
    CreateKeyPair,
    /// `sign`
    Sign,
    /// `verify`
    Verify,
    /// `isBiometricChanged`
    IsBiometricChanged,
    /// `resetBiometricChanged`
    ResetBiometricChanged,
}

impl Method {
    /// The wire name.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Method::CreateKeyPair => "createKeyPair",
            Method::Sign => "sign",
            Method::Verify => "verify",
            Method::IsBiometricChanged => "isBiometricChanged",
            Method::ResetBiometricChanged => "resetBiometricChanged",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An unrecognized method name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("method '{0}' is not implemented")]
pub struct UnknownMethod(pub String);

impl FromStr for Method {
    type Err = UnknownMethod;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "createKeyPair" => Ok(Method::CreateKeyPair),
            "sign" => Ok(Method::Sign),
            "verify" => Ok(Method::Verify),
            "isBiometricChanged" => Ok(Method::IsBiometricChanged),
            "resetBiometricChanged" => Ok(Method::ResetBiometricChanged),
            other => Err(UnknownMethod(other.to_owned())),
        }
    }
}

/// Loosely typed arguments, as a host delivers them.
///
/// Payloads are taken as UTF-8 text, signatures and public keys as base64.
/// Prompt fields sit next to the other arguments.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Arguments {
    /// Key alias.
    pub key: Option<String>,
    /// Text to sign or verify.
    pub payload: Option<String>,
    /// Base64 DER signature.
    pub signature: Option<String>,
    /// Base64 SPKI public key for [`Method::IsBiometricChanged`].
    pub public_key: Option<String>,
    /// Whether [`Method::Verify`] prompts first.
    pub authenticate: bool,
    /// Prompt text and key policy.
    #[serde(flatten)]
    pub prompt: PromptConfig,
}

impl Arguments {
    fn alias(&self) -> Result<KeyAlias, KeyGateError> {
        match &self.key {
            Some(key) => KeyAlias::new(key.as_str()),
            None => Err(KeyGateError::MissingArgument(Field::Key)),
        }
    }

    fn payload(&self) -> Result<&[u8], KeyGateError> {
        self.payload
            .as_deref()
            .map(str::as_bytes)
            .ok_or(KeyGateError::MissingArgument(Field::Payload))
    }

    fn signature(&self) -> Result<P256Signature, KeyGateError> {
        match self.signature.as_deref().map(str::trim) {
            None | Some("") => Err(KeyGateError::MissingArgument(Field::Signature)),
            Some(encoded) => {
                P256Signature::from_base64(encoded).map_err(|error| KeyGateError::InvalidArgument {
                    field: Field::Signature,
                    reason: error.to_string(),
                })
            }
        }
    }

    fn public_key(&self) -> Result<Option<P256PublicKey>, KeyGateError> {
        match self.public_key.as_deref().map(str::trim) {
            None => Ok(None),
            Some("") => Err(KeyGateError::MissingArgument(Field::PublicKey)),
            Some(encoded) => P256PublicKey::from_base64(encoded)
                .map(Some)
                .map_err(|error| KeyGateError::InvalidArgument {
                    field: Field::PublicKey,
                    reason: error.to_string(),
                }),
        }
    }
}

/// A method call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    /// Which operation.
    pub method: Method,
    /// Its arguments.
    #[serde(default)]
    pub arguments: Arguments,
}

impl Request {
    /// A call with no arguments yet.
    pub fn new(method: Method) -> Self {
        Self {
            method,
            arguments: Arguments::default(),
        }
    }

    /// Set the key alias.
    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.arguments.key = Some(key.into());
        self
    }

    /// Set the payload.
    pub fn payload(mut self, payload: impl Into<String>) -> Self {
        self.arguments.payload = Some(payload.into());
        self
    }

    /// Set the base64 signature.
    pub fn signature(mut self, signature: impl Into<String>) -> Self {
        self.arguments.signature = Some(signature.into());
        self
    }

    /// Set the base64 public key.
    pub fn public_key(mut self, public_key: impl Into<String>) -> Self {
        self.arguments.public_key = Some(public_key.into());
        self
    }

    /// Set the prompt.
    pub fn prompt(mut self, prompt: PromptConfig) -> Self {
        self.arguments.prompt = prompt;
        self
    }

    /// Require authentication for [`Method::Verify`].
    pub fn authenticate(mut self, authenticate: bool) -> Self {
        self.arguments.authenticate = authenticate;
        self
    }
}

/// The result of a method call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Response {
    /// A new public key.
    PublicKey(P256PublicKey),
    /// A signature.
    Signature(P256Signature),
    /// A verification verdict.
    Verified(bool),
    /// An enrollment change status.
    ChangeStatus(ChangeStatus),
    /// Success with nothing to report.
    Done,
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Response::PublicKey(public_key) => write!(f, "{public_key}"),
            Response::Signature(signature) => write!(f, "{signature}"),
            Response::Verified(verified) => write!(f, "{verified}"),
            Response::ChangeStatus(status) => write!(f, "{status}"),
            Response::Done => Ok(()),
        }
    }
}

impl<K, P, B> KeyGate<K, P, B>
where
    K: KeyStore,
    P: BiometricPlatform,
    B: StorageBackend<Key = String, Value = Vec<u8>>,
{
    /// Validate and run `request`.
    pub async fn call(&self, request: Request) -> Result<Response, KeyGateError> {
        let Request { method, arguments } = request;
        tracing::debug!(%method, "Handling request");

        match method {
            Method::CreateKeyPair => {
                let alias = arguments.alias()?;
                let public_key = self.create_key_pair(&alias, &arguments.prompt).await?;
                Ok(Response::PublicKey(public_key))
            }
            Method::Sign => {
                let alias = arguments.alias()?;
                let payload = arguments.payload()?;
                let signature = self.sign(&alias, payload, &arguments.prompt).await?;
                Ok(Response::Signature(signature))
            }
            Method::Verify => {
                let alias = arguments.alias()?;
                let payload = arguments.payload()?;
                let signature = arguments.signature()?;
                let prompt = arguments.authenticate.then_some(&arguments.prompt);
                let verified = self.verify(&alias, payload, &signature, prompt).await?;
                Ok(Response::Verified(verified))
            }
            Method::IsBiometricChanged => {
                let alias = arguments.alias()?;
                let status = match arguments.public_key()? {
                    Some(public_key) => self.is_biometric_changed_against(&alias, &public_key).await?,
                    None => self.is_biometric_changed(&alias).await?,
                };
                Ok(Response::ChangeStatus(status))
            }
            Method::ResetBiometricChanged => {
                let alias = arguments.alias()?;
                self.reset_biometric_changed(&alias).await?;
                Ok(Response::Done)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{KeyGateConfig, SimulatedPlatform};

    async fn error_code<K, P, B>(keygate: &KeyGate<K, P, B>, request: Request) -> &'static str
    where
        K: KeyStore,
        P: BiometricPlatform,
        B: StorageBackend<Key = String, Value = Vec<u8>>,
    {
        keygate.call(request).await.unwrap_err().code()
    }

    #[test]
    fn method_names_round_trip() {
        for method in [
            Method::CreateKeyPair,
            Method::Sign,
            Method::Verify,
            Method::IsBiometricChanged,
            Method::ResetBiometricChanged,
        ] {
            assert_eq!(method.as_str().parse::<Method>(), Ok(method));
        }
        assert_eq!(
            "deleteEverything".parse::<Method>(),
            Err(UnknownMethod("deleteEverything".into()))
        );
    }

    #[test]
    fn requests_parse_from_host_json() {
        let request: Request = serde_json::from_str(
            r#"{"method":"sign","arguments":{"key":"user-42","payload":"hello","title":"Confirm"}}"#,
        )
        .unwrap();
        assert_eq!(
            request,
            Request::new(Method::Sign)
                .key("user-42")
                .payload("hello")
                .prompt(PromptConfig::titled("Confirm"))
        );
    }

    #[tokio::test]
    async fn arguments_are_checked_in_order_before_prompting() {
        let keygate = KeyGate::in_memory(KeyGateConfig::default(), SimulatedPlatform::default());

        assert_eq!(error_code(&keygate, Request::new(Method::Verify)).await, "KeyIsNull");
        assert_eq!(
            error_code(&keygate, Request::new(Method::Verify).key("user-42")).await,
            "PayloadIsNull"
        );
        assert_eq!(
            error_code(&keygate, Request::new(Method::Verify).key("user-42").payload("x")).await,
            "SignatureIsNull"
        );
        assert_eq!(
            error_code(&keygate, Request::new(Method::Sign).key("").payload("x")).await,
            "KeyIsNull"
        );
        assert_eq!(
            error_code(
                &keygate,
                Request::new(Method::Verify)
                    .key("user-42")
                    .payload("x")
                    .signature("%%%")
            )
            .await,
            "InvalidArgument"
        );
        assert_eq!(keygate.platform().prompt_count(), 0);
    }

    #[tokio::test]
    async fn a_full_session_runs_through_method_names() {
        let keygate = KeyGate::in_memory(KeyGateConfig::default(), SimulatedPlatform::default());

        let Response::PublicKey(public_key) = keygate
            .call(Request::new(Method::CreateKeyPair).key("user-42"))
            .await
            .unwrap()
        else {
            panic!("expected a public key");
        };

        let signature = keygate
            .call(Request::new(Method::Sign).key("user-42").payload("hello"))
            .await
            .unwrap()
            .to_string();

        assert_eq!(
            keygate
                .call(
                    Request::new(Method::Verify)
                        .key("user-42")
                        .payload("hello")
                        .signature(signature)
                )
                .await
                .unwrap(),
            Response::Verified(true)
        );

        assert_eq!(
            keygate
                .call(
                    Request::new(Method::IsBiometricChanged)
                        .key("user-42")
                        .public_key(public_key.to_base64())
                )
                .await
                .unwrap(),
            Response::ChangeStatus(ChangeStatus::Unchanged)
        );
        assert_eq!(
            keygate
                .call(Request::new(Method::ResetBiometricChanged).key("user-42"))
                .await
                .unwrap(),
            Response::Done
        );
    }
}
