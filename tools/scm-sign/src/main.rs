//! scm-sign: command-line access to the cross-world message authentication layer.
//!
//! Mints nonces, builds and signs envelopes, verifies signatures, runs the
//! structural validator, and demonstrates the full pipeline in-process.

use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde_json::{json, Value};

use scm_security::{
    CrossWorldValidator, Envelope, MessageAuthenticationApi, MessageSigner, MessageValidator,
    NonceManager, SecurityLevel, SecuritySettings, SigningKey, ValidatorOptions,
};
use scm_telemetry::{init_logging, TelemetryConfig};

/// scm-sign: cross-world envelope tool
#[derive(Parser, Debug)]
#[command(name = "scm-sign")]
#[command(about = "Mint, sign, verify and inspect cross-world envelopes")]
struct Args {
    /// Emit logs as JSON
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print a fresh nonce
    Nonce,

    /// Build, nonce and sign an envelope; print it as JSON
    Envelope {
        /// Message type
        #[arg(long = "type")]
        message_type: String,

        /// Payload as a JSON object
        #[arg(long)]
        payload: String,

        /// Source tag
        #[arg(long, default_value = scm_security::domain::SOURCE_INJECTED)]
        source: String,

        #[command(flatten)]
        key: KeyArgs,
    },

    /// Check an envelope's signature
    Verify {
        #[command(flatten)]
        key: KeyArgs,

        /// Envelope file, or - for stdin
        #[arg(long, default_value = "-")]
        file: PathBuf,
    },

    /// Run the structural validator on an envelope
    Check {
        /// Envelope file, or - for stdin
        #[arg(long, default_value = "-")]
        file: PathBuf,
    },

    /// Sign, validate, replay and tamper with an envelope in-process
    Demo {
        /// basic, moderate or strict
        #[arg(long, default_value = "strict")]
        level: SecurityLevel,

        /// Shared secret for the demo key
        #[arg(long, default_value = "demo-secret")]
        secret: String,
    },
}

#[derive(clap::Args, Debug)]
struct KeyArgs {
    /// Shared secret
    #[arg(long, env = "SCM_SECRET", hide_env_values = true)]
    secret: String,

    /// Key derivation salt (default: built-in salt)
    #[arg(long)]
    salt: Option<String>,
}

impl KeyArgs {
    fn derive(&self, signer: &MessageSigner) -> Result<SigningKey> {
        signer
            .generate_signing_key(&self.secret, self.salt.as_deref().map(str::as_bytes))
            .context("failed to derive signing key")
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let telemetry = TelemetryConfig::from_env().with_json(args.json_logs);
    if let Err(e) = init_logging(&telemetry) {
        eprintln!("Warning: logging disabled: {e}");
    }

    match run(args.command).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

/// Returns whether the command succeeded.
async fn run(command: Command) -> Result<bool> {
    match command {
        Command::Nonce => {
            let nonce = NonceManager::new().generate()?;
            println!("{nonce}");
            Ok(true)
        }

        Command::Envelope {
            message_type,
            payload,
            source,
            key,
        } => {
            let payload: Value = serde_json::from_str(&payload).context("payload is not JSON")?;
            let Value::Object(payload) = payload else {
                bail!("payload must be a JSON object");
            };

            let signer = MessageSigner::new();
            let key = key.derive(&signer)?;
            let nonce = NonceManager::new().generate()?;
            let envelope = Envelope::new(message_type, payload, source).with_nonce(nonce);
            let envelope = signer.sign_envelope(envelope, Some(&key))?;

            println!("{}", serde_json::to_string_pretty(&envelope)?);
            Ok(true)
        }

        Command::Verify { key, file } => {
            let message = read_envelope(&file)?;
            let signer = MessageSigner::new();
            let key = key.derive(&signer)?;
            let signature = message
                .get("signature")
                .and_then(Value::as_str)
                .unwrap_or_default();

            let valid = signer.verify_signature(&message, signature, Some(&key));
            println!("{}", json!({ "signatureValid": valid }));
            Ok(valid)
        }

        Command::Check { file } => {
            let message = read_envelope(&file)?;
            let report = MessageValidator::new().validate(&message);
            println!(
                "{}",
                serde_json::to_string_pretty(&json!({
                    "valid": report.valid,
                    "errors": report.messages(),
                }))?
            );
            Ok(report.valid)
        }

        Command::Demo { level, secret } => demo(level, &secret).await,
    }
}

async fn demo(level: SecurityLevel, secret: &str) -> Result<bool> {
    let signer = MessageSigner::new();
    let key = signer.generate_signing_key(secret, None)?;

    let settings = SecuritySettings {
        level,
        ..SecuritySettings::default()
    };
    let validator = CrossWorldValidator::new(
        ValidatorOptions::builder()
            .settings(settings)
            .signing_key(key.clone())
            .build()?,
    );

    let nonce = validator.issue_nonce().await?;
    let mut payload = serde_json::Map::new();
    payload.insert("ready".into(), Value::Bool(true));
    let envelope = Envelope::typed(
        scm_security::MessageType::CategoryManagerReady,
        payload,
        scm_security::domain::SOURCE_INJECTED,
    )
    .with_nonce(nonce);
    let envelope = signer.sign_envelope(envelope, Some(&key))?;
    let message = envelope.to_value();

    let mut tampered = message.clone();
    tampered["payload"]["ready"] = Value::Bool(false);

    let fresh = validator.validate(&message).await;
    let replay = validator.validate(&message).await;

    // Tampering is only observable with a fresh nonce at levels that check one.
    let tamper_nonce = validator.issue_nonce().await?;
    tampered["nonce"] = Value::String(tamper_nonce);
    let tamper = validator.validate(&tampered).await;

    tracing::info!(
        %level,
        fresh = fresh.valid,
        replay = replay.valid,
        tamper = tamper.valid,
        "Demo finished"
    );

    let report = json!({
        "securityLevel": level,
        "fresh": fresh,
        "replay": replay,
        "tampered": tamper,
        "statistics": validator.statistics(),
        "logs": validator.logger().export_logs(),
    });
    println!("{}", serde_json::to_string_pretty(&report)?);

    validator.shutdown();
    Ok(fresh.valid)
}

fn read_envelope(path: &Path) -> Result<Value> {
    let text = if path.as_os_str() == "-" {
        let mut buf = String::new();
        io::stdin()
            .read_to_string(&mut buf)
            .context("failed to read stdin")?;
        buf
    } else {
        std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?
    };
    serde_json::from_str(&text).context("envelope is not JSON")
}
