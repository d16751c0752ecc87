//! Account Vault CLI - encode and decode record documents from the command line
//!
//! Records are read as JSON objects (from a file or stdin) and written to
//! stdout. Logs go to stderr so the output can be piped straight into the
//! record store tooling.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing::{info, warn};

use vault_core::crypto::is_weak_passphrase;
use vault_core::{
    KeyContext, KeyPolicy, KeychainPassphraseStore, PassphraseProfile, PassphraseStore,
    PolicyKind, RecordKind, SensitiveFields, SensitiveRecord, Settings, SettingsManager,
    VaultError,
};

/// Account Vault - field-level encryption for stored account records
#[derive(Parser, Debug)]
#[command(name = "account-vault")]
#[command(version)]
#[command(about = "Encrypt and decrypt the sensitive fields of account records")]
struct Cli {
    /// Directory holding settings.json (defaults to the per-user config dir)
    #[arg(long, global = true, env = "VAULT_CONFIG_DIR")]
    config_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Encrypt the sensitive fields of a record
    Encode(RecordArgs),
    /// Decrypt the sensitive fields of a record
    Decode(RecordArgs),
    /// Create a passphrase profile for an owner
    InitProfile {
        #[arg(long, env = "VAULT_OWNER_ID")]
        owner: String,
        /// Where to write the profile JSON
        #[arg(long)]
        output: PathBuf,
    },
    /// Remove a remembered passphrase from the OS keychain
    ForgetPassphrase {
        #[arg(long, env = "VAULT_OWNER_ID")]
        owner: String,
    },
}

#[derive(Args, Debug)]
struct RecordArgs {
    /// Owner identifier issued by the authentication provider
    #[arg(long, env = "VAULT_OWNER_ID")]
    owner: String,

    /// Record kind whose preset sensitive fields are used
    #[arg(long, conflicts_with = "fields", required_unless_present = "fields")]
    kind: Option<String>,

    /// Comma-separated sensitive field names
    #[arg(long)]
    fields: Option<String>,

    /// Input JSON file (stdin if omitted)
    #[arg(long)]
    input: Option<PathBuf>,

    /// Override the key policy from settings
    #[arg(long, value_enum)]
    policy: Option<PolicyArg>,

    /// Passphrase profile JSON (passphrase policy only)
    #[arg(long)]
    profile: Option<PathBuf>,

    /// Passphrase (prompted for if omitted)
    #[arg(long, env = "VAULT_PASSPHRASE", hide_env_values = true)]
    passphrase: Option<String>,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum PolicyArg {
    Silent,
    Passphrase,
}

impl From<PolicyArg> for PolicyKind {
    fn from(arg: PolicyArg) -> Self {
        match arg {
            PolicyArg::Silent => PolicyKind::Silent,
            PolicyArg::Passphrase => PolicyKind::Passphrase,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let settings = load_settings(cli.config_dir.as_deref())?;

    match cli.command {
        Command::Encode(args) => run_record(&settings, args, Direction::Encode).await,
        Command::Decode(args) => run_record(&settings, args, Direction::Decode).await,
        Command::InitProfile { owner, output } => init_profile(&settings, &owner, &output).await,
        Command::ForgetPassphrase { owner } => {
            let store = KeychainPassphraseStore::new(None);
            store.forget(&owner).with_context(|| {
                format!("Failed to forget passphrase in {}", store.backend_name())
            })?;
            info!("Forgot remembered passphrase for {}", owner);
            Ok(())
        }
    }
}

fn load_settings(config_dir: Option<&Path>) -> anyhow::Result<Settings> {
    let manager = match config_dir {
        Some(dir) => SettingsManager::with_dir(dir),
        None => SettingsManager::new(),
    }
    .context("Failed to open settings")?;
    Ok(manager.get().clone())
}

#[derive(Clone, Copy)]
enum Direction {
    Encode,
    Decode,
}

async fn run_record(
    settings: &Settings,
    args: RecordArgs,
    direction: Direction,
) -> anyhow::Result<()> {
    let fields = match (&args.kind, &args.fields) {
        (Some(kind), _) => kind.parse::<RecordKind>()?.sensitive_fields(),
        (None, Some(list)) => SensitiveFields::parse_list(list),
        (None, None) => bail!("Either --kind or --fields is required"),
    };
    if fields.is_empty() {
        bail!("No sensitive fields selected");
    }

    let mut settings = settings.clone();
    if let Some(policy) = args.policy {
        settings.policy = policy.into();
    }

    let profile = match &args.profile {
        Some(path) => Some(read_profile(path).await?),
        None => None,
    };
    let policy = settings.key_policy(profile)?;
    match policy.profile() {
        Some(profile) if !profile.belongs_to(&args.owner) => {
            bail!("The passphrase profile was created for a different owner")
        }
        Some(_) => {}
        None => warn!(
            "Using the silent key policy: data is only protected against a compromised record store"
        ),
    }

    let mut ctx = KeyContext::new(policy);
    if settings.remember_passphrase {
        ctx = ctx.with_passphrase_store(Arc::new(KeychainPassphraseStore::new(None)));
    }
    ctx.sign_in(&args.owner)?;

    if ctx.policy().requires_passphrase() {
        unlock(&ctx, args.passphrase, settings.remember_passphrase, || {
            rpassword::prompt_password("Vault passphrase: ")
        })?;
    }

    let record = SensitiveRecord::from_json(read_input(args.input.as_deref())?)?;
    let output = match direction {
        Direction::Encode => ctx.encode_record(&record, &fields)?,
        Direction::Decode => ctx.decode_record(&record, &fields).map_err(|e| {
            if e.is_unreadable_data() {
                anyhow::anyhow!("Could not read this record - wrong key or corrupted data ({})", e)
            } else {
                e.into()
            }
        })?,
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

/// Make the key available, using a remembered passphrase when there is one
///
/// A remembered passphrase that no longer matches the profile is forgotten
/// and the user is prompted instead.
fn unlock<P>(
    ctx: &KeyContext,
    passphrase: Option<String>,
    remember: bool,
    prompt: P,
) -> anyhow::Result<()>
where
    P: FnOnce() -> std::io::Result<String>,
{
    if let Some(passphrase) = passphrase {
        return Ok(ctx.provide_passphrase(&passphrase, remember)?);
    }

    match ctx.current_key() {
        Ok(_) => {
            info!("Using remembered passphrase");
            return Ok(());
        }
        Err(VaultError::InvalidInput(_)) => {}
        Err(e) if e.is_unreadable_data() => {
            warn!("Remembered passphrase no longer matches this account; forgetting it");
            ctx.forget_passphrase()?;
        }
        Err(e) => return Err(e.into()),
    }

    let passphrase = prompt()?;
    Ok(ctx.provide_passphrase(&passphrase, remember)?)
}

async fn init_profile(settings: &Settings, owner: &str, output: &Path) -> anyhow::Result<()> {
    if output.exists() {
        bail!("{} already exists; refusing to overwrite a passphrase profile", output.display());
    }

    eprintln!(
        "If this passphrase is lost, every value encrypted under it is permanently unreadable."
    );
    let passphrase = rpassword::prompt_password("New vault passphrase: ")?;
    let confirm = rpassword::prompt_password("Repeat passphrase: ")?;
    if passphrase != confirm {
        bail!("Passphrases do not match");
    }
    if is_weak_passphrase(&passphrase) {
        warn!("Passphrase is shorter than the recommended minimum length");
    }

    let mut profile = PassphraseProfile::generate(owner, settings.kdf.clone());
    let key = KeyPolicy::passphrase(profile.clone()).derive(owner, Some(&passphrase))?;
    profile.seal(&key)?;

    let json = serde_json::to_string_pretty(&profile)?;
    tokio::fs::write(output, json)
        .await
        .with_context(|| format!("Failed to write {}", output.display()))?;

    info!("Wrote passphrase profile for {} to {}", owner, output.display());
    Ok(())
}

async fn read_profile(path: &Path) -> anyhow::Result<PassphraseProfile> {
    let json = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read profile {}", path.display()))?;
    serde_json::from_str(&json).with_context(|| format!("Invalid profile {}", path.display()))
}

fn read_input(path: Option<&Path>) -> anyhow::Result<serde_json::Value> {
    let mut raw = String::new();
    match path {
        Some(path) => {
            raw = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
        }
        None => {
            std::io::stdin().read_to_string(&mut raw)?;
        }
    }
    serde_json::from_str(&raw).context("Input is not valid JSON")
}
