//! saltpack: encrypt, sign and signcrypt messages from the command line
//!
//! Commands:
//!   keygen [--signing]              - print a fresh keypair as hex
//!   encrypt / decrypt               - public-key encryption to one or more recipients
//!   sign / verify                   - attached signatures
//!   sign-detached / verify-detached - detached signatures
//!   signcrypt / designcrypt         - signed encryption for Curve25519 or symmetric recipients
//!   armor / dearmor                 - BaseX armor on its own
//!   paperkey                        - derive keys from a paper key phrase
//!   config show                     - display the active configuration
//!
//! Keys are hex strings. Messages are armored unless `--binary` is given. Input is read
//! from `--input` or stdin and output goes to `--output` or stdout; everything else
//! (senders, signers, logs) is written to stderr.

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use secrecy::SecretString;
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use zeroize::Zeroizing;

use saltpack_armor::{ArmorOptions, ArmorStream, DearmorStream};
use saltpack_core::config::SaltpackConfig;
use saltpack_core::transform::copy;
use saltpack_core::{MessageType, Transform};
use saltpack_crypto::with_armor;
use saltpack_crypto::{
    sign_detached, verify_detached, BoxKeyPair, BoxPublicKey, BoxSecretKey, DecryptStream,
    DesigncryptStream, EncryptStream, PaperKey, PaperKeyParams, Recipient, RecipientKey,
    SignStream, SigncryptRecipient, SigncryptStream, SigningKeyPair, SigningPublicKey,
    SymmetricKey, VerifyStream,
};

const DEFAULT_CONFIG_PATH: &str = "~/.config/saltpack/config.toml";

// ── CLI structure ──────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(
    name = "saltpack",
    version,
    about = "Saltpack message encryption and signing",
    long_about = "saltpack: encrypt, sign, signcrypt and armor messages in the saltpack v2 format"
)]
struct Cli {
    /// Path to the configuration file (default: ~/.config/saltpack/config.toml)
    #[arg(long, short = 'c', env = "SALTPACK_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error); overrides the config file
    #[arg(long, env = "SALTPACK_LOG", global = true)]
    log: Option<String>,

    /// Log format; overrides the config file
    #[arg(long, env = "SALTPACK_LOG_FORMAT", global = true)]
    log_format: Option<LogFormat>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Debug, ValueEnum)]
enum LogFormat {
    Json,
    Text,
}

#[derive(Args, Debug)]
struct IoArgs {
    /// Input file (default: stdin)
    #[arg(long, short = 'i')]
    input: Option<PathBuf>,

    /// Output file (default: stdout)
    #[arg(long, short = 'o')]
    output: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct FramingArgs {
    /// Armor without the BEGIN/END framing
    #[arg(long)]
    raw: bool,

    /// Application name in the armor framing (overrides the config file)
    #[arg(long)]
    app_name: Option<String>,
}

#[derive(Args, Debug)]
struct ArmorArgs {
    /// Read or write binary messages instead of armor
    #[arg(long)]
    binary: bool,

    #[command(flatten)]
    framing: FramingArgs,
}

#[derive(Args, Debug)]
struct SecretArgs {
    /// Secret key as hex: an X25519 secret key for encryption, an Ed25519 seed for signing
    #[arg(long, short = 'k', env = "SALTPACK_SECRET_KEY", hide_env_values = true)]
    key: Option<String>,

    /// Derive the key from a paper key phrase (SALTPACK_PAPER_KEY or a terminal prompt)
    #[arg(long, conflicts_with = "key")]
    paper_key: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Generate a keypair and print it as hex
    Keygen {
        /// Generate an Ed25519 signing keypair instead of an X25519 encryption keypair
        #[arg(long)]
        signing: bool,
    },

    /// Encrypt a message for one or more recipients
    ///
    /// Without a secret key the message is sent anonymously.
    Encrypt {
        /// Recipient X25519 public key (hex); repeatable
        #[arg(
            long = "recipient",
            short = 'r',
            required_unless_present = "hidden_recipients"
        )]
        recipients: Vec<String>,

        /// Recipient whose public key is left out of the header (hex); repeatable
        #[arg(long = "hidden-recipient")]
        hidden_recipients: Vec<String>,

        #[command(flatten)]
        secret: SecretArgs,

        #[command(flatten)]
        armor: ArmorArgs,

        #[command(flatten)]
        io: IoArgs,
    },

    /// Decrypt a message
    Decrypt {
        /// Fail unless the message is from this sender (X25519 public key, hex)
        #[arg(long)]
        sender: Option<String>,

        #[command(flatten)]
        secret: SecretArgs,

        #[command(flatten)]
        armor: ArmorArgs,

        #[command(flatten)]
        io: IoArgs,
    },

    /// Produce an attached signature
    Sign {
        #[command(flatten)]
        secret: SecretArgs,

        #[command(flatten)]
        armor: ArmorArgs,

        #[command(flatten)]
        io: IoArgs,
    },

    /// Verify an attached signature and print the signed message
    Verify {
        /// Fail unless signed by this key (Ed25519 public key, hex)
        #[arg(long)]
        signer: Option<String>,

        #[command(flatten)]
        armor: ArmorArgs,

        #[command(flatten)]
        io: IoArgs,
    },

    /// Produce a detached signature over a message
    SignDetached {
        #[command(flatten)]
        secret: SecretArgs,

        #[command(flatten)]
        armor: ArmorArgs,

        #[command(flatten)]
        io: IoArgs,
    },

    /// Check a detached signature over a message
    VerifyDetached {
        /// File holding the detached signature
        #[arg(long, short = 's')]
        signature: PathBuf,

        /// Signed message (default: stdin)
        #[arg(long, short = 'i')]
        input: Option<PathBuf>,

        /// Fail unless signed by this key (Ed25519 public key, hex)
        #[arg(long)]
        signer: Option<String>,

        #[command(flatten)]
        armor: ArmorArgs,
    },

    /// Sign and encrypt a message
    ///
    /// Without a secret key the message is sent anonymously.
    Signcrypt {
        /// Recipient X25519 public key (hex); repeatable
        #[arg(
            long = "recipient",
            short = 'r',
            required_unless_present = "symmetric_recipients"
        )]
        recipients: Vec<String>,

        /// Pre-shared 32-byte symmetric key (hex); repeatable
        #[arg(long = "symmetric-recipient")]
        symmetric_recipients: Vec<String>,

        #[command(flatten)]
        secret: SecretArgs,

        #[command(flatten)]
        armor: ArmorArgs,

        #[command(flatten)]
        io: IoArgs,
    },

    /// Decrypt a signcrypted message and check its signatures
    Designcrypt {
        /// Pre-shared symmetric key to try (hex)
        #[arg(long, env = "SALTPACK_SYMMETRIC_KEY", hide_env_values = true)]
        symmetric_key: Option<String>,

        /// Fail unless signed by this key (Ed25519 public key, hex)
        #[arg(long)]
        sender: Option<String>,

        #[command(flatten)]
        secret: SecretArgs,

        #[command(flatten)]
        armor: ArmorArgs,

        #[command(flatten)]
        io: IoArgs,
    },

    /// Armor arbitrary bytes
    Armor {
        /// Message type written to the framing
        #[arg(long = "type", value_enum, default_value = "message")]
        message_type: ArmorType,

        #[command(flatten)]
        framing: FramingArgs,

        #[command(flatten)]
        io: IoArgs,
    },

    /// Strip armor and print the bytes it carries
    Dearmor {
        #[command(flatten)]
        framing: FramingArgs,

        #[command(flatten)]
        io: IoArgs,
    },

    /// Derive signing and encryption keys from a paper key phrase
    Paperkey {
        /// Also print the derived secret key and seed
        #[arg(long)]
        show_secrets: bool,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Print the active configuration (merged defaults + config file)
    Show,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ArmorType {
    Encrypted,
    Signed,
    Detached,
    Message,
}

impl From<ArmorType> for MessageType {
    fn from(value: ArmorType) -> Self {
        match value {
            ArmorType::Encrypted => MessageType::EncryptedMessage,
            ArmorType::Signed => MessageType::SignedMessage,
            ArmorType::Detached => MessageType::DetachedSignature,
            ArmorType::Message => MessageType::Message,
        }
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    let cli = Cli::parse();

    let explicit = cli.config.is_some();
    let config_path = expand_tilde(
        cli.config
            .as_deref()
            .unwrap_or_else(|| Path::new(DEFAULT_CONFIG_PATH)),
    );
    let file_config = read_config(&config_path)?;
    let found = file_config.is_some();
    let config = file_config.unwrap_or_default();

    let level = cli
        .log
        .clone()
        .unwrap_or_else(|| config.logging.level.clone());
    let format = cli.log_format.clone().unwrap_or_else(|| {
        LogFormat::from_str(&config.logging.format, true).unwrap_or(LogFormat::Text)
    });
    init_logging(&level, &format);

    if !found && explicit {
        warn!(
            "config file not found: {}  (using defaults)",
            config_path.display()
        );
    }
    debug!(
        version = env!("CARGO_PKG_VERSION"),
        config = %config_path.display(),
        found,
        "saltpack starting"
    );

    run(cli.command, &config, &config_path)
}

fn run(command: Commands, config: &SaltpackConfig, config_path: &Path) -> Result<()> {
    match command {
        Commands::Keygen { signing } => cmd_keygen(signing),
        Commands::Encrypt {
            recipients,
            hidden_recipients,
            secret,
            armor,
            io,
        } => cmd_encrypt(config, &recipients, &hidden_recipients, &secret, &armor, &io),
        Commands::Decrypt {
            sender,
            secret,
            armor,
            io,
        } => cmd_decrypt(config, sender.as_deref(), &secret, &armor, &io),
        Commands::Sign { secret, armor, io } => cmd_sign(config, &secret, &armor, &io),
        Commands::Verify { signer, armor, io } => {
            cmd_verify(config, signer.as_deref(), &armor, &io)
        }
        Commands::SignDetached { secret, armor, io } => {
            cmd_sign_detached(config, &secret, &armor, &io)
        }
        Commands::VerifyDetached {
            signature,
            input,
            signer,
            armor,
        } => cmd_verify_detached(config, &signature, input.as_deref(), signer.as_deref(), &armor),
        Commands::Signcrypt {
            recipients,
            symmetric_recipients,
            secret,
            armor,
            io,
        } => cmd_signcrypt(config, &recipients, &symmetric_recipients, &secret, &armor, &io),
        Commands::Designcrypt {
            symmetric_key,
            sender,
            secret,
            armor,
            io,
        } => cmd_designcrypt(
            config,
            symmetric_key.as_deref(),
            sender.as_deref(),
            &secret,
            &armor,
            &io,
        ),
        Commands::Armor {
            message_type,
            framing,
            io,
        } => cmd_armor(config, message_type, &framing, &io),
        Commands::Dearmor { framing, io } => cmd_dearmor(config, &framing, &io),
        Commands::Paperkey { show_secrets } => cmd_paperkey(config, show_secrets),
        Commands::Config {
            action: ConfigAction::Show,
        } => cmd_config_show(config, config_path),
    }
}

// ── Config + logging ──────────────────────────────────────────────────────────

/// `None` when there is no file at `path`
fn read_config(path: &Path) -> Result<Option<SaltpackConfig>> {
    if !path.exists() {
        return Ok(None);
    }
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading config: {}", path.display()))?;
    let config = toml::from_str(&content)
        .with_context(|| format!("parsing config: {}", path.display()))?;
    Ok(Some(config))
}

/// Expand `~` in path to the user's home directory
fn expand_tilde(path: &Path) -> PathBuf {
    let s = path.to_string_lossy();
    match s.strip_prefix("~/") {
        Some(rest) => {
            let home = std::env::var("HOME").unwrap_or_default();
            PathBuf::from(home).join(rest)
        }
        None => path.to_path_buf(),
    }
}

/// Logs go to stderr so they never mix with message output.
fn init_logging(level: &str, format: &LogFormat) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    match format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().json().with_writer(io::stderr))
                .init();
        }
        LogFormat::Text => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().with_writer(io::stderr))
                .init();
        }
    }
}

fn armor_options(config: &SaltpackConfig, framing: &FramingArgs) -> ArmorOptions {
    let mut options = ArmorOptions::from(&config.armor);
    options.raw |= framing.raw;
    if framing.app_name.is_some() {
        options.app_name = framing.app_name.clone();
    }
    options
}

// ── Keys ──────────────────────────────────────────────────────────────────────

fn parse_key(text: &str, what: &str) -> Result<Zeroizing<[u8; 32]>> {
    let bytes = Zeroizing::new(
        hex::decode(text.trim()).with_context(|| format!("{what} is not valid hex"))?,
    );
    let mut key = Zeroizing::new([0u8; 32]);
    if bytes.len() != key.len() {
        bail!("{what} must be 32 bytes, got {}", bytes.len());
    }
    key.copy_from_slice(&bytes);
    Ok(key)
}

fn parse_box_public(text: &str) -> Result<BoxPublicKey> {
    Ok(BoxPublicKey::from_bytes(*parse_key(text, "public key")?))
}

fn parse_signing_public(text: &str) -> Result<SigningPublicKey> {
    Ok(SigningPublicKey::from_bytes(*parse_key(
        text,
        "signing public key",
    )?))
}

fn read_paper_key(config: &SaltpackConfig) -> Result<PaperKey> {
    let phrase = match std::env::var("SALTPACK_PAPER_KEY") {
        Ok(phrase) => Zeroizing::new(phrase),
        Err(_) => Zeroizing::new(
            rpassword::prompt_password("Paper key: ").context("reading paper key from terminal")?,
        ),
    };
    let phrase = SecretString::from(phrase.trim().to_owned());
    PaperKey::derive(&phrase, &PaperKeyParams::from(&config.paperkey))
        .context("deriving keys from paper key")
}

fn box_keypair(args: &SecretArgs, config: &SaltpackConfig) -> Result<Option<BoxKeyPair>> {
    if args.paper_key {
        return Ok(Some(read_paper_key(config)?.encryption_keypair().clone()));
    }
    match args.key.as_deref() {
        Some(text) => {
            let secret = parse_key(text, "secret key")?;
            Ok(Some(BoxKeyPair::from_secret(BoxSecretKey::from_bytes(*secret))))
        }
        None => Ok(None),
    }
}

fn signing_keypair(args: &SecretArgs, config: &SaltpackConfig) -> Result<Option<SigningKeyPair>> {
    if args.paper_key {
        return Ok(Some(read_paper_key(config)?.signing_keypair().clone()));
    }
    match args.key.as_deref() {
        Some(text) => Ok(Some(SigningKeyPair::from_seed(&*parse_key(text, "signing seed")?))),
        None => Ok(None),
    }
}

fn required<T>(key: Option<T>, command: &str) -> Result<T> {
    key.with_context(|| format!("{command} needs a secret key: pass --key or --paper-key"))
}

// ── I/O ───────────────────────────────────────────────────────────────────────

fn open_input(path: Option<&Path>) -> Result<Box<dyn Read>> {
    match path {
        Some(path) => {
            let file = File::open(path)
                .with_context(|| format!("opening input: {}", path.display()))?;
            Ok(Box::new(BufReader::new(file)))
        }
        None => Ok(Box::new(io::stdin().lock())),
    }
}

fn open_output(path: Option<&Path>) -> Result<Box<dyn Write>> {
    match path {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("creating output: {}", path.display()))?;
            Ok(Box::new(BufWriter::new(file)))
        }
        None => Ok(Box::new(BufWriter::new(io::stdout().lock()))),
    }
}

fn read_all(path: Option<&Path>) -> Result<Vec<u8>> {
    let mut data = Vec::new();
    open_input(path)?
        .read_to_end(&mut data)
        .context("reading input")?;
    Ok(data)
}

fn write_all(path: Option<&Path>, data: &[u8]) -> Result<()> {
    let mut writer = open_output(path)?;
    writer.write_all(data).context("writing output")?;
    writer.flush().context("writing output")
}

/// Stream the input through `transform` into the output.
fn pump<T: Transform + ?Sized>(transform: &mut T, io: &IoArgs) -> Result<u64> {
    let mut reader = open_input(io.input.as_deref())?;
    let mut writer = open_output(io.output.as_deref())?;
    let written = copy(transform, &mut reader, &mut writer).context("processing message")?;
    debug!(bytes = written, "output written");
    Ok(written)
}

// ── `saltpack keygen` ─────────────────────────────────────────────────────────

fn cmd_keygen(signing: bool) -> Result<()> {
    if signing {
        let keypair = SigningKeyPair::generate();
        println!("seed:   {}", hex::encode(keypair.to_seed().as_slice()));
        println!("public: {}", hex::encode(keypair.public_key().as_bytes()));
    } else {
        let keypair = BoxKeyPair::generate();
        println!("secret: {}", hex::encode(keypair.secret_key().as_bytes()));
        println!("public: {}", hex::encode(keypair.public_key().as_bytes()));
    }
    Ok(())
}

// ── `saltpack encrypt` / `decrypt` ────────────────────────────────────────────

fn cmd_encrypt(
    config: &SaltpackConfig,
    recipients: &[String],
    hidden_recipients: &[String],
    secret: &SecretArgs,
    armor: &ArmorArgs,
    io: &IoArgs,
) -> Result<()> {
    let sender = box_keypair(secret, config)?;
    let mut all = Vec::with_capacity(recipients.len() + hidden_recipients.len());
    for text in recipients {
        all.push(Recipient::new(parse_box_public(text)?));
    }
    for text in hidden_recipients {
        all.push(Recipient::anonymous(parse_box_public(text)?));
    }

    let mut transform: Box<dyn Transform> = if armor.binary {
        Box::new(EncryptStream::new(sender.as_ref(), &all)?)
    } else {
        Box::new(with_armor::encrypt_and_armor_stream(
            sender.as_ref(),
            &all,
            &armor_options(config, &armor.framing),
        )?)
    };
    pump(&mut transform, io)?;
    Ok(())
}

fn cmd_decrypt(
    config: &SaltpackConfig,
    sender: Option<&str>,
    secret: &SecretArgs,
    armor: &ArmorArgs,
    io: &IoArgs,
) -> Result<()> {
    let keypair = required(box_keypair(secret, config)?, "decrypt")?;
    let expected = sender.map(parse_box_public).transpose()?;

    let (sender, anonymous) = if armor.binary {
        let mut stream = DecryptStream::new(&keypair, expected.as_ref());
        pump(&mut stream, io).context("decrypting message")?;
        (stream.sender_public_key(), stream.is_anonymous_sender())
    } else {
        let mut pipe = with_armor::dearmor_and_decrypt_stream(
            &keypair,
            expected.as_ref(),
            &armor_options(config, &armor.framing),
        )?;
        pump(&mut pipe, io).context("decrypting message")?;
        (
            pipe.second().sender_public_key(),
            pipe.second().is_anonymous_sender(),
        )
    };

    match (sender, anonymous) {
        (_, Some(true)) => eprintln!("sender: anonymous"),
        (Some(sender), _) => eprintln!("sender: {}", hex::encode(sender.as_bytes())),
        _ => {}
    }
    Ok(())
}

// ── `saltpack sign` / `verify` ────────────────────────────────────────────────

fn cmd_sign(
    config: &SaltpackConfig,
    secret: &SecretArgs,
    armor: &ArmorArgs,
    io: &IoArgs,
) -> Result<()> {
    let keypair = required(signing_keypair(secret, config)?, "sign")?;
    let mut transform: Box<dyn Transform> = if armor.binary {
        Box::new(SignStream::new(&keypair)?)
    } else {
        Box::new(with_armor::sign_and_armor_stream(
            &keypair,
            &armor_options(config, &armor.framing),
        )?)
    };
    pump(&mut transform, io)?;
    Ok(())
}

fn cmd_verify(
    config: &SaltpackConfig,
    signer: Option<&str>,
    armor: &ArmorArgs,
    io: &IoArgs,
) -> Result<()> {
    let expected = signer.map(parse_signing_public).transpose()?;

    let signer = if armor.binary {
        let mut stream = VerifyStream::new(expected.as_ref());
        pump(&mut stream, io).context("verifying message")?;
        stream.public_key()
    } else {
        let mut pipe = with_armor::dearmor_and_verify_stream(
            expected.as_ref(),
            &armor_options(config, &armor.framing),
        )?;
        pump(&mut pipe, io).context("verifying message")?;
        pipe.second().public_key()
    };

    if let Some(signer) = signer {
        eprintln!("signed by: {}", hex::encode(signer.as_bytes()));
    }
    Ok(())
}

fn cmd_sign_detached(
    config: &SaltpackConfig,
    secret: &SecretArgs,
    armor: &ArmorArgs,
    io: &IoArgs,
) -> Result<()> {
    let keypair = required(signing_keypair(secret, config)?, "sign-detached")?;
    let message = read_all(io.input.as_deref())?;

    let signature = if armor.binary {
        sign_detached(&message, &keypair)?
    } else {
        with_armor::sign_detached_and_armor(
            &message,
            &keypair,
            &armor_options(config, &armor.framing),
        )?
        .into_bytes()
    };
    write_all(io.output.as_deref(), &signature)
}

fn cmd_verify_detached(
    config: &SaltpackConfig,
    signature_path: &Path,
    input: Option<&Path>,
    signer: Option<&str>,
    armor: &ArmorArgs,
) -> Result<()> {
    let expected = signer.map(parse_signing_public).transpose()?;
    let signature = std::fs::read(signature_path)
        .with_context(|| format!("reading signature: {}", signature_path.display()))?;
    let message = read_all(input)?;

    let checked = if armor.binary {
        verify_detached(&signature, &message, expected.as_ref())
    } else {
        with_armor::verify_detached_armored(
            &signature,
            &message,
            expected.as_ref(),
            &armor_options(config, &armor.framing),
        )
        .map(|checked| checked.value)
    };
    let signer = checked.context("verifying detached signature")?;

    eprintln!("signed by: {}", hex::encode(signer.as_bytes()));
    Ok(())
}

// ── `saltpack signcrypt` / `designcrypt` ──────────────────────────────────────

fn cmd_signcrypt(
    config: &SaltpackConfig,
    recipients: &[String],
    symmetric_recipients: &[String],
    secret: &SecretArgs,
    armor: &ArmorArgs,
    io: &IoArgs,
) -> Result<()> {
    let sender = signing_keypair(secret, config)?;
    let mut all = Vec::with_capacity(recipients.len() + symmetric_recipients.len());
    for text in recipients {
        all.push(SigncryptRecipient::Curve25519(parse_box_public(text)?));
    }
    for text in symmetric_recipients {
        let key = parse_key(text, "symmetric key")?;
        all.push(SigncryptRecipient::Symmetric(SymmetricKey::from_bytes(*key)));
    }

    let mut transform: Box<dyn Transform> = if armor.binary {
        Box::new(SigncryptStream::new(sender.as_ref(), &all)?)
    } else {
        Box::new(with_armor::signcrypt_and_armor_stream(
            sender.as_ref(),
            &all,
            &armor_options(config, &armor.framing),
        )?)
    };
    pump(&mut transform, io)?;
    Ok(())
}

fn cmd_designcrypt(
    config: &SaltpackConfig,
    symmetric_key: Option<&str>,
    sender: Option<&str>,
    secret: &SecretArgs,
    armor: &ArmorArgs,
    io: &IoArgs,
) -> Result<()> {
    let mut keys = Vec::new();
    if let Some(keypair) = box_keypair(secret, config)? {
        keys.push(RecipientKey::from(keypair));
    }
    if let Some(text) = symmetric_key {
        let key = parse_key(text, "symmetric key")?;
        keys.push(RecipientKey::symmetric(SymmetricKey::from_bytes(*key)));
    }
    if keys.is_empty() {
        bail!("designcrypt needs a key: pass --key, --paper-key or --symmetric-key");
    }
    let expected = sender.map(parse_signing_public).transpose()?;

    let sender = if armor.binary {
        let mut stream = DesigncryptStream::new(&keys, expected.as_ref());
        pump(&mut stream, io).context("designcrypting message")?;
        stream.sender_public_key()
    } else {
        let mut pipe = with_armor::dearmor_and_designcrypt_stream(
            &keys,
            expected.as_ref(),
            &armor_options(config, &armor.framing),
        )?;
        pump(&mut pipe, io).context("designcrypting message")?;
        pipe.second().sender_public_key()
    };

    match sender {
        Some(sender) => eprintln!("signed by: {}", hex::encode(sender.as_bytes())),
        None => eprintln!("signed by: anonymous"),
    }
    Ok(())
}

// ── `saltpack armor` / `dearmor` ──────────────────────────────────────────────

fn cmd_armor(
    config: &SaltpackConfig,
    message_type: ArmorType,
    framing: &FramingArgs,
    io: &IoArgs,
) -> Result<()> {
    let options = armor_options(config, framing).with_message_type(message_type.into());
    let mut stream = ArmorStream::new(options).context("invalid armor options")?;
    pump(&mut stream, io)?;
    Ok(())
}

fn cmd_dearmor(config: &SaltpackConfig, framing: &FramingArgs, io: &IoArgs) -> Result<()> {
    let mut stream =
        DearmorStream::new(armor_options(config, framing)).context("invalid armor options")?;
    pump(&mut stream, io).context("dearmoring input")?;

    if let Some(info) = stream.header_info() {
        debug!(message_type = %info.message_type, app = ?info.app_name, "dearmored");
    }
    if let Some(remaining) = stream.remaining() {
        if !remaining.iter().all(u8::is_ascii_whitespace) {
            warn!(bytes = remaining.len(), "ignoring text after the armor footer");
        }
    }
    Ok(())
}

// ── `saltpack paperkey` ───────────────────────────────────────────────────────

fn cmd_paperkey(config: &SaltpackConfig, show_secrets: bool) -> Result<()> {
    let paper_key = read_paper_key(config)?;

    if let Some(label) = paper_key.label() {
        println!("label:          {label}");
    }
    println!(
        "signing key:    {}",
        hex::encode(paper_key.signing_keypair().public_key().as_bytes())
    );
    println!(
        "encryption key: {}",
        hex::encode(paper_key.encryption_keypair().public_key().as_bytes())
    );
    if show_secrets {
        println!(
            "signing seed:   {}",
            hex::encode(paper_key.signing_keypair().to_seed().as_slice())
        );
        println!(
            "secret key:     {}",
            hex::encode(paper_key.encryption_keypair().secret_key().as_bytes())
        );
    }
    Ok(())
}

// ── `saltpack config show` ────────────────────────────────────────────────────

fn cmd_config_show(config: &SaltpackConfig, config_path: &Path) -> Result<()> {
    if config_path.exists() {
        println!("# Configuration from: {}", config_path.display());
    } else {
        println!(
            "# Configuration: defaults (no file at {})",
            config_path.display()
        );
    }
    println!();
    let rendered = toml::to_string_pretty(config).context("serializing config to TOML")?;
    print!("{rendered}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    const ALICE_SECRET: &str = "5ce86efb75fa4e2c410f46e16de9f6acae1a1703528651b69bc176c088bef3ee";
    const ALICE_PUBLIC: &str = "1b1b58dd50ea14b60da17b790cd02754d970c9bab864ebb3c0f3016fe51d3f57";
    const BOB_SECRET: &str = "aa3c626bc9c38c8c201878ebb1d5b0b50ac40e8986c78793db1d4ef369fca1ce";
    const BOB_PUBLIC: &str = "60346e7c911a5f6ba154129174cafe75b294ac3bbd5549632f48cec6266f8410";
    const SEED: &str = "0101010101010101010101010101010101010101010101010101010101010101";
    const SEED_PUBLIC: &str = "8a88e3dd7409f195fd52db2d3cba5d72ca6709bf1d94121bf3748801b40f6f5c";

    fn execute(args: &[&str]) -> Result<()> {
        let cli = Cli::try_parse_from(std::iter::once("saltpack").chain(args.iter().copied()))?;
        run(cli.command, &SaltpackConfig::default(), Path::new("unused.toml"))
    }

    fn path_str(path: &Path) -> &str {
        path.to_str().unwrap()
    }

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parse_key_checks_hex_and_length() {
        assert_eq!(*parse_key(&"00".repeat(32), "key").unwrap(), [0u8; 32]);
        assert!(parse_key("zz", "key").is_err());
        assert!(parse_key(&"00".repeat(31), "key").is_err());
        assert_eq!(
            parse_box_public(&format!(" {BOB_PUBLIC}\n")).unwrap(),
            BoxKeyPair::from_secret(BoxSecretKey::from_bytes(*parse_key(BOB_SECRET, "k").unwrap()))
                .public_key()
        );
    }

    #[test]
    fn expand_tilde_uses_home() {
        let expanded = expand_tilde(Path::new("~/x/config.toml"));
        assert!(expanded.ends_with("x/config.toml"));
        assert_eq!(expand_tilde(Path::new("/etc/a.toml")), PathBuf::from("/etc/a.toml"));
    }

    #[test]
    fn armor_flags_override_config() {
        let mut config = SaltpackConfig::default();
        config.armor.app_name = Some("KEYBASE".into());
        let framing = FramingArgs {
            raw: false,
            app_name: None,
        };
        assert_eq!(
            armor_options(&config, &framing).app_name.as_deref(),
            Some("KEYBASE")
        );

        let framing = FramingArgs {
            raw: true,
            app_name: Some("OTHER".into()),
        };
        let options = armor_options(&config, &framing);
        assert!(options.raw);
        assert_eq!(options.app_name.as_deref(), Some("OTHER"));
    }

    #[test]
    fn missing_config_reads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        assert!(read_config(&dir.path().join("absent.toml")).unwrap().is_none());

        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[armor]\napp_name = \"KEYBASE\"\n").unwrap();
        let config = read_config(&path).unwrap().unwrap();
        assert_eq!(config.armor.app_name.as_deref(), Some("KEYBASE"));

        std::fs::write(&path, "[armor\n").unwrap();
        assert!(read_config(&path).is_err());
    }

    #[test]
    fn encrypt_then_decrypt_files() {
        let dir = tempfile::tempdir().unwrap();
        let plain = dir.path().join("plain.txt");
        let sealed = dir.path().join("sealed.txt");
        let opened = dir.path().join("opened.txt");
        std::fs::write(&plain, b"meet at noon").unwrap();

        execute(&[
            "encrypt", "-r", BOB_PUBLIC, "-k", ALICE_SECRET,
            "-i", path_str(&plain), "-o", path_str(&sealed),
        ])
        .unwrap();
        let armored = std::fs::read_to_string(&sealed).unwrap();
        assert!(armored.starts_with("BEGIN SALTPACK ENCRYPTED MESSAGE."));

        execute(&[
            "decrypt", "-k", BOB_SECRET, "--sender", ALICE_PUBLIC,
            "-i", path_str(&sealed), "-o", path_str(&opened),
        ])
        .unwrap();
        assert_eq!(std::fs::read(&opened).unwrap(), b"meet at noon");

        let err = execute(&[
            "decrypt", "-k", ALICE_SECRET,
            "-i", path_str(&sealed), "-o", path_str(&opened),
        ]);
        assert!(err.is_err());
    }

    #[test]
    fn binary_sign_then_verify() {
        let dir = tempfile::tempdir().unwrap();
        let plain = dir.path().join("plain.txt");
        let signed = dir.path().join("signed.bin");
        let out = dir.path().join("out.txt");
        std::fs::write(&plain, b"signed words").unwrap();

        execute(&[
            "sign", "--binary", "-k", SEED,
            "-i", path_str(&plain), "-o", path_str(&signed),
        ])
        .unwrap();
        execute(&[
            "verify", "--binary", "--signer", SEED_PUBLIC,
            "-i", path_str(&signed), "-o", path_str(&out),
        ])
        .unwrap();
        assert_eq!(std::fs::read(&out).unwrap(), b"signed words");

        // Armored verification of a binary message fails
        assert!(execute(&["verify", "-i", path_str(&signed), "-o", path_str(&out)]).is_err());
    }

    #[test]
    fn detached_signature_files() {
        let dir = tempfile::tempdir().unwrap();
        let plain = dir.path().join("plain.txt");
        let signature = dir.path().join("plain.sig");
        std::fs::write(&plain, b"release notes").unwrap();

        execute(&[
            "sign-detached", "-k", SEED,
            "-i", path_str(&plain), "-o", path_str(&signature),
        ])
        .unwrap();
        execute(&[
            "verify-detached", "-s", path_str(&signature),
            "-i", path_str(&plain), "--signer", SEED_PUBLIC,
        ])
        .unwrap();

        std::fs::write(&plain, b"release notes, edited").unwrap();
        assert!(execute(&[
            "verify-detached", "-s", path_str(&signature), "-i", path_str(&plain),
        ])
        .is_err());
    }

    #[test]
    fn signcrypt_with_symmetric_key() {
        let dir = tempfile::tempdir().unwrap();
        let plain = dir.path().join("plain.txt");
        let sealed = dir.path().join("sealed.txt");
        let opened = dir.path().join("opened.txt");
        let shared = "42".repeat(32);
        let shared = shared.as_str();
        std::fs::write(&plain, b"for the team").unwrap();

        execute(&[
            "signcrypt", "--symmetric-recipient", shared, "-r", BOB_PUBLIC, "-k", SEED,
            "-i", path_str(&plain), "-o", path_str(&sealed),
        ])
        .unwrap();
        execute(&[
            "designcrypt", "--symmetric-key", shared, "--sender", SEED_PUBLIC,
            "-i", path_str(&sealed), "-o", path_str(&opened),
        ])
        .unwrap();
        assert_eq!(std::fs::read(&opened).unwrap(), b"for the team");

        execute(&[
            "designcrypt", "-k", BOB_SECRET,
            "-i", path_str(&sealed), "-o", path_str(&opened),
        ])
        .unwrap();
        assert_eq!(std::fs::read(&opened).unwrap(), b"for the team");
    }

    #[test]
    fn armor_then_dearmor() {
        let dir = tempfile::tempdir().unwrap();
        let plain = dir.path().join("plain.bin");
        let armored = dir.path().join("armored.txt");
        let back = dir.path().join("back.bin");
        std::fs::write(&plain, [0u8, 1, 2, 250, 251, 252]).unwrap();

        execute(&[
            "armor", "--type", "signed", "--app-name", "TEST",
            "-i", path_str(&plain), "-o", path_str(&armored),
        ])
        .unwrap();
        assert!(std::fs::read_to_string(&armored)
            .unwrap()
            .starts_with("BEGIN TEST SALTPACK SIGNED MESSAGE."));

        execute(&["dearmor", "-i", path_str(&armored), "-o", path_str(&back)]).unwrap();
        assert_eq!(std::fs::read(&back).unwrap(), [0u8, 1, 2, 250, 251, 252]);
    }

    #[test]
    fn encrypt_needs_a_recipient() {
        assert!(Cli::try_parse_from(["saltpack", "encrypt"]).is_err());
        assert!(Cli::try_parse_from(["saltpack", "encrypt", "--hidden-recipient", BOB_PUBLIC]).is_ok());
    }
}
