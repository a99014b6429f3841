#![forbid(unsafe_code)]
//! `cellar` command-line interface.

use std::io::{self, Read};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use cellar::{BLOCK_SIZE, Cellar, CellarOptions, Cipher, KEY_SIZE, is_obfuscated, read_key_file};
use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;
use zeroize::Zeroizing;

#[derive(Parser, Debug)]
#[command(
    name = "cellar",
    version,
    about = "Encrypt/decrypt files and directories, names included, with a secret key",
    long_about = format!(
        "Encrypt/decrypt files and directories, names included, with a secret key.\n\
         The key must be {KEY_SIZE} bytes long. Shorter keys are padded with null bytes, \
         longer keys are truncated."
    )
)]
struct Cli {
    /// Increase log output (-v info, -vv debug, -vvv trace). RUST_LOG overrides.
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    verbose: u8,

    #[command(flatten)]
    key: KeyArgs,

    /// AEAD cipher (must match between encryption and decryption)
    #[arg(short = 'c', long, value_enum, default_value_t = CipherChoice::Xsalsa)]
    cipher: CipherChoice,

    /// Plaintext bytes per chunk (must match between encryption and decryption)
    #[arg(short = 'b', long, default_value_t = BLOCK_SIZE)]
    block_size: usize,

    /// Worker threads for directories (default: one per CPU)
    #[arg(short = 'j', long)]
    jobs: Option<usize>,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Args, Debug)]
struct KeyArgs {
    /// File holding the secret key
    #[arg(short = 'k', long = "key-file", env = "CELLAR_KEYFILE")]
    key_file: Option<PathBuf>,

    /// Byte offset into the key file; reads one key from there
    #[arg(short = 'o', long = "offset", requires = "key_file")]
    offset: Option<u64>,

    /// Text to use as secret key, "-" reads it from stdin. Do NOT type your key on the
    /// command line, it ends up in your shell history
    #[arg(short = 'p', long = "key-phrase", env = "CELLAR_KEYPHRASE", hide_env_values = true)]
    key_phrase: Option<String>,

    /// Prompt for the secret key
    #[arg(short = 'P', long = "key-prompt", env = "CELLAR_KEYPROMPT")]
    key_prompt: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Encrypt files or directories ("-" pipes stdin to stdout)
    Encrypt(TransformArgs),
    /// Decrypt files or directories ("-" pipes stdin to stdout)
    Decrypt(TransformArgs),
    /// Show the original names inside encrypted files or directories
    Ls(LsArgs),
}

#[derive(Args, Debug)]
struct TransformArgs {
    /// Files, directories or "-"
    #[arg(required = true)]
    paths: Vec<PathBuf>,

    /// Keep the source. By default it is deleted once the operation completes successfully.
    #[arg(short = 'p', long)]
    preserve: bool,
}

#[derive(Args, Debug)]
struct LsArgs {
    /// Encrypted files or directories
    #[arg(required = true)]
    paths: Vec<PathBuf>,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum CipherChoice {
    Xsalsa,
    Xchacha,
}

impl From<CipherChoice> for Cipher {
    fn from(v: CipherChoice) -> Self {
        match v {
            CipherChoice::Xsalsa => Cipher::XSalsa20Poly1305,
            CipherChoice::Xchacha => Cipher::XChaCha20Poly1305,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let paths = match &cli.cmd {
        Command::Encrypt(a) | Command::Decrypt(a) => &a.paths,
        Command::Ls(a) => &a.paths,
    };
    let key = read_key(&cli.key, paths)?;

    let mut opts = CellarOptions::default()
        .with_cipher(cli.cipher.into())
        .with_block_size(cli.block_size);
    if let Some(jobs) = cli.jobs {
        opts = opts.with_jobs(jobs);
    }
    if let Command::Encrypt(a) | Command::Decrypt(a) = &cli.cmd {
        opts = opts.with_preserve(a.preserve);
    }
    let cellar = Cellar::new(&key, opts).context("invalid options")?;
    drop(key);

    match cli.cmd {
        Command::Encrypt(a) => cmd_encrypt(&cellar, &a.paths),
        Command::Decrypt(a) => cmd_decrypt(&cellar, &a.paths),
        Command::Ls(a) => cmd_ls(&cellar, &a.paths),
    }
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn is_stdio(path: &Path) -> bool {
    path.as_os_str() == "-"
}

/// Resolve the secret key: phrase, then key file, then prompt.
fn read_key(args: &KeyArgs, paths: &[PathBuf]) -> Result<Zeroizing<Vec<u8>>> {
    let key = if let Some(phrase) = &args.key_phrase {
        if phrase == "-" {
            if paths.iter().any(|p| is_stdio(p)) {
                bail!("cannot read both the key and the data from stdin");
            }
            let mut buf = Zeroizing::new(Vec::new());
            io::stdin().lock().read_to_end(&mut buf)?;
            buf
        } else {
            Zeroizing::new(phrase.as_bytes().to_vec())
        }
    } else if let Some(path) = &args.key_file {
        read_key_file(path, args.offset.unwrap_or(0))
            .with_context(|| format!("reading key file {}", path.display()))?
    } else if args.key_prompt {
        let pw = Zeroizing::new(rpassword::prompt_password("Secret key: ")?);
        Zeroizing::new(pw.as_bytes().to_vec())
    } else {
        bail!("must choose a key as a file (-k), phrase (-p) or prompt (-P)");
    };

    if key.is_empty() {
        bail!("the secret key is empty");
    }
    Ok(key)
}

fn cmd_encrypt(cellar: &Cellar, paths: &[PathBuf]) -> Result<()> {
    for path in paths {
        if is_stdio(path) {
            cellar
                .encrypt_stream(io::stdin().lock(), io::stdout().lock())
                .context("encryption of stdin failed")?;
            continue;
        }
        if path.file_name().is_some_and(is_obfuscated) {
            eprintln!("Skipping {} (already encrypted)", path.display());
            continue;
        }
        let out = cellar
            .encrypt_path(path)
            .with_context(|| format!("encryption of {} failed", path.display()))?;
        eprintln!("Encrypted {} -> {}", path.display(), out.display());
    }
    Ok(())
}

fn cmd_decrypt(cellar: &Cellar, paths: &[PathBuf]) -> Result<()> {
    for path in paths {
        if is_stdio(path) {
            cellar
                .decrypt_stream(io::stdin().lock(), io::stdout().lock())
                .context("decryption of stdin failed")?;
            continue;
        }
        let out = cellar
            .decrypt_path(path)
            .with_context(|| format!("decryption of {} failed", path.display()))?;
        eprintln!("Decrypted {} -> {}", path.display(), out.display());
    }
    Ok(())
}

fn cmd_ls(cellar: &Cellar, paths: &[PathBuf]) -> Result<()> {
    for path in paths {
        let names = cellar
            .list(path)
            .with_context(|| format!("listing {} failed", path.display()))?;
        for name in names {
            println!("{}", name.display());
        }
    }
    Ok(())
}
