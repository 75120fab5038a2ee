//! Statebox CLI - Passphrase-based Terraform state file protection
//!
//! Command-line interface for encrypting and decrypting a state file in
//! place using AES-256-GCM with PBKDF2 key derivation. The passphrase is
//! taken from the TFSTATE_PASSPHRASE environment variable by default so it
//! never appears in process listings.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process;

use statebox::file_ops;
use statebox::passphrase::{
    EnvPassphraseReader, PassphraseReader, ReaderPassphraseReader, TerminalPassphraseReader,
};

#[derive(Parser)]
#[command(name = "statebox")]
#[command(version)]
#[command(about = "Passphrase-based Terraform state file protection.", long_about = None)]
struct Cli {
    /// Read passphrase from stdin instead of the TFSTATE_PASSPHRASE
    /// environment variable
    #[arg(long, global = true)]
    passphrase_stdin: bool,

    /// Prompt for the passphrase on the terminal instead of reading the
    /// TFSTATE_PASSPHRASE environment variable
    #[arg(long, global = true, conflicts_with = "passphrase_stdin")]
    passphrase_prompt: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Encrypt a state file in place (no-op if the file does not exist)
    #[command(alias = "e")]
    Encrypt {
        /// Path to the state file to protect
        #[arg(value_name = "STATE_FILE")]
        state_file: PathBuf,
    },

    /// Decrypt a state file in place (no-op if the file does not exist)
    #[command(alias = "d")]
    Decrypt {
        /// Path to the state file to unprotect
        #[arg(value_name = "STATE_FILE")]
        state_file: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();

    let mut reader = get_passphrase_reader(cli.passphrase_stdin, cli.passphrase_prompt);
    let result = match cli.command {
        Commands::Encrypt { state_file } => file_ops::encrypt_file(&state_file, &mut *reader),
        Commands::Decrypt { state_file } => file_ops::decrypt_file(&state_file, &mut *reader),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e.render_chain());
        process::exit(1);
    }
}

fn get_passphrase_reader(use_stdin: bool, use_prompt: bool) -> Box<dyn PassphraseReader> {
    if use_stdin {
        Box::new(ReaderPassphraseReader::new(Box::new(std::io::stdin())))
    } else if use_prompt {
        Box::new(TerminalPassphraseReader)
    } else {
        Box::new(EnvPassphraseReader::new())
    }
}
