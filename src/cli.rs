use std::path::PathBuf;

use clap::{Parser, Subcommand};
use mc_request_object::key::SUPPORTED_KEY_BITS;
use mc_request_object::DEFAULT_KEY_BITS;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)] // Read from `Cargo.toml`
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// Every command reads its request values from the environment, see `RequestConfig`.
#[derive(Subcommand, Debug, PartialEq)]
pub enum Command {
    /// Generate an RSA key and write private.json and public.json
    GenerateKey {
        /// Directory for the key set files, defaults to KEYS_DIR
        #[arg(long)]
        keys_dir: Option<PathBuf>,
        /// Key id, defaults to KID
        #[arg(long)]
        kid: Option<String>,
        /// RSA modulus size
        #[arg(long, default_value_t = DEFAULT_KEY_BITS, value_parser = parse_key_bits)]
        bits: usize,
    },
    /// Sign a request object and print the token
    Sign,
    /// Print the SI authorize query parameters and the claims they carry
    QueryParams,
    /// Verify a signed request object with the public key set and print its claims
    Verify {
        /// Token to verify, defaults to SIGNED_REQUEST_OBJECT
        token: Option<String>,
    },
    /// Sign a request object and POST it to SI_AUTH_URL
    Send,
}

fn parse_key_bits(value: &str) -> Result<usize, String> {
    let bits = value.parse::<usize>().map_err(|e| e.to_string())?;
    if SUPPORTED_KEY_BITS.contains(&bits) {
        Ok(bits)
    } else {
        Err(format!(
            "must be between {} and {}",
            SUPPORTED_KEY_BITS.start(),
            SUPPORTED_KEY_BITS.end()
        ))
    }
}

impl Cli {
    /// Parses command line arguments
    pub fn init() -> Self {
        Self::parse()
    }
}
