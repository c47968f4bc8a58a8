use std::env;

use mc_request_object::config::{write_keyset_files, ConfigError, RequestConfig};
use mc_request_object::logging::Logging;
use mc_request_object::transport::{
    AuthorizeRequest, AuthorizeTransport, TransportError, UreqTransport,
};
use mc_request_object::{
    sign_with_store, verify, ClaimAssembler, Key, RequestObjectError, REQUEST_OBJECT_KEYS,
};
use serde_json::Value;
use thiserror::Error;
use tracing::{error, info};

use crate::cli::{Cli, Command};

mod cli;

const SIGNED_REQUEST_OBJECT_ENV: &str = "SIGNED_REQUEST_OBJECT";

#[derive(Error, Debug)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    RequestObject(#[from] RequestObjectError),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("no token given, pass one or set {SIGNED_REQUEST_OBJECT_ENV}")]
    MissingToken,
    #[error("unable to render output: `{0}`")]
    Output(#[from] serde_json::Error),
}

fn main() {
    if let Err(err) = Logging::try_init() {
        eprintln!("{err}");
        std::process::exit(1);
    }

    let cli = Cli::init();
    if let Err(err) = run(cli.command) {
        error!("{err}");
        std::process::exit(1);
    }
}

fn run(command: Command) -> Result<(), CliError> {
    let config = RequestConfig::from_env()?;

    match command {
        Command::GenerateKey {
            keys_dir,
            kid,
            bits,
        } => {
            let keys_dir = keys_dir.unwrap_or_else(|| config.keys_dir.clone());
            let key = Key::generate_rsa(kid.as_deref().unwrap_or(&config.kid), bits)?;
            let (private, public) = write_keyset_files(&keys_dir, &key)?;
            info!(private = %private.display(), public = %public.display(), "wrote key sets");
        }
        Command::Sign => {
            println!("{}", sign_request(&config)?);
        }
        Command::QueryParams => {
            let request = AuthorizeRequest::from_config(&config, sign_request(&config)?);
            println!(
                "Query params:\n{}\n",
                serde_json::to_string_pretty(&request)?
            );

            let public_keys = config.load_private_keys()?.to_public();
            let claims = verify(&public_keys, &request.request)?;
            println!(
                "JWT claims:\n{}",
                serde_json::to_string_pretty(&Value::Object(claims))?
            );
        }
        Command::Verify { token } => {
            let token = token
                .or_else(|| env::var(SIGNED_REQUEST_OBJECT_ENV).ok())
                .ok_or(CliError::MissingToken)?;
            let token = token.trim();
            info!("decoding signed request \"{token}\"");

            let claims = verify(&config.load_public_keys()?, token)?;
            println!(
                "Verified request object:\n{}",
                serde_json::to_string_pretty(&Value::Object(claims))?
            );
        }
        Command::Send => {
            let url = config.require_si_auth_url()?;
            let request = AuthorizeRequest::from_config(&config, sign_request(&config)?);

            let response = UreqTransport::default().post_authorize(
                url,
                &request,
                config.host_header.as_deref(),
            )?;
            println!("Response: {}", response.status);
            println!("Body content: {}", response.body);
        }
    }

    Ok(())
}

/// Assembles the request object from `config` and signs it with the configured kid.
fn sign_request(config: &RequestConfig) -> Result<String, CliError> {
    let private_keys = config.load_private_keys()?;
    let claims = ClaimAssembler::new().assemble(&config.to_claims(), &REQUEST_OBJECT_KEYS)?;
    Ok(sign_with_store(&private_keys, &config.kid, &claims)?)
}
