use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use snsapi::{ApiClient, Config, FileParam, OAuth1Token, OAuthVersion, Params, Time, Token};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "sns-authorize", about = "Authorize against a social network API and call its endpoints")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the URL the user authorizes the app at.
    Url {
        /// Redirect URI (OAuth 2.0) or callback (OAuth 1.0a); defaults to SNS_REDIRECT_URI.
        #[arg(long)]
        redirect_uri: Option<String>,
    },
    /// Trade an authorization code (OAuth 2.0) for an access token.
    Token {
        code: String,
        #[arg(long)]
        redirect_uri: Option<String>,
    },
    /// Trade an authorized request token and verifier (OAuth 1.0a) for an access token.
    Verify {
        oauth_token: String,
        oauth_token_secret: String,
        verifier: String,
    },
    /// Call an endpoint with the token from SNS_ACCESS_TOKEN.
    Call {
        #[arg(value_enum)]
        verb: CallVerb,
        /// Endpoint path, such as statuses/home_timeline.
        path: String,
        /// Parameters as key=value; key=@file attaches a file.
        params: Vec<String>,
        /// Seconds the access token stays valid.
        #[arg(long, default_value_t = 3600)]
        expires_in: i64,
    },
    /// Verify an in-site signed request.
    SignedRequest { signed_request: String },
    /// Look up the openid an access token belongs to (QQ).
    Openid { access_token: String },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum CallVerb {
    Get,
    Post,
    Upload,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let config = Config::from_env().context("loading configuration from SNS_* variables")?;
    let client = ApiClient::new(config)?;

    match cli.command {
        Commands::Url { redirect_uri } => cmd_url(&client, redirect_uri.as_deref()),
        Commands::Token { code, redirect_uri } => {
            let token = client.request_access_token(&code, redirect_uri.as_deref())?;
            print_token(&token)
        }
        Commands::Verify {
            oauth_token,
            oauth_token_secret,
            verifier,
        } => {
            let request_token = OAuth1Token {
                oauth_token,
                oauth_token_secret,
                oauth_verifier: None,
                extra: Default::default(),
            };
            let token = client.get_oauth1_access_token(&request_token, &verifier)?;
            print_token(&token)
        }
        Commands::Call {
            verb,
            path,
            params,
            expires_in,
        } => cmd_call(&client, verb, &path, &params, expires_in),
        Commands::SignedRequest { signed_request } => match client.parse_signed_request(&signed_request) {
            Some(request) => {
                println!("{}", serde_json::to_string_pretty(&request.payload)?);
                Ok(())
            }
            None => bail!("signed request rejected"),
        },
        Commands::Openid { access_token } => {
            println!("{}", client.get_openid(&access_token)?);
            Ok(())
        }
    }
}

fn cmd_url(client: &ApiClient, redirect_uri: Option<&str>) -> Result<()> {
    match client.config().provider.oauth_version {
        OAuthVersion::OAuth2 => {
            println!("{}", client.get_authorize_url(redirect_uri, &Params::new())?);
        }
        OAuthVersion::OAuth1 => {
            let request_token = client.get_request_token(redirect_uri)?;
            println!("{}", client.get_oauth1_authorize_url(&request_token.oauth_token)?);
            eprintln!(
                "request token: {} {}",
                request_token.oauth_token, request_token.oauth_token_secret
            );
        }
    }
    Ok(())
}

fn cmd_call(client: &ApiClient, verb: CallVerb, path: &str, args: &[String], expires_in: i64) -> Result<()> {
    let access_token = std::env::var("SNS_ACCESS_TOKEN").context("SNS_ACCESS_TOKEN is not set")?;
    match std::env::var("SNS_TOKEN_SECRET") {
        Ok(secret) => client.set_token(Token::oauth1(access_token, secret)),
        Err(_) => client.set_access_token(&access_token, Time::now().plus_seconds(expires_in)),
    }

    let mut params = Params::new();
    for arg in args {
        let Some((key, value)) = arg.split_once('=') else {
            bail!("parameter {:?} is not key=value", arg);
        };
        match value.strip_prefix('@') {
            Some(file) => {
                let file = FileParam::open(file).with_context(|| format!("reading {}", file))?;
                params.insert(key, file);
            }
            None => {
                params.insert(key, value);
            }
        }
    }

    let result = match verb {
        CallVerb::Get => client.get(path, params)?,
        CallVerb::Post => client.post(path, params)?,
        CallVerb::Upload => client.upload(path, params)?,
    };
    println!("{}", serde_json::to_string_pretty(result.raw())?);
    Ok(())
}

fn print_token(token: &Token) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(token)?);
    Ok(())
}
