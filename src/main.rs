use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};

use mailassist_lib::ai;
use mailassist_lib::config::AppConfig;
use mailassist_lib::error::{AppError, Result};
use mailassist_lib::gmail::{GmailClient, OAuthClient, TokenStore};
use mailassist_lib::logging;
use mailassist_lib::model::EmailItem;

#[derive(Parser)]
#[command(name = "mailassist")]
#[command(about = "Gmail retrieval with AI categorization, task generation and reply drafting")]
struct Cli {
    /// Debug logging (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP API
    Serve {
        /// Address to listen on
        #[arg(long, env = "BIND_ADDR")]
        bind: Option<String>,
    },
    /// Authorize Gmail access and store the encrypted token
    Auth,
    /// Retrieve recent emails into a JSON file
    Fetch {
        /// Days to look back
        #[arg(long)]
        days: Option<u32>,
        /// Maximum number of emails
        #[arg(long)]
        max: Option<u32>,
        /// Skip message bodies
        #[arg(long)]
        no_body: bool,
        #[arg(short, long, env = "OUTPUT_FILE", default_value = "retrieved_emails.json")]
        output: PathBuf,
    },
    /// Categorize emails from a fetched JSON file
    Categorize {
        #[arg(short, long, default_value = "retrieved_emails.json")]
        input: PathBuf,
    },
    /// Generate tasks for emails from a fetched JSON file
    Tasks {
        #[arg(short, long, default_value = "retrieved_emails.json")]
        input: PathBuf,
        /// formal, informal, professional, friendly or casual
        #[arg(long)]
        tone: Option<String>,
    },
    /// Delete the stored Gmail token
    Logout,
}

/// Document written by `fetch`
#[derive(Serialize, Deserialize)]
struct FetchOutput {
    retrieval_date: String,
    total_emails: usize,
    days_back: u32,
    max_results: u32,
    include_body: bool,
    emails: Vec<EmailItem>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum EmailFile {
    Fetched { emails: Vec<EmailItem> },
    Plain(Vec<EmailItem>),
}

fn read_emails(path: &Path) -> Result<Vec<EmailItem>> {
    let content = std::fs::read_to_string(path)?;
    let file: EmailFile = serde_json::from_str(&content)?;
    Ok(match file {
        EmailFile::Fetched { emails } => emails,
        EmailFile::Plain(emails) => emails,
    })
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn preview(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

fn print_summary(output: &FetchOutput, path: &Path) {
    println!("\n{}", "=".repeat(60));
    println!("GMAIL EMAIL RETRIEVAL SUMMARY");
    println!("{}", "=".repeat(60));
    println!("Total emails retrieved: {}", output.total_emails);
    println!("Date range: Last {} days", output.days_back);
    println!("Output file: {}", path.display());
    println!("Include body: {}", output.include_body);

    if !output.emails.is_empty() {
        println!("\nEMAIL SAMPLES:");
        for (i, email) in output.emails.iter().take(5).enumerate() {
            println!("\n{}. Subject: {}", i + 1, email.subject);
            println!("   From: {}", email.sender);
            println!("   Date: {}", email.date);
            println!("   Labels: {}", email.labels.join(", "));
            println!("   Snippet: {}...", preview(&email.snippet, 100));
            if let Some(body) = &email.body {
                println!("   Body preview: {}...", preview(&body.replace('\n', " "), 200));
            }
        }
    }
    println!("\n{}", "=".repeat(60));
}

fn provider(config: &AppConfig) -> Result<Box<dyn ai::AIProvider>> {
    ai::create_provider(&config.ai)
}

async fn authorize(config: &AppConfig) -> Result<()> {
    let oauth = OAuthClient::new(config.gmail.clone());
    let url = oauth.authorization_url(None)?;

    println!("\nPlease visit this URL to authorize the application:");
    println!("{}", url);
    println!("\nAfter authorization, enter the authorization code here:");

    let mut code = String::new();
    std::io::stdin().read_line(&mut code)?;
    let token = oauth.exchange_code(code.trim()).await?;

    TokenStore::default_location()?.save(&token)?;

    let gmail = GmailClient::with_base_url(config.gmail.api_base.clone());
    match gmail.profile(&token.access_token).await {
        Ok(profile) => println!("Authenticated as {}", profile.email_address),
        Err(e) => tracing::warn!("Token stored, but profile lookup failed: {}", e),
    }
    Ok(())
}

async fn fetch(
    config: &AppConfig,
    days: Option<u32>,
    max: Option<u32>,
    no_body: bool,
    output_path: &Path,
) -> Result<()> {
    let store = TokenStore::default_location()?;
    let stored = store.load()?.ok_or(AppError::AuthRequired)?;

    let oauth = OAuthClient::new(config.gmail.clone());
    let token = oauth.ensure_fresh(stored.clone()).await?;
    if token != stored {
        store.save(&token)?;
    }

    let days_back = days.unwrap_or(config.gmail.days_back);
    let max_results = max.unwrap_or(config.gmail.max_results);
    let include_body = config.gmail.include_body && !no_body;

    tracing::info!(
        "Retrieving emails: {} days back, max {} results, include body: {}",
        days_back,
        max_results,
        include_body
    );

    let gmail = GmailClient::with_base_url(config.gmail.api_base.clone());
    let emails = gmail
        .fetch_recent(&token.access_token, days_back, max_results, include_body)
        .await?;

    let output = FetchOutput {
        retrieval_date: chrono::Local::now().to_rfc3339(),
        total_emails: emails.len(),
        days_back,
        max_results,
        include_body,
        emails,
    };
    std::fs::write(output_path, serde_json::to_string_pretty(&output)?)?;
    tracing::info!("Saved {} emails to {}", output.total_emails, output_path.display());

    print_summary(&output, output_path);
    Ok(())
}

async fn execute(cli: Cli) -> Result<()> {
    let mut config = AppConfig::load()?;

    match cli.command {
        Commands::Serve { bind } => {
            if let Some(bind) = bind {
                config.server.bind_addr = bind;
            }
            mailassist_lib::run(config).await
        }
        Commands::Auth => authorize(&config).await,
        Commands::Fetch {
            days,
            max,
            no_body,
            output,
        } => fetch(&config, days, max, no_body, &output).await,
        Commands::Categorize { input } => {
            let emails = read_emails(&input)?;
            let provider = provider(&config)?;
            let result =
                ai::categorize_emails(provider.as_ref(), &emails, config.ai.batch_size).await?;
            print_json(&result)
        }
        Commands::Tasks { input, tone } => {
            let emails = read_emails(&input)?;
            let provider = provider(&config)?;
            let tone = tone.unwrap_or_else(|| config.default_tone.clone());
            let result =
                ai::generate_tasks(provider.as_ref(), &emails, &tone, config.ai.batch_size).await?;
            print_json(&result)
        }
        Commands::Logout => {
            TokenStore::default_location()?.clear()?;
            println!("Stored Gmail credentials removed.");
            Ok(())
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    match execute(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
