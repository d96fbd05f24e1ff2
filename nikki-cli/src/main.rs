//! nikki-cli: write, list and delete diary entries from a terminal
//!
//! Talks to a running `nikki-server` over its HTTP API.
//!
//! # Subcommands
//! - `list [-n <limit>] [--json]`      show the newest entries
//! - `write <text> [--image-url <u>]`  add an entry
//! - `delete <id>`                     remove an entry
//! - `checkin [--utc-offset <min>]`    record today's study check-in
//! - `status`                          show server health

use std::time::Duration;

use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};

const DEFAULT_SERVER: &str = "http://127.0.0.1:8787";
const DEFAULT_LIMIT: usize = 10;
const PREVIEW_CHARS: usize = 80;

// ============================================================================
// CLI Definition
// ============================================================================

#[derive(Debug, Parser)]
#[command(name = "nikki-cli", version, about = "Japanese study diary client")]
struct Cli {
    /// Nikki HTTP server URL (overrides NIKKI_HTTP_URL env var)
    #[arg(long, env = "NIKKI_HTTP_URL", default_value = DEFAULT_SERVER)]
    server: String,

    /// Admin password for commands that change the diary
    #[arg(long, env = "NIKKI_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// List diary entries, newest first
    List {
        /// Maximum number of entries to show
        #[arg(short = 'n', long, default_value_t = DEFAULT_LIMIT)]
        limit: usize,

        /// Print the entries as a JSON array
        #[arg(long)]
        json: bool,
    },

    /// Write a new entry
    Write {
        /// Entry text
        text: String,

        /// URL of an image already uploaded to the diary
        #[arg(long)]
        image_url: Option<String>,
    },

    /// Delete an entry by id
    Delete {
        id: String,
    },

    /// Record today's study check-in
    Checkin {
        /// Minutes east of UTC used to decide what "today" is
        #[arg(long, default_value_t = 0, allow_hyphen_values = true)]
        utc_offset: i32,
    },

    /// Show server status
    Status,
}

// ============================================================================
// API Response Types
// ============================================================================

#[derive(Debug, Deserialize, Serialize)]
pub struct EntryView {
    pub id: String,
    pub timestamp: String,
    #[serde(default)]
    pub text: String,
    #[serde(rename = "imageUrl")]
    pub image_url: Option<String>,
    pub gemini_response: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DocumentView {
    #[serde(default)]
    pub entries: Vec<EntryView>,
    #[serde(default)]
    pub checkins: Vec<String>,
}

/// First line of the entry, capped at [`PREVIEW_CHARS`] characters.
pub fn preview(text: &str) -> String {
    let first = text.lines().find(|l| !l.trim().is_empty()).unwrap_or("");
    let mut out: String = first.chars().take(PREVIEW_CHARS).collect();
    if first.chars().count() > PREVIEW_CHARS {
        out.push('…');
    }
    out
}

/// One human-readable block per entry.
pub fn format_entry(entry: &EntryView) -> String {
    let mut out = format!("{}  {}\n  {}", entry.timestamp, entry.id, preview(&entry.text));
    if let Some(url) = &entry.image_url {
        out.push_str(&format!("\n  [image] {url}"));
    }
    if let Some(comment) = &entry.gemini_response {
        out.push_str(&format!("\n  > {comment}"));
    }
    out
}

// ============================================================================
// HTTP Client Calls
// ============================================================================

fn client() -> anyhow::Result<reqwest::blocking::Client> {
    Ok(reqwest::blocking::Client::builder()
        .timeout(Duration::from_secs(30))
        .build()?)
}

fn require_password(password: Option<&str>) -> anyhow::Result<&str> {
    password.ok_or_else(|| anyhow::anyhow!("--password or NIKKI_PASSWORD is required"))
}

/// POST a JSON body and return the decoded response, failing on non-2xx.
fn post(server: &str, route: &str, body: serde_json::Value) -> anyhow::Result<serde_json::Value> {
    let url = format!("{}{}", server, route);
    let resp = client()?
        .post(&url)
        .json(&body)
        .send()
        .map_err(|e| anyhow::anyhow!("connection failed to {}: {}", url, e))?;

    let status = resp.status();
    let body: serde_json::Value = resp.json().unwrap_or_default();
    if !status.is_success() {
        let message = body["error"].as_str().unwrap_or("no details");
        if body["retryable"].as_bool() == Some(true) {
            anyhow::bail!("server returned {}: {} (try again)", status, message);
        }
        anyhow::bail!("server returned {}: {}", status, message);
    }
    Ok(body)
}

fn do_list(server: &str, limit: usize, json_output: bool) -> anyhow::Result<()> {
    let url = format!("{}/api/data", server);
    let resp = client()?
        .get(&url)
        .send()
        .map_err(|e| anyhow::anyhow!("connection failed to {}: {}", url, e))?;
    if !resp.status().is_success() {
        anyhow::bail!("server returned {}", resp.status());
    }
    let doc: DocumentView = resp.json()?;
    let shown: Vec<&EntryView> = doc.entries.iter().take(limit).collect();

    if json_output {
        println!("{}", serde_json::to_string_pretty(&shown)?);
        return Ok(());
    }

    if shown.is_empty() {
        eprintln!("The diary is empty.");
        return Ok(());
    }
    for entry in shown {
        println!("{}\n", format_entry(entry));
    }
    println!(
        "{} entries, {} check-ins",
        doc.entries.len(),
        doc.checkins.len()
    );
    Ok(())
}

fn do_write(
    server: &str,
    password: Option<&str>,
    text: &str,
    image_url: Option<String>,
) -> anyhow::Result<()> {
    let body = serde_json::json!({
        "password": require_password(password)?,
        "text": text,
        "imageUrl": image_url,
    });
    let resp = post(server, "/api/entries", body)?;
    let entry: EntryView = serde_json::from_value(resp["entry"].clone())?;
    println!("{}", format_entry(&entry));
    Ok(())
}

fn do_delete(server: &str, password: Option<&str>, id: &str) -> anyhow::Result<()> {
    let body = serde_json::json!({
        "password": require_password(password)?,
        "id": id,
    });
    let resp = post(server, "/api/entries/delete", body)?;
    println!(
        "Deleted {} ({} entries left)",
        id,
        resp["remaining"].as_u64().unwrap_or(0)
    );
    Ok(())
}

fn do_checkin(server: &str, password: Option<&str>, utc_offset: i32) -> anyhow::Result<()> {
    let body = serde_json::json!({
        "password": require_password(password)?,
        "utc_offset_minutes": utc_offset,
    });
    let resp = post(server, "/api/checkins", body)?;
    if resp["checked_in"].as_bool() == Some(true) {
        let total = resp["checkins"].as_array().map(Vec::len).unwrap_or(0);
        println!("Checked in. {} days so far.", total);
    } else {
        println!("{}", resp["reason"].as_str().unwrap_or("Already checked in"));
    }
    Ok(())
}

/// Show the server status by calling GET /health.
fn do_status(server: &str) -> anyhow::Result<()> {
    let url = format!("{}/health", server);
    let resp = client()?.get(&url).send();

    match resp {
        Ok(r) if r.status().is_success() => {
            let body: serde_json::Value = r.json().unwrap_or_default();
            println!("Nikki server: {}", body["status"].as_str().unwrap_or("unknown"));
            println!("Version:      {}", body["version"].as_str().unwrap_or("?"));
            println!("Store:        {}", body["store"].as_str().unwrap_or("?"));
            println!("Entries:      {}", body["entries"]);
            println!("Check-ins:    {}", body["checkins"]);
        }
        Ok(r) => {
            eprintln!("nikki-cli: server unhealthy (HTTP {})", r.status());
            std::process::exit(1);
        }
        Err(e) => {
            eprintln!("nikki-cli: cannot reach {}: {}", url, e);
            std::process::exit(1);
        }
    }

    Ok(())
}

// ============================================================================
// Main
// ============================================================================

fn main() {
    let cli = Cli::parse();
    let server = cli.server.trim_end_matches('/').to_string();
    let password = cli.password.as_deref();

    let result = match cli.command {
        Commands::List { limit, json } => do_list(&server, limit, json),
        Commands::Write { text, image_url } => do_write(&server, password, &text, image_url),
        Commands::Delete { id } => do_delete(&server, password, &id),
        Commands::Checkin { utc_offset } => do_checkin(&server, password, utc_offset),
        Commands::Status => do_status(&server),
    };

    if let Err(e) = result {
        eprintln!("nikki-cli: {}", e);
        std::process::exit(1);
    }
}

// ============================================================================
// Tests
// ============================================================================
