//! One-shot CLI over a knowledge-base SQLite file.
//!
//! # Responsibility
//! - Bootstrap workspaces and memberships.
//! - Run single wire requests through the same dispatch as a server would.
//!
//! Database and logging locations come from `DAMKB_*` environment variables.

use clap::{Parser, Subcommand};
use damkb_core::api::codec::JSON_UTF8_CONTENT_TYPE;
use damkb_core::api::method::METHOD_OVERRIDE_FIELD;
use damkb_core::db::Connection;
use damkb_core::repo::workspace_repo::WorkspaceRepository;
use damkb_core::{
    core_version, handle_request, init_from_config, open_db, ApiRequest, ApiStatus, KbConfig,
    KbSession, WorkspaceId,
};
use log::info;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "damkb_cli", version, about = "Knowledge-base request runner")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the core library version.
    Version,
    /// Register a workspace (if new) and add a member to it.
    InitWorkspace {
        id: WorkspaceId,
        name: String,
        user: String,
    },
    /// Dispatch one request and print the response envelope.
    Request {
        user: String,
        method: String,
        path: String,
        /// JSON file sent as the request body.
        body_file: Option<PathBuf>,
        /// Tunneled verb sent as `__REAL_HTTP_METHOD__`.
        #[arg(long = "override")]
        override_verb: Option<String>,
        /// Query parameter, repeatable.
        #[arg(long, value_name = "KEY=VALUE", value_parser = parse_key_value)]
        query: Vec<(String, String)>,
    },
}

fn main() -> ExitCode {
    match run(Cli::parse()) {
        Ok(output) => {
            println!("{output}");
            ExitCode::SUCCESS
        }
        Err(message) => {
            eprintln!("{message}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<String, String> {
    match cli.command {
        Commands::Version => Ok(format!("damkb_core version={}", core_version())),
        Commands::InitWorkspace { id, name, user } => init_workspace(id, &name, &user),
        Commands::Request {
            user,
            method,
            path,
            body_file,
            override_verb,
            query,
        } => {
            let mut request = ApiRequest::new(user, method, path);
            for (key, value) in query {
                request = request.with_query(key, value);
            }
            if let Some(verb) = override_verb {
                request = request.with_query(METHOD_OVERRIDE_FIELD, verb);
            }
            if let Some(body_file) = body_file {
                request.body = std::fs::read(&body_file).map_err(|err| {
                    format!("failed to read body file `{}`: {err}", body_file.display())
                })?;
                request.content_type = Some(JSON_UTF8_CONTENT_TYPE.to_string());
            }
            send(&request)
        }
    }
}

fn parse_key_value(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .ok_or_else(|| format!("expected KEY=VALUE, got `{raw}`"))
}

fn open_configured() -> Result<Connection, String> {
    let config = KbConfig::from_env();
    init_from_config(&config)?;
    open_db(&config.db_path)
        .map_err(|err| format!("failed to open `{}`: {err}", config.db_path.display()))
}

fn init_workspace(id: WorkspaceId, name: &str, user: &str) -> Result<String, String> {
    let mut conn = open_configured()?;
    let session = KbSession::begin(&mut conn).map_err(|err| err.to_string())?;
    let workspace = {
        let workspaces = session.workspaces();
        let workspace = match workspaces.get_workspace(id).map_err(|err| err.to_string())? {
            Some(existing) => existing,
            None => workspaces
                .create_workspace(id, name.trim())
                .map_err(|err| err.to_string())?,
        };
        workspaces
            .add_member(id, user)
            .map_err(|err| err.to_string())?;
        workspace
    };
    session.commit().map_err(|err| err.to_string())?;

    info!("event=workspace_init module=cli status=ok workspace_id={id}");
    serde_json::to_string_pretty(&serde_json::json!({
        "workspace": workspace,
        "member": user,
    }))
    .map_err(|err| err.to_string())
}

fn send(request: &ApiRequest) -> Result<String, String> {
    let mut conn = open_configured()?;
    let response = handle_request(&mut conn, request);
    let rendered = serde_json::to_string_pretty(&response).map_err(|err| err.to_string())?;
    if response.status == ApiStatus::Ok {
        Ok(rendered)
    } else {
        Err(rendered)
    }
}
