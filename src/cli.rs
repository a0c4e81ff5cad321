use std::net::{IpAddr, SocketAddr};

use axum::http::HeaderValue;
use chrono::{Datelike, Utc};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;

use crate::api::ServerConfig;
use crate::api::auth::StaticSessions;
use crate::core::{GoalConfig, GoalPatch, YearsToTarget, build_outlook, solve_years_to_target};

#[derive(Parser, Debug)]
#[command(
    name = "vantage",
    about = "FIRE projection engine (bucketed compound growth + goal and check-in API)"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the HTTP API.
    Serve(ServeArgs),
    /// Project a goal year by year and print the outlook as JSON.
    Project(ProjectArgs),
    /// Solve years-to-target in closed form for a single blended rate.
    Solve(SolveArgs),
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    #[arg(long, env = "VANTAGE_HOST", default_value = "0.0.0.0")]
    pub host: IpAddr,
    #[arg(long, env = "PORT", default_value_t = 3001)]
    pub port: u16,
    #[arg(
        long,
        env = "FRONTEND_URL",
        default_value = "http://localhost:8100",
        help = "Origin allowed to call the API with credentials"
    )]
    pub frontend_url: String,
    #[arg(
        long = "session",
        env = "VANTAGE_SESSIONS",
        value_delimiter = ',',
        value_name = "TOKEN=USER",
        help = "Session token accepted for a user; repeatable"
    )]
    pub sessions: Vec<String>,
}

impl ServeArgs {
    pub fn server_config(&self) -> Result<ServerConfig, String> {
        let frontend_origin = HeaderValue::from_str(self.frontend_url.trim_end_matches('/'))
            .map_err(|e| format!("--frontend-url is not a valid origin: {e}"))?;
        let sessions = StaticSessions::from_entries(&self.sessions)
            .map_err(|e| format!("--session: {e}"))?;
        Ok(ServerConfig {
            addr: SocketAddr::new(self.host, self.port),
            frontend_origin,
            sessions,
        })
    }
}

#[derive(Args, Debug, Default)]
pub struct ProjectArgs {
    #[arg(long, help = "Target corpus as a multiple of annual expense")]
    pub target_multiple: Option<f64>,
    #[arg(long, help = "Initial corpus (k$)")]
    pub initial_corpus: Option<f64>,
    #[arg(long, help = "Fixed emergency fund carved out of the initial corpus (k$)")]
    pub emergency_corpus: Option<f64>,
    #[arg(long)]
    pub annual_income: Option<f64>,
    #[arg(long)]
    pub annual_expense: Option<f64>,
    #[arg(
        long = "allocation",
        value_name = "NAME=PCT",
        value_parser = parse_named_percent,
        help = "Share of the investable corpus per bucket; replaces the default split"
    )]
    pub allocation: Vec<(String, f64)>,
    #[arg(
        long = "rate",
        value_name = "NAME=PCT",
        value_parser = parse_named_percent,
        help = "Annual growth rate per bucket in percent, including `emergency`"
    )]
    pub rates: Vec<(String, f64)>,
    #[arg(long, help = "Corpus used for progress; defaults to the initial corpus")]
    pub current_corpus: Option<f64>,
    #[arg(long, help = "Calendar year treated as year 0; defaults to the current year")]
    pub current_year: Option<i32>,
}

impl ProjectArgs {
    pub fn goal(&self) -> GoalConfig {
        let patch = GoalPatch {
            target_multiple: self.target_multiple,
            initial_corpus: self.initial_corpus,
            emergency_corpus: self.emergency_corpus,
            annual_income: self.annual_income,
            annual_expense: self.annual_expense,
            allocation: (!self.allocation.is_empty())
                .then(|| self.allocation.iter().cloned().collect()),
            rates: (!self.rates.is_empty()).then(|| self.rates.iter().cloned().collect()),
        };
        patch.apply_to(GoalConfig::default())
    }
}

#[derive(Args, Debug)]
pub struct SolveArgs {
    #[arg(long)]
    pub principal: f64,
    #[arg(long, default_value_t = 0.0)]
    pub monthly_contribution: f64,
    #[arg(long, help = "Blended annual rate in percent")]
    pub annual_rate: f64,
    #[arg(long)]
    pub target: f64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SolveOutput {
    years_to_target: YearsToTarget,
}

pub fn run_project(args: &ProjectArgs) -> Result<String, String> {
    let goal = args.goal();
    let current_corpus = args.current_corpus.unwrap_or(goal.initial_corpus);
    let current_year = args.current_year.unwrap_or_else(|| Utc::now().year());
    let outlook = build_outlook(&goal, current_corpus, current_year).map_err(|e| e.to_string())?;
    serde_json::to_string_pretty(&outlook).map_err(|e| format!("failed to encode outlook: {e}"))
}

pub fn run_solve(args: &SolveArgs) -> Result<String, String> {
    for (flag, value) in [
        ("--principal", args.principal),
        ("--monthly-contribution", args.monthly_contribution),
        ("--annual-rate", args.annual_rate),
        ("--target", args.target),
    ] {
        if !value.is_finite() {
            return Err(format!("{flag} must be a finite number"));
        }
    }
    if args.principal < 0.0 {
        return Err("--principal must be >= 0".to_string());
    }

    let output = SolveOutput {
        years_to_target: solve_years_to_target(
            args.principal,
            args.monthly_contribution,
            args.annual_rate / 100.0,
            args.target,
        ),
    };
    serde_json::to_string_pretty(&output).map_err(|e| format!("failed to encode result: {e}"))
}

fn parse_named_percent(raw: &str) -> Result<(String, f64), String> {
    let (name, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=PCT, got `{raw}`"))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("expected NAME=PCT, got `{raw}`"));
    }
    let value = value
        .trim()
        .parse::<f64>()
        .map_err(|e| format!("invalid percentage `{value}`: {e}"))?;
    Ok((name.to_string(), value))
}
