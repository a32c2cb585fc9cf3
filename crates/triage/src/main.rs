//! Triage CLI - query alerts, approve fixes and serve the API.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use notify::Notifier;
use serde::Serialize;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use triage::leads::Lead;
use triage::{ApprovalInput, EnrichedAlert, Level, ReadPolicy, Triage, TriageConfig};

/// Triage CLI - turn monitor findings into approved fixes.
#[derive(Parser)]
#[command(name = "triage")]
#[command(about = "Alert triage and recommendation engine")]
#[command(version)]
pub struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Print JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    /// Directory the monitors write reports into
    #[arg(long, global = true, env = "TRIAGE_REPORTS_DIR")]
    reports_dir: Option<PathBuf>,

    /// Directory holding the approval log
    #[arg(long, global = true, env = "TRIAGE_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Never read from the remote store
    #[arg(long, global = true)]
    local_only: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Serve the HTTP API
    Serve {
        /// Address to bind
        #[arg(long, default_value = "0.0.0.0:5050", env = "TRIAGE_ADDR")]
        addr: String,
    },

    /// Show a status card for every agent
    Agents,

    /// Show the latest report for one agent
    Report {
        /// Agent id (e.g. annunci)
        agent: String,
    },

    /// Show an agent's profile
    Profile {
        /// Agent id (e.g. annunci)
        agent: String,
    },

    /// List scheduler jobs and their last run
    Cron,

    /// List active alerts
    Alerts {
        /// Enrich and rank alerts with diagnosis and fixes
        #[arg(long)]
        detailed: bool,
    },

    /// Approve a suggested fix
    Approve {
        /// Alert the fix belongs to
        #[arg(long)]
        alert_id: String,

        /// Fix action type (e.g. pause_campaign)
        #[arg(long)]
        fix_action: String,

        #[arg(long)]
        school: Option<String>,

        #[arg(long)]
        campaign: Option<String>,

        #[arg(long)]
        description: Option<String>,

        #[arg(long)]
        estimated_impact: Option<String>,

        /// Who approved the fix
        #[arg(long)]
        approved_by: Option<String>,
    },

    /// List recorded approvals
    Approvals,

    /// List captured demo requests
    Leads,

    /// Show the per-school metrics overview
    Metrics,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("triage=debug,notify=debug,info")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("triage=info,warn"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let mut config = TriageConfig::from_env().context("Failed to load configuration")?;
    if let Some(dir) = cli.reports_dir {
        config.reports_dir = dir;
    }
    if let Some(dir) = cli.data_dir {
        if std::env::var_os("TRIAGE_LEADS_FILE").is_none() {
            config.leads_file = dir.join("leads.json");
        }
        config.data_dir = dir;
    }
    if cli.local_only {
        config.read_policy = ReadPolicy::LocalOnly;
    }

    let engine = Triage::from_config(config, Arc::new(Notifier::from_env()))
        .await
        .context("Failed to initialize triage")?;
    let json = cli.json;

    match cli.command {
        Commands::Serve { addr } => {
            tracing::info!(addr, "Starting API server");
            triage::server::run_server(Arc::new(engine), &addr).await
        }
        Commands::Agents => run_agents(&engine, json).await,
        Commands::Report { agent } => run_report(&engine, &agent).await,
        Commands::Profile { agent } => run_profile(&engine, &agent),
        Commands::Cron => run_cron(&engine, json).await,
        Commands::Alerts { detailed } => run_alerts(&engine, detailed, json).await,
        Commands::Approve {
            alert_id,
            fix_action,
            school,
            campaign,
            description,
            estimated_impact,
            approved_by,
        } => {
            let input = ApprovalInput {
                alert_id: Some(alert_id),
                fix_action: Some(fix_action),
                school,
                campaign,
                description,
                estimated_impact,
                approved_by,
                timestamp: None,
            };
            run_approve(&engine, input, json).await
        }
        Commands::Approvals => run_approvals(&engine, json).await,
        Commands::Leads => run_leads(&engine, json).await,
        Commands::Metrics => print_json(&triage::metrics::to_json(&engine.metrics().await)),
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!(
        "{}",
        serde_json::to_string_pretty(value).context("Failed to serialize output")?
    );
    Ok(())
}

fn level_label(level: &Level) -> colored::ColoredString {
    let label = level.as_str().to_uppercase();
    match level {
        Level::Red => label.red().bold(),
        Level::Yellow => label.yellow().bold(),
        Level::Green => label.green().bold(),
        Level::Other(_) => label.dimmed(),
    }
}

async fn run_agents(triage: &Triage, json: bool) -> Result<()> {
    let statuses = triage.agent_statuses().await;
    if json {
        return print_json(&statuses);
    }

    for status in statuses {
        let stats: Vec<String> = status
            .quick_stats
            .iter()
            .map(|s| format!("{}: {}", s.label, display(&s.value)))
            .collect();
        println!(
            "{} {:<11} {:<28} {:<9} {:<22} {}",
            status.emoji,
            status.name.bold(),
            status.role,
            level_label(&Level::parse(&status.severity)),
            status.run.last_run,
            stats.join(", ").dimmed()
        );
    }
    Ok(())
}

fn run_profile(triage: &Triage, agent: &str) -> Result<()> {
    let card = triage
        .catalog()
        .get(agent)
        .and_then(|a| a.profile_card())
        .with_context(|| format!("Agent not found: {agent}"))?;
    print_json(&card)
}

async fn run_cron(triage: &Triage, json: bool) -> Result<()> {
    let jobs = triage.cron_statuses().await;
    if json {
        return print_json(&jobs);
    }

    for job in &jobs {
        let status = match job.run.last_status.as_str() {
            "ok" => job.run.last_status.green(),
            "error" => job.run.last_status.red().bold(),
            _ => job.run.last_status.dimmed(),
        };
        let name = if job.run.enabled {
            job.name.bold()
        } else {
            job.name.dimmed()
        };
        println!(
            "  {:<36} {:<18} {:<7} last {} ({}) next {}",
            name, job.schedule, status, job.run.last_run, job.run.last_duration, job.run.next_run
        );
        if job.run.consecutive_errors > 0 {
            println!(
                "    {}",
                format!("{} consecutive errors", job.run.consecutive_errors).red()
            );
        }
    }
    Ok(())
}

async fn run_report(triage: &Triage, agent: &str) -> Result<()> {
    let report = triage.agent_report(agent).await?;
    print_json(&report)
}

async fn run_alerts(triage: &Triage, detailed: bool, json: bool) -> Result<()> {
    if detailed {
        let alerts = triage.detailed_alerts().await;
        if json {
            return print_json(&alerts);
        }
        for alert in &alerts {
            print_enriched(alert);
        }
        return Ok(());
    }

    let counts = triage.alert_counts().await;
    if json {
        return print_json(&counts);
    }

    println!(
        "{} red, {} yellow, {} green ({})",
        counts.red.to_string().red().bold(),
        counts.yellow.to_string().yellow().bold(),
        counts.green.to_string().green().bold(),
        counts.source
    );
    for feed in &counts.alerts {
        println!(
            "  {:<8} {:<10} {:<8} {}",
            level_label(&feed.alert.level),
            feed.agent,
            feed.alert.school,
            feed.alert.finding
        );
    }
    Ok(())
}

fn print_enriched(alert: &EnrichedAlert) {
    println!(
        "{} {} [{}] {}",
        level_label(&alert.level),
        alert.alert_id.cyan(),
        alert.agent,
        alert.title.bold()
    );
    if alert.impact_monthly > 0.0 {
        println!(
            "    impact: {} /month ({:?})",
            triage::enrich::rules::dollars(alert.impact_monthly),
            alert.impact_type
        );
    }
    println!("    why: {}", alert.why);
    for line in &alert.evidence {
        println!("    - {}", line.dimmed());
    }
    for fix in &alert.fixes {
        println!(
            "    fix [{}] {} -> {} ({})",
            fix.action_type.cyan(),
            fix.description,
            fix.assigned_agent,
            fix.estimated_impact
        );
    }
}

async fn run_approve(triage: &Triage, input: ApprovalInput, json: bool) -> Result<()> {
    let approval = triage.record_approval(input).await?;
    if json {
        return print_json(&approval);
    }
    println!(
        "{}",
        format!(
            "Approved {} for {} at {}",
            approval.fix_action, approval.alert_id, approval.timestamp
        )
        .green()
    );
    Ok(())
}

async fn run_approvals(triage: &Triage, json: bool) -> Result<()> {
    let list = triage.approvals().await;
    if json {
        return print_json(&list);
    }

    println!("{} approvals ({})", list.approvals.len(), list.source);
    for approval in &list.approvals {
        println!(
            "  {} {:<22} {:<16} {} {}",
            approval.timestamp.dimmed(),
            approval.alert_id,
            approval.fix_action.cyan(),
            approval.school,
            approval.approved_by
        );
    }
    Ok(())
}

async fn run_leads(triage: &Triage, json: bool) -> Result<()> {
    let leads: Vec<Lead> = triage.leads().await?;
    if json {
        return print_json(&leads);
    }

    if leads.is_empty() {
        println!("{}", "No leads captured yet".dimmed());
    }
    for lead in &leads {
        println!(
            "  {} {} <{}> {} {}",
            lead.timestamp.dimmed(),
            lead.name.bold(),
            lead.email,
            lead.school,
            lead.source.dimmed()
        );
    }
    Ok(())
}

fn display(value: &serde_json::Value) -> String {
    triage::report::display_value(value)
}
