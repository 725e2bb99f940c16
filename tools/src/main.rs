//! gymdesk: headless runner for the gym analytics desk.
//!
//! Usage:
//!   gymdesk preview --gym g1 --csv roster.csv
//!   gymdesk import  --gym g1 --csv roster.csv --db desk.db [--as-of 2026-10-19]
//!   gymdesk metrics --gym g1 --db desk.db
//!   gymdesk report  --gym g1 --db desk.db --month 2026-09-01
//!   gymdesk predict --gym g1 --db desk.db
//!   gymdesk learn   --db desk.db
//!   gymdesk serve   --db desk.db          (JSON commands on stdin)
//!
//! `--config scoring.json` overrides the shipped scoring constants.

use anyhow::{anyhow, Context, Result};
use chrono::{NaiveDate, Utc};
use gymdesk_core::{
    config::ScoringConfig,
    engine::GymDesk,
    field_mapper::{ColumnMapping, MappingOverride},
};
use std::env;
use std::io::{self, BufRead, Write};

#[derive(serde::Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum IpcCommand {
    Report { gym: String, month: NaiveDate },
    Predict { gym: String },
    LogContact {
        gym: String,
        member_id: String,
        note: Option<String>,
    },
    Learn,
    Quit,
}

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let command = args.get(1).map(String::as_str).unwrap_or("help");
    let gym = flag(&args, "--gym").unwrap_or("default");
    let db = flag(&args, "--db").unwrap_or(":memory:");
    let as_of: NaiveDate = parse_arg(&args, "--as-of", Utc::now().date_naive());
    let config = match flag(&args, "--config") {
        Some(path) => ScoringConfig::load(path)?,
        None => ScoringConfig::default(),
    };

    let mut desk = GymDesk::open(db, config)?;

    match command {
        "preview" => {
            let text = read_csv(&args)?;
            let preview = desk.preview_import(gym, &text, &MappingOverride::new())?;
            println!("{}", serde_json::to_string_pretty(&preview)?);
        }
        "import" => {
            let text = read_csv(&args)?;
            let preview = desk.preview_import(gym, &text, &MappingOverride::new())?;
            if preview.duplicate_import {
                log::warn!("this file was already imported for {gym}; importing again");
            }
            let mapping: ColumnMapping = preview.detected.mapping;
            let outcome = desk.commit_import(gym, &text, &mapping, as_of)?;
            if let Some(handle) = outcome.refresh {
                if handle.join().is_err() {
                    log::error!("metrics refresh thread panicked");
                }
            }
            println!("{}", serde_json::to_string_pretty(&outcome.summary)?);
        }
        "metrics" => {
            let months = desk.recompute_all_metrics(gym, as_of)?;
            println!("=== METRICS: {gym} ({months} months) ===");
            for m in desk.metrics_history(gym)? {
                println!(
                    "  {} | active {:>4} | churn {:>5.2}% | MRR ${:>9.2} | ARM ${:>7.2} | RSI {:>3} | RES {:>5.1}",
                    m.month_start, m.active_members, m.churn_rate, m.mrr, m.arm, m.rsi, m.res
                );
            }
        }
        "report" => {
            let month: NaiveDate = parse_arg(&args, "--month", as_of);
            let report = desk.monthly_report(gym, month, as_of)?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        "predict" => {
            let view = desk.predictive_intelligence(gym, as_of, Utc::now())?;
            print_summary(&view);
        }
        "learn" => {
            let recorded = desk.run_learning_update(as_of)?;
            println!("learning update: {recorded} new outcomes");
        }
        "serve" => run_ipc_loop(&mut desk, as_of)?,
        _ => {
            println!("usage: gymdesk <preview|import|metrics|report|predict|learn|serve> [flags]");
        }
    }

    Ok(())
}

fn run_ipc_loop(desk: &mut GymDesk, as_of: NaiveDate) -> Result<()> {
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut handle = stdin.lock();
    let mut buffer = String::new();

    loop {
        buffer.clear();
        if handle.read_line(&mut buffer)? == 0 {
            break;
        }

        let cmd: IpcCommand = match serde_json::from_str(&buffer) {
            Ok(c) => c,
            Err(e) => {
                writeln!(stdout, "{}", serde_json::json!({ "error": e.to_string() }))?;
                stdout.flush()?;
                continue;
            }
        };

        let reply = match cmd {
            IpcCommand::Quit => break,
            IpcCommand::Report { gym, month } => {
                serde_json::to_value(desk.monthly_report(&gym, month, as_of)?)?
            }
            IpcCommand::Predict { gym } => {
                serde_json::to_value(desk.predictive_intelligence(&gym, as_of, Utc::now())?)?
            }
            IpcCommand::LogContact { gym, member_id, note } => {
                desk.record_contact(&gym, &member_id, Utc::now(), note.as_deref())?;
                serde_json::json!({ "ok": true })
            }
            IpcCommand::Learn => {
                serde_json::json!({ "recorded": desk.run_learning_update(as_of)? })
            }
        };
        writeln!(stdout, "{reply}")?;
        stdout.flush()?;
    }
    Ok(())
}

fn print_summary(view: &gymdesk_core::predictive::PredictiveIntelligence) {
    let s = &view.summary;
    println!("=== PREDICTIVE SUMMARY: {} as of {} ===", view.gym_id, view.as_of);
    println!("  archetype:       {}", view.aggregate.archetype.as_str());
    println!("  members:         {}", s.total_members);
    println!("  core/drifter:    {}/{}", s.core, s.drifter);
    println!("  at-risk/ghost:   {}/{}", s.at_risk, s.ghost);
    println!("  revenue at risk: ${:.2}", s.total_revenue_at_risk);
    println!();
    println!("=== BRIEF ({:?} churn) ===", view.brief.churn_trend);
    for rec in view.brief.recommendations.iter().take(5) {
        println!("  [{:?}] {} (score {:.0})", rec.priority, rec.title, rec.score);
    }
    println!("  {}", view.brief.revenue_outlook);
}

fn read_csv(args: &[String]) -> Result<String> {
    let path = flag(args, "--csv").ok_or_else(|| anyhow!("--csv <file> is required"))?;
    std::fs::read_to_string(path).with_context(|| format!("cannot read {path}"))
}

fn flag<'a>(args: &'a [String], name: &str) -> Option<&'a str> {
    args.windows(2).find(|w| w[0] == name).map(|w| w[1].as_str())
}

fn parse_arg<T: std::str::FromStr + Copy>(args: &[String], flag: &str, default: T) -> T {
    args.windows(2)
        .find(|w| w[0] == flag)
        .and_then(|w| w[1].parse().ok())
        .unwrap_or(default)
}
