use std::time::Duration;

use anyhow::{bail, Context};
use clap::Parser;
use tracing::info;

use common::io::{load_records, write_results};
use common::roster::Roster;
use common::rpc::ClientConfig;
use mr_coordinator::{CoordinatorConfig, JobSpec, MRCoordinator};

mod args;
use args::{Args, Command};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();

    let roster = Roster::new(args.workers)?;
    let config = CoordinatorConfig {
        task_timeout: Duration::from_secs(args.timeout_secs),
        health_timeout: Duration::from_secs(args.health_timeout_secs),
        reset_before_job: true,
        client: ClientConfig {
            connect_timeout: Duration::from_secs(args.connect_timeout_secs),
            max_message_size: usize::try_from(args.max_message_size.as_u64())
                .context("max message size does not fit in memory")?,
        },
    };

    match args.command {
        Command::Run {
            workload,
            input,
            format,
            output,
            sort,
            no_reset,
            aux,
        } => {
            let records = load_records(&input, format)?;
            info!("Loaded {} records from `{input}`", records.len());

            let coordinator = MRCoordinator::new(
                roster,
                CoordinatorConfig {
                    reset_before_job: !no_reset,
                    ..config
                },
            )?;
            let outcome = coordinator
                .run_job(JobSpec::new(workload, records).with_aux(aux))
                .await?;

            info!(job_id = outcome.job_id, stats = ?outcome.stats, "job finished");
            write_results(&outcome.results, output.as_deref(), sort)?;
        }
        Command::Status => {
            let coordinator = MRCoordinator::new(roster, config)?;
            let mut unhealthy = 0;
            for (member, health) in coordinator.status().await {
                match health {
                    Ok(health) => println!(
                        "{member}: {} (job {})",
                        health.worker_phase(),
                        health.job_id
                    ),
                    Err(e) => {
                        unhealthy += 1;
                        println!("{member}: {e}");
                    }
                }
            }
            if unhealthy > 0 {
                bail!("{unhealthy} worker(s) unhealthy");
            }
        }
        Command::Reset => {
            let coordinator = MRCoordinator::new(roster, config)?;
            coordinator.reset_all().await?;
            info!("Reset {} workers", coordinator.roster().len());
        }
    }

    Ok(())
}
