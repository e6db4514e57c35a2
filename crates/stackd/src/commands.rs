//! Subcommand execution.

use std::net::SocketAddr;
use std::path::Path;

use anyhow::{Context, bail};
use serde_json::json;
use stackgrid_api::SharedOrchestrator;
use stackgrid_cluster::DeleteOutcome;
use stackgrid_core::{LogicalStackId, StackConfig};
use stackgrid_orchestrator::{HostInputs, MutationOutcome};
use tracing::{info, warn};

use crate::Command;

/// Write a starter configuration. Refuses to clobber without `force`.
pub fn init_config(path: &Path, namespace: &str, force: bool) -> anyhow::Result<()> {
    if path.exists() && !force {
        bail!("{} already exists (pass --force to overwrite)", path.display());
    }
    let content = StackConfig::scaffold(namespace).to_toml_string()?;
    std::fs::write(path, content).with_context(|| format!("writing {}", path.display()))?;
    println!("wrote {}", path.display());
    Ok(())
}

pub async fn run(command: Command, orch: SharedOrchestrator) -> anyhow::Result<()> {
    match command {
        Command::Serve { port } => serve(orch, port).await,
        Command::InitConfig { .. } => Ok(()),

        Command::CreateWebhook {
            tenant_id,
            version,
            image,
        } => {
            let url = orch.create_webhook_stack(&tenant_id, &version, &image).await?;
            println!("{url}");
            Ok(())
        }
        Command::DestroyWebhook { tenant_id, version } => {
            report_destroyed(&orch.destroy_webhook_stack(&tenant_id, &version).await?);
            Ok(())
        }

        Command::CreateDaipp {
            tenant_id,
            version,
            image,
        } => {
            let url = orch.create_daipp_stack(&tenant_id, &version, &image).await?;
            println!("{url}");
            Ok(())
        }
        Command::DestroyDaipp { tenant_id, version } => {
            report_destroyed(&orch.destroy_daipp_stack(&tenant_id, &version).await?);
            Ok(())
        }

        Command::CreateHost {
            tenant_id,
            version,
            inputs,
        } => {
            let inputs = HostInputs::from(inputs);
            let url = orch.create_host_stack(&tenant_id, &version, &inputs).await?;
            println!("{url}");
            Ok(())
        }
        Command::DestroyHost { tenant_id, version } => {
            report_destroyed(&orch.destroy_host_stack(&tenant_id, &version).await?);
            Ok(())
        }

        Command::UpdateImage {
            tenant_id,
            version,
            role,
            image,
        } => {
            let id = LogicalStackId::new(&tenant_id, &version, role);
            report_mutation(&id, &orch.update_deployment_image(&id, &image).await?)
        }
        Command::UpdateConfig {
            tenant_id,
            version,
            role,
            inputs,
        } => {
            let inputs = HostInputs::from(inputs);
            let outcome = orch
                .update_business_configuration(&tenant_id, &version, role, &inputs)
                .await?;
            println!("{outcome:?}");
            Ok(())
        }
        Command::UpgradeHost {
            tenant_id,
            version,
            inputs,
        } => {
            let inputs = HostInputs::from(inputs);
            let (silo, client) = orch.upgrade_application(&tenant_id, &version, &inputs).await?;
            println!("{}", serde_json::to_string_pretty(&json!({ "silo": silo, "client": client }))?);
            Ok(())
        }
        Command::Restart {
            tenant_id,
            version,
            role,
        } => {
            let id = LogicalStackId::new(&tenant_id, &version, role);
            report_mutation(&id, &orch.restart(&id).await?)
        }

        Command::Intents { prune } => {
            let Some(store) = orch.intents() else {
                bail!("no intent log: pass --data-dir");
            };
            if prune {
                let removed = store.prune_finished()?;
                info!(removed, "pruned finished intents");
            }
            println!("{}", serde_json::to_string_pretty(&store.pending()?)?);
            Ok(())
        }
    }
}

async fn serve(orch: SharedOrchestrator, port: u16) -> anyhow::Result<()> {
    let router = stackgrid_api::build_router(orch);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    info!(%addr, "API server starting");
    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "could not install Ctrl-C handler");
                std::future::pending::<()>().await;
            }
            info!("shutdown signal received");
        })
        .await?;

    info!("StackGrid daemon stopped");
    Ok(())
}

fn report_destroyed(outcomes: &[DeleteOutcome]) {
    let deleted = outcomes
        .iter()
        .filter(|o| **o == DeleteOutcome::Deleted)
        .count();
    println!("deleted {deleted}, already absent {}", outcomes.len() - deleted);
}

/// Soft-failed mutations exit non-zero so scripts notice.
fn report_mutation(id: &LogicalStackId, outcome: &MutationOutcome) -> anyhow::Result<()> {
    match outcome {
        MutationOutcome::Applied { restarted_at } => {
            println!("{id}: rolled at {restarted_at}");
            Ok(())
        }
        MutationOutcome::DeploymentMissing => bail!("{id}: deployment not found"),
        MutationOutcome::ContainerMissing => bail!("{id}: container not found"),
    }
}
