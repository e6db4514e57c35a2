//! Lifecycle sequences over the reconciler.
//!
//! Every sequence awaits one cluster call at a time, so ordering inside a
//! sequence is guaranteed and nothing is shared between concurrent
//! sequences. A failure aborts the sequence where it stands without rolling
//! back earlier steps; re-invoking the same verb converges because each step
//! is an idempotent ensure.

use std::future::Future;
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use stackgrid_cluster::k8s_openapi::api::apps::v1::Deployment;
use stackgrid_cluster::k8s_openapi::api::autoscaling::v2::HorizontalPodAutoscaler;
use stackgrid_cluster::k8s_openapi::api::core::v1::{ConfigMap, Service};
use stackgrid_cluster::k8s_openapi::api::networking::v1::Ingress;
use stackgrid_cluster::resources::{self, pod_labels};
use stackgrid_cluster::{ClusterApi, DeleteOutcome, EnsureOutcome, Reconciler};
use stackgrid_core::naming::{external_url, ingress_rule_path};
use stackgrid_core::{
    LogicalStackId, Placeholder, PlaceholderMap, ResourceDescriptor, Role, StackConfig,
    TemplateRenderer,
};
use stackgrid_state::{IntentStore, IntentVerb};
use tracing::{error, info, warn};

use crate::error::{OrchestratorError, OrchestratorResult};
use crate::restart::stamp_restart;
use crate::topology::{RolePlan, StackKind, StackTopology};

/// Per-call inputs for host stacks.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostInputs {
    /// Comma-separated allowed origins, substituted into client settings.
    pub cors_origins: Option<String>,
    pub project_id: Option<String>,
}

/// Result of a deployment mutation. Missing targets are reported, not raised.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum MutationOutcome {
    Applied { restarted_at: String },
    DeploymentMissing,
    ContainerMissing,
}

impl MutationOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, MutationOutcome::Applied { .. })
    }
}

pub struct StackOrchestrator<C: ?Sized> {
    config: Arc<StackConfig>,
    reconciler: Reconciler<C>,
    renderer: TemplateRenderer,
    intents: Option<IntentStore>,
}

impl<C: ClusterApi + ?Sized> StackOrchestrator<C> {
    pub fn new(cluster: Arc<C>, config: StackConfig) -> Self {
        let renderer = match &config.template_dir {
            Some(dir) => TemplateRenderer::with_base_dir(dir),
            None => TemplateRenderer::new(),
        };
        Self {
            reconciler: Reconciler::new(cluster, config.namespace.clone()),
            config: Arc::new(config),
            renderer,
            intents: None,
        }
    }

    /// Journal create, destroy and upgrade sequences to `store`.
    pub fn with_intent_store(mut self, store: IntentStore) -> Self {
        self.intents = Some(store);
        self
    }

    pub fn config(&self) -> &StackConfig {
        &self.config
    }

    pub fn intents(&self) -> Option<&IntentStore> {
        self.intents.as_ref()
    }

    // ── Create / destroy ───────────────────────────────────────────

    /// Bring up a webhook stack and return its external URL.
    pub async fn create_webhook_stack(
        &self,
        tenant_id: &str,
        version: &str,
        image: &str,
    ) -> OrchestratorResult<String> {
        self.create(StackKind::Webhook, tenant_id, version, Some(image), &HostInputs::default())
            .await
    }

    pub async fn destroy_webhook_stack(
        &self,
        tenant_id: &str,
        version: &str,
    ) -> OrchestratorResult<Vec<DeleteOutcome>> {
        self.destroy(StackKind::Webhook, tenant_id, version).await
    }

    /// Bring up a daipp stack, routed at `/{tenant}/{version}`.
    pub async fn create_daipp_stack(
        &self,
        tenant_id: &str,
        version: &str,
        image: &str,
    ) -> OrchestratorResult<String> {
        self.create(StackKind::Daipp, tenant_id, version, Some(image), &HostInputs::default())
            .await
    }

    pub async fn destroy_daipp_stack(
        &self,
        tenant_id: &str,
        version: &str,
    ) -> OrchestratorResult<Vec<DeleteOutcome>> {
        self.destroy(StackKind::Daipp, tenant_id, version).await
    }

    /// Bring up silo then client. A silo failure stops before the client.
    pub async fn create_host_stack(
        &self,
        tenant_id: &str,
        version: &str,
        inputs: &HostInputs,
    ) -> OrchestratorResult<String> {
        self.create(StackKind::Host, tenant_id, version, None, inputs).await
    }

    pub async fn destroy_host_stack(
        &self,
        tenant_id: &str,
        version: &str,
    ) -> OrchestratorResult<Vec<DeleteOutcome>> {
        self.destroy(StackKind::Host, tenant_id, version).await
    }

    async fn create(
        &self,
        kind: StackKind,
        tenant_id: &str,
        version: &str,
        image: Option<&str>,
        inputs: &HostInputs,
    ) -> OrchestratorResult<String> {
        let topology = StackTopology::of(kind);
        self.journaled(topology.create_verb(), tenant_id, version, image, async {
            // Every role needs an image before anything is applied.
            let ids_and_images = topology
                .roles
                .iter()
                .map(|plan| {
                    let id = LogicalStackId::new(tenant_id, version, plan.role);
                    self.image_for(topology, &id, image).map(|image| (id, image))
                })
                .collect::<OrchestratorResult<Vec<_>>>()?;

            let mut url = None;
            for (plan, (id, image)) in topology.roles.iter().zip(ids_and_images) {
                if let Some(u) = self.create_role(&id, plan, &image, inputs).await? {
                    url = Some(u);
                }
            }
            let url = url.ok_or(OrchestratorError::NoExternalRoute)?;
            info!(?kind, tenant_id, version, url = %url, "stack created");
            Ok::<_, OrchestratorError>(url)
        })
        .await
    }

    async fn destroy(
        &self,
        kind: StackKind,
        tenant_id: &str,
        version: &str,
    ) -> OrchestratorResult<Vec<DeleteOutcome>> {
        let topology = StackTopology::of(kind);
        self.journaled(topology.destroy_verb(), tenant_id, version, None, async {
            let mut outcomes = Vec::new();
            for plan in topology.roles {
                let id = LogicalStackId::new(tenant_id, version, plan.role);
                outcomes.extend(self.destroy_role(&id, plan).await?);
            }
            info!(?kind, tenant_id, version, "stack destroyed");
            Ok::<_, OrchestratorError>(outcomes)
        })
        .await
    }

    fn image_for(
        &self,
        topology: &StackTopology,
        id: &LogicalStackId,
        supplied: Option<&str>,
    ) -> OrchestratorResult<String> {
        let configured = self.config.role(id.role).image.as_deref();
        let image = if topology.image_per_call {
            supplied.or(configured)
        } else {
            configured.or(supplied)
        };
        image
            .map(str::to_string)
            .ok_or(OrchestratorError::MissingImage(id.role))
    }

    /// Config maps, deployment, then service and ingress as planned.
    /// Returns the external URL when the role is routed.
    async fn create_role(
        &self,
        id: &LogicalStackId,
        plan: &RolePlan,
        image: &str,
        inputs: &HostInputs,
    ) -> OrchestratorResult<Option<String>> {
        let names = ResourceDescriptor::for_stack(id);
        let role_cfg = self.config.role(id.role);

        self.ensure_settings(id, &names, inputs).await?;
        let sidecar = self
            .renderer
            .render(&role_cfg.sidecar_template, &self.placeholders(id, inputs))?;
        self.reconciler
            .ensure(&resources::config_map(
                &names.side_car_config_map_name,
                pod_labels(id, &names),
                &self.config.sidecar.config_file_name,
                &sidecar,
            ))
            .await?;

        let health = plan.probe.resolve(id, role_cfg.health_path.as_deref());
        self.reconciler
            .ensure(&resources::deployment(&self.config, id, image, health.as_deref()))
            .await?;

        if plan.service {
            self.reconciler
                .ensure(&resources::service(&names, role_cfg.port))
                .await?;
        }

        if !plan.ingress {
            return Ok(None);
        }
        let host = self.config.host_name(id.role);
        let path = ingress_rule_path(id);
        self.reconciler
            .ensure(&resources::ingress(&names, host, &path, role_cfg.port))
            .await?;
        Ok(Some(external_url(host, &path)))
    }

    /// Deployment first so pods stop before their config disappears.
    async fn destroy_role(
        &self,
        id: &LogicalStackId,
        plan: &RolePlan,
    ) -> OrchestratorResult<Vec<DeleteOutcome>> {
        let names = ResourceDescriptor::for_stack(id);
        let rec = &self.reconciler;
        let mut outcomes = vec![
            rec.ensure_deleted::<Deployment>(&names.deployment_name).await?,
            rec.ensure_deleted::<ConfigMap>(&names.app_setting_config_map_name)
                .await?,
            rec.ensure_deleted::<ConfigMap>(&names.side_car_config_map_name)
                .await?,
        ];
        if plan.service {
            outcomes.push(rec.ensure_deleted::<Service>(&names.service_name).await?);
        }
        if plan.ingress {
            outcomes.push(rec.ensure_deleted::<Ingress>(&names.ingress_name).await?);
        }
        Ok(outcomes)
    }

    async fn ensure_settings(
        &self,
        id: &LogicalStackId,
        names: &ResourceDescriptor,
        inputs: &HostInputs,
    ) -> OrchestratorResult<EnsureOutcome> {
        let template = &self.config.role(id.role).settings_template;
        let settings = self.renderer.render(template, &self.placeholders(id, inputs))?;
        let outcome = self
            .reconciler
            .ensure(&resources::config_map(
                &names.app_setting_config_map_name,
                pod_labels(id, names),
                &self.config.app.settings_file_name,
                &settings,
            ))
            .await?;
        Ok(outcome)
    }

    fn placeholders(&self, id: &LogicalStackId, inputs: &HostInputs) -> PlaceholderMap {
        let map = PlaceholderMap::new()
            .with(Placeholder::TenantId, id.tenant_id.to_lowercase())
            .with(Placeholder::Version, id.version.to_lowercase())
            .with(Placeholder::Namespace, self.config.namespace.to_lowercase());
        match id.role {
            Role::HostSilo => map.with_opt(Placeholder::ProjectId, inputs.project_id.as_deref()),
            Role::HostClient => map
                .with_opt(Placeholder::ProjectId, inputs.project_id.as_deref())
                .with_opt(Placeholder::CorsUrls, inputs.cors_origins.as_deref()),
            Role::Webhook | Role::Daipp => map,
        }
    }

    // ── Mutations ──────────────────────────────────────────────────

    /// Point the role's container at `image` and roll its pods.
    ///
    /// Never creates anything: a missing deployment or container is logged
    /// and reported, and no replace is issued.
    pub async fn update_deployment_image(
        &self,
        id: &LogicalStackId,
        image: &str,
    ) -> OrchestratorResult<MutationOutcome> {
        let names = ResourceDescriptor::for_stack(id);
        let Some(mut deployment) = self
            .reconciler
            .fetch::<Deployment>(&names.deployment_name)
            .await?
        else {
            error!(deployment = %names.deployment_name, "deployment does not exist");
            return Ok(MutationOutcome::DeploymentMissing);
        };

        let container = deployment
            .spec
            .as_mut()
            .and_then(|spec| spec.template.spec.as_mut())
            .and_then(|pod| {
                pod.containers
                    .iter_mut()
                    .find(|c| c.name == names.container_name)
            });
        let Some(container) = container else {
            error!(
                deployment = %names.deployment_name,
                container = %names.container_name,
                "container not found in deployment"
            );
            return Ok(MutationOutcome::ContainerMissing);
        };
        container.image = Some(image.to_string());
        let restarted_at = stamp_restart(&mut deployment, Utc::now());

        self.reconciler
            .replace(&names.deployment_name, &deployment)
            .await?;
        info!(deployment = %names.deployment_name, image, %restarted_at, "image updated");
        Ok(MutationOutcome::Applied { restarted_at })
    }

    /// Re-render and re-apply one role's settings config map. Pods pick the
    /// change up on their next restart.
    pub async fn update_business_configuration(
        &self,
        tenant_id: &str,
        version: &str,
        role: Role,
        inputs: &HostInputs,
    ) -> OrchestratorResult<EnsureOutcome> {
        let id = LogicalStackId::new(tenant_id, version, role);
        let names = ResourceDescriptor::for_stack(&id);
        let outcome = self.ensure_settings(&id, &names, inputs).await?;
        info!(stack = %id, ?outcome, "business configuration applied");
        Ok(outcome)
    }

    /// Stamp a fresh restart marker so the platform rolls every pod.
    pub async fn restart(&self, id: &LogicalStackId) -> OrchestratorResult<MutationOutcome> {
        let names = ResourceDescriptor::for_stack(id);
        let Some(mut deployment) = self
            .reconciler
            .fetch::<Deployment>(&names.deployment_name)
            .await?
        else {
            error!(deployment = %names.deployment_name, "deployment does not exist");
            return Ok(MutationOutcome::DeploymentMissing);
        };

        let restarted_at = stamp_restart(&mut deployment, Utc::now());
        self.reconciler
            .replace(&names.deployment_name, &deployment)
            .await?;
        info!(deployment = %names.deployment_name, %restarted_at, "deployment restarted");
        Ok(MutationOutcome::Applied { restarted_at })
    }

    /// Restart silo, then client.
    pub async fn restart_host(
        &self,
        tenant_id: &str,
        version: &str,
    ) -> OrchestratorResult<(MutationOutcome, MutationOutcome)> {
        let silo = self
            .restart(&LogicalStackId::new(tenant_id, version, Role::HostSilo))
            .await?;
        let client = self
            .restart(&LogicalStackId::new(tenant_id, version, Role::HostClient))
            .await?;
        Ok((silo, client))
    }

    /// New CORS origins or project id: re-apply both settings config maps,
    /// then restart silo and client.
    pub async fn upgrade_application(
        &self,
        tenant_id: &str,
        version: &str,
        inputs: &HostInputs,
    ) -> OrchestratorResult<(MutationOutcome, MutationOutcome)> {
        let detail = inputs.cors_origins.as_deref();
        self.journaled(IntentVerb::UpgradeHost, tenant_id, version, detail, async {
            self.update_business_configuration(tenant_id, version, Role::HostSilo, inputs)
                .await?;
            self.update_business_configuration(tenant_id, version, Role::HostClient, inputs)
                .await?;
            self.restart_host(tenant_id, version).await
        })
        .await
    }

    // ── Autoscaling ────────────────────────────────────────────────

    pub async fn ensure_autoscaler(&self, id: &LogicalStackId) -> OrchestratorResult<EnsureOutcome> {
        let policy = self
            .config
            .autoscaling
            .as_ref()
            .ok_or(OrchestratorError::AutoscalingDisabled)?;
        let names = ResourceDescriptor::for_stack(id);
        let outcome = self
            .reconciler
            .ensure(&resources::autoscaler(&names, policy))
            .await?;
        Ok(outcome)
    }

    pub async fn remove_autoscaler(&self, id: &LogicalStackId) -> OrchestratorResult<DeleteOutcome> {
        let names = ResourceDescriptor::for_stack(id);
        let outcome = self
            .reconciler
            .ensure_deleted::<HorizontalPodAutoscaler>(&names.autoscaler_name)
            .await?;
        Ok(outcome)
    }

    // ── Intent journal ─────────────────────────────────────────────

    /// Run `sequence`, bracketing it with an intent when a store is attached.
    async fn journaled<T>(
        &self,
        verb: IntentVerb,
        tenant_id: &str,
        version: &str,
        detail: Option<&str>,
        sequence: impl Future<Output = OrchestratorResult<T>>,
    ) -> OrchestratorResult<T> {
        let Some(store) = &self.intents else {
            return sequence.await;
        };

        let intent = store.begin(verb, tenant_id, version, detail)?;
        match sequence.await {
            Ok(value) => {
                store.complete(intent.id, None)?;
                Ok(value)
            }
            Err(e) => {
                if let Err(state_err) = store.fail(intent.id, &e.to_string()) {
                    warn!(id = intent.id, error = %state_err, "could not close failed intent");
                }
                Err(e)
            }
        }
    }
}
