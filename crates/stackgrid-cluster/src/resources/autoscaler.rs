use k8s_openapi::api::autoscaling::v2::{
    CrossVersionObjectReference, HorizontalPodAutoscaler, HorizontalPodAutoscalerSpec, MetricSpec,
    MetricTarget, ResourceMetricSource,
};
use stackgrid_core::ResourceDescriptor;
use stackgrid_core::config::AutoscalingConfig;

use super::{named, selector_labels};

/// CPU-utilisation autoscaler targeting the stack's deployment.
pub fn autoscaler(names: &ResourceDescriptor, policy: &AutoscalingConfig) -> HorizontalPodAutoscaler {
    HorizontalPodAutoscaler {
        metadata: named(&names.autoscaler_name, selector_labels(names)),
        spec: Some(HorizontalPodAutoscalerSpec {
            scale_target_ref: CrossVersionObjectReference {
                api_version: Some("apps/v1".to_string()),
                kind: "Deployment".to_string(),
                name: names.deployment_name.clone(),
            },
            min_replicas: Some(policy.min_replicas),
            max_replicas: policy.max_replicas,
            metrics: Some(vec![MetricSpec {
                type_: "Resource".to_string(),
                resource: Some(ResourceMetricSource {
                    name: "cpu".to_string(),
                    target: MetricTarget {
                        type_: "Utilization".to_string(),
                        average_utilization: Some(policy.target_cpu_utilization),
                        ..MetricTarget::default()
                    },
                }),
                ..MetricSpec::default()
            }]),
            ..HorizontalPodAutoscalerSpec::default()
        }),
        ..HorizontalPodAutoscaler::default()
    }
}

#[cfg(test)]
mod tests {
    use stackgrid_core::{LogicalStackId, Role};

    use super::*;

    #[test]
    fn targets_the_deployment() {
        let names = ResourceDescriptor::for_stack(&LogicalStackId::new("acme", "1", Role::HostClient));
        let policy = AutoscalingConfig {
            min_replicas: 1,
            max_replicas: 4,
            target_cpu_utilization: 70,
        };
        let hpa = autoscaler(&names, &policy);
        assert_eq!(hpa.metadata.name.as_deref(), Some("hpa-acme-client-1"));
        let spec = hpa.spec.unwrap();
        assert_eq!(spec.scale_target_ref.name, "deployment-acme-client-1");
        assert_eq!(spec.max_replicas, 4);
        let metric = &spec.metrics.unwrap()[0];
        assert_eq!(metric.resource.as_ref().unwrap().target.average_utilization, Some(70));
    }
}
