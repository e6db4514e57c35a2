use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::{Service, ServicePort, ServiceSpec};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use stackgrid_core::ResourceDescriptor;

use super::{APP_LABEL, named, selector_labels};

/// ClusterIP service routing `port` to the stack's pods.
pub fn service(names: &ResourceDescriptor, port: i32) -> Service {
    let labels = BTreeMap::from([(APP_LABEL.to_string(), names.service_label_name.clone())]);
    Service {
        metadata: named(&names.service_name, labels),
        spec: Some(ServiceSpec {
            type_: Some("ClusterIP".to_string()),
            selector: Some(selector_labels(names)),
            ports: Some(vec![ServicePort {
                name: Some(names.service_port_name.clone()),
                protocol: Some("TCP".to_string()),
                port,
                target_port: Some(IntOrString::Int(port)),
                ..ServicePort::default()
            }]),
            ..ServiceSpec::default()
        }),
        ..Service::default()
    }
}

#[cfg(test)]
mod tests {
    use stackgrid_core::{LogicalStackId, Role};

    use super::*;

    #[test]
    fn selects_deployment_pods() {
        let names = ResourceDescriptor::for_stack(&LogicalStackId::new("acme", "1", Role::HostSilo));
        let svc = service(&names, 11111);
        assert_eq!(svc.metadata.name.as_deref(), Some("service-acme-silo-1"));
        let spec = svc.spec.unwrap();
        assert_eq!(spec.selector.unwrap()["app"], "acme-silo-1");
        let port = &spec.ports.unwrap()[0];
        assert_eq!(port.port, 11111);
        assert_eq!(port.name.as_deref(), Some("http-1"));
    }
}
