use std::collections::BTreeMap;

use k8s_openapi::api::networking::v1::{
    HTTPIngressPath, HTTPIngressRuleValue, Ingress, IngressBackend, IngressRule,
    IngressServiceBackend, IngressSpec, ServiceBackendPort,
};
use stackgrid_core::ResourceDescriptor;

use super::{APP_LABEL, named};

/// Route `rule_path` on `host_name` to the stack's service.
///
/// `host_name` may carry a scheme; only the authority ends up in the rule.
pub fn ingress(names: &ResourceDescriptor, host_name: &str, rule_path: &str, port: i32) -> Ingress {
    let labels = BTreeMap::from([(APP_LABEL.to_string(), names.deployment_label_name.clone())]);
    let backend = IngressBackend {
        service: Some(IngressServiceBackend {
            name: names.service_name.clone(),
            port: Some(ServiceBackendPort {
                number: Some(port),
                ..ServiceBackendPort::default()
            }),
        }),
        ..IngressBackend::default()
    };

    Ingress {
        metadata: named(&names.ingress_name, labels),
        spec: Some(IngressSpec {
            rules: Some(vec![IngressRule {
                host: Some(host_authority(host_name).to_string()),
                http: Some(HTTPIngressRuleValue {
                    paths: vec![HTTPIngressPath {
                        path: Some(rule_path.to_string()),
                        path_type: "Prefix".to_string(),
                        backend,
                    }],
                }),
            }]),
            ..IngressSpec::default()
        }),
        ..Ingress::default()
    }
}

/// `https://hooks.example.com/` → `hooks.example.com`.
pub fn host_authority(host_name: &str) -> &str {
    let rest = host_name
        .strip_prefix("https://")
        .or_else(|| host_name.strip_prefix("http://"))
        .unwrap_or(host_name);
    rest.split('/').next().unwrap_or(rest)
}

#[cfg(test)]
mod tests {
    use stackgrid_core::{LogicalStackId, Role};

    use super::*;

    #[test]
    fn routes_path_to_service() {
        let names = ResourceDescriptor::for_stack(&LogicalStackId::new("acme", "1", Role::Webhook));
        let ing = ingress(&names, "https://hooks.example.com/", "/acme", 8308);
        assert_eq!(ing.metadata.name.as_deref(), Some("ingress-acme-webhook-1"));

        let rule = &ing.spec.unwrap().rules.unwrap()[0];
        assert_eq!(rule.host.as_deref(), Some("hooks.example.com"));
        let path = &rule.http.as_ref().unwrap().paths[0];
        assert_eq!(path.path.as_deref(), Some("/acme"));
        let svc = path.backend.service.as_ref().unwrap();
        assert_eq!(svc.name, "service-acme-webhook-1");
        assert_eq!(svc.port.as_ref().unwrap().number, Some(8308));
    }

    #[test]
    fn authority_strips_scheme_and_path() {
        assert_eq!(host_authority("http://a.example.com/x"), "a.example.com");
        assert_eq!(host_authority("a.example.com"), "a.example.com");
    }
}
