use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::ConfigMap;

use super::named;

/// A config map holding one file. Content always replaces prior data wholesale.
pub fn config_map(
    name: &str,
    labels: BTreeMap<String, String>,
    file_name: &str,
    content: &str,
) -> ConfigMap {
    ConfigMap {
        metadata: named(name, labels),
        data: Some(BTreeMap::from([(file_name.to_string(), content.to_string())])),
        ..ConfigMap::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_file_payload() {
        let cm = config_map("appsettings-acme-webhook-1", BTreeMap::new(), "appsettings.json", "{}");
        assert_eq!(cm.metadata.name.as_deref(), Some("appsettings-acme-webhook-1"));
        let data = cm.data.unwrap();
        assert_eq!(data.len(), 1);
        assert_eq!(data["appsettings.json"], "{}");
    }
}
