//! Rolling-restart trigger.
//!
//! Changing any pod-template annotation makes the platform roll every pod
//! of a deployment. The marker is the same one `kubectl rollout restart`
//! writes, so restarts from either source interleave cleanly.

use chrono::{DateTime, Duration, SecondsFormat, SubsecRound, Utc};
use stackgrid_cluster::k8s_openapi::api::apps::v1::Deployment;

pub const RESTARTED_AT_ANNOTATION: &str = "kubectl.kubernetes.io/restartedAt";

/// Current restart marker on the pod template, if any.
pub fn restarted_at(deployment: &Deployment) -> Option<&str> {
    deployment
        .spec
        .as_ref()?
        .template
        .metadata
        .as_ref()?
        .annotations
        .as_ref()?
        .get(RESTARTED_AT_ANNOTATION)
        .map(String::as_str)
}

/// Stamp a restart marker strictly later than any marker already present.
///
/// Markers carry microsecond precision. When the clock has not moved past
/// the previous marker, the new one is the previous plus one microsecond.
/// Returns the value written.
pub fn stamp_restart(deployment: &mut Deployment, now: DateTime<Utc>) -> String {
    let now = now.trunc_subsecs(6);
    let next = match restarted_at(deployment).and_then(parse_marker) {
        Some(prev) if prev >= now => prev + Duration::microseconds(1),
        _ => now,
    };
    let value = next.to_rfc3339_opts(SecondsFormat::Micros, true);

    let spec = deployment.spec.get_or_insert_with(Default::default);
    let meta = spec.template.metadata.get_or_insert_with(Default::default);
    meta.annotations
        .get_or_insert_with(Default::default)
        .insert(RESTARTED_AT_ANNOTATION.to_string(), value.clone());
    value
}

fn parse_marker(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).single().unwrap()
    }

    #[test]
    fn stamps_empty_deployment() {
        let mut d = Deployment::default();
        let value = stamp_restart(&mut d, at(1_700_000_000));
        assert_eq!(value, "2023-11-14T22:13:20.000000Z");
        assert_eq!(restarted_at(&d), Some(value.as_str()));
    }

    #[test]
    fn later_clock_wins() {
        let mut d = Deployment::default();
        let first = stamp_restart(&mut d, at(100));
        let second = stamp_restart(&mut d, at(200));
        assert!(second > first);
        assert_eq!(second, "1970-01-01T00:03:20.000000Z");
    }

    #[test]
    fn same_or_earlier_clock_still_increases() {
        let mut d = Deployment::default();
        let first = stamp_restart(&mut d, at(100));
        let second = stamp_restart(&mut d, at(100));
        let third = stamp_restart(&mut d, at(50));
        assert!(second > first);
        assert!(third > second);
        assert_eq!(third, "1970-01-01T00:01:40.000002Z");
    }

    #[test]
    fn foreign_marker_format_is_replaced() {
        let mut d = Deployment::default();
        stamp_restart(&mut d, at(100));
        d.spec
            .as_mut()
            .unwrap()
            .template
            .metadata
            .as_mut()
            .unwrap()
            .annotations
            .as_mut()
            .unwrap()
            .insert(RESTARTED_AT_ANNOTATION.into(), "not-a-time".into());
        let value = stamp_restart(&mut d, at(100));
        assert_eq!(value, "1970-01-01T00:01:40.000000Z");
    }
}
