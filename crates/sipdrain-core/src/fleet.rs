//! Fleet identifier helpers.
//!
//! Service identifiers look like
//! `arn:aws:ecs:{region}:{account}:service/{cluster}/{service}`.

/// Capacity-policy resource id (`service/{cluster}/{service}`) for a service ARN.
pub fn scalable_resource_id(service_arn: &str) -> Option<String> {
    let tail = service_arn.rsplit_once(":service/").map(|(_, t)| t)?;
    let (cluster, service) = tail.split_once('/')?;
    if cluster.is_empty() || service.is_empty() || service.contains('/') {
        return None;
    }
    Some(format!("service/{cluster}/{service}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resource_id_from_service_arn() {
        assert_eq!(
            scalable_resource_id("arn:aws:ecs:us-east-1:123456789012:service/voice/asterisk")
                .as_deref(),
            Some("service/voice/asterisk")
        );
    }

    #[test]
    fn malformed_arns_rejected() {
        assert_eq!(scalable_resource_id("arn:aws:ecs:us-east-1:1:task/voice/abc"), None);
        assert_eq!(scalable_resource_id("arn:aws:ecs:us-east-1:1:service/voice"), None);
        assert_eq!(scalable_resource_id("arn:aws:ecs:us-east-1:1:service//x"), None);
    }
}
