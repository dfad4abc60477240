// ── Filter predicates for snapshot views ──
//
// Used by table views to narrow a snapshot without asking the backend.

use crate::model::{Instance, InstanceState, Service};

/// Filter predicate for the flat service list.
pub enum ServiceFilter {
    All,
    ByCluster(String),
    /// Case-insensitive match on the service status string.
    ByStatus(String),
    /// The backend flagged the current rollout as stuck.
    Stuck,
    /// Fewer tasks running than desired.
    Degraded,
    Custom(Box<dyn Fn(&Service) -> bool + Send + Sync>),
}

impl ServiceFilter {
    pub fn matches(&self, service: &Service) -> bool {
        match self {
            Self::All => true,
            Self::ByCluster(cluster) => service.cluster_name == *cluster,
            Self::ByStatus(status) => service.status.eq_ignore_ascii_case(status),
            Self::Stuck => service.is_stuck(),
            Self::Degraded => service.is_degraded(),
            Self::Custom(f) => f(service),
        }
    }
}

/// Filter predicate for the EC2 inventory.
pub enum InstanceFilter {
    All,
    ByState(InstanceState),
    Running,
    ByType(String),
    Custom(Box<dyn Fn(&Instance) -> bool + Send + Sync>),
}

impl InstanceFilter {
    pub fn matches(&self, instance: &Instance) -> bool {
        match self {
            Self::All => true,
            Self::ByState(state) => instance.state == *state,
            Self::Running => instance.state == InstanceState::Running,
            Self::ByType(kind) => instance.instance_type == *kind,
            Self::Custom(f) => f(instance),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::DeploymentStatus;

    fn service(running: u32, desired: u32, stuck: bool) -> Service {
        Service {
            name: "api".into(),
            cluster_name: "prod".into(),
            status: "ACTIVE".into(),
            desired_count: desired,
            running_count: running,
            deployment_status: Some(DeploymentStatus {
                is_stuck: stuck,
                ..DeploymentStatus::default()
            }),
            ..Service::default()
        }
    }

    #[test]
    fn service_filters() {
        let healthy = service(2, 2, false);
        let degraded = service(1, 2, false);
        let stuck = service(2, 2, true);

        assert!(ServiceFilter::All.matches(&healthy));
        assert!(ServiceFilter::ByCluster("prod".into()).matches(&healthy));
        assert!(!ServiceFilter::ByCluster("dev".into()).matches(&healthy));
        assert!(ServiceFilter::ByStatus("active".into()).matches(&healthy));
        assert!(ServiceFilter::Degraded.matches(&degraded));
        assert!(!ServiceFilter::Degraded.matches(&healthy));
        assert!(ServiceFilter::Stuck.matches(&stuck));
        assert!(!ServiceFilter::Stuck.matches(&degraded));
        assert!(ServiceFilter::Custom(Box::new(|s| s.desired_count == 2)).matches(&degraded));
    }

    #[test]
    fn instance_filters() {
        let instance = Instance {
            instance_id: "i-1".into(),
            instance_type: "m6i.large".into(),
            state: InstanceState::Stopped,
            ..Instance::default()
        };
        assert!(InstanceFilter::ByState(InstanceState::Stopped).matches(&instance));
        assert!(!InstanceFilter::Running.matches(&instance));
        assert!(InstanceFilter::ByType("m6i.large".into()).matches(&instance));
    }
}
