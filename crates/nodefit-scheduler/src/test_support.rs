//! Object builders shared by the unit tests

use k8s_openapi::api::core::v1::{
    Container, NodeSpec, NodeStatus, PodSpec, PodStatus, ResourceRequirements,
};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use nodefit_core::{Node, ObjectMeta, Pod, SCHEDULER_NAME_ANNOTATION};
use std::collections::BTreeMap;

pub const TEST_SCHEDULER: &str = "nodefit-scheduler";

pub fn create_test_node(name: &str, cpu: &str) -> Node {
    Node {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            ..Default::default()
        },
        spec: Some(NodeSpec::default()),
        status: Some(NodeStatus {
            allocatable: Some(BTreeMap::from([(
                "cpu".to_string(),
                Quantity(cpu.to_string()),
            )])),
            ..Default::default()
        }),
    }
}

pub fn with_price(mut node: Node, price: &str) -> Node {
    node.metadata
        .annotations
        .get_or_insert_with(BTreeMap::new)
        .insert(crate::select::PRICE_ANNOTATION.to_string(), price.to_string());
    node
}

pub fn with_instance_type(mut node: Node, instance_type: &str) -> Node {
    node.metadata.labels.get_or_insert_with(BTreeMap::new).insert(
        crate::select::INSTANCE_TYPE_LABEL.to_string(),
        instance_type.to_string(),
    );
    node
}

/// A pod with one container per entry in `cpu_requests`; `None` means the
/// container carries no CPU request
pub fn create_test_pod(name: &str, cpu_requests: &[Option<&str>], node: Option<&str>) -> Pod {
    let containers = cpu_requests
        .iter()
        .enumerate()
        .map(|(i, cpu)| Container {
            name: format!("c{}", i),
            image: Some("nginx:latest".to_string()),
            resources: Some(ResourceRequirements {
                requests: cpu.map(|c| {
                    BTreeMap::from([("cpu".to_string(), Quantity(c.to_string()))])
                }),
                ..Default::default()
            }),
            ..Default::default()
        })
        .collect();

    Pod {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some("default".to_string()),
            uid: Some(format!("uid-{}", name)),
            ..Default::default()
        },
        spec: Some(PodSpec {
            containers,
            node_name: node.map(str::to_string),
            ..Default::default()
        }),
        status: Some(PodStatus {
            phase: Some(if node.is_some() { "Running" } else { "Pending" }.to_string()),
            ..Default::default()
        }),
    }
}

/// An unscheduled pod that names the test scheduler
pub fn claimed_pod(name: &str, cpu: &str) -> Pod {
    let mut pod = create_test_pod(name, &[Some(cpu)], None);
    pod.metadata.annotations = Some(BTreeMap::from([(
        SCHEDULER_NAME_ANNOTATION.to_string(),
        TEST_SCHEDULER.to_string(),
    )]));
    pod
}
