//! Diff scenarios: identity, added, removed and changed resources

mod common;

use serde_json::json;
use tokio_util::sync::CancellationToken;

use common::{ec2_rate, engine_with, single_ec2_plan, snapshot};
use terracost::engine::response::ChangeKind;
use terracost::engine::{DiffRequest, DiffSide, Mode};

fn diff_request(base: serde_json::Value, head: serde_json::Value) -> DiffRequest {
    DiffRequest {
        base: DiffSide {
            ref_name: Some("main".to_string()),
            source: base,
        },
        head: DiffSide {
            ref_name: Some("feature".to_string()),
            source: head,
        },
        mode: Mode::Permissive,
        usage_profile: None,
        pricing_snapshot_id: None,
    }
}

#[tokio::test]
async fn diff_of_identical_configs_is_exactly_zero() {
    let engine = engine_with(snapshot("snap-1", 1), vec![ec2_rate("snap-1", "0.096")]).await;
    let response = engine
        .diff(
            &diff_request(single_ec2_plan(), single_ec2_plan()),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(response.monthly_cost_delta, "+$0.00");
    assert_eq!(response.confidence_delta, 0.0);
    assert!(response.changes.is_empty());
    assert_eq!(response.base.input_hash, response.head.input_hash);
    assert_eq!(response.base.total_monthly_cost, "70.08");
}

#[tokio::test]
async fn added_resource_shows_positive_delta() {
    let engine = engine_with(snapshot("snap-1", 1), vec![ec2_rate("snap-1", "0.096")]).await;
    let head = json!({
        "region": "us-east-1",
        "resources": [
            {
                "address": "aws_instance.web",
                "type": "aws_instance",
                "provider": "aws",
                "values": {"instance_type": "m5.large"}
            },
            {
                "address": "aws_instance.worker",
                "type": "aws_instance",
                "provider": "aws",
                "values": {"instance_type": "m5.large"}
            }
        ]
    });

    let response = engine
        .diff(&diff_request(single_ec2_plan(), head), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(response.monthly_cost_delta, "+$70.08");
    assert_eq!(response.changes.len(), 1);
    let change = &response.changes[0];
    assert_eq!(change.kind, ChangeKind::Added);
    assert_eq!(change.address, "aws_instance.worker");
    assert_eq!(change.cost_before, None);
    assert_eq!(change.cost_after.as_deref(), Some("70.08"));
    assert_eq!(change.cost_delta, "+$70.08");
    assert!(!change.dependency_path.is_empty());
}

#[tokio::test]
async fn removed_resource_shows_negative_delta() {
    let engine = engine_with(snapshot("snap-1", 1), vec![ec2_rate("snap-1", "0.096")]).await;
    let empty = json!({"region": "us-east-1", "resources": []});

    let response = engine
        .diff(&diff_request(single_ec2_plan(), empty), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(response.monthly_cost_delta, "-$70.08");
    assert_eq!(response.changes.len(), 1);
    assert_eq!(response.changes[0].kind, ChangeKind::Removed);
    assert_eq!(response.changes[0].cost_delta, "-$70.08");
}

#[tokio::test]
async fn count_change_is_a_changed_row() {
    let engine = engine_with(snapshot("snap-1", 1), vec![ec2_rate("snap-1", "0.096")]).await;
    let head = json!({
        "region": "us-east-1",
        "resources": [
            {
                "address": "aws_instance.web",
                "type": "aws_instance",
                "provider": "aws",
                "count": 2,
                "values": {"instance_type": "m5.large"}
            }
        ]
    });

    let response = engine
        .diff(&diff_request(single_ec2_plan(), head), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(response.monthly_cost_delta, "+$70.08");
    let change = &response.changes[0];
    assert_eq!(change.kind, ChangeKind::Changed);
    assert_eq!(change.cost_before.as_deref(), Some("70.08"));
    assert_eq!(change.cost_after.as_deref(), Some("140.16"));
    assert_eq!(change.cost_delta, "+$70.08");
    assert_eq!(change.confidence_before, change.confidence_after);
}

#[tokio::test]
async fn both_sides_share_one_snapshot_identity() {
    use std::sync::Arc;
    use terracost::pricing::store::{MemorySnapshotStore, SnapshotStore};

    // two snapshots exist; the diff must pin one for both sides
    let store = Arc::new(MemorySnapshotStore::new());
    store
        .put_snapshot(snapshot("snap-old", 10), vec![ec2_rate("snap-old", "0.096")])
        .await
        .unwrap();
    store
        .put_snapshot(snapshot("snap-new", 1), vec![ec2_rate("snap-new", "0.106")])
        .await
        .unwrap();
    let engine = common::engine_over(store);

    let mut request = diff_request(single_ec2_plan(), single_ec2_plan());
    request.pricing_snapshot_id = Some("snap-old".to_string());

    let response = engine.diff(&request, &CancellationToken::new()).await.unwrap();
    assert_eq!(response.metadata.pricing_snapshot_id, "snap-old");
    assert_eq!(response.monthly_cost_delta, "+$0.00");

    // latest snapshot is the default pin
    let request = diff_request(single_ec2_plan(), single_ec2_plan());
    let response = engine.diff(&request, &CancellationToken::new()).await.unwrap();
    assert_eq!(response.metadata.pricing_snapshot_id, "snap-new");
    assert_eq!(response.base.total_monthly_cost, "77.38");
}
