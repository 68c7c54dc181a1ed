//! Two-sided estimation diff
//!
//! Estimates base and head under the same mode and the same pinned
//! snapshot, pairs resources by address, and reports signed deltas.
//! Diffing a configuration against itself is exactly zero: same
//! snapshot, same ordering, same arithmetic.

use chrono::Utc;
use rust_decimal::Decimal;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;
use std::str::FromStr;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::error::{EngineError, Result};
use crate::money::{Currency, Money};
use crate::pricing::store::SnapshotStore;
use crate::scan::input_hash;

use super::response::{
    Change, ChangeKind, DiffResponse, DiffSideSummary, ResourceCost, ResponseMetadata,
};
use super::{
    normalized_input, Engine, EstimateOptions, EstimateRequest, Mode, UsageProfile,
};

/// One side of a diff: a source document plus an optional label
/// (e.g. a git ref the caller already checked out).
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct DiffSide {
    #[serde(default, rename = "ref")]
    pub ref_name: Option<String>,

    pub source: Value,
}

/// Diff request: both sides share mode, profile and snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiffRequest {
    pub base: DiffSide,
    pub head: DiffSide,
    pub mode: Mode,

    #[serde(default)]
    pub usage_profile: Option<UsageProfile>,

    #[serde(default)]
    pub pricing_snapshot_id: Option<String>,
}

impl<S: SnapshotStore> Engine<S> {
    /// Estimate both sides and pair the results.
    pub async fn diff(
        &self,
        request: &DiffRequest,
        cancel: &CancellationToken,
    ) -> Result<DiffResponse> {
        let started = Instant::now();

        // both sides must be priced against one snapshot identity
        let snapshot = self
            .pin_snapshot(request.pricing_snapshot_id.as_deref())
            .await?;

        let side_request = |source: &Value| EstimateRequest {
            source: source.clone(),
            mode: request.mode,
            usage_profile: request.usage_profile.clone(),
            options: EstimateOptions {
                include_cost_lineage: true,
                ..Default::default()
            },
            pricing_snapshot_id: Some(snapshot.snapshot_id.clone()),
        };

        let base_request = side_request(&request.base.source);
        let head_request = side_request(&request.head.source);
        let base = self.estimate(&base_request, cancel).await?;
        let head = self.estimate(&head_request, cancel).await?;

        let currency = base.summary.currency;
        let base_total = parse_money(&base.summary.total_monthly_cost, currency)?;
        let head_total = parse_money(&head.summary.total_monthly_cost, currency)?;
        let delta = head_total.sub(&base_total)?;

        let mut changes = Vec::new();
        let addresses: BTreeSet<&str> = base
            .resources
            .iter()
            .chain(head.resources.iter())
            .map(|r| r.address.as_str())
            .collect();

        for address in addresses {
            let before = base.resources.iter().find(|r| r.address == address);
            let after = head.resources.iter().find(|r| r.address == address);
            if let Some(change) = change_row(address, before, after, currency)? {
                changes.push(change);
            }
        }

        Ok(DiffResponse {
            metadata: ResponseMetadata {
                request_id: Uuid::new_v4().to_string(),
                input_hash: input_hash(&serde_json::json!({
                    "base": normalized_input(&base_request),
                    "head": normalized_input(&head_request),
                })),
                engine_version: super::engine_version().to_string(),
                pricing_snapshot_id: snapshot.snapshot_id.clone(),
                mode: request.mode,
                timestamp: Utc::now(),
                duration_ms: started.elapsed().as_millis() as u64,
            },
            base: side_summary(&request.base, &base),
            head: side_summary(&request.head, &head),
            monthly_cost_delta: delta.to_signed_display(),
            confidence_delta: head.summary.confidence - base.summary.confidence,
            changes,
        })
    }
}

fn side_summary(side: &DiffSide, response: &super::EstimateResponse) -> DiffSideSummary {
    DiffSideSummary {
        ref_name: side.ref_name.clone(),
        input_hash: response.metadata.input_hash.clone(),
        total_monthly_cost: response.summary.total_monthly_cost.clone(),
        confidence: response.summary.confidence,
        status: response.status,
    }
}

fn parse_money(display: &str, currency: Currency) -> Result<Money> {
    let amount = Decimal::from_str(display)
        .map_err(|_| EngineError::Internal(format!("unparseable money string: {display}")))?;
    Ok(Money::from_decimal(amount, currency))
}

fn change_row(
    address: &str,
    before: Option<&ResourceCost>,
    after: Option<&ResourceCost>,
    currency: Currency,
) -> Result<Option<Change>> {
    let zero = Money::zero(currency);
    let (kind, cost_before, cost_after) = match (before, after) {
        (None, Some(a)) => (ChangeKind::Added, None, Some(parse_money(&a.monthly_cost, currency)?)),
        (Some(b), None) => (
            ChangeKind::Removed,
            Some(parse_money(&b.monthly_cost, currency)?),
            None,
        ),
        (Some(b), Some(a)) => {
            let unchanged = b.monthly_cost == a.monthly_cost
                && (b.confidence - a.confidence).abs() < f64::EPSILON;
            if unchanged {
                return Ok(None);
            }
            (
                ChangeKind::Changed,
                Some(parse_money(&b.monthly_cost, currency)?),
                Some(parse_money(&a.monthly_cost, currency)?),
            )
        }
        (None, None) => return Ok(None),
    };

    let delta = cost_after
        .as_ref()
        .unwrap_or(&zero)
        .sub(cost_before.as_ref().unwrap_or(&zero))?;

    let dependency_path = after
        .or(before)
        .and_then(|r| r.lineage.as_ref())
        .map(|l| l.dependency_path.clone())
        .unwrap_or_else(|| vec![address.to_string()]);

    Ok(Some(Change {
        address: address.to_string(),
        kind,
        cost_before: cost_before.as_ref().map(Money::to_display),
        cost_after: cost_after.as_ref().map(Money::to_display),
        cost_delta: delta.to_signed_display(),
        confidence_before: before.map(|r| r.confidence),
        confidence_after: after.map(|r| r.confidence),
        dependency_path,
    }))
}
