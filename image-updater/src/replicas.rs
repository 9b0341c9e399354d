//! Replica count resolution from deployment metadata.
//!
//! The platform has no single replica count field. The count is read from
//! `serviceManifest.deploy.multiRegionConfig.<region>.numReplicas` of the
//! latest deployment's metadata, which arrives either as a JSON object or as a
//! string holding an encoded JSON object.

use serde_json::{Map, Value};
use std::borrow::Cow;

pub const DEFAULT_REPLICAS: u32 = 1;

/// Resolves the replica count for `service`, defaulting to one.
///
/// Regions are scanned in ascending name order; the first one with a count of
/// at least one wins.
pub fn resolve_replicas(service: &str, meta: Option<&Value>) -> u32 {
    let Some(meta) = meta.filter(|m| !m.is_null()) else {
        tracing::debug!(service, "No deployment meta, defaulting to {DEFAULT_REPLICAS} replica");
        return DEFAULT_REPLICAS;
    };

    let Some(meta) = decode_meta(meta) else {
        tracing::debug!(service, "Unreadable deployment meta, defaulting to {DEFAULT_REPLICAS} replica");
        return DEFAULT_REPLICAS;
    };

    let Some(regions) = multi_region_config(&meta) else {
        tracing::debug!(service, "No multiRegionConfig, defaulting to {DEFAULT_REPLICAS} replica");
        return DEFAULT_REPLICAS;
    };

    // Sort explicitly; serde_json keeps insertion order under `preserve_order`
    let mut regions: Vec<_> = regions.iter().collect();
    regions.sort_by(|a, b| a.0.cmp(b.0));

    for (region, config) in regions {
        if let Some(replicas) = config.get("numReplicas").and_then(positive_count) {
            tracing::debug!(service, region = %region, replicas, "Resolved replica count");
            return replicas;
        }
    }

    tracing::debug!(service, "No region sets numReplicas, defaulting to {DEFAULT_REPLICAS} replica");
    DEFAULT_REPLICAS
}

/// Structured decode first, then a second decode of string contents.
fn decode_meta(meta: &Value) -> Option<Cow<'_, Map<String, Value>>> {
    match meta {
        Value::Object(map) => Some(Cow::Borrowed(map)),
        Value::String(encoded) => match serde_json::from_str::<Value>(encoded) {
            Ok(Value::Object(map)) => Some(Cow::Owned(map)),
            _ => None,
        },
        _ => None,
    }
}

fn multi_region_config(meta: &Map<String, Value>) -> Option<&Map<String, Value>> {
    meta.get("serviceManifest")?
        .get("deploy")?
        .get("multiRegionConfig")?
        .as_object()
}

fn positive_count(value: &Value) -> Option<u32> {
    let count = value.as_f64()?;
    if (1.0..=f64::from(u32::MAX)).contains(&count) {
        Some(count as u32)
    } else {
        None
    }
}
