//! Flight covers carry up to four places: where the cover was addressed from and to, and where
//! it was postmarked when sent and when received.

use super::{AssignReferencesOptions, Reference, assign_references};
use crate::error::{GeoError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlightCoverReferences {
    /// The depiction being georeferenced.
    pub id: i64,
    #[serde(default)]
    pub from: Vec<i64>,
    #[serde(default)]
    pub to: Vec<i64>,
    #[serde(default)]
    pub sent: Vec<i64>,
    #[serde(default)]
    pub received: Vec<i64>,
}

impl FlightCoverReferences {
    /// Empty lists are left out rather than treated as removals.
    pub fn references(&self) -> Vec<Reference> {
        [
            (
                "sfomuseum:flightcover_address_from",
                "flightcover-address-from",
                &self.from,
            ),
            (
                "sfomuseum:flightcover_address_to",
                "flightcover-address-to",
                &self.to,
            ),
            (
                "sfomuseum:flightcover_postmark_sent",
                "flightcover-postmark-sent",
                &self.sent,
            ),
            (
                "sfomuseum:flightcover_postmark_received",
                "flightcover-postmark-received",
                &self.received,
            ),
        ]
        .into_iter()
        .filter(|(_, _, ids)| !ids.is_empty())
        .map(|(label, alt_label, ids)| Reference::new(label, ids.clone()).with_alt_label(alt_label))
        .collect()
    }
}

pub async fn assign_flight_cover_references(
    opts: &AssignReferencesOptions,
    flightcover_refs: &FlightCoverReferences,
) -> Result<Value> {
    let refs = flightcover_refs.references();

    if refs.is_empty() {
        return Err(GeoError::NothingToUpdate);
    }

    assign_references(opts, flightcover_refs.id, &refs).await
}
