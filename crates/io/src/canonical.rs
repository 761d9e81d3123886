// Canonical record views, derived from persisted raw rows only.

use icr_core::{CanonicalSet, OnboardItemRecord, RawRecord, ReferenceItemRecord, SourceKind, VesselRecord};

use crate::error::StoreError;
use crate::store::{RecordFilter, StoreReader, StoredRecord};

/// Vessel-index columns with a dedicated field on [`VesselRecord`].
const VESSEL_FIELDS: [&str; 8] = [
    "ship_id",
    "ship_name",
    "customer_no",
    "imo_no",
    "status",
    "email",
    "office_email",
    "ams",
];

/// Read every raw row of the run and map it into canonical records.
pub fn load_canonical_set(reader: &StoreReader) -> Result<CanonicalSet, StoreError> {
    let stored = reader.read_raw_records(RecordFilter::all())?;
    Ok(build_canonical_set(&stored))
}

/// Rows of each source in stored order. Vessel and onboard rows without a
/// ship id are skipped; their `missing_key_field` diagnostic already exists.
pub fn build_canonical_set(stored: &[StoredRecord]) -> CanonicalSet {
    let mut set = CanonicalSet::default();
    for StoredRecord { record, .. } in stored {
        match record.source {
            SourceKind::ReferenceCatalog => set.reference.push(reference_item(record)),
            SourceKind::VesselIndex => set.vessels.extend(vessel(record)),
            SourceKind::OnboardInventory => set.onboard.extend(onboard_item(record)),
        }
    }
    set
}

fn owned(record: &RawRecord, column: &str) -> Option<String> {
    record.get(column).map(|v| v.trim().to_string())
}

fn vessel(record: &RawRecord) -> Option<VesselRecord> {
    let ship_id = owned(record, "ship_id")?;
    let attributes = record
        .values
        .iter()
        .filter(|(column, _)| !VESSEL_FIELDS.contains(&column.as_str()))
        .filter_map(|(column, _)| Some((column.clone(), owned(record, column)?)))
        .collect();

    Some(VesselRecord {
        ship_id,
        name: owned(record, "ship_name"),
        customer_no: owned(record, "customer_no"),
        imo_no: owned(record, "imo_no"),
        status: owned(record, "status"),
        vessel_email: owned(record, "email"),
        office_email: owned(record, "office_email"),
        ams: owned(record, "ams"),
        attributes,
        row_number: record.row_number,
    })
}

fn onboard_item(record: &RawRecord) -> Option<OnboardItemRecord> {
    Some(OnboardItemRecord {
        ship_id: owned(record, "ship_id")?,
        item_id: owned(record, "item").unwrap_or_default(),
        onboard_edition: owned(record, "onboard_edition"),
        store_edition: owned(record, "store_edition"),
        description: owned(record, "description"),
        row_number: record.row_number,
    })
}

fn reference_item(record: &RawRecord) -> ReferenceItemRecord {
    ReferenceItemRecord {
        item_id: owned(record, "item").unwrap_or_default(),
        current_edition: owned(record, "current_edition"),
        description: owned(record, "description"),
        current_date: owned(record, "current_date"),
        row_number: record.row_number,
    }
}
