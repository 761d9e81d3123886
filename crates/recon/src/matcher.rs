use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

use icr_core::{OnboardItemRecord, ReferenceItemRecord, VesselRecord};

use crate::model::EngineNote;
use crate::normalize::match_key;

/// Index vessels by match key. The lowest row number wins a duplicate key;
/// every loser yields a note.
pub fn index_vessels<'a>(
    vessels: &'a [VesselRecord],
    case_sensitive: bool,
    notes: &mut Vec<EngineNote>,
) -> BTreeMap<String, &'a VesselRecord> {
    let mut by_key: BTreeMap<String, &VesselRecord> = BTreeMap::new();
    let mut losers: Vec<(&VesselRecord, &VesselRecord)> = Vec::new();

    for vessel in vessels {
        match by_key.entry(match_key(&vessel.ship_id, case_sensitive)) {
            Entry::Vacant(slot) => {
                slot.insert(vessel);
            }
            Entry::Occupied(mut slot) => {
                let kept = *slot.get();
                if vessel.row_number < kept.row_number {
                    slot.insert(vessel);
                    losers.push((kept, vessel));
                } else {
                    losers.push((vessel, kept));
                }
            }
        }
    }

    losers.sort_by_key(|(lost, _)| lost.row_number);
    for (lost, kept) in losers {
        notes.push(EngineNote {
            ship_id: Some(kept.ship_id.clone()),
            message: format!(
                "vessel index row {} repeats ship id '{}'; row {} is used",
                lost.row_number, lost.ship_id, kept.row_number
            ),
        });
    }
    by_key
}

/// Index reference items by match key, lowest row number first. Rows with a
/// blank item id can never be matched and are left out.
pub fn index_reference<'a>(
    items: &'a [ReferenceItemRecord],
    case_sensitive: bool,
) -> BTreeMap<String, &'a ReferenceItemRecord> {
    let mut by_key: BTreeMap<String, &ReferenceItemRecord> = BTreeMap::new();
    for item in items {
        let key = match_key(&item.item_id, case_sensitive);
        if key.is_empty() {
            continue;
        }
        match by_key.entry(key) {
            Entry::Vacant(slot) => {
                slot.insert(item);
            }
            Entry::Occupied(mut slot) => {
                if item.row_number < slot.get().row_number {
                    slot.insert(item);
                }
            }
        }
    }
    by_key
}

/// Group onboard rows by vessel match key.
pub fn group_onboard(
    items: &[OnboardItemRecord],
    case_sensitive: bool,
) -> BTreeMap<String, Vec<&OnboardItemRecord>> {
    let mut groups: BTreeMap<String, Vec<&OnboardItemRecord>> = BTreeMap::new();
    for item in items {
        groups
            .entry(match_key(&item.ship_id, case_sensitive))
            .or_default()
            .push(item);
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vessel(id: &str, row: u32) -> VesselRecord {
        VesselRecord {
            ship_id: id.into(),
            name: Some(format!("row {row}")),
            customer_no: None,
            imo_no: None,
            status: None,
            vessel_email: None,
            office_email: None,
            ams: None,
            attributes: BTreeMap::new(),
            row_number: row,
        }
    }

    fn reference(id: &str, edition: &str, row: u32) -> ReferenceItemRecord {
        ReferenceItemRecord {
            item_id: id.into(),
            current_edition: Some(edition.into()),
            description: None,
            current_date: None,
            row_number: row,
        }
    }

    #[test]
    fn first_vessel_row_wins_regardless_of_order() {
        let vessels = vec![vessel("V1", 5), vessel("V1", 2), vessel("V2", 3)];
        let mut notes = Vec::new();
        let index = index_vessels(&vessels, true, &mut notes);
        assert_eq!(index.len(), 2);
        assert_eq!(index["V1"].row_number, 2);
        assert_eq!(notes.len(), 1);
        assert!(notes[0].message.contains("row 5"));
    }

    #[test]
    fn vessel_keys_honor_case_flag() {
        let vessels = vec![vessel("v1", 2), vessel(" V1 ", 3)];
        let mut notes = Vec::new();
        assert_eq!(index_vessels(&vessels, true, &mut notes).len(), 2);
        assert!(notes.is_empty());
        assert_eq!(index_vessels(&vessels, false, &mut notes).len(), 1);
        assert_eq!(notes.len(), 1);
    }

    #[test]
    fn reference_duplicates_and_blanks() {
        let items = vec![
            reference("a1", "2", 4),
            reference("A1", "1", 3),
            reference("  ", "9", 2),
        ];
        let index = index_reference(&items, false);
        assert_eq!(index.len(), 1);
        assert_eq!(index["a1"].current_edition.as_deref(), Some("1"));
    }
}
