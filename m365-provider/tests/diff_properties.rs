use m365_provider::subaction::{ElementKey, diff_elements};
use m365_types::TypedValue;
use proptest::prelude::*;
use std::collections::{BTreeMap, BTreeSet};

fn element(key: &str, value: u8) -> TypedValue {
    TypedValue::object([
        ("id", TypedValue::string(key)),
        ("value", TypedValue::number(value)),
    ])
}

fn elements() -> impl Strategy<Value = Vec<(String, u8)>> {
    prop::collection::vec(("[a-f]", 0u8..3), 0..8)
}

/// Last element per key, as the diff sees them.
fn by_key(items: &[(String, u8)]) -> BTreeMap<String, u8> {
    items.iter().cloned().collect()
}

fn build(items: &[(String, u8)]) -> Vec<TypedValue> {
    items.iter().map(|(k, v)| element(k, *v)).collect()
}

proptest! {
    #[test]
    fn diff_partitions_keys(plan in elements(), state in elements()) {
        let diff = diff_elements(&build(&plan), &build(&state), &ElementKey::attribute("id"));
        let planned = by_key(&plan);
        let prior = by_key(&state);

        let added: BTreeSet<_> = diff.add.iter().map(|(k, _)| k.clone()).collect();
        let updated: BTreeSet<_> = diff.update.iter().map(|(k, _, _)| k.clone()).collect();
        let deleted: BTreeSet<_> = diff.delete.iter().map(|(k, _)| k.clone()).collect();

        let expected_added: BTreeSet<_> = planned.keys().filter(|k| !prior.contains_key(*k)).cloned().collect();
        let expected_updated: BTreeSet<_> = planned
            .iter()
            .filter(|(k, v)| prior.get(*k).is_some_and(|old| old != *v))
            .map(|(k, _)| k.clone())
            .collect();
        let expected_deleted: BTreeSet<_> = prior.keys().filter(|k| !planned.contains_key(*k)).cloned().collect();

        prop_assert_eq!(added, expected_added);
        prop_assert_eq!(updated, expected_updated);
        prop_assert_eq!(deleted, expected_deleted);
        prop_assert_eq!(diff.add.len() + diff.update.len() + diff.delete.len(),
            expected_len(&planned, &prior));
    }

    #[test]
    fn diff_of_identical_collections_is_empty(items in elements()) {
        let built = build(&items);
        prop_assert!(diff_elements(&built, &built, &ElementKey::attribute("id")).is_empty());
    }

    #[test]
    fn replacements_turn_every_update_into_delete_and_add(plan in elements(), state in elements()) {
        let diff = diff_elements(&build(&plan), &build(&state), &ElementKey::attribute("id"));
        let updates = diff.update.len();
        let (adds, deletes) = (diff.add.len(), diff.delete.len());

        let (replaced, keys) = diff.into_replacements();
        prop_assert!(replaced.update.is_empty());
        prop_assert_eq!(keys.len(), updates);
        prop_assert_eq!(replaced.add.len(), adds + updates);
        prop_assert_eq!(replaced.delete.len(), deletes + updates);
    }
}

fn expected_len(planned: &BTreeMap<String, u8>, prior: &BTreeMap<String, u8>) -> usize {
    let changed = planned.iter().filter(|(k, v)| prior.get(*k).is_some_and(|old| old != *v)).count();
    let added = planned.keys().filter(|k| !prior.contains_key(*k)).count();
    let deleted = prior.keys().filter(|k| !planned.contains_key(*k)).count();
    changed + added + deleted
}

#[test]
fn elements_without_a_key_are_ignored() {
    let keyless = TypedValue::object([("value", TypedValue::number(1))]);
    let diff = diff_elements(&[keyless.clone()], &[keyless], &ElementKey::attribute("id"));
    assert!(diff.is_empty());

    let null_key = TypedValue::object([("id", TypedValue::Null)]);
    let diff = diff_elements(&[null_key], &[], &ElementKey::attribute("id"));
    assert!(diff.is_empty());
}
