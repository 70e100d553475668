//! End-to-end scenarios against the real `Database`/`Cursor` surface: a
//! synthetic 100-primitive dataset exercised through equality constraints,
//! pagination, backward seeking, freeze, slow-check, and rollback.

use gravel_api::{ConstraintSpec, Cursor, Database, Direction, Field, Id, StoreConfig, Value};
use gravel_core::{Budget, Check, Step};
use gravel_engine::FreezeFlags;
use gravel_executor::PageOutcome;

/// 100 primitives, `typeguid = (id % 3) + 1`, `left = (id % 5) + 1` for
/// ids `1..=100`. `typeguid=2 && left=3` then picks out exactly the ids
/// congruent to `1 mod 3` and `2 mod 5`.
fn seed(db: &mut Database) {
    for n in 1..=100u64 {
        let typeguid = Id::new((n % 3) + 1).unwrap();
        let left = Id::new((n % 5) + 1).unwrap();
        db.insert(Some(left), None, Some(typeguid), Value(serde_json::json!(n))).unwrap();
    }
}

#[test]
fn and_intersection_over_two_equality_constraints() {
    let dir = tempfile::tempdir().unwrap();
    let mut db = Database::create(dir.path(), StoreConfig::default()).unwrap();
    seed(&mut db);

    let mut budget = Budget::new(100_000);
    let constraints = [
        ConstraintSpec::Equals(Field::TypeGuid, Id::new(2).unwrap()),
        ConstraintSpec::Equals(Field::Left, Id::new(3).unwrap()),
    ];
    let mut cursor = db.query(&constraints, Direction::Forward, &mut budget).unwrap();

    let mut found = Vec::new();
    loop {
        match cursor.iterator_mut().next(&mut budget) {
            Step::Ready(id) => found.push(id.get()),
            Step::EndOfSet => break,
            Step::NeedMoreBudget => panic!("unexpected suspension"),
        }
    }
    assert_eq!(found, vec![7, 22, 37, 52, 67, 82, 97]);
}

#[test]
fn single_constraint_against_all_pages_in_ascending_order() {
    let dir = tempfile::tempdir().unwrap();
    let mut db = Database::create(dir.path(), StoreConfig::default()).unwrap();
    seed(&mut db);

    let mut budget = Budget::new(100_000);
    let constraints = [ConstraintSpec::Equals(Field::TypeGuid, Id::new(2).unwrap()), ConstraintSpec::All];
    let mut cursor = db.query(&constraints, Direction::Forward, &mut budget).unwrap();

    let page = cursor.next_page(3, &mut budget).unwrap();
    let ids = match page {
        PageOutcome::Page(p) => p.ids.into_iter().map(|id| id.get()).collect::<Vec<_>>(),
        PageOutcome::Suspended => panic!("unexpected suspension"),
    };
    assert_eq!(ids, vec![1, 4, 7]);
}

#[test]
fn backward_find_lands_on_the_nearest_member_at_or_below() {
    let dir = tempfile::tempdir().unwrap();
    let mut db = Database::create(dir.path(), StoreConfig::default()).unwrap();
    seed(&mut db);

    let mut budget = Budget::new(100_000);
    let constraints = [
        ConstraintSpec::Equals(Field::TypeGuid, Id::new(2).unwrap()),
        ConstraintSpec::Equals(Field::Left, Id::new(3).unwrap()),
    ];
    let mut cursor = db.query(&constraints, Direction::Backward, &mut budget).unwrap();

    match cursor.find(Id::new(50).unwrap(), &mut budget) {
        Step::Ready(id) => assert_eq!(id.get(), 37),
        other => panic!("expected a match, got {other:?}"),
    }
}

#[test]
fn freezing_mid_traversal_does_not_lose_or_duplicate_remaining_ids() {
    let dir = tempfile::tempdir().unwrap();
    let mut db = Database::create(dir.path(), StoreConfig::default()).unwrap();
    seed(&mut db);

    let mut budget = Budget::new(100_000);
    let constraints = [
        ConstraintSpec::Equals(Field::TypeGuid, Id::new(2).unwrap()),
        ConstraintSpec::Equals(Field::Left, Id::new(3).unwrap()),
    ];
    let mut cursor = db.query(&constraints, Direction::Forward, &mut budget).unwrap();

    let mut seen = Vec::new();
    assert!(matches!(cursor.iterator_mut().next(&mut budget), Step::Ready(id) if { seen.push(id.get()); true }));
    assert!(matches!(cursor.iterator_mut().next(&mut budget), Step::Ready(id) if { seen.push(id.get()); true }));

    let frozen = cursor.freeze(FreezeFlags::default());
    assert!(!frozen.is_empty());

    let mut thawed = Cursor::thaw(&frozen, cursor.direction(), &mut budget).expect("frozen cursor should thaw");

    loop {
        match thawed.iterator_mut().next(&mut budget) {
            Step::Ready(id) => seen.push(id.get()),
            Step::EndOfSet => break,
            Step::NeedMoreBudget => panic!("unexpected suspension"),
        }
    }

    let mut dedup = seen.clone();
    dedup.sort_unstable();
    dedup.dedup();
    assert_eq!(seen.len(), dedup.len(), "no id should repeat across the freeze boundary");
    assert_eq!(seen, vec![7, 22, 37, 52, 67, 82, 97]);
}

#[test]
fn slow_check_answers_membership_before_any_next_call() {
    let dir = tempfile::tempdir().unwrap();
    let mut db = Database::create(dir.path(), StoreConfig::default()).unwrap();
    seed(&mut db);

    let mut budget = Budget::new(100_000);
    let constraints = [
        ConstraintSpec::Equals(Field::TypeGuid, Id::new(2).unwrap()),
        ConstraintSpec::Equals(Field::Left, Id::new(3).unwrap()),
    ];
    let mut cursor = db.query(&constraints, Direction::Forward, &mut budget).unwrap();

    assert_eq!(cursor.iterator_mut().check(Id::new(22).unwrap(), &mut budget), Check::Yes);
    assert_eq!(cursor.iterator_mut().check(Id::new(23).unwrap(), &mut budget), Check::No);
}

#[test]
fn rollback_discards_everything_inserted_since_the_last_checkpoint() {
    let dir = tempfile::tempdir().unwrap();
    let mut db = Database::create(dir.path(), StoreConfig::default()).unwrap();

    let kept = db
        .insert(None, None, Some(Id::new(9).unwrap()), Value(serde_json::json!("kept")))
        .unwrap();
    db.checkpoint().unwrap();
    assert_eq!(db.horizon(), 1);

    let discarded = db
        .insert(None, None, Some(Id::new(9).unwrap()), Value(serde_json::json!("discarded")))
        .unwrap();

    db.rollback().unwrap();

    assert_eq!(db.get(kept.id).unwrap().payload, Value(serde_json::json!("kept")));
    assert!(matches!(db.get(discarded.id), Err(gravel_api::Error::NotFound)));
    assert_eq!(db.horizon(), 1);
}
