use super::{Cursor, Dense, Sorted, Sparse, Storage};
use crate::entity::Id;

#[derive(Debug, Default, PartialEq, Eq)]
struct Payload(u32);

/// Exercises the insert/get/remove contract shared by all variants.
macro_rules! test_storage_contract {
    ($name:ident, $storage:ty) => {
        #[test]
        fn $name() {
            let mut storage = <$storage>::default();
            let a = Id::new(3);
            let b = Id::new(700);

            storage.insert(a).0 = 30;
            storage.insert(b).0 = 7000;
            assert_eq!(storage.get(a), Some(&Payload(30)));
            assert_eq!(storage.get(b), Some(&Payload(7000)));

            storage.get_mut(a).expect("present").0 += 1;
            assert_eq!(storage.get(a), Some(&Payload(31)));

            storage.remove(a);
            storage.remove(b);
            // re-inserting yields a fresh default value
            assert_eq!(storage.insert(a), &mut Payload(0));
        }
    };
}

test_storage_contract!(dense_contract, Dense<Payload>);
test_storage_contract!(sorted_binary_contract, Sorted<Payload, true>);
test_storage_contract!(sorted_linear_contract, Sorted<Payload, false>);
test_storage_contract!(sparse_contract, Sparse<Payload>);

fn filled_sorted<const BINARY: bool>() -> Sorted<Payload, BINARY> {
    let mut storage = Sorted::<Payload, BINARY>::default();
    // deliberately out of order
    for raw in [40_u16, 8, 1000, 2, 300] {
        storage.insert(Id::new(raw)).0 = u32::from(raw);
    }
    storage
}

#[test]
fn sorted_entries_stay_strictly_ordered() {
    let storage = filled_sorted::<true>();
    let mut ids = Vec::new();
    storage.ids(&mut ids);
    assert_eq!(ids, vec![Id::new(2), Id::new(8), Id::new(40), Id::new(300), Id::new(1000)]);

    let mut storage = storage;
    storage.remove(Id::new(40));
    let mut ids = Vec::new();
    storage.ids(&mut ids);
    assert_eq!(ids, vec![Id::new(2), Id::new(8), Id::new(300), Id::new(1000)]);
}

#[test]
fn add_remove_restores_sorted_storage() {
    let mut storage = filled_sorted::<true>();
    let mut before = Vec::new();
    storage.ids(&mut before);

    storage.insert(Id::new(77)).0 = 77;
    storage.remove(Id::new(77));

    let mut after = Vec::new();
    storage.ids(&mut after);
    assert_eq!(before, after);
    assert_eq!(storage.len(), 5);
}

/// The cursor must keep resolving hits when walking ids in increasing order,
/// for both resume strategies, including misses in between.
macro_rules! test_cursor_walk {
    ($name:ident, $binary:expr) => {
        #[test]
        fn $name() {
            let storage = filled_sorted::<$binary>();
            let mut cursor = Cursor::default();

            assert_eq!(storage.get_hinted(Id::new(2), &mut cursor), Some(&Payload(2)));
            assert_eq!(storage.get_hinted(Id::new(8), &mut cursor), Some(&Payload(8)));
            // a miss advances past smaller entries without losing later hits
            assert_eq!(storage.get_hinted(Id::new(100), &mut cursor), None);
            assert_eq!(storage.get_hinted(Id::new(300), &mut cursor), Some(&Payload(300)));
            assert_eq!(storage.get_hinted(Id::new(1000), &mut cursor), Some(&Payload(1000)));
            // cursor beyond the end keeps yielding misses
            assert_eq!(storage.get_hinted(Id::new(1001), &mut cursor), None);
        }
    };
}

test_cursor_walk!(cursor_walk_binary, true);
test_cursor_walk!(cursor_walk_linear, false);

#[test]
fn sparse_iterates_in_id_order() {
    let mut storage = Sparse::<Payload>::default();
    for raw in [9_u16, 1, 500] {
        storage.insert(Id::new(raw));
    }
    let mut ids = Vec::new();
    storage.ids(&mut ids);
    assert_eq!(ids, vec![Id::new(1), Id::new(9), Id::new(500)]);
    assert_eq!(storage.len(), 3);
}

#[test]
fn dense_resets_slot_on_remove() {
    let mut storage = Dense::<Payload>::default();
    storage.insert(Id::new(5)).0 = 99;
    storage.remove(Id::new(5));
    assert_eq!(storage.get(Id::new(5)), Some(&Payload(0)));
}
