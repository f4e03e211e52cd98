use super::table::Table;
use super::Id;
use crate::comp::IdSet;
use crate::error::Error;
use crate::tag::Tag;

#[test]
fn id_ordering_puts_sentinel_first() {
    assert!(Id::INVALID < Id::new(0));
    assert!(Id::new(0) < Id::new(1));
    assert!(Id::new(1) < Id::new(1023));
    assert_eq!(Id::INVALID, Id::INVALID);
}

#[test]
fn allocation_recycling_and_generation() {
    let mut table = Table::default();
    assert_eq!(table.count(), 0);

    let h0 = table.add(Tag::NONE, 0).unwrap();
    assert_eq!(h0.id().raw(), 0);
    assert_eq!(table.count(), 1);
    assert!(table.is_live(h0));

    let h1 = table.add(Tag::NONE, 100).unwrap();
    assert_eq!(h1.id().raw(), 100);
    assert_eq!(table.count(), 2);

    table.remove_checked(h1.id());
    assert_eq!(table.count(), 1);
    assert!(!table.is_live(h1));
    assert!(table.is_live(h0));

    table.remove_checked(h0.id());
    assert_eq!(table.count(), 0);

    // the slot is reused with a strictly greater generation
    let h2 = table.add(Tag::NONE, 0).unwrap();
    assert_eq!(h2.id(), h0.id());
    assert!(h2.generation() > h0.generation());
    assert!(table.is_live(h2));
    assert!(!table.is_live(h0));
}

#[test]
fn add_fails_when_full() {
    let mut table = Table::default();
    for _ in 0..crate::config::MAX_ENTITIES {
        table.add(Tag::NONE, 0).unwrap();
    }
    assert_eq!(table.add(Tag::NONE, 0), Err(Error::EntityCapacity));
    assert_eq!(table.add(Tag::NONE, 500), Err(Error::EntityCapacity));
}

#[test]
fn min_position_skips_lower_slots() {
    let mut table = Table::default();
    let a = table.add(Tag::NONE, 10).unwrap();
    assert_eq!(a.id().raw(), 10);
    let b = table.add(Tag::NONE, 10).unwrap();
    assert_eq!(b.id().raw(), 11);
    let c = table.add(Tag::NONE, 0).unwrap();
    assert_eq!(c.id().raw(), 0);
}

#[test]
fn next_match_scans_through_the_maximum_index() {
    let mut table = Table::default();
    let first = table.add(Tag::NONE, 3).unwrap();
    let last = table.add(Tag::NONE, 9).unwrap();

    let hit = table.next_match(None, &IdSet::EMPTY, Tag::NONE);
    assert_eq!(hit, Some(first.id()));
    // the slot at the maximum allocated index is included in the scan
    let hit = table.next_match(hit, &IdSet::EMPTY, Tag::NONE);
    assert_eq!(hit, Some(last.id()));
    assert_eq!(table.next_match(hit, &IdSet::EMPTY, Tag::NONE), None);
}

#[test]
fn next_match_respects_tags() {
    let mut table = Table::default();
    let x = Tag::new(0);
    let y = Tag::new(1);
    let hx = table.add(x, 0).unwrap();
    let hy = table.add(y, 0).unwrap();

    assert_eq!(table.next_match(None, &IdSet::EMPTY, x), Some(hx.id()));
    assert_eq!(table.next_match(Some(hx.id()), &IdSet::EMPTY, x), None);
    assert_eq!(table.next_match(None, &IdSet::EMPTY, y), Some(hy.id()));
    // the wildcard tag matches both
    assert_eq!(table.next_match(Some(hx.id()), &IdSet::EMPTY, Tag::NONE), Some(hy.id()));
}
