//! Tests for the packed list: wire layout, ordering, coercion, cascade.

use super::*;

fn values(list: &PackedList) -> Vec<String> {
    let mut out = Vec::new();
    let mut p = list.head_offset();
    while let Some(v) = list.get(p) {
        out.push(match v {
            PackedValue::Bytes(b) => String::from_utf8_lossy(b).into_owned(),
            PackedValue::Int(i) => format!("#{i}"),
        });
        p = match list.next(p) {
            Some(next) => next,
            None => break,
        };
    }
    out
}

#[test]
fn empty_list_layout_is_byte_exact() {
    let list = PackedList::new();
    assert_eq!(
        list.as_bytes(),
        &[11, 0, 0, 0, 10, 0, 0, 0, 0, 0, 0xFF][..]
    );
    assert_eq!(list.len(), 0);
    assert!(list.is_empty());
    assert_eq!(list.blob_len(), PACKED_HEADER_SIZE + 1);
    list.check_invariants();
}

#[test]
fn pushed_entries_have_the_documented_layout() {
    let mut list = PackedList::new();
    list.push(End::Tail, b"hi");
    list.check_invariants();
    assert_eq!(
        list.as_bytes(),
        &[
            15, 0, 0, 0, // total_bytes
            10, 0, 0, 0, // tail_offset
            1, 0, // count
            0x00, 0x02, b'h', b'i', // prevlen 0, 6-bit string of length 2
            0xFF,
        ][..]
    );

    list.push(End::Tail, b"5");
    list.check_invariants();
    assert_eq!(
        list.as_bytes(),
        &[
            17, 0, 0, 0,
            14, 0, 0, 0,
            2, 0,
            0x00, 0x02, b'h', b'i',
            0x04, 0xF6, // prevlen 4, immediate integer 5
            0xFF,
        ][..]
    );
}

#[test]
fn push_order_and_integer_coercion() {
    let mut list = PackedList::new();
    list.push(End::Tail, b"foo");
    list.push(End::Tail, b"quux");
    list.push(End::Head, b"hello");
    list.push(End::Tail, b"1024");
    list.check_invariants();

    assert_eq!(list.len(), 4);
    assert_eq!(
        list.get(list.index(0).unwrap()),
        Some(PackedValue::Bytes(b"hello"))
    );
    assert_eq!(
        list.get(list.index(1).unwrap()),
        Some(PackedValue::Bytes(b"foo"))
    );
    assert_eq!(
        list.get(list.index(2).unwrap()),
        Some(PackedValue::Bytes(b"quux"))
    );
    assert_eq!(list.get(list.index(3).unwrap()), Some(PackedValue::Int(1024)));
}

#[test]
fn negative_indices_count_from_the_tail() {
    let mut list = PackedList::new();
    for s in [&b"a"[..], b"b", b"c"] {
        list.push(End::Tail, s);
    }
    assert_eq!(list.get(list.index(-1).unwrap()), Some(PackedValue::Bytes(b"c")));
    assert_eq!(list.get(list.index(-3).unwrap()), Some(PackedValue::Bytes(b"a")));
    assert_eq!(list.index(-4), None);
    assert_eq!(list.index(3), None);
}

#[test]
fn next_and_prev_walk_the_chain() {
    let mut list = PackedList::new();
    for s in [&b"a"[..], b"b", b"c"] {
        list.push(End::Tail, s);
    }
    let head = list.index(0).unwrap();
    let mid = list.next(head).unwrap();
    let tail = list.next(mid).unwrap();
    assert_eq!(list.next(tail), None);
    assert_eq!(list.prev(tail), Some(mid));
    assert_eq!(list.prev(mid), Some(head));
    assert_eq!(list.prev(head), None);
    // Backward iteration can start at the terminator.
    assert_eq!(list.prev(list.end_offset()), Some(tail));
}

#[test]
fn integer_widths_are_chosen_smallest_first() {
    let mut list = PackedList::new();
    let inputs: &[(&[u8], i64)] = &[
        (b"0", 0),
        (b"12", 12),
        (b"13", 13),
        (b"-1", -1),
        (b"1024", 1024),
        (b"-70000", -70000),
        (b"2000000000", 2_000_000_000),
        (b"9223372036854775807", i64::MAX),
        (b"-9223372036854775808", i64::MIN),
    ];
    for (s, _) in inputs {
        list.push(End::Tail, s);
        list.check_invariants();
    }
    for (i, (_, v)) in inputs.iter().enumerate() {
        assert_eq!(
            list.get(list.index(i as isize).unwrap()),
            Some(PackedValue::Int(*v))
        );
    }
}

#[test]
fn non_canonical_numbers_stay_strings() {
    let mut list = PackedList::new();
    list.push(End::Tail, b"01024");
    list.push(End::Tail, b"-0");
    list.push(End::Tail, b"+5");
    list.check_invariants();
    assert_eq!(values(&list), vec!["01024", "-0", "+5"]);
}

#[test]
fn cross_encoding_compare_is_numeric() {
    let mut list = PackedList::new();
    list.push(End::Tail, b"1024");
    let at = list.index(0).unwrap();
    assert!(list.entry_eq(at, b"1024"));
    assert!(!list.entry_eq(at, b"1025"));
    assert!(list.entry_eq(at, b"01024"));
    assert!(!list.entry_eq(at, b"not a number"));
}

#[test]
fn string_compare_is_byte_exact() {
    let mut list = PackedList::new();
    list.push(End::Tail, b"hello");
    let at = list.index(0).unwrap();
    assert!(list.entry_eq(at, b"hello"));
    assert!(!list.entry_eq(at, b"hell"));
    assert!(!list.entry_eq(at, b"helloo"));
}

#[test]
fn insert_before_an_interior_entry() {
    let mut list = PackedList::new();
    list.push(End::Tail, b"a");
    list.push(End::Tail, b"c");
    let at = list.index(1).unwrap();
    list.insert(at, b"b");
    list.check_invariants();
    assert_eq!(values(&list), vec!["a", "b", "c"]);
}

#[test]
fn delete_returns_the_successor_offset() {
    let mut list = PackedList::new();
    for s in [&b"a"[..], b"b", b"c"] {
        list.push(End::Tail, s);
    }
    let at = list.index(1).unwrap();
    let follow = list.delete(at);
    list.check_invariants();
    assert_eq!(list.get(follow), Some(PackedValue::Bytes(b"c")));
    assert_eq!(values(&list), vec!["a", "c"]);

    // Deleting the tail leaves the follow-up offset at the terminator.
    let tail = list.index(-1).unwrap();
    let follow = list.delete(tail);
    list.check_invariants();
    assert!(list.is_end(follow));
    assert_eq!(values(&list), vec!["a"]);
}

#[test]
fn delete_range_spans_and_clamps() {
    let mut list = PackedList::new();
    for i in 0..6 {
        list.push(End::Tail, format!("v{i}").as_bytes());
    }
    assert_eq!(list.delete_range(1, 2), 2);
    list.check_invariants();
    assert_eq!(values(&list), vec!["v0", "v3", "v4", "v5"]);

    // Ranges past the end clamp to what exists.
    assert_eq!(list.delete_range(2, 100), 2);
    list.check_invariants();
    assert_eq!(values(&list), vec!["v0", "v3"]);

    assert_eq!(list.delete_range(5, 1), 0);
}

#[test]
fn reverse_iteration_deleting_every_entry_empties_the_blob() {
    let mut list = PackedList::new();
    list.push(End::Tail, b"foo");
    list.push(End::Tail, b"quux");
    list.push(End::Head, b"hello");
    list.push(End::Tail, b"1024");

    let mut p = list.prev(list.end_offset());
    while let Some(at) = p {
        let follow = list.delete(at);
        list.check_invariants();
        p = list.prev(follow);
    }
    assert!(list.is_empty());
    assert_eq!(list.len(), 0);
    assert_eq!(list.blob_len(), PACKED_HEADER_SIZE + 1);
}

#[test]
fn push_pop_tail_restores_the_blob() {
    let mut list = PackedList::new();
    list.push(End::Tail, b"stable");
    list.push(End::Tail, b"123");
    let before = list.as_bytes().to_vec();

    list.push(End::Tail, b"transient entry");
    let tail = list.index(-1).unwrap();
    list.delete(tail);
    list.check_invariants();
    assert_eq!(list.as_bytes(), &before[..]);
}

#[test]
fn find_skips_between_comparisons() {
    let mut list = PackedList::new();
    for s in [&b"k1"[..], b"1", b"k2", b"2", b"k3", b"3"] {
        list.push(End::Tail, s);
    }
    let head = list.index(0).unwrap();

    let at = list.find(head, b"k3", 0).unwrap();
    assert_eq!(list.get(at), Some(PackedValue::Bytes(b"k3")));

    // skip = 1 only compares every second entry: the keys.
    assert_eq!(list.find(head, b"2", 1), None);
    let second = list.index(1).unwrap();
    let at = list.find(second, b"2", 1).unwrap();
    assert_eq!(list.get(at), Some(PackedValue::Int(2)));

    assert_eq!(list.find(head, b"missing", 0), None);
}

#[test]
fn find_matches_integers_numerically() {
    let mut list = PackedList::new();
    list.push(End::Tail, b"99");
    list.push(End::Tail, b"text");
    let head = list.index(0).unwrap();
    assert_eq!(list.find(head, b"099", 0), Some(head));
}

#[test]
fn large_strings_use_the_wide_length_encodings() {
    let mut list = PackedList::new();
    let medium = vec![b'm'; 300];
    let large = vec![b'l'; 20_000];
    list.push(End::Tail, &medium);
    list.check_invariants();
    list.push(End::Tail, &large);
    list.check_invariants();

    assert_eq!(list.get(list.index(0).unwrap()), Some(PackedValue::Bytes(&medium[..])));
    assert_eq!(list.get(list.index(1).unwrap()), Some(PackedValue::Bytes(&large[..])));
    // 300 needs the 2-byte string header, 20000 the 5-byte one; the second
    // entry's prevlen field must be wide (300 + headers >= 254).
    let second = list.index(1).unwrap();
    assert_eq!(entry::decode_prevlen(&list.as_bytes()[second..]).0, 5);
}

#[test]
fn cascade_widens_every_affected_prevlen_field() {
    let mut list = PackedList::new();
    // Three entries of raw length 253: 1-byte prevlen + 2-byte header + 250.
    for c in [b'a', b'b', b'c'] {
        list.push(End::Tail, &vec![c; 250]);
        list.check_invariants();
    }
    assert_eq!(list.blob_len(), 10 + 3 * 253 + 1);

    // A 255-byte head entry pushes every successor's prevlen to 5 bytes.
    list.push(End::Head, &vec![b'h'; 252]);
    list.check_invariants();
    assert_eq!(list.blob_len(), 10 + 255 + 3 * 257 + 1);
    assert_eq!(list.len(), 4);
    assert_eq!(
        list.get(list.index(-1).unwrap()),
        Some(PackedValue::Bytes(&vec![b'c'; 250][..]))
    );
}

#[test]
fn cascade_never_narrows_prevlen_fields() {
    let mut list = PackedList::new();
    for c in [b'a', b'b', b'c'] {
        list.push(End::Tail, &vec![c; 250]);
    }
    list.push(End::Head, &vec![b'h'; 252]);
    assert_eq!(list.blob_len(), 10 + 255 + 3 * 257 + 1);

    // Removing the wide head shrinks its successor back to 253 raw bytes,
    // but the later 5-byte prevlen fields are rewritten in place, not
    // narrowed.
    list.delete(list.head_offset());
    list.check_invariants();
    assert_eq!(list.blob_len(), 10 + 253 + 2 * 257 + 1);
    assert_eq!(values(&list).len(), 3);
}

#[test]
fn count_saturates_and_len_walks() {
    let mut list = PackedList::new();
    let total = PACKED_COUNT_SATURATED as usize + 5;
    for _ in 0..total {
        list.push(End::Tail, b"1");
    }
    assert_eq!(list.len(), total);

    // Deleting below the saturation point re-syncs the stored counter.
    assert_eq!(list.delete_range(0, 10), 10);
    assert_eq!(list.len(), total - 10);
    list.check_invariants();
}

#[test]
fn mutation_invariants_hold_under_mixed_traffic() {
    let mut list = PackedList::new();
    for i in 0..64 {
        if i % 3 == 0 {
            list.push(End::Head, format!("{i}").as_bytes());
        } else {
            list.push(End::Tail, format!("payload-{i}").as_bytes());
        }
        list.check_invariants();
    }
    let mut deleted = 0;
    while list.len() > 16 {
        let at = list.index((deleted % list.len()) as isize).unwrap();
        list.delete(at);
        list.check_invariants();
        deleted += 1;
    }
    assert_eq!(list.len(), 16);
}
