use sarc_core::consts::{MAX_BUFFERED_PAYLOAD, MAX_STREAM_PAYLOAD};
use sarc_core::{Archive, ArchiveError, ArchiveOptions, IndexEntry, IndexLayout};
use std::fs::{self, File};
use std::io::Read;
use tempfile::tempdir;

fn pack(path: &std::path::Path, opts: ArchiveOptions, items: &[(&str, &[u8])]) {
    let mut ar = Archive::open_with(path, opts).unwrap();
    for (name, data) in items {
        ar.add_file(name, data).unwrap();
    }
    ar.finalize().unwrap();
}

#[test]
fn hello_world_example() {
    let tmp = tempdir().unwrap();
    let path = tmp.path().join("ex.sarc");
    pack(&path, ArchiveOptions::default(), &[("a", &b"hello"[..]), ("b", &b"world!"[..])]);

    let ar = Archive::open(&path).unwrap();
    assert_eq!(
        ar.entries(),
        &[IndexEntry::new("a", 5, 0), IndexEntry::new("b", 6, 5)]
    );
    assert_eq!(ar.get_file(&ar.entries()[1]).unwrap(), &b"world!"[..]);
}

#[test]
fn roundtrip_preserves_order_names_and_bytes() {
    let tmp = tempdir().unwrap();
    for layout in [IndexLayout::Sized, IndexLayout::Positioned] {
        let path = tmp.path().join(format!("rt-{layout:?}.sarc"));
        let big: Vec<u8> = (0..200_000u32).map(|i| (i % 251) as u8).collect();
        let items: Vec<(&str, &[u8])> = vec![
            ("first.txt", &b"alpha"[..]),
            ("ünïcode/名前", &b"\x00\x01\x02"[..]),
            ("big.bin", big.as_slice()),
            ("first.txt", &b"again"[..]),
        ];
        pack(&path, ArchiveOptions::default().with_layout(layout), &items);

        let ar = Archive::open_with(&path, ArchiveOptions::default().with_layout(layout)).unwrap();
        assert_eq!(ar.len(), items.len());
        for (e, (name, data)) in ar.entries().iter().zip(&items) {
            assert_eq!(e.name, *name);
            assert_eq!(e.size, data.len() as u64);
            assert_eq!(ar.get_file(e).unwrap(), *data);
        }
    }
}

#[test]
fn positions_are_running_sums_of_sizes() {
    let tmp = tempdir().unwrap();
    let path = tmp.path().join("sums.sarc");
    let items: Vec<(String, Vec<u8>)> =
        (0..20).map(|i| (format!("e{i}"), vec![i as u8; i * 37 % 11])).collect();
    let refs: Vec<(&str, &[u8])> = items.iter().map(|(n, d)| (n.as_str(), d.as_slice())).collect();
    pack(&path, ArchiveOptions::default(), &refs);

    let ar = Archive::open(&path).unwrap();
    let mut sum = 0;
    for e in ar.entries() {
        assert_eq!(e.pos, sum);
        sum += e.size;
    }
    assert_eq!(ar.payload_end(), sum);
}

#[test]
fn empty_archive_stays_empty() {
    let tmp = tempdir().unwrap();
    let path = tmp.path().join("empty.sarc");
    Archive::open(&path).unwrap().finalize().unwrap();
    assert!(fs::metadata(&path).unwrap().len() <= 4);

    let ar = Archive::open(&path).unwrap();
    assert!(ar.is_empty());
}

#[test]
fn zero_byte_payload_roundtrips() {
    let tmp = tempdir().unwrap();
    let path = tmp.path().join("zero.sarc");
    pack(&path, ArchiveOptions::default(), &[("x", &b"abc"[..]), ("nothing", &b""[..]), ("y", &b"d"[..])]);

    let ar = Archive::open(&path).unwrap();
    let e = ar.find("nothing").unwrap();
    assert_eq!((e.size, e.pos), (0, 3));
    assert!(ar.get_file(e).unwrap().is_empty());
    assert_eq!(ar.find("y").unwrap().pos, 3);

    let only = tmp.path().join("only-zero.sarc");
    pack(&only, ArchiveOptions::default(), &[("z", &b""[..])]);
    let ar = Archive::open(&only).unwrap();
    assert_eq!(ar.entries(), &[IndexEntry::new("z", 0, 0)]);
}

#[test]
fn oversized_file_is_rejected_before_writing() {
    let tmp = tempdir().unwrap();
    let src = tmp.path().join("huge.bin");
    // sparse
    File::create(&src).unwrap().set_len(MAX_STREAM_PAYLOAD + 1).unwrap();

    let path = tmp.path().join("limit.sarc");
    let mut ar = Archive::open(&path).unwrap();
    let err = ar.add_path(&src).unwrap_err();
    assert!(matches!(err, ArchiveError::SizeLimitExceeded { size, .. } if size == MAX_STREAM_PAYLOAD + 1));
    assert!(ar.is_empty());
    drop(ar);
    assert_eq!(fs::metadata(&path).unwrap().len(), 0);
}

#[test]
fn read_ceilings_are_enforced_without_io() {
    let tmp = tempdir().unwrap();
    let ar = Archive::open(tmp.path().join("ceil.sarc")).unwrap();

    let two_gib = IndexEntry::new("big", MAX_BUFFERED_PAYLOAD + 1, 0);
    assert!(matches!(ar.get_file(&two_gib), Err(ArchiveError::SizeLimitExceeded { .. })));
    // streaming still allowed up to 4 GiB - 1
    assert!(ar.read_file(&two_gib).is_ok());

    let four_gib = IndexEntry::new("bigger", MAX_STREAM_PAYLOAD + 1, 0);
    assert!(matches!(ar.read_file(&four_gib), Err(ArchiveError::SizeLimitExceeded { .. })));
}

#[test]
fn streaming_matches_buffered() {
    let tmp = tempdir().unwrap();
    let path = tmp.path().join("stream.sarc");
    let data: Vec<u8> = (0..5000u32).map(|i| (i * 7 % 256) as u8).collect();
    pack(&path, ArchiveOptions::default(), &[("pad", &b"....."[..]), ("data", data.as_slice())]);

    let ar = Archive::open(&path).unwrap();
    for e in ar.entries() {
        let buffered = ar.get_file(e).unwrap();
        let mut streamed = Vec::new();
        let mut r = ar.read_file(e).unwrap();
        let mut byte = [0u8; 1];
        while r.read(&mut byte).unwrap() == 1 {
            streamed.push(byte[0]);
        }
        assert_eq!(streamed, buffered);
    }
}

#[test]
fn add_reader_and_add_path_record_written_size() {
    let tmp = tempdir().unwrap();
    let src = tmp.path().join("notes.txt");
    fs::write(&src, &b"from disk"[..]).unwrap();

    let path = tmp.path().join("sources.sarc");
    let mut ar = Archive::open(&path).unwrap();
    let chunked: Vec<u8> = vec![9u8; 150_000];
    ar.add_reader("stream", &chunked[..]).unwrap();
    let e = ar.add_path(&src).unwrap().clone();
    assert_eq!(e, IndexEntry::new("notes.txt", 9, 150_000));
    ar.finalize().unwrap();

    let ar = Archive::open(&path).unwrap();
    assert_eq!(ar.get_file(ar.find("stream").unwrap()).unwrap(), chunked);
    assert_eq!(ar.get_file(ar.find("notes.txt").unwrap()).unwrap(), &b"from disk"[..]);
}

#[test]
fn append_session_extends_existing_archive() {
    let tmp = tempdir().unwrap();
    for layout in [IndexLayout::Sized, IndexLayout::Positioned] {
        let path = tmp.path().join(format!("grow-{layout:?}.sarc"));
        let opts = ArchiveOptions::default().with_layout(layout);
        pack(&path, opts, &[("a", &b"hello"[..]), ("b", &b"world!"[..])]);
        pack(&path, ArchiveOptions::append().with_layout(layout), &[("c", &b"more"[..])]);

        let ar = Archive::open_with(&path, opts).unwrap();
        assert_eq!(
            ar.entries(),
            &[
                IndexEntry::new("a", 5, 0),
                IndexEntry::new("b", 6, 5),
                IndexEntry::new("c", 4, 11)
            ]
        );
        assert_eq!(ar.get_file(&ar.entries()[2]).unwrap(), &b"more"[..]);
        assert_eq!(ar.get_file(&ar.entries()[0]).unwrap(), &b"hello"[..]);
    }
}

#[test]
fn read_session_append_then_finalize_keeps_old_entries() {
    let tmp = tempdir().unwrap();
    let path = tmp.path().join("reopen.sarc");
    pack(&path, ArchiveOptions::default(), &[("a", &b"hello"[..])]);

    let mut ar = Archive::open(&path).unwrap();
    ar.add_file("b", &b"xyz"[..]).unwrap();
    ar.finalize().unwrap();

    let ar = Archive::open(&path).unwrap();
    let names: Vec<&str> = ar.entries().iter().map(|e| e.name.as_str()).collect();
    assert_eq!(names, ["a", "b"]);
    assert_eq!(ar.get_file(&ar.entries()[1]).unwrap(), &b"xyz"[..]);
}

#[test]
fn sized_layout_bytes_on_disk() {
    let tmp = tempdir().unwrap();
    let path = tmp.path().join("legacy.sarc");
    pack(
        &path,
        ArchiveOptions::default().with_layout(IndexLayout::Sized),
        &[("a", &b"hello"[..]), ("b", &b"world!"[..])],
    );

    let mut want = Vec::new();
    want.extend_from_slice(b"helloworld!");
    want.extend_from_slice(&[0, 1, b'a', 0, 0, 0, 5]);
    want.extend_from_slice(&[0, 1, b'b', 0, 0, 0, 6]);
    want.extend_from_slice(&14u32.to_be_bytes());
    assert_eq!(fs::read(&path).unwrap(), want);
}

#[test]
fn entries_serialize_to_json() {
    let e = IndexEntry::new("a", 5, 0);
    let v = serde_json::to_value(&e).unwrap();
    assert_eq!(v["name"], "a");
    assert_eq!(v["size"], 5);
    assert_eq!(v["pos"], 0);
}

#[test]
fn opening_with_the_wrong_layout_fails() {
    let tmp = tempdir().unwrap();

    let positioned = tmp.path().join("positioned.sarc");
    pack(&positioned, ArchiveOptions::default(), &[("x", &b""[..]), ("yy", &b""[..])]);
    let sized_opts = ArchiveOptions::default().with_layout(IndexLayout::Sized);
    assert!(matches!(
        Archive::open_with(&positioned, sized_opts),
        Err(ArchiveError::Malformed(_))
    ));

    let sized = tmp.path().join("sized.sarc");
    pack(&sized, sized_opts, &[("a", &b"hello"[..]), ("b", &b"world!"[..])]);
    assert!(matches!(Archive::open(&sized), Err(ArchiveError::Malformed(_))));
}
