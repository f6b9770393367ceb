//! End-to-end exercises against the public `Kernel` facade, covering the
//! concrete scenarios worked out by hand before the component tests were
//! written: small objects, exact chunk multiples, objects that span
//! multiple tracks, and the delete/reuse/duplicate-write interactions.

use std::io::Cursor;

use tempfile::tempdir;
use trackstore::{Error, Kernel, KernelOptions};

fn open(dir: &std::path::Path) -> Kernel {
    let opts = KernelOptions::new(dir).with_chunk_size(64).with_track_size(256);
    Kernel::open(opts).unwrap()
}

fn write(k: &mut Kernel, name: &[u8], data: &[u8]) {
    k.write(name, &mut Cursor::new(data.to_vec())).unwrap();
}

fn read(k: &Kernel, name: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    k.read(name, &mut out).unwrap();
    out
}

#[test]
fn small_object_round_trips() {
    let dir = tempdir().unwrap();
    let mut k = open(dir.path());
    let data: Vec<u8> = (0..30).collect();
    write(&mut k, b"small", &data);
    assert_eq!(read(&k, b"small"), data);
}

#[test]
fn exact_chunk_multiple_round_trips() {
    let dir = tempdir().unwrap();
    let mut k = open(dir.path());
    // C=64, header=17 so D=47; two full chunks.
    let data: Vec<u8> = (0..94u32).map(|b| b as u8).collect();
    write(&mut k, b"exact", &data);
    assert_eq!(read(&k, b"exact"), data);
}

#[test]
fn object_spanning_tracks_round_trips() {
    let dir = tempdir().unwrap();
    let mut k = open(dir.path());
    let data: Vec<u8> = (0..500u32).map(|b| (b % 251) as u8).collect();
    write(&mut k, b"big", &data);
    assert_eq!(read(&k, b"big"), data);
}

#[test]
fn many_small_objects_coexist() {
    let dir = tempdir().unwrap();
    let mut k = open(dir.path());
    for i in 0..40u32 {
        let name = format!("obj-{i}");
        let data = vec![i as u8; (i % 37) as usize + 1];
        write(&mut k, name.as_bytes(), &data);
    }
    for i in 0..40u32 {
        let name = format!("obj-{i}");
        let expected = vec![i as u8; (i % 37) as usize + 1];
        assert_eq!(read(&k, name.as_bytes()), expected);
    }
}

#[test]
fn duplicate_write_rejected_and_original_survives() {
    let dir = tempdir().unwrap();
    let mut k = open(dir.path());
    write(&mut k, b"dup", b"first value");
    let err = k.write(b"dup", &mut Cursor::new(b"second value".to_vec())).unwrap_err();
    assert!(matches!(err, Error::AlreadyExists));
    assert_eq!(read(&k, b"dup"), b"first value");
}

#[test]
fn delete_frees_space_for_reuse() {
    let dir = tempdir().unwrap();
    let mut k = open(dir.path());
    write(&mut k, b"a", &vec![0xAA; 200]);
    k.delete(b"a").unwrap();

    let err = k.read(b"a", &mut Vec::new()).unwrap_err();
    assert!(matches!(err, Error::NotFound));

    write(&mut k, b"b", &vec![0xBB; 47]);
    assert_eq!(read(&k, b"b"), vec![0xBBu8; 47]);
}

#[test]
fn delete_is_not_idempotent_across_calls() {
    let dir = tempdir().unwrap();
    let mut k = open(dir.path());
    write(&mut k, b"a", b"bytes");
    k.delete(b"a").unwrap();
    let err = k.delete(b"a").unwrap_err();
    assert!(matches!(err, Error::NotFound));
}

#[test]
fn reopen_recovers_previously_written_objects() {
    let dir = tempdir().unwrap();
    {
        let mut k = open(dir.path());
        write(&mut k, b"persisted", b"durable bytes");
    }
    let k = open(dir.path());
    assert_eq!(read(&k, b"persisted"), b"durable bytes");
}

#[test]
fn empty_object_round_trips_and_is_deletable() {
    let dir = tempdir().unwrap();
    let mut k = open(dir.path());
    write(&mut k, b"nothing", b"");
    assert_eq!(read(&k, b"nothing"), Vec::<u8>::new());
    k.delete(b"nothing").unwrap();
    let err = k.read(b"nothing", &mut Vec::new()).unwrap_err();
    assert!(matches!(err, Error::NotFound));
}
