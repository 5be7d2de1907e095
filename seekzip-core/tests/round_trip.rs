use proptest::prelude::*;
use seekzip_core::codec::store::Store;
use seekzip_core::codec::zstdc::ZstdCompressor;
use seekzip_core::codec::{CodecId, Compressor, codec_for};
use seekzip_core::container::frametab::{ENTRY_SIZE, index_checksum};
use seekzip_core::container::tail::{TAIL_LEN, Tail};
use seekzip_core::source::MemSource;
use seekzip_core::{ReaderOptions, SeekError, SeekableReader, SeekableWriter, WriterOptions};
use std::io::{Read, Seek, SeekFrom};

fn pack(data: &[u8], frame_size: usize, codec: Box<dyn Compressor>) -> Vec<u8> {
    let opts = WriterOptions {
        frame_size,
        ..Default::default()
    };
    let mut w = SeekableWriter::new(Vec::new(), codec, opts).unwrap();
    w.write_bytes(data).unwrap();
    w.finish().unwrap()
}

fn open(bytes: Vec<u8>, codec: Box<dyn Compressor>) -> Result<SeekableReader, SeekError> {
    SeekableReader::open(Box::new(MemSource::new(bytes)), codec, &ReaderOptions::default())
}

fn sample(n: usize) -> Vec<u8> {
    (0..n).map(|i| (i * 31 % 251) as u8).collect()
}

#[test]
fn round_trips_empty_single_and_multi_frame() {
    for (len, frame_size, frames) in [(0usize, 64usize, 0usize), (64, 64, 1), (1000, 64, 16)] {
        let data = sample(len);
        let r = open(pack(&data, frame_size, Box::new(ZstdCompressor)), Box::new(ZstdCompressor)).unwrap();
        assert_eq!(r.size(), len as u64);
        assert_eq!(r.frames().len(), frames);
        let mut out = Vec::new();
        r.cursor().read_to_end(&mut out).unwrap();
        assert_eq!(out, data);
    }
}

#[test]
fn cursor_seeks_within_logical_space() {
    let data = sample(300);
    let r = open(pack(&data, 40, Box::new(ZstdCompressor)), Box::new(ZstdCompressor)).unwrap();
    let mut c = r.cursor();
    assert_eq!(c.seek(SeekFrom::End(-10)).unwrap(), 290);
    let mut buf = [0u8; 32];
    assert_eq!(c.read(&mut buf).unwrap(), 10);
    assert_eq!(&buf[..10], &data[290..]);
    assert_eq!(c.read(&mut buf).unwrap(), 0);
    assert_eq!(c.seek(SeekFrom::Start(300)).unwrap(), 300);
    assert!(c.seek(SeekFrom::Start(301)).is_err());
    assert!(c.seek(SeekFrom::Current(-301)).is_err());
}

#[test]
fn out_of_range_reads() {
    let data = sample(100);
    let r = open(pack(&data, 30, Box::new(Store)), Box::new(Store)).unwrap();
    assert_eq!(r.read_at(90, 50).unwrap(), &data[90..]);
    assert!(r.read_at(100, 5).unwrap().is_empty());
    assert!(matches!(r.read_at(101, 1), Err(SeekError::OutOfRange { .. })));
    let mut buf = [0u8; 20];
    assert!(matches!(
        r.read_exact_at(90, &mut buf),
        Err(SeekError::OutOfRange { .. })
    ));
}

/// Rewrite the frame index through `edit`, then re-seal index checksum and tail
/// so only the structural invariants are left to catch the damage.
fn tamper_index(bytes: &mut Vec<u8>, edit: impl FnOnce(&mut [u8])) {
    let tail_at = bytes.len() - TAIL_LEN as usize;
    let mut tail = Tail::decode(&bytes[tail_at..]).unwrap();
    let start = tail.index_off as usize;
    let end = start + tail.index_len as usize;
    edit(&mut bytes[start..end]);
    tail.index_xxh64 = index_checksum(&bytes[start..end]);
    bytes[tail_at..].copy_from_slice(&tail.encode());
}

fn put_u64(buf: &mut [u8], at: usize, v: u64) {
    buf[at..at + 8].copy_from_slice(&v.to_le_bytes());
}

#[test]
fn index_invariant_violations_are_corrupt_index() {
    let data = sample(100);
    let good = pack(&data, 25, Box::new(Store));

    // gap in logical offsets
    let mut b = good.clone();
    tamper_index(&mut b, |ix| put_u64(ix, ENTRY_SIZE + 16, 26));
    assert!(matches!(open(b, Box::new(Store)), Err(SeekError::CorruptIndex(_))));

    // overlapping compressed ranges
    let mut b = good.clone();
    tamper_index(&mut b, |ix| put_u64(ix, ENTRY_SIZE, 10));
    assert!(matches!(open(b, Box::new(Store)), Err(SeekError::CorruptIndex(_))));

    // nonempty frame with no compressed bytes
    let mut b = good.clone();
    tamper_index(&mut b, |ix| put_u64(ix, 8, 0));
    assert!(matches!(open(b, Box::new(Store)), Err(SeekError::CorruptIndex(_))));

    // index bytes changed without re-sealing
    let mut b = good.clone();
    let at = b.len() - TAIL_LEN as usize - 1;
    b[at] ^= 0xff;
    assert!(matches!(open(b, Box::new(Store)), Err(SeekError::CorruptIndex(_))));
}

#[test]
fn huge_declared_frame_is_refused_at_open() {
    let mut b = pack(&sample(100), 100, Box::new(Store));
    let huge = 1u64 << 44;
    tamper_index(&mut b, |ix| put_u64(ix, 24, huge));
    let tail_at = b.len() - TAIL_LEN as usize;
    let mut tail = Tail::decode(&b[tail_at..]).unwrap();
    tail.total_u = huge;
    b[tail_at..].copy_from_slice(&tail.encode());
    assert!(matches!(open(b, Box::new(Store)), Err(SeekError::CorruptIndex(_))));
}

#[test]
fn truncated_or_foreign_input_is_invalid_format() {
    assert!(matches!(
        open(vec![0u8; 10], Box::new(ZstdCompressor)),
        Err(SeekError::InvalidFormat(_))
    ));
    let mut b = pack(&sample(10), 8, Box::new(ZstdCompressor));
    let n = b.len();
    b[n - 1] ^= 0x55;
    assert!(matches!(open(b, Box::new(ZstdCompressor)), Err(SeekError::InvalidFormat(_))));
}

#[test]
fn flipped_payload_byte_only_poisons_its_frame() {
    let data = sample(40);
    let mut b = pack(&data, 10, Box::new(Store));
    // frame 2 covers logical 20..30 and, with the store codec, bytes 20..30
    b[25] ^= 0x01;
    let r = open(b, Box::new(Store)).unwrap();
    match r.read_at(18, 5) {
        Err(SeekError::Integrity { frame, .. }) => assert_eq!(frame, Some(2)),
        other => panic!("expected integrity error, got {other:?}"),
    }
    assert!(matches!(r.read_at(25, 1), Err(SeekError::Integrity { .. })));
    assert_eq!(r.read_at(0, 20).unwrap(), &data[..20]);
    assert_eq!(r.read_at(30, 10).unwrap(), &data[30..]);
    assert!(matches!(r.verify_all(), Err(SeekError::Integrity { .. })));
}

#[test]
fn disabled_verification_skips_checksums() {
    let data = sample(40);
    let mut b = pack(&data, 10, Box::new(Store));
    b[5] ^= 0x01;
    let opts = ReaderOptions {
        verify_checksums: false,
        ..Default::default()
    };
    let r = SeekableReader::open(Box::new(MemSource::new(b)), Box::new(Store), &opts).unwrap();
    let got = r.read_at(0, 10).unwrap();
    assert_eq!(got[5], data[5] ^ 0x01);
}

#[test]
fn codec_ids_select_matching_codecs() {
    let data = sample(500);
    for id in [CodecId::Store, CodecId::Zstd] {
        let r = open(pack(&data, 128, codec_for(id)), codec_for(id)).unwrap();
        assert_eq!(r.tail().codec, id);
        assert_eq!(r.read_at(100, 300).unwrap(), &data[100..400]);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn random_access_matches_plain_slice(
        data in proptest::collection::vec(any::<u8>(), 0..4096),
        frame_size in 1usize..700,
        offset_frac in 0.0f64..=1.0,
        len in 0u64..5000,
        cache in 0usize..4,
    ) {
        let bytes = pack(&data, frame_size, Box::new(ZstdCompressor));
        let opts = ReaderOptions { cache_frames: cache, ..Default::default() };
        let r = SeekableReader::open(Box::new(MemSource::new(bytes)), Box::new(ZstdCompressor), &opts).unwrap();
        let offset = (data.len() as f64 * offset_frac) as u64;
        let got = r.read_at(offset, len).unwrap();
        let end = (offset + len).min(data.len() as u64) as usize;
        prop_assert_eq!(&got[..], &data[offset as usize..end]);
    }
}
