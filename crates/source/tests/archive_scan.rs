use std::io::Write;

use anyhow::Result;
use cms_source::bson::{doc, Document};
use cms_source::{read_archive, Classifier, Collection, CollectionStore, DocumentScanner, ARCHIVE_MAGIC};
use flate2::write::GzEncoder;
use flate2::Compression;

fn encode(doc: &Document) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    doc.to_writer(&mut out)?;
    Ok(out)
}

fn sample_documents() -> Vec<Document> {
    vec![
        doc! { "_id": "u1", "email": "asha@college.edu", "password": "$2b$10$x", "role": "STUDENT" },
        doc! { "_id": "u2", "email": "ravi@college.edu", "password": "$2b$10$y", "role": "FACULTY" },
        doc! { "_id": "s1", "userId": "u1", "rollNumber": "21CS001", "branchId": "b1" },
        doc! { "_id": "m1", "studentId": "s1", "mentorId": "u2", "assignedBy": "u2" },
        doc! { "_id": "r1", "applicationId": "a1", "reportMonth": 3, "reportYear": 2024 },
        doc! { "_id": "z", "randomField": 1 },
    ]
}

/// Interleaves the encoded documents with runs of bytes that never form a
/// plausible length prefix.
fn corrupted_buffer(docs: &[Document]) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    for (i, doc) in docs.iter().enumerate() {
        buf.extend(std::iter::repeat(0xEEu8).take(i * 3 + 1));
        buf.extend(encode(doc)?);
    }
    buf.extend([0xEEu8, 0xEE]);
    Ok(buf)
}

#[test]
fn test_scanner_recovers_every_document_from_corrupt_buffer() -> Result<()> {
    let docs = sample_documents();
    let buf = corrupted_buffer(&docs)?;

    let mut scanner = DocumentScanner::new(&buf);
    let found: Vec<_> = scanner.by_ref().collect();

    // spurious extra records are allowed, missing ones are not
    assert!(found.len() >= docs.len());
    for doc in &docs {
        assert!(found.iter().any(|s| &s.document == doc), "lost {:?}", doc);
    }
    assert!(scanner.stats().skipped_bytes > 0);
    Ok(())
}

/// Deterministic xorshift byte source.
struct Noise(u32);

impl Noise {
    fn byte(&mut self) -> u8 {
        self.0 ^= self.0 << 13;
        self.0 ^= self.0 >> 17;
        self.0 ^= self.0 << 5;
        (self.0 >> 24) as u8
    }
}

/// Corrupt runs that look like the start of a record: a terminator cut
/// short, a small length with a trailing null that does not decode, and an
/// empty document that does.
const LOOKALIKES: [&[u8]; 3] = [
    &[0xff, 0xff, 0xff],
    &[0x08, 0x00, 0x00, 0x00, 0x01, 0x02, 0x03, 0x00],
    &[0x05, 0x00, 0x00, 0x00, 0x00],
];

fn noisy_buffer(docs: &[Document], seed: u32, framed: bool) -> Result<Vec<u8>> {
    let mut noise = Noise(seed);
    let mut buf = if framed { ARCHIVE_MAGIC.to_vec() } else { Vec::new() };
    for (i, doc) in docs.iter().enumerate() {
        let run = noise.byte() % 8;
        for _ in 0..run {
            buf.push(noise.byte());
        }
        buf.extend(LOOKALIKES[i % LOOKALIKES.len()]);
        buf.extend(encode(doc)?);
    }
    buf.extend(LOOKALIKES[0]);
    Ok(buf)
}

#[test]
fn test_scanner_keeps_every_record_among_lookalike_noise() -> Result<()> {
    // 255 bytes long, so its length prefix opens with 0xff
    let mut docs = vec![doc! { "k": "x".repeat(242) }];
    docs.extend(sample_documents());

    for seed in [1, 7, 42, 1234, 0xdead_beef] {
        for framed in [false, true] {
            let buf = noisy_buffer(&docs, seed, framed)?;
            let found: Vec<_> = DocumentScanner::new(&buf).collect();

            assert!(found.len() >= docs.len(), "seed {} framed {}", seed, framed);
            for doc in &docs {
                assert!(
                    found.iter().any(|s| &s.document == doc),
                    "seed {} framed {} lost {:?}",
                    seed,
                    framed,
                    doc
                );
            }
        }
    }
    Ok(())
}

#[test]
fn test_gzip_dump_to_buckets() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("cms.archive.gz");

    let mut raw = ARCHIVE_MAGIC.to_vec();
    raw.extend(encode(&doc! { "db": "cms", "collection": "calendars", "EOF": false, "CRC": 0i64 })?);
    raw.extend(encode(&doc! { "_id": "c1", "name": "Odd semester" })?);
    raw.extend([0xFFu8; 4]);
    raw.extend(encode(&doc! { "db": "cms", "collection": "calendars", "EOF": true, "CRC": 0i64 })?);
    raw.extend(corrupted_buffer(&sample_documents())?);

    let mut encoder = GzEncoder::new(std::fs::File::create(&path)?, Compression::default());
    encoder.write_all(&raw)?;
    encoder.finish()?;

    let bytes = read_archive(&path)?;
    let store = CollectionStore::from_archive(&bytes, &Classifier::default());

    // the calendar entry is tagged by its namespace alone
    assert_eq!(store.bucket(Collection::Calendars).len(), 1);
    assert_eq!(store.bucket(Collection::Users).len(), 2);
    assert_eq!(store.bucket(Collection::Students).len(), 1);
    assert_eq!(store.bucket(Collection::MentorAssignments).len(), 1);
    assert_eq!(store.bucket(Collection::MonthlyReports).len(), 1);
    assert_eq!(store.unidentified().total(), 1);

    let stats = store.scan_stats().expect("scan stats recorded");
    assert_eq!(stats.terminators, 1);
    assert!(stats.resyncs >= 1);
    Ok(())
}
