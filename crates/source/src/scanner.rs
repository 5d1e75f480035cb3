use mongodb::bson::Document;

/// Largest document the server will store; anything claiming more is noise.
pub const MAX_DOCUMENT_SIZE: usize = 16 * 1024 * 1024;

/// Magic number opening a `mongodump --archive` stream (0x8199e26d, LE).
pub const ARCHIVE_MAGIC: [u8; 4] = [0x6d, 0xe2, 0x99, 0x81];

/// Block terminator between namespace sections of an archive.
const TERMINATOR: [u8; 4] = [0xff, 0xff, 0xff, 0xff];

/// Length prefix plus the trailing null of an empty document.
const MIN_DOCUMENT_SIZE: usize = 5;

#[derive(Debug, Clone)]
pub struct ScannedDocument {
    /// Byte offset of the document's length prefix.
    pub offset: usize,
    /// Bytes discarded while resynchronising just before this document.
    pub skipped_before: usize,
    pub document: Document,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ScanStats {
    pub bytes: usize,
    pub documents: usize,
    pub skipped_bytes: usize,
    /// Number of corrupt runs that were stepped over.
    pub resyncs: usize,
    pub terminators: usize,
    /// Candidates that passed the bounds checks but did not decode.
    pub decode_failures: usize,
}

/// Walks a byte buffer yielding every well-formed BSON document in it.
///
/// At each position the next four bytes are read as a little-endian length.
/// A candidate is accepted when the length is plausible, fits in the buffer,
/// ends in a null byte and decodes cleanly. Otherwise the scanner advances by
/// one byte and tries again, so a corrupt region costs bytes, not the rest of
/// the dump.
///
/// In a buffer opened by [`ARCHIVE_MAGIC`], four `0xff` bytes sitting on a
/// record boundary and followed by a record, another terminator or the end
/// of the buffer are consumed as framing. Anywhere else they are ordinary
/// unreadable bytes.
pub struct DocumentScanner<'a> {
    buf: &'a [u8],
    pos: usize,
    framed: bool,
    pending_skip: usize,
    stats: ScanStats,
}

impl<'a> DocumentScanner<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        let framed = buf.starts_with(&ARCHIVE_MAGIC);
        let pos = if framed { ARCHIVE_MAGIC.len() } else { 0 };
        let stats = ScanStats { bytes: buf.len(), ..ScanStats::default() };
        Self { buf, pos, framed, pending_skip: 0, stats }
    }

    pub fn is_framed(&self) -> bool {
        self.framed
    }

    pub fn stats(&self) -> ScanStats {
        self.stats
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    fn candidate(&mut self) -> Option<(Document, usize)> {
        match read_candidate(&self.buf[self.pos..]) {
            Candidate::Valid(doc, len) => Some((doc, len)),
            Candidate::Undecodable => {
                self.stats.decode_failures += 1;
                None
            }
            Candidate::OutOfBounds => None,
        }
    }

    /// Whether the bytes at the cursor are archive framing rather than data.
    fn at_terminator(&self) -> bool {
        // pending_skip is zero exactly when the cursor sits on a record boundary
        if !self.framed || self.pending_skip > 0 {
            return false;
        }
        let mut end = self.pos;
        while self.buf[end..].starts_with(&TERMINATOR) {
            end += TERMINATOR.len();
        }
        end > self.pos
            && (end == self.buf.len() || matches!(read_candidate(&self.buf[end..]), Candidate::Valid(..)))
    }

    fn skip(&mut self, bytes: usize) {
        self.pos += bytes;
        self.pending_skip += bytes;
        self.stats.skipped_bytes += bytes;
    }
}

impl Iterator for DocumentScanner<'_> {
    type Item = ScannedDocument;

    fn next(&mut self) -> Option<Self::Item> {
        while self.buf.len() - self.pos >= MIN_DOCUMENT_SIZE {
            if self.at_terminator() {
                self.pos += TERMINATOR.len();
                self.stats.terminators += 1;
                continue;
            }

            let Some((document, len)) = self.candidate() else {
                self.skip(1);
                continue;
            };

            let skipped_before = std::mem::take(&mut self.pending_skip);
            if skipped_before > 0 {
                self.stats.resyncs += 1;
                tracing::debug!(
                    "Resynchronised at offset {} after {} unreadable bytes",
                    self.pos,
                    skipped_before
                );
            }
            let scanned = ScannedDocument { offset: self.pos, skipped_before, document };
            self.pos += len;
            self.stats.documents += 1;
            return Some(scanned);
        }

        let tail = self.buf.len() - self.pos;
        if tail > 0 {
            if self.at_terminator() && tail == TERMINATOR.len() {
                self.stats.terminators += 1;
                self.pos += tail;
            } else {
                self.skip(tail);
            }
        }
        None
    }
}

enum Candidate {
    OutOfBounds,
    Undecodable,
    Valid(Document, usize),
}

fn read_candidate(rest: &[u8]) -> Candidate {
    let Some(prefix) = rest.get(..4).and_then(|p| <[u8; 4]>::try_from(p).ok()) else {
        return Candidate::OutOfBounds;
    };
    let declared = i32::from_le_bytes(prefix);
    if declared < MIN_DOCUMENT_SIZE as i32 {
        return Candidate::OutOfBounds;
    }
    let len = declared as usize;
    if len > MAX_DOCUMENT_SIZE || len > rest.len() || rest[len - 1] != 0 {
        return Candidate::OutOfBounds;
    }
    match Document::from_reader(&rest[..len]) {
        Ok(doc) => Candidate::Valid(doc, len),
        Err(_) => Candidate::Undecodable,
    }
}

/// One item of a dump as seen by [`ArchiveWalker`].
#[derive(Debug, Clone)]
pub enum ArchiveEntry {
    /// The archive prelude header (tool and server versions).
    Header(Document),
    /// Collection metadata from the prelude.
    Metadata { db: String, collection: String },
    /// Start or end of a namespace block.
    Namespace { db: String, collection: String, eof: bool },
    /// An application document, tagged with the namespace block it sat in.
    Data { namespace: Option<String>, scanned: ScannedDocument },
}

/// Layers `mongodump --archive` framing over [`DocumentScanner`].
///
/// Framing documents are only recognised when the buffer opens with the
/// archive magic; a bare concatenation of BSON documents yields only
/// [`ArchiveEntry::Data`] with no namespace.
pub struct ArchiveWalker<'a> {
    scanner: DocumentScanner<'a>,
    framed: bool,
    namespace: Option<String>,
}

impl<'a> ArchiveWalker<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        let scanner = DocumentScanner::new(buf);
        Self { framed: scanner.is_framed(), scanner, namespace: None }
    }

    pub fn is_framed(&self) -> bool {
        self.framed
    }

    pub fn stats(&self) -> ScanStats {
        self.scanner.stats()
    }

    pub fn position(&self) -> usize {
        self.scanner.position()
    }
}

fn namespace_of(doc: &Document) -> Option<(String, String)> {
    let db = doc.get_str("db").ok()?;
    let collection = doc.get_str("collection").ok()?;
    Some((db.to_string(), collection.to_string()))
}

fn is_prelude_header(doc: &Document) -> bool {
    doc.contains_key("concurrent_collections") && doc.contains_key("server_version")
}

impl Iterator for ArchiveWalker<'_> {
    type Item = ArchiveEntry;

    fn next(&mut self) -> Option<Self::Item> {
        let scanned = self.scanner.next()?;
        if !self.framed {
            return Some(ArchiveEntry::Data { namespace: None, scanned });
        }

        let doc = &scanned.document;
        if is_prelude_header(doc) {
            return Some(ArchiveEntry::Header(scanned.document));
        }
        if let Some((db, collection)) = namespace_of(doc) {
            if let Ok(eof) = doc.get_bool("EOF") {
                self.namespace = if eof { None } else { Some(collection.clone()) };
                return Some(ArchiveEntry::Namespace { db, collection, eof });
            }
            if doc.contains_key("metadata") {
                return Some(ArchiveEntry::Metadata { db, collection });
            }
        }

        Some(ArchiveEntry::Data { namespace: self.namespace.clone(), scanned })
    }
}
