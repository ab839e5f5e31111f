use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use sidetree_types::{OperationRequest, UniqueSuffix};
use tracing::{debug, info, warn};

use crate::error::{BatchError, BatchResult};
use crate::queue::{Fifo, OperationQueue, PendingOperation, QueuedOperation};

/// Header size: 4 bytes length + 4 bytes CRC.
const HEADER_SIZE: usize = 8;

/// When appended records reach stable storage.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum WalSync {
    /// `fsync` after every record.
    EveryWrite,
    /// Flush to the OS; rely on the page cache.
    #[default]
    OsDefault,
}

/// On-disk queue record.
///
/// Requests are stored as JSON bytes: their serde shape is an internally
/// tagged enum, which bincode cannot decode.
#[derive(Debug, Serialize, Deserialize)]
enum QueueRecord {
    Enqueued {
        seq: u64,
        suffix: String,
        request: Vec<u8>,
    },
    Acked {
        seqs: Vec<u64>,
    },
}

/// Append-only segment file with length + CRC32 framing.
///
/// ```text
/// [4 bytes: payload length (little-endian u32)]
/// [4 bytes: CRC32 of payload (little-endian u32)]
/// [N bytes: payload (bincode-serialized QueueRecord)]
/// ```
struct Segment {
    path: PathBuf,
    writer: BufWriter<File>,
    sync: WalSync,
}

impl Segment {
    fn open(path: &Path, sync: WalSync) -> io::Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            writer: BufWriter::new(file),
            sync,
        })
    }

    fn append(&mut self, record: &QueueRecord) -> BatchResult<()> {
        let payload = encode(record)?;
        write_frame(&mut self.writer, &payload)?;
        self.writer.flush()?;
        if self.sync == WalSync::EveryWrite {
            self.writer.get_ref().sync_all()?;
        }
        Ok(())
    }

    fn truncate(&mut self) -> io::Result<()> {
        let file = OpenOptions::new()
            .write(true)
            .truncate(true)
            .open(&self.path)?;
        drop(file);
        *self = Self::open(&self.path, self.sync)?;
        debug!(path = %self.path.display(), "queue WAL truncated");
        Ok(())
    }

    /// Replace the segment with one holding only `live` entries.
    fn rewrite(&mut self, live: &[QueuedOperation]) -> BatchResult<()> {
        let tmp = self.path.with_extension("wal.tmp");
        {
            let mut out = BufWriter::new(File::create(&tmp)?);
            for queued in live {
                write_frame(&mut out, &encode(&enqueued_record(queued)?)?)?;
            }
            out.flush()?;
            out.get_ref().sync_all()?;
        }
        fs::rename(&tmp, &self.path)?;
        *self = Self::open(&self.path, self.sync)?;
        Ok(())
    }
}

fn encode(record: &QueueRecord) -> BatchResult<Vec<u8>> {
    bincode::serialize(record).map_err(|e| BatchError::Serialization(e.to_string()))
}

fn enqueued_record(queued: &QueuedOperation) -> BatchResult<QueueRecord> {
    let request = serde_json::to_vec(&queued.operation.request)
        .map_err(|e| BatchError::Serialization(e.to_string()))?;
    Ok(QueueRecord::Enqueued {
        seq: queued.seq,
        suffix: queued.operation.unique_suffix.to_string(),
        request,
    })
}

fn write_frame(out: &mut impl Write, payload: &[u8]) -> io::Result<()> {
    let length = payload.len() as u32;
    let crc = crc32fast::hash(payload);
    out.write_all(&length.to_le_bytes())?;
    out.write_all(&crc.to_le_bytes())?;
    out.write_all(payload)
}

/// Read every intact frame. A torn tail stops recovery; CRC failures are
/// skipped. The flag is `false` if anything was skipped.
fn read_frames(path: &Path) -> io::Result<(Vec<Vec<u8>>, bool)> {
    let mut data = Vec::new();
    BufReader::new(File::open(path)?).read_to_end(&mut data)?;

    let mut frames = Vec::new();
    let mut clean = true;
    let mut offset = 0usize;
    while offset + HEADER_SIZE <= data.len() {
        let header = &data[offset..offset + HEADER_SIZE];
        let length = u32::from_le_bytes([header[0], header[1], header[2], header[3]]) as usize;
        let expected_crc = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);
        let start = offset + HEADER_SIZE;
        if length == 0 || start + length > data.len() {
            warn!(offset, length, "truncated queue WAL entry; stopping recovery");
            clean = false;
            break;
        }
        let payload = &data[start..start + length];
        let actual_crc = crc32fast::hash(payload);
        if actual_crc == expected_crc {
            frames.push(payload.to_vec());
        } else {
            clean = false;
            warn!(
                offset,
                expected = expected_crc,
                actual = actual_crc,
                "CRC mismatch in queue WAL; skipping entry"
            );
        }
        offset = start + length;
    }
    if offset != data.len() {
        clean = false;
    }
    Ok((frames, clean))
}

struct WalState {
    fifo: Fifo,
    segment: Segment,
}

/// Durable operation queue backed by a write-ahead log.
///
/// Every `add` is logged before it becomes visible. Taken operations stay in
/// the log until [`ack`](OperationQueue::ack), so a crash between cut and
/// anchor commit replays them on the next open. The log is truncated
/// whenever the queue drains with nothing in flight.
pub struct WalQueue {
    path: PathBuf,
    state: Mutex<WalState>,
}

impl WalQueue {
    /// Open (or create) the queue log at `path` and replay it.
    pub fn open(path: &Path, sync: WalSync) -> BatchResult<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut segment = Segment::open(path, sync)?;

        let mut live: BTreeMap<u64, PendingOperation> = BTreeMap::new();
        let mut next_seq = 0u64;
        let mut records = 0usize;
        let (frames, clean) = read_frames(path)?;
        for frame in frames {
            records += 1;
            let record: QueueRecord = match bincode::deserialize(&frame) {
                Ok(r) => r,
                Err(e) => {
                    warn!(error = %e, "undecodable queue record; skipping");
                    continue;
                }
            };
            match record {
                QueueRecord::Enqueued {
                    seq,
                    suffix,
                    request,
                } => {
                    next_seq = next_seq.max(seq + 1);
                    match decode_pending(&suffix, &request) {
                        Ok(op) => {
                            live.insert(seq, op);
                        }
                        Err(e) => warn!(seq, error = %e, "unreadable queued operation; dropping"),
                    }
                }
                QueueRecord::Acked { seqs } => {
                    for seq in seqs {
                        live.remove(&seq);
                    }
                }
            }
        }

        let mut fifo = Fifo {
            next_seq,
            ..Fifo::default()
        };
        fifo.items = live
            .into_iter()
            .map(|(seq, operation)| QueuedOperation { seq, operation })
            .collect();

        if fifo.items.is_empty() {
            segment.truncate()?;
        } else if !clean || records > fifo.items.len() {
            let items: Vec<_> = fifo.items.iter().cloned().collect();
            segment.rewrite(&items)?;
        }

        info!(
            path = %path.display(),
            recovered = fifo.items.len(),
            "queue WAL opened"
        );
        Ok(Self {
            path: path.to_path_buf(),
            state: Mutex::new(WalState { fifo, segment }),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Operations taken but not yet acked or requeued.
    pub fn in_flight(&self) -> usize {
        self.state.lock().expect("lock poisoned").fifo.in_flight
    }
}

fn decode_pending(suffix: &str, request: &[u8]) -> BatchResult<PendingOperation> {
    let unique_suffix =
        UniqueSuffix::new(suffix).map_err(|e| BatchError::Serialization(e.to_string()))?;
    let request: OperationRequest =
        serde_json::from_slice(request).map_err(|e| BatchError::Serialization(e.to_string()))?;
    Ok(PendingOperation::new(unique_suffix, request))
}

impl OperationQueue for WalQueue {
    fn add(&self, operation: PendingOperation) -> BatchResult<usize> {
        let mut state = self.state.lock().expect("lock poisoned");
        let queued = QueuedOperation {
            seq: state.fifo.next_seq,
            operation,
        };
        state.segment.append(&enqueued_record(&queued)?)?;
        state.fifo.push(queued.operation);
        Ok(state.fifo.items.len())
    }

    fn take(&self, max: usize) -> BatchResult<Vec<QueuedOperation>> {
        Ok(self.state.lock().expect("lock poisoned").fifo.take(max))
    }

    fn requeue(&self, operations: Vec<QueuedOperation>) -> BatchResult<()> {
        // Still logged as enqueued; only the in-memory head changes.
        self.state
            .lock()
            .expect("lock poisoned")
            .fifo
            .requeue(operations);
        Ok(())
    }

    fn ack(&self, operations: &[QueuedOperation]) -> BatchResult<()> {
        if operations.is_empty() {
            return Ok(());
        }
        let mut state = self.state.lock().expect("lock poisoned");
        let seqs = operations.iter().map(|q| q.seq).collect();
        state.segment.append(&QueueRecord::Acked { seqs })?;
        state.fifo.settle(operations.len());
        if state.fifo.items.is_empty() && state.fifo.in_flight == 0 {
            state.segment.truncate()?;
        }
        Ok(())
    }

    fn peek(&self) -> Vec<QueuedOperation> {
        self.state
            .lock()
            .expect("lock poisoned")
            .fifo
            .items
            .iter()
            .cloned()
            .collect()
    }

    fn len(&self) -> usize {
        self.state.lock().expect("lock poisoned").fifo.items.len()
    }
}

impl std::fmt::Debug for WalQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WalQueue")
            .field("path", &self.path)
            .field("len", &self.len())
            .finish()
    }
}
