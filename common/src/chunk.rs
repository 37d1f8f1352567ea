//! Chunk arithmetic used by both the client's RPC facade and the daemon's
//! data plane to agree on which bytes of a write/read land in which chunk.
//!
//! Grounded in the call sites in `client/rpc/forward_data.cpp` and
//! `daemon/handler/h_data.cpp` (the header declaring these functions,
//! `chunk_calc_util.hpp`, was not present in the retrieved sources, but its
//! contract is fully pinned down by those call sites).

/// The id of the chunk that contains byte `offset`, for a given `chunk_size`.
pub fn chunk_id(offset: u64, chunk_size: u64) -> u64 {
    offset / chunk_size
}

/// Bytes to skip at the start of the first chunk touched by a request that
/// begins at `offset`.
pub fn left_pad(offset: u64, chunk_size: u64) -> u64 {
    offset % chunk_size
}

/// Bytes to discard at the end of the last chunk touched by a request that
/// ends at `offset` (exclusive-end convention: `offset` is one past the
/// last written/read byte).
pub fn right_pad(offset: u64, chunk_size: u64) -> u64 {
    let rem = offset % chunk_size;
    if rem == 0 {
        0
    } else {
        chunk_size - rem
    }
}

/// Inclusive `[start, end]` chunk-id range touched by a `size`-byte request
/// starting at `offset`.
pub fn chunk_range(offset: u64, size: u64, chunk_size: u64) -> (u64, u64) {
    assert!(size > 0);
    let start = chunk_id(offset, chunk_size);
    let end = chunk_id(offset + size - 1, chunk_size);
    (start, end)
}

/// One run of bytes that lies entirely within a single chunk, as part of a
/// larger `[offset, offset + size)` request. `pos` is the run's starting
/// offset within that request (so `pos - offset` is its position in the
/// caller's buffer).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkRun {
    pub pos: u64,
    pub chunk_id: u64,
    pub offset_in_chunk: u64,
    pub length: u64,
}

/// Splits `[offset, offset + size)` into the sequence of `ChunkRun`s that
/// cover it, one per chunk boundary crossed. This is the single source of
/// truth for chunk boundaries on both sides of a write/read RPC: the client
/// uses it to group runs by owning host, and the daemon trusts the list a
/// request carries instead of re-deriving boundaries from a start offset
/// (which breaks once a host's owned chunks in a range aren't contiguous).
pub fn chunk_plan(offset: u64, size: u64, chunk_size: u64) -> Vec<ChunkRun> {
    let mut out = Vec::new();
    let mut pos = offset;
    let mut remaining = size;
    while remaining > 0 {
        let id = chunk_id(pos, chunk_size);
        let in_chunk_off = left_pad(pos, chunk_size);
        let avail = chunk_size - in_chunk_off;
        let take = avail.min(remaining);
        out.push(ChunkRun { pos, chunk_id: id, offset_in_chunk: in_chunk_off, length: take });
        pos += take;
        remaining -= take;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_and_pads() {
        let cs = 1024;
        assert_eq!(chunk_id(0, cs), 0);
        assert_eq!(chunk_id(1023, cs), 0);
        assert_eq!(chunk_id(1024, cs), 1);
        assert_eq!(left_pad(100, cs), 100);
        assert_eq!(left_pad(1024, cs), 0);
        assert_eq!(right_pad(1024, cs), 0);
        assert_eq!(right_pad(100, cs), 924);
    }

    #[test]
    fn range_single_chunk() {
        assert_eq!(chunk_range(10, 20, 1024), (0, 0));
    }

    #[test]
    fn range_spanning_chunks() {
        assert_eq!(chunk_range(1000, 100, 1024), (0, 1));
        assert_eq!(chunk_range(1024, 1024, 1024), (1, 1));
    }

    #[test]
    fn plan_single_chunk() {
        let runs = chunk_plan(10, 20, 1024);
        assert_eq!(runs, vec![ChunkRun { pos: 10, chunk_id: 0, offset_in_chunk: 10, length: 20 }]);
    }

    #[test]
    fn plan_spans_chunks_with_correct_lengths() {
        let runs = chunk_plan(1000, 100, 1024);
        assert_eq!(runs.len(), 2);
        assert_eq!(runs[0], ChunkRun { pos: 1000, chunk_id: 0, offset_in_chunk: 1000, length: 24 });
        assert_eq!(runs[1], ChunkRun { pos: 1024, chunk_id: 1, offset_in_chunk: 0, length: 76 });
        let total: u64 = runs.iter().map(|r| r.length).sum();
        assert_eq!(total, 100);
    }
}
