//! Integration contract between chunk producers and a streaming dispatcher.
//!
//! A dispatcher asks a [`ChunkSource`] for the chunk containing a world
//! position. Baked worlds and procedural generators implement the same
//! trait, so a dispatcher can register either one, or chain a baked source in
//! front of a procedural fallback with [`ChunkSource::or_else`].

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::view::ChunkView;

/// Shared cancellation flag for an outstanding chunk request.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// Creates a token that is not cancelled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation. Sources observe this only when a request starts.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    /// Returns true once [`cancel`](Self::cancel) has been called on any clone.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// A request for the chunk containing a world-space voxel position.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChunkRequest {
    /// World X position in voxels.
    pub world_x: i32,
    /// World Y position in voxels.
    pub world_y: i32,
    /// World Z position in voxels.
    pub world_z: i32,
    /// Edge length the dispatcher expects.
    pub size: u16,
}

impl ChunkRequest {
    /// Creates a request.
    pub fn new(world_x: i32, world_y: i32, world_z: i32, size: u16) -> Self {
        Self {
            world_x,
            world_y,
            world_z,
            size,
        }
    }
}

/// A chunk delivered to the dispatcher.
#[derive(Clone, Debug)]
pub struct GeneratedChunk {
    /// The chunk's voxels.
    pub voxel_data: ChunkView,
}

/// Anything that can answer chunk requests.
///
/// Returning `None` means "not available here"; it is never an error.
pub trait ChunkSource {
    /// Produces the chunk for `request`, or `None`.
    fn request_chunk(&mut self, request: ChunkRequest, cancel: &CancelToken)
    -> Option<GeneratedChunk>;

    /// Chains `fallback` behind this source.
    fn or_else<B: ChunkSource>(self, fallback: B) -> Fallback<Self, B>
    where
        Self: Sized,
    {
        Fallback {
            primary: self,
            fallback,
        }
    }
}

impl<F> ChunkSource for F
where
    F: FnMut(ChunkRequest, &CancelToken) -> Option<GeneratedChunk>,
{
    fn request_chunk(
        &mut self,
        request: ChunkRequest,
        cancel: &CancelToken,
    ) -> Option<GeneratedChunk> {
        self(request, cancel)
    }
}

/// Asks `primary` first and falls through to `fallback` on `None`.
#[derive(Debug)]
pub struct Fallback<A, B> {
    primary: A,
    fallback: B,
}

impl<A: ChunkSource, B: ChunkSource> ChunkSource for Fallback<A, B> {
    fn request_chunk(
        &mut self,
        request: ChunkRequest,
        cancel: &CancelToken,
    ) -> Option<GeneratedChunk> {
        if cancel.is_cancelled() {
            return None;
        }
        self.primary
            .request_chunk(request, cancel)
            .or_else(|| self.fallback.request_chunk(request, cancel))
    }
}
