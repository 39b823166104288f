//! Parallel encoding and decoding of independent containers.
//!
//! Frames within one container form a sequential chain, so parallelism is
//! only applied across containers: each job runs on its own rayon task.

use rayon::prelude::*;

use crate::container::{DecodedContainer, PartialDecode, decode_container, encode_container};
use crate::error::Result;
use crate::raster::{FrameShape, RasterBuffer};
use crate::schema::{CodecConfig, ReaderConfig};

/// One container to encode.
#[derive(Debug, Clone)]
pub struct ContainerJob {
    pub shape: FrameShape,
    pub fps: u32,
    pub frames: Vec<RasterBuffer>,
    pub config: CodecConfig,
}

/// Encode every job. Results are in job order.
pub fn encode_batch(jobs: &[ContainerJob]) -> Vec<Result<Vec<u8>>> {
    jobs.par_iter()
        .map(|job| encode_container(job.shape, job.fps, &job.frames, &job.config))
        .collect()
}

/// Decode every container. Results are in input order.
pub fn decode_batch<B>(
    containers: &[B],
    config: &ReaderConfig,
) -> Vec<std::result::Result<DecodedContainer, PartialDecode>>
where
    B: AsRef<[u8]> + Sync,
{
    containers
        .par_iter()
        .map(|bytes| decode_container(bytes.as_ref(), config))
        .collect()
}
