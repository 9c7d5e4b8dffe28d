// SPDX-License-Identifier: CEPL-1.0
use ash::vk;

use crate::error::{BuildStep, SessionError, SessionResult};
use crate::gpu::{Gpu, GpuObject};
use crate::session::Ledger;

/// Synchronization for the single in-flight frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SyncSet {
    /// Signaled when the acquired image may be written.
    pub image_available: vk::Semaphore,
    /// Signaled when the frame's commands finish; presentation waits on it.
    pub render_finished: vk::Semaphore,
    /// Created signaled so the first frame does not block.
    pub in_flight: vk::Fence,
}

pub(crate) fn create_sync_set<G: Gpu>(gpu: &mut G, ledger: &mut Ledger) -> SessionResult<SyncSet> {
    let image_available = gpu
        .create_semaphore()
        .map_err(SessionError::create(BuildStep::SyncObjects))?;
    ledger.push(GpuObject::Semaphore(image_available));
    let render_finished = gpu
        .create_semaphore()
        .map_err(SessionError::create(BuildStep::SyncObjects))?;
    ledger.push(GpuObject::Semaphore(render_finished));
    let in_flight = gpu
        .create_fence(true)
        .map_err(SessionError::create(BuildStep::SyncObjects))?;
    ledger.push(GpuObject::Fence(in_flight));

    Ok(SyncSet {
        image_available,
        render_finished,
        in_flight,
    })
}
