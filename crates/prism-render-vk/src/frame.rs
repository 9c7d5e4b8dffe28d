// SPDX-License-Identifier: CEPL-1.0
//! One frame in flight: wait, acquire, record, submit, present.
//!
//! `image_available` orders the acquire before the color write,
//! `render_finished` orders the write before presentation and `in_flight`
//! keeps the CPU from re-recording the command buffer while the GPU still
//! reads it.

use ash::vk;
use std::fmt;
use tracing::{error, trace, warn};

use crate::error::{SessionError, SessionResult};
use crate::gpu::{Gpu, PresentDesc, RenderPassBegin, SubmitDesc};
use crate::session::Session;

const TRIANGLE_VERTICES: u32 = 3;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FrameState {
    #[default]
    Idle,
    WaitGate,
    Acquire,
    Record,
    Submit,
    Present,
}

impl fmt::Display for FrameState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FrameState::Idle => "idle",
            FrameState::WaitGate => "waiting for the in-flight fence",
            FrameState::Acquire => "acquiring a swap chain image",
            FrameState::Record => "recording commands",
            FrameState::Submit => "submitting",
            FrameState::Present => "presenting",
        };
        f.write_str(name)
    }
}

impl<G: Gpu> Session<G> {
    /// Runs one full cycle. On error the state is left at the failing stage.
    /// An image that was acquired but never submitted is handed back with an
    /// empty submission so the next call can pass the gate again; if even
    /// that fails every later call returns [`SessionError::GateLost`].
    pub fn draw_frame(&mut self) -> SessionResult<()> {
        if self.gate_lost {
            return Err(SessionError::GateLost);
        }
        let sync = self.sync;

        self.state = FrameState::WaitGate;
        self.gpu
            .wait_for_fence(sync.in_flight, self.config.gate_timeout_ns())
            .map_err(SessionError::frame(FrameState::WaitGate))?;

        self.state = FrameState::Acquire;
        let (image_index, suboptimal) = self
            .gpu
            .acquire_next_image(
                self.swapchain.handle,
                self.config.acquire_timeout_ns(),
                sync.image_available,
            )
            .map_err(SessionError::frame(FrameState::Acquire))?;
        if suboptimal {
            warn!("swap chain is suboptimal for the surface");
        }
        let Some(framebuffer) = self.framebuffers.get(image_index as usize).copied() else {
            self.release_image(vk::Fence::null());
            return Err(SessionError::ImageIndexOutOfRange {
                index: image_index,
                count: self.framebuffers.len(),
            });
        };
        // Only close the gate once an image is in hand, otherwise a failed
        // acquire would leave it shut for good.
        if let Err(e) = self.gpu.reset_fence(sync.in_flight) {
            self.release_image(vk::Fence::null());
            return Err(SessionError::frame(FrameState::Acquire)(e));
        }

        if let Err(e) = self.record_and_submit(framebuffer) {
            self.release_image(sync.in_flight);
            return Err(e);
        }

        self.state = FrameState::Present;
        let present = self.gpu.queue_present(
            self.present_queue,
            &PresentDesc {
                wait: sync.render_finished,
                swapchain: self.swapchain.handle,
                image_index,
            },
        );
        match present {
            Ok(false) => {}
            Ok(true) => warn!("present: swap chain is suboptimal"),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => warn!("present: swap chain is out of date"),
            Err(e) => return Err(SessionError::frame(FrameState::Present)(e)),
        }

        self.frames_presented += 1;
        self.state = FrameState::Idle;
        trace!("frame {} presented (image {image_index})", self.frames_presented);
        Ok(())
    }

    fn record_and_submit(&mut self, framebuffer: vk::Framebuffer) -> SessionResult<()> {
        let sync = self.sync;

        self.state = FrameState::Record;
        self.record(framebuffer)
            .map_err(SessionError::frame(FrameState::Record))?;

        self.state = FrameState::Submit;
        self.gpu
            .queue_submit(
                self.graphics_queue,
                &SubmitDesc {
                    command_buffer: self.command_buffer,
                    wait: sync.image_available,
                    wait_stage: vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
                    signal: sync.render_finished,
                    fence: sync.in_flight,
                },
            )
            .map_err(SessionError::frame(FrameState::Submit))
    }

    /// Consumes the `image_available` signal of an abandoned frame and, when
    /// `fence` is not null, reopens the gate.
    fn release_image(&mut self, fence: vk::Fence) {
        let released = self.gpu.queue_release(
            self.graphics_queue,
            self.sync.image_available,
            vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
            fence,
        );
        if let Err(e) = released {
            error!("releasing an abandoned image failed: {e}");
            if fence != vk::Fence::null() {
                self.gate_lost = true;
            }
        }
    }

    fn record(&mut self, framebuffer: vk::Framebuffer) -> ash::prelude::VkResult<()> {
        let cmd = self.command_buffer;
        self.gpu.reset_command_buffer(cmd)?;
        self.gpu.begin_command_buffer(cmd)?;
        self.gpu.cmd_begin_render_pass(
            cmd,
            &RenderPassBegin {
                render_pass: self.render_pass,
                framebuffer,
                extent: self.swapchain.extent,
                clear_color: self.config.clear_color,
            },
        );
        self.gpu.cmd_bind_pipeline(cmd, self.pipeline);
        self.gpu.cmd_draw(cmd, TRIANGLE_VERTICES, 1);
        self.gpu.cmd_end_render_pass(cmd);
        self.gpu.end_command_buffer(cmd)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::SessionBuilder;
    use crate::config::SessionConfig;
    use crate::fake::{Call, FakeDevice, FakeGpu};
    use crate::gpu::Sharing;
    use crate::shader::ShaderBytecode;
    use prism_render::RenderSize;

    fn session(gpu: &mut FakeGpu, config: SessionConfig) -> Session<&mut FakeGpu> {
        SessionBuilder::new(
            gpu,
            config,
            ShaderBytecode::for_tests(),
            RenderSize::new(800, 600),
        )
        .build()
        .unwrap()
    }

    fn run_frames(n: usize) {
        let mut gpu = FakeGpu::with_devices(vec![FakeDevice::discrete()]);
        let mut s = session(&mut gpu, SessionConfig::default());
        for _ in 0..n {
            s.draw_frame().unwrap();
            assert_eq!(s.state(), FrameState::Idle);
        }
        assert_eq!(s.frames_presented(), n as u64);

        let sync = s.sync();
        let framebuffers = s.framebuffers().to_vec();
        let swapchain = s.swapchain().handle;
        let gpu = s.gpu();
        let count = |c: fn(&Call) -> bool| gpu.count(c);

        assert_eq!(count(|c| matches!(c, Call::WaitFence(_))), n);
        assert_eq!(count(|c| matches!(c, Call::Acquire { .. })), n);
        assert_eq!(count(|c| matches!(c, Call::ResetFence(_))), n);
        assert_eq!(count(|c| matches!(c, Call::Submit(_))), n);
        assert_eq!(count(|c| matches!(c, Call::Present(_))), n);
        assert_eq!(
            count(|c| matches!(
                c,
                Call::Draw {
                    vertices: 3,
                    instances: 1
                }
            )),
            n
        );
        assert_eq!(gpu.fence_raises, n);

        let mut image = 0;
        for call in &gpu.calls {
            match call {
                Call::WaitFence(f) | Call::ResetFence(f) => assert_eq!(*f, sync.in_flight),
                Call::Acquire { signal } => assert_eq!(*signal, sync.image_available),
                Call::BeginRenderPass(fb) => {
                    assert_eq!(*fb, framebuffers[image % framebuffers.len()])
                }
                Call::Submit(submit) => {
                    assert_eq!(submit.wait, sync.image_available);
                    assert_eq!(
                        submit.wait_stage,
                        vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT
                    );
                    assert_eq!(submit.signal, sync.render_finished);
                    assert_eq!(submit.fence, sync.in_flight);
                }
                Call::Present(present) => {
                    assert_eq!(present.wait, sync.render_finished);
                    assert_eq!(present.swapchain, swapchain);
                    assert_eq!(present.image_index as usize, image % framebuffers.len());
                    image += 1;
                }
                _ => {}
            }
        }
    }

    #[test]
    fn one_frame() {
        run_frames(1);
    }

    #[test]
    fn two_frames() {
        run_frames(2);
    }

    #[test]
    fn hundred_frames() {
        run_frames(100);
    }

    #[test]
    fn cycle_runs_in_protocol_order() {
        let mut gpu = FakeGpu::with_devices(vec![FakeDevice::discrete()]);
        let mut s = session(&mut gpu, SessionConfig::default());
        s.draw_frame().unwrap();
        let sync = s.sync();
        let cmd = s.command_buffer();
        let (_, pipeline) = s.pipeline();
        let fb = s.framebuffers()[0];

        let calls = &s.gpu().calls;
        assert_eq!(calls.len(), 12);
        assert_eq!(calls[0], Call::WaitFence(sync.in_flight));
        assert_eq!(
            calls[1],
            Call::Acquire {
                signal: sync.image_available
            }
        );
        assert_eq!(calls[2], Call::ResetFence(sync.in_flight));
        assert_eq!(calls[3], Call::ResetCommandBuffer(cmd));
        assert_eq!(calls[4], Call::BeginCommandBuffer(cmd));
        assert_eq!(calls[5], Call::BeginRenderPass(fb));
        assert_eq!(calls[6], Call::BindPipeline(pipeline));
        assert_eq!(
            calls[7],
            Call::Draw {
                vertices: 3,
                instances: 1
            }
        );
        assert_eq!(calls[8], Call::EndRenderPass);
        assert_eq!(calls[9], Call::EndCommandBuffer(cmd));
        assert!(matches!(calls[10], Call::Submit(_)));
        assert!(matches!(calls[11], Call::Present(_)));
    }

    #[test]
    fn gate_timeout_is_reported_not_hung() {
        let mut gpu = FakeGpu::with_devices(vec![FakeDevice::discrete()]);
        gpu.stall = true;
        let config = SessionConfig {
            gate_timeout_ms: Some(5),
            ..SessionConfig::default()
        };
        let mut s = session(&mut gpu, config);

        s.draw_frame().unwrap();
        let err = s.draw_frame().unwrap_err();
        assert!(matches!(err, SessionError::Timeout(FrameState::WaitGate)));
        assert_eq!(s.state(), FrameState::WaitGate);
        assert_eq!(s.frames_presented(), 1);
        assert_eq!(s.gpu().count(|c| matches!(c, Call::Acquire { .. })), 1);
    }

    #[test]
    fn failed_acquire_leaves_gate_open() {
        let mut gpu = FakeGpu::with_devices(vec![FakeDevice::discrete()]);
        gpu.fail_on = Some("acquire_next_image");
        let mut s = session(&mut gpu, SessionConfig::default());

        let err = s.draw_frame().unwrap_err();
        assert!(matches!(
            err,
            SessionError::Frame {
                stage: FrameState::Acquire,
                source: vk::Result::ERROR_OUT_OF_DEVICE_MEMORY
            }
        ));
        let fence = s.sync().in_flight;
        assert!(s.gpu().fence_signaled(fence));
        assert_eq!(s.gpu().count(|c| matches!(c, Call::ResetFence(_))), 0);
        assert_eq!(s.gpu().count(|c| matches!(c, Call::Submit(_))), 0);
    }

    #[test]
    fn present_failure_is_a_frame_error() {
        let mut gpu = FakeGpu::with_devices(vec![FakeDevice::discrete()]);
        gpu.fail_on = Some("queue_present");
        let mut s = session(&mut gpu, SessionConfig::default());

        let err = s.draw_frame().unwrap_err();
        assert!(matches!(
            err,
            SessionError::Frame {
                stage: FrameState::Present,
                ..
            }
        ));
        assert_eq!(s.frames_presented(), 0);
    }

    #[test]
    fn failed_submit_hands_the_image_back() {
        let mut gpu = FakeGpu::with_devices(vec![FakeDevice::discrete()]);
        gpu.fail_on = Some("queue_submit");
        let mut s = session(&mut gpu, SessionConfig::default());
        let sync = s.sync();

        let err = s.draw_frame().unwrap_err();
        assert!(matches!(
            err,
            SessionError::Frame {
                stage: FrameState::Submit,
                ..
            }
        ));
        assert_eq!(s.state(), FrameState::Submit);
        assert!(s.gpu().fence_signaled(sync.in_flight));
        assert_eq!(
            s.gpu().calls.last(),
            Some(&Call::Release {
                wait: sync.image_available,
                fence: sync.in_flight
            })
        );

        // Unbounded gate: the fake panics if the fence was left unsignaled.
        s.gpu.fail_on = None;
        s.draw_frame().unwrap();
        assert_eq!(s.frames_presented(), 1);
        assert_eq!(s.gpu().count(|c| matches!(c, Call::Acquire { .. })), 2);
        assert_eq!(s.gpu().count(|c| matches!(c, Call::Submit(_))), 1);
    }

    #[test]
    fn unreleasable_image_loses_the_gate() {
        let mut gpu = FakeGpu::with_devices(vec![FakeDevice::discrete()]);
        gpu.fail_on = Some("queue_submit");
        gpu.fail_release = true;
        let mut s = session(&mut gpu, SessionConfig::default());

        assert!(s.draw_frame().is_err());
        s.gpu.fail_on = None;
        let waits = s.gpu().count(|c| matches!(c, Call::WaitFence(_)));
        let err = s.draw_frame().unwrap_err();
        assert!(matches!(err, SessionError::GateLost));
        assert_eq!(s.gpu().count(|c| matches!(c, Call::WaitFence(_))), waits);
    }

    #[test]
    fn bounded_acquire_times_out() {
        let mut gpu = FakeGpu::with_devices(vec![FakeDevice::discrete()]);
        gpu.starve_acquire = true;
        let config = SessionConfig {
            acquire_timeout_ms: Some(7),
            ..SessionConfig::default()
        };
        let mut s = session(&mut gpu, config);

        let err = s.draw_frame().unwrap_err();
        assert!(matches!(err, SessionError::Timeout(FrameState::Acquire)));
        assert_eq!(s.state(), FrameState::Acquire);
        assert_eq!(s.gpu().acquire_timeout_ns, Some(7_000_000));
        assert!(s.gpu().fence_signaled(s.sync().in_flight));
        assert_eq!(s.gpu().count(|c| matches!(c, Call::ResetFence(_))), 0);
    }

    #[test]
    fn suboptimal_acquire_still_presents() {
        let mut gpu = FakeGpu::with_devices(vec![FakeDevice::discrete()]);
        gpu.acquire_suboptimal = true;
        let mut s = session(&mut gpu, SessionConfig::default());

        s.draw_frame().unwrap();
        assert_eq!(s.state(), FrameState::Idle);
        assert_eq!(s.frames_presented(), 1);
        assert_eq!(s.gpu().count(|c| matches!(c, Call::Present(_))), 1);
    }

    fn present_returning(result: ash::prelude::VkResult<bool>) {
        let mut gpu = FakeGpu::with_devices(vec![FakeDevice::discrete()]);
        gpu.present_result = Some(result);
        let mut s = session(&mut gpu, SessionConfig::default());

        s.draw_frame().unwrap();
        s.draw_frame().unwrap();
        assert_eq!(s.state(), FrameState::Idle);
        assert_eq!(s.frames_presented(), 2);
    }

    #[test]
    fn suboptimal_present_counts_as_presented() {
        present_returning(Ok(true));
    }

    #[test]
    fn out_of_date_present_counts_as_presented() {
        present_returning(Err(vk::Result::ERROR_OUT_OF_DATE_KHR));
    }

    #[test]
    fn separate_present_family_end_to_end() {
        let mut gpu = FakeGpu::with_devices(vec![FakeDevice::discrete()
            .families(
                &[vk::QueueFlags::GRAPHICS, vk::QueueFlags::TRANSFER],
                &[1],
            )
            .formats(vec![vk::SurfaceFormatKHR {
                format: vk::Format::R8G8B8A8_UNORM,
                color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
            }])
            .present_modes(vec![vk::PresentModeKHR::FIFO])
            .capabilities(vk::SurfaceCapabilitiesKHR {
                min_image_count: 2,
                max_image_count: 4,
                current_extent: vk::Extent2D {
                    width: 800,
                    height: 600,
                },
                max_image_extent: vk::Extent2D {
                    width: 800,
                    height: 600,
                },
                ..Default::default()
            })]);
        let mut s = session(&mut gpu, SessionConfig::default());

        let swapchain = s.swapchain().clone();
        assert_eq!(swapchain.images.len(), 3);
        assert_eq!((swapchain.extent.width, swapchain.extent.height), (800, 600));
        assert_eq!(swapchain.sharing, Sharing::Concurrent([0, 1]));
        assert_eq!(swapchain.format.format, vk::Format::R8G8B8A8_UNORM);
        assert_eq!(swapchain.present_mode, vk::PresentModeKHR::FIFO);
        assert_eq!(s.image_views().len(), 3);
        assert_eq!(s.framebuffers().len(), 3);
        let (graphics, present) = s.queues();
        assert_ne!(graphics, present);

        for _ in 0..5 {
            s.draw_frame().unwrap();
        }
        assert_eq!(s.frames_presented(), 5);
        assert_eq!(s.gpu().count(|c| matches!(c, Call::Draw { .. })), 5);
        drop(s);

        let desc = gpu.device_desc.clone().unwrap();
        assert_eq!(desc.queue_families, vec![0, 1]);
        assert_eq!(gpu.pool_family, Some(0));
        assert_eq!(gpu.destroyed.len(), gpu.created.len());
    }
}
