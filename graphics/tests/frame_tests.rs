//! Integration tests for frames-in-flight buffer multiplexing.

mod common;

use std::sync::Arc;

use rstest::rstest;

use common::{Backend, TestContext, generate_test_pattern};
use meshpool_graphics::generators::generate_quad;
use meshpool_graphics::{DrawList, FrameMultiplexer, GpuBufferEntry};

/// Each of three frames writes its own instance; writes through one slot are
/// invisible through the others.
#[rstest]
#[case::dummy(Backend::Dummy)]
#[case::webgpu(Backend::WebGpu)]
fn test_frame_isolation(#[case] backend: Backend) {
    let Some(ctx) = TestContext::with_frames_in_flight(backend, 3) else {
        eprintln!("Backend {:?} not available, skipping", backend);
        return;
    };

    let mut mux = FrameMultiplexer::new(ctx.device.clone());
    assert_eq!(mux.frame_count(), 3);
    let handle = mux
        .register_per_frame_buffer(&ctx.indirect_descriptor(64))
        .unwrap();

    let mut frames = mux.create_frames();
    let keys: Vec<_> = frames
        .iter_mut()
        .map(|frame| frame.register_buffer(&mux, handle))
        .collect();

    let buffers: Vec<_> = frames
        .iter()
        .zip(&keys)
        .map(|(frame, &key)| Arc::clone(frame.buffer_handle(key)))
        .collect();
    for (i, a) in buffers.iter().enumerate() {
        for b in &buffers[i + 1..] {
            assert!(!Arc::ptr_eq(a, b));
        }
    }

    let pattern = generate_test_pattern(64, 9);
    ctx.device.write_buffer(&buffers[0], 0, &pattern).unwrap();

    assert_eq!(ctx.device.read_buffer(&buffers[0], 0, 64).unwrap(), pattern);
    assert_eq!(ctx.device.read_buffer(&buffers[1], 0, 64).unwrap(), vec![0; 64]);
    assert_eq!(ctx.device.read_buffer(&buffers[2], 0, 64).unwrap(), vec![0; 64]);
}

/// A frame loop: each frame compiles its draws into its own argument buffer
/// while the mesh set changes between frames.
#[rstest]
#[case::dummy(Backend::Dummy)]
#[case::webgpu(Backend::WebGpu)]
fn test_frame_loop_with_draw_lists(#[case] backend: Backend) {
    let Some(ctx) = TestContext::with_frames_in_flight(backend, 2) else {
        eprintln!("Backend {:?} not available, skipping", backend);
        return;
    };

    let mut registry = ctx.small_registry(1024, 256);
    let quad = generate_quad(1.0, 1.0);
    let meshes: Vec<_> = (0..4).map(|_| registry.add_mesh(&quad).unwrap()).collect();
    let table = meshes[0].0;
    let handles: Vec<_> = meshes.iter().map(|&(_, mesh)| mesh).collect();

    let max_draws = handles.len() as u64;
    let mut mux = FrameMultiplexer::new(ctx.device.clone());
    let args = mux
        .register_per_frame_buffer(&ctx.indirect_descriptor(max_draws * GpuBufferEntry::SIZE))
        .unwrap();

    let mut frames = mux.create_frames();
    let keys: Vec<_> = frames
        .iter_mut()
        .map(|frame| frame.register_buffer(&mux, args))
        .collect();

    let mut draws = DrawList::with_capacity(handles.len());
    let mut expected = Vec::new();
    for frame_index in 0..4 {
        if frame_index == 2 {
            registry[table].remove_mesh(handles[1]).unwrap();
        }

        let slot = frame_index % frames.len();
        let frame = &frames[slot];
        draws.compile(&registry[table], &handles);
        ctx.device
            .write_buffer(frame.buffer_handle(keys[slot]), 0, draws.as_bytes())
            .unwrap();
        expected.push(draws.len());
        ctx.device.advance_frame();
    }
    assert_eq!(expected, vec![4, 4, 3, 3]);

    // Slot 0 was last written in frame 2 and slot 1 in frame 3; both hold three draws.
    for (frame, &key) in frames.iter().zip(&keys) {
        let bytes = ctx
            .device
            .read_buffer(frame.buffer_handle(key), 0, 3 * GpuBufferEntry::SIZE)
            .unwrap();
        let written: Vec<GpuBufferEntry> = bytes
            .chunks_exact(GpuBufferEntry::SIZE as usize)
            .map(bytemuck::pod_read_unaligned)
            .collect();
        let instances: Vec<u32> = written.iter().map(|e| e.first_instance).collect();
        assert_eq!(instances, vec![0, 1, 2]);
    }
}
