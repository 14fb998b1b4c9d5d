use anyhow::Result;

use super::EguiFrameInput;

/// Overlay pass for the control panel. Runs after the scene passes with its
/// own encoder so texture-delta uploads order correctly.
pub(crate) fn render(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    frame_view: &wgpu::TextureView,
    frame: EguiFrameInput<'_>,
) -> Result<()> {
    for (id, delta) in &frame.textures_delta.set {
        frame.painter.update_texture(device, queue, *id, delta);
    }

    let mut encoder =
        device.create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some("Egui Encoder") });
    let mut extra_cmd =
        frame.painter.update_buffers(device, queue, &mut encoder, frame.paint_jobs, frame.screen);

    {
        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Egui Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: frame_view,
                depth_slice: None,
                resolve_target: None,
                ops: wgpu::Operations { load: wgpu::LoadOp::Load, store: wgpu::StoreOp::Store },
            })],
            depth_stencil_attachment: None,
            occlusion_query_set: None,
            timestamp_writes: None,
        });
        let pass = unsafe {
            std::mem::transmute::<&mut wgpu::RenderPass<'_>, &mut wgpu::RenderPass<'static>>(&mut pass)
        };
        frame.painter.render(pass, frame.paint_jobs, frame.screen);
    }

    extra_cmd.push(encoder.finish());
    queue.submit(extra_cmd);

    for id in &frame.textures_delta.free {
        frame.painter.free_texture(id);
    }
    Ok(())
}
