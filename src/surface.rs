//! Render-target surfaces and double buffering.
//!
//! A [`Surface`] owns a GPU texture usable both as a render attachment and
//! as a sampled input. A [`DoubleSurface`] pairs two equally-sized
//! surfaces behind read/write accessors with an O(1) [`swap`](PingPong::swap):
//! every pipeline pass reads from `read()`, renders into `write()`, then
//! swaps, so no pass ever samples the texture it is writing.
//!
//! Surface dimensions are immutable after creation. A resolution change
//! allocates an entirely new surface and copies old contents best-effort
//! (top-left aligned, no scaling) at the engine level.

/// Size, format, and sampling behavior of a surface to allocate.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SurfaceSpec {
    pub label: &'static str,
    pub width: u32,
    pub height: u32,
    pub format: wgpu::TextureFormat,
    pub filter: wgpu::FilterMode,
}

impl SurfaceSpec {
    pub fn new(label: &'static str, width: u32, height: u32, format: wgpu::TextureFormat) -> Self {
        Self {
            label,
            width: width.max(1),
            height: height.max(1),
            format,
            filter: wgpu::FilterMode::Linear,
        }
    }

    pub fn with_filter(mut self, filter: wgpu::FilterMode) -> Self {
        self.filter = filter;
        self
    }
}

/// Bytes per texel for the formats this crate allocates.
fn bytes_per_texel(format: wgpu::TextureFormat) -> u32 {
    match format {
        wgpu::TextureFormat::R16Float => 2,
        wgpu::TextureFormat::Rg16Float | wgpu::TextureFormat::Rgba8Unorm => 4,
        wgpu::TextureFormat::Rgba16Float => 8,
        other => panic!("unsupported surface format {:?}", other),
    }
}

/// An owned 2D GPU image plus the view and sampler used to read it back.
pub struct Surface {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub sampler: wgpu::Sampler,
    pub width: u32,
    pub height: u32,
    pub format: wgpu::TextureFormat,
}

impl Surface {
    /// Allocate a surface, optionally uploading initial pixel data.
    ///
    /// `initial` must be tightly packed rows of `width * bytes_per_texel`
    /// bytes when provided; without it the surface starts zeroed.
    pub fn new(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        spec: &SurfaceSpec,
        initial: Option<&[u8]>,
    ) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(spec.label),
            size: wgpu::Extent3d {
                width: spec.width,
                height: spec.height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: spec.format,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT
                | wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_SRC
                | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        if let Some(data) = initial {
            let stride = spec.width * bytes_per_texel(spec.format);
            queue.write_texture(
                wgpu::TexelCopyTextureInfo {
                    texture: &texture,
                    mip_level: 0,
                    origin: wgpu::Origin3d::ZERO,
                    aspect: wgpu::TextureAspect::All,
                },
                data,
                wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(stride),
                    rows_per_image: Some(spec.height),
                },
                wgpu::Extent3d {
                    width: spec.width,
                    height: spec.height,
                    depth_or_array_layers: 1,
                },
            );
        }
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some(spec.label),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: spec.filter,
            min_filter: spec.filter,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });
        Self {
            texture,
            view,
            sampler,
            width: spec.width,
            height: spec.height,
            format: spec.format,
        }
    }

    /// Copy this surface into `dest`'s top-left region.
    ///
    /// Only the overlapping extent is transferred; a genuine resize is
    /// lossy. Formats must match.
    pub fn blit_into(&self, encoder: &mut wgpu::CommandEncoder, dest: &Surface) {
        let extent = wgpu::Extent3d {
            width: self.width.min(dest.width),
            height: self.height.min(dest.height),
            depth_or_array_layers: 1,
        };
        encoder.copy_texture_to_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &self.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyTextureInfo {
                texture: &dest.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            extent,
        );
    }
}

/// A read/write pair with an index swap over two owned slots.
///
/// `swap` exchanges which slot is "read" and which is "write" without
/// touching the slots themselves: no pixel data moves, only the index.
#[derive(Debug)]
pub struct PingPong<T> {
    slots: [T; 2],
    read: usize,
}

impl<T> PingPong<T> {
    pub fn new(first: T, second: T) -> Self {
        Self {
            slots: [first, second],
            read: 0,
        }
    }

    /// The slot passes sample from.
    pub fn read(&self) -> &T {
        &self.slots[self.read]
    }

    /// The slot passes render into.
    pub fn write(&self) -> &T {
        &self.slots[1 - self.read]
    }

    /// Both slots at once, `(read, write)`.
    pub fn split(&self) -> (&T, &T) {
        (self.read(), self.write())
    }

    /// Exchange read and write in O(1). The previous write slot becomes
    /// the new read slot.
    pub fn swap(&mut self) {
        self.read = 1 - self.read;
    }
}

/// Double-buffered surface used by every multi-pass pipeline stage.
pub type DoubleSurface = PingPong<Surface>;

impl PingPong<Surface> {
    /// Allocate two independent, equally-sized surfaces. `initial` seeds
    /// the read surface only.
    pub fn allocate(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        spec: &SurfaceSpec,
        initial: Option<&[u8]>,
    ) -> Self {
        Self::new(
            Surface::new(device, queue, spec, initial),
            Surface::new(device, queue, spec, None),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_swap_exchanges_identity_without_copying() {
        let a = String::from("a");
        let b = String::from("b");
        let mut pair = PingPong::new(a, b);
        let read_ptr = pair.read() as *const String;
        let write_ptr = pair.write() as *const String;
        assert_ne!(read_ptr, write_ptr);

        pair.swap();
        // The previous write slot is now the read slot, same objects.
        assert_eq!(pair.read() as *const String, write_ptr);
        assert_eq!(pair.write() as *const String, read_ptr);

        pair.swap();
        assert_eq!(pair.read() as *const String, read_ptr);
        assert_eq!(pair.write() as *const String, write_ptr);
    }

    #[test]
    fn test_split_returns_read_then_write() {
        let mut pair = PingPong::new(1, 2);
        assert_eq!(pair.split(), (&1, &2));
        pair.swap();
        assert_eq!(pair.split(), (&2, &1));
    }

    #[test]
    fn test_spec_clamps_degenerate_dimensions() {
        let spec = SurfaceSpec::new("s", 0, 0, wgpu::TextureFormat::Rgba8Unorm);
        assert_eq!((spec.width, spec.height), (1, 1));
    }

    #[test]
    fn test_bytes_per_texel_matches_formats() {
        assert_eq!(bytes_per_texel(wgpu::TextureFormat::R16Float), 2);
        assert_eq!(bytes_per_texel(wgpu::TextureFormat::Rg16Float), 4);
        assert_eq!(bytes_per_texel(wgpu::TextureFormat::Rgba8Unorm), 4);
        assert_eq!(bytes_per_texel(wgpu::TextureFormat::Rgba16Float), 8);
    }
}
