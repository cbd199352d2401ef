//! Post-processing: convolution filters and bloom.
//!
//! Filters are 3x3 convolutions applied by ping-ponging between two
//! surfaces. Bloom extracts a brightness-weighted copy of the frame,
//! walks it down a chain of shrinking surfaces, blurs the smallest level,
//! walks back up, and composites the result over the frame.

use bytemuck::bytes_of;

use crate::gpu::pipeline::PassProgram;
use crate::kernels::{self, CompositeParams, FilterParams};
use crate::surface::{DoubleSurface, Surface};

/// Filter rounds applied to the smallest bloom level.
const BLOOM_BLUR_ROUNDS: u32 = 5;

/// Post-process filter selection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FilterKind {
    Blur,
    EdgeDetect,
    Sharpen,
}

/// A 3x3 kernel and its normalization weight.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FilterKernel {
    pub weights: [f32; 9],
    pub weight: f32,
}

impl FilterKind {
    pub fn kernel(self) -> FilterKernel {
        match self {
            FilterKind::Blur => FilterKernel {
                weights: [1.0, 2.0, 1.0, 2.0, 4.0, 2.0, 1.0, 2.0, 1.0],
                weight: 16.0,
            },
            FilterKind::EdgeDetect => FilterKernel {
                weights: [-1.0, -1.0, -1.0, -1.0, 8.0, -1.0, -1.0, -1.0, -1.0],
                weight: 1.0,
            },
            FilterKind::Sharpen => FilterKernel {
                weights: [0.0, -1.0, 0.0, -1.0, 5.0, -1.0, 0.0, -1.0, 0.0],
                weight: 1.0,
            },
        }
    }
}

/// Round a repetition count up to the nearest odd number.
///
/// An odd number of ping-pong passes is what lands the final write in the
/// destination surface; an even count would leave it in the source.
pub fn odd_rounds(rounds: u32) -> u32 {
    rounds + (rounds + 1) % 2
}

fn pack_kernel(kernel: &FilterKernel) -> [[f32; 4]; 3] {
    let k = kernel.weights;
    [
        [k[0], k[1], k[2], k[3]],
        [k[4], k[5], k[6], k[7]],
        [k[8], kernel.weight, 0.0, 0.0],
    ]
}

/// An ordered list of convolution kernels applied as one filter.
pub struct Filter {
    kernels: Vec<FilterKernel>,
}

impl Filter {
    pub fn new(kind: FilterKind) -> Self {
        Self {
            kernels: vec![kind.kernel()],
        }
    }

    /// Apply the filter by ping-ponging between `source` and `dest`.
    ///
    /// `rounds` is rounded up to an odd pass count so the result lands in
    /// `dest`; should the kernel list make the total even anyway, a final
    /// copy moves it there. The pixel size is re-read from the live input
    /// each pass, so chains across differently-sized surfaces stay
    /// consistent.
    pub fn apply(
        &self,
        device: &wgpu::Device,
        encoder: &mut wgpu::CommandEncoder,
        programs: &PostPrograms,
        source: &Surface,
        dest: &Surface,
        rounds: u32,
    ) {
        let mut src = source;
        let mut dst = dest;
        for _ in 0..odd_rounds(rounds) {
            for kernel in &self.kernels {
                let params = FilterParams {
                    pixel_size: [1.0 / src.width as f32, 1.0 / src.height as f32],
                    _pad: [0.0; 2],
                    kernel: pack_kernel(kernel),
                };
                programs.filter.encode(
                    device,
                    encoder,
                    &dst.view,
                    dst.format,
                    &[src],
                    Some(bytes_of(&params)),
                );
                std::mem::swap(&mut src, &mut dst);
            }
        }
        // The last write target is `src` after the trailing swap.
        if !std::ptr::eq(src, dest) {
            programs.copy.encode(device, encoder, &dest.view, dest.format, &[src], None);
        }
    }
}

/// Compiled programs used by the post-process stages.
pub struct PostPrograms {
    pub filter: PassProgram,
    pub copy: PassProgram,
    pub bloom_extract: PassProgram,
    pub bloom_composite: PassProgram,
}

impl PostPrograms {
    pub fn new(device: &wgpu::Device) -> Self {
        Self {
            filter: PassProgram::new(device, "Filter Pass", kernels::FILTER3X3, 1, true),
            copy: PassProgram::new(device, "Copy Pass", kernels::COPY, 1, false),
            bloom_extract: PassProgram::new(device, "Bloom Extract Pass", kernels::BLOOM_EXTRACT, 1, false),
            bloom_composite: PassProgram::new(
                device,
                "Bloom Composite Pass",
                kernels::BLOOM_COMPOSITE,
                2,
                true,
            ),
        }
    }
}

/// Run the bloom chain over `frame` and composite the result back into it.
///
/// `levels` are progressively half-sized surfaces. Downsampling is a plain
/// copy per level and upsampling copies back without blending, a
/// simplification that trades a little quality for a much shorter chain.
pub fn apply_bloom(
    device: &wgpu::Device,
    encoder: &mut wgpu::CommandEncoder,
    programs: &PostPrograms,
    blur: &Filter,
    levels: &[Surface],
    frame: &mut DoubleSurface,
    intensity: f32,
) {
    if levels.len() < 2 {
        return;
    }

    programs.bloom_extract.encode(
        device,
        encoder,
        &levels[0].view,
        levels[0].format,
        &[frame.read()],
        None,
    );

    let mut prev = &levels[0];
    for next in &levels[1..] {
        programs.copy.encode(device, encoder, &next.view, next.format, &[prev], None);
        prev = next;
    }

    let last = levels.len() - 1;
    blur.apply(device, encoder, programs, &levels[last], &levels[last - 1], BLOOM_BLUR_ROUNDS);
    prev = &levels[last - 1];

    for i in (1..=levels.len().saturating_sub(3)).rev() {
        programs.copy.encode(device, encoder, &levels[i].view, levels[i].format, &[prev], None);
        prev = &levels[i];
    }

    let params = CompositeParams {
        intensity,
        _pad: [0.0; 3],
    };
    let target = frame.write();
    programs.bloom_composite.encode(
        device,
        encoder,
        &target.view,
        target.format,
        &[frame.read(), prev],
        Some(bytes_of(&params)),
    );
    frame.swap();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_odd_rounds_is_always_odd() {
        for rounds in 0..20 {
            assert_eq!(odd_rounds(rounds) % 2, 1, "rounds = {}", rounds);
            assert!(odd_rounds(rounds) >= rounds);
        }
        assert_eq!(odd_rounds(1), 1);
        assert_eq!(odd_rounds(2), 3);
        assert_eq!(odd_rounds(5), 5);
    }

    #[test]
    fn test_blur_kernel_normalizes_to_its_weight() {
        let blur = FilterKind::Blur.kernel();
        let sum: f32 = blur.weights.iter().sum();
        assert_eq!(sum, blur.weight);
    }

    #[test]
    fn test_edge_and_sharpen_kernels_preserve_flat_fields() {
        // On a constant input, convolution yields sum(weights) / weight.
        for kind in [FilterKind::EdgeDetect, FilterKind::Sharpen] {
            let kernel = kind.kernel();
            let response: f32 = kernel.weights.iter().sum::<f32>() / kernel.weight;
            let expected = if kind == FilterKind::EdgeDetect { 0.0 } else { 1.0 };
            assert_eq!(response, expected, "{:?}", kind);
        }
    }

    #[test]
    fn test_kernel_packing_layout() {
        let kernel = FilterKernel {
            weights: [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0],
            weight: 16.0,
        };
        let packed = pack_kernel(&kernel);
        assert_eq!(packed[0], [1.0, 2.0, 3.0, 4.0]);
        assert_eq!(packed[1], [5.0, 6.0, 7.0, 8.0]);
        assert_eq!(packed[2], [9.0, 16.0, 0.0, 0.0]);
    }
}
