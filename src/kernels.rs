//! WGSL sources for every pipeline pass.
//!
//! Each pass is a small fragment program that reads one or more input
//! surfaces and writes one output surface; all of them share the same
//! fullscreen-triangle vertex stage. The `*Params` structs here mirror the
//! uniform blocks declared in the WGSL and are uploaded per draw.
//!
//! Binding convention (enforced by `gpu::pipeline::PassProgram`): when a
//! pass takes parameters, binding 0 is the uniform block and input
//! texture/sampler pairs follow; parameterless passes start their inputs
//! at binding 0.
//!
//! UV space is bottom-left origin throughout, matching the normalized
//! coordinates accepted by `add_force`.

use bytemuck::{Pod, Zeroable};

/// Concatenate the shared vertex stage with a fragment kernel into one
/// compilable module.
pub fn module(fragment: &str) -> String {
    format!("{FULLSCREEN_VERTEX}\n{fragment}")
}

/// Shared fullscreen-triangle vertex stage.
pub const FULLSCREEN_VERTEX: &str = r#"
struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) uv: vec2<f32>,
};

@vertex
fn vs_main(@builtin(vertex_index) vertex_index: u32) -> VertexOutput {
    var positions = array<vec2<f32>, 3>(
        vec2<f32>(-1.0, -1.0),
        vec2<f32>(3.0, -1.0),
        vec2<f32>(-1.0, 3.0),
    );
    let pos = positions[vertex_index];
    var out: VertexOutput;
    out.clip_position = vec4<f32>(pos, 0.0, 1.0);
    out.uv = pos * 0.5 + 0.5;
    return out;
}
"#;

#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
pub struct AdvectParams {
    pub dt: f32,
    pub decay: f32,
    pub _pad: [f32; 2],
}

/// Semi-Lagrangian advection with exponential damping plus a small
/// constant bias that drains residual dye at very low densities.
pub const ADVECT: &str = r#"
struct AdvectParams {
    dt: f32,
    decay: f32,
    _pad: vec2<f32>,
};

@group(0) @binding(0) var<uniform> params: AdvectParams;
@group(0) @binding(1) var velocity_tex: texture_2d<f32>;
@group(0) @binding(2) var velocity_smp: sampler;
@group(0) @binding(3) var field_tex: texture_2d<f32>;
@group(0) @binding(4) var field_smp: sampler;

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    let velocity = textureSample(velocity_tex, velocity_smp, in.uv).xy;
    let source = in.uv - params.dt * velocity;
    let result = textureSample(field_tex, field_smp, source);
    let decay = 1.0 + params.decay * params.dt;
    return result / decay - 0.001 * params.decay;
}
"#;

#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
pub struct PixelParams {
    pub pixel_size: [f32; 2],
    pub _pad: [f32; 2],
}

/// Central-difference divergence. Samples that would fall outside the
/// domain mirror the negated center value (zero-flux walls).
pub const DIVERGENCE: &str = r#"
struct PixelParams {
    pixel_size: vec2<f32>,
    _pad: vec2<f32>,
};

@group(0) @binding(0) var<uniform> params: PixelParams;
@group(0) @binding(1) var velocity_tex: texture_2d<f32>;
@group(0) @binding(2) var velocity_smp: sampler;

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    let l = in.uv - vec2<f32>(params.pixel_size.x, 0.0);
    let r = in.uv + vec2<f32>(params.pixel_size.x, 0.0);
    let t = in.uv + vec2<f32>(0.0, params.pixel_size.y);
    let b = in.uv - vec2<f32>(0.0, params.pixel_size.y);
    let center = textureSample(velocity_tex, velocity_smp, in.uv).xy;
    var ll = textureSample(velocity_tex, velocity_smp, l).x;
    var rr = textureSample(velocity_tex, velocity_smp, r).x;
    var tt = textureSample(velocity_tex, velocity_smp, t).y;
    var bb = textureSample(velocity_tex, velocity_smp, b).y;
    if (l.x < 0.0) { ll = -center.x; }
    if (r.x > 1.0) { rr = -center.x; }
    if (t.y > 1.0) { tt = -center.y; }
    if (b.y < 0.0) { bb = -center.y; }
    let div = 0.5 * (rr - ll + tt - bb);
    return vec4<f32>(div, 0.0, 0.0, 1.0);
}
"#;

/// One Jacobi relaxation step of the pressure Poisson equation.
pub const PRESSURE: &str = r#"
struct PixelParams {
    pixel_size: vec2<f32>,
    _pad: vec2<f32>,
};

@group(0) @binding(0) var<uniform> params: PixelParams;
@group(0) @binding(1) var pressure_tex: texture_2d<f32>;
@group(0) @binding(2) var pressure_smp: sampler;
@group(0) @binding(3) var divergence_tex: texture_2d<f32>;
@group(0) @binding(4) var divergence_smp: sampler;

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    let ll = textureSample(pressure_tex, pressure_smp, in.uv - vec2<f32>(params.pixel_size.x, 0.0)).x;
    let rr = textureSample(pressure_tex, pressure_smp, in.uv + vec2<f32>(params.pixel_size.x, 0.0)).x;
    let tt = textureSample(pressure_tex, pressure_smp, in.uv + vec2<f32>(0.0, params.pixel_size.y)).x;
    let bb = textureSample(pressure_tex, pressure_smp, in.uv - vec2<f32>(0.0, params.pixel_size.y)).x;
    let divergence = textureSample(divergence_tex, divergence_smp, in.uv).x;
    let pressure = (ll + rr + bb + tt - divergence) * 0.25;
    return vec4<f32>(pressure, 0.0, 0.0, 1.0);
}
"#;

/// Subtract the pressure gradient from the velocity field.
pub const GRADIENT_SUBTRACT: &str = r#"
struct PixelParams {
    pixel_size: vec2<f32>,
    _pad: vec2<f32>,
};

@group(0) @binding(0) var<uniform> params: PixelParams;
@group(0) @binding(1) var pressure_tex: texture_2d<f32>;
@group(0) @binding(2) var pressure_smp: sampler;
@group(0) @binding(3) var velocity_tex: texture_2d<f32>;
@group(0) @binding(4) var velocity_smp: sampler;

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    let ll = textureSample(pressure_tex, pressure_smp, in.uv - vec2<f32>(params.pixel_size.x, 0.0)).x;
    let rr = textureSample(pressure_tex, pressure_smp, in.uv + vec2<f32>(params.pixel_size.x, 0.0)).x;
    let tt = textureSample(pressure_tex, pressure_smp, in.uv + vec2<f32>(0.0, params.pixel_size.y)).x;
    let bb = textureSample(pressure_tex, pressure_smp, in.uv - vec2<f32>(0.0, params.pixel_size.y)).x;
    var velocity = textureSample(velocity_tex, velocity_smp, in.uv).xy;
    velocity -= vec2<f32>(rr - ll, tt - bb);
    return vec4<f32>(velocity, 0.0, 1.0);
}
"#;

/// Curl of the velocity field.
pub const CURL: &str = r#"
struct PixelParams {
    pixel_size: vec2<f32>,
    _pad: vec2<f32>,
};

@group(0) @binding(0) var<uniform> params: PixelParams;
@group(0) @binding(1) var velocity_tex: texture_2d<f32>;
@group(0) @binding(2) var velocity_smp: sampler;

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    let ll = textureSample(velocity_tex, velocity_smp, in.uv - vec2<f32>(params.pixel_size.x, 0.0)).y;
    let rr = textureSample(velocity_tex, velocity_smp, in.uv + vec2<f32>(params.pixel_size.x, 0.0)).y;
    let tt = textureSample(velocity_tex, velocity_smp, in.uv + vec2<f32>(0.0, params.pixel_size.y)).x;
    let bb = textureSample(velocity_tex, velocity_smp, in.uv - vec2<f32>(0.0, params.pixel_size.y)).x;
    let vorticity = rr - ll + bb - tt;
    return vec4<f32>(vorticity, 0.0, 0.0, 1.0);
}
"#;

#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
pub struct VorticityParams {
    pub pixel_size: [f32; 2],
    pub curl_strength: f32,
    pub dt: f32,
}

/// Vorticity confinement: push velocity along the gradient of |curl|
/// rotated a quarter turn, restoring rotation lost to the coarse grid.
/// The result is clamped hard to keep runaway feedback bounded.
pub const VORTICITY: &str = r#"
struct VorticityParams {
    pixel_size: vec2<f32>,
    curl_strength: f32,
    dt: f32,
};

@group(0) @binding(0) var<uniform> params: VorticityParams;
@group(0) @binding(1) var velocity_tex: texture_2d<f32>;
@group(0) @binding(2) var velocity_smp: sampler;
@group(0) @binding(3) var curl_tex: texture_2d<f32>;
@group(0) @binding(4) var curl_smp: sampler;

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    let ll = textureSample(curl_tex, curl_smp, in.uv - vec2<f32>(params.pixel_size.x, 0.0)).x;
    let rr = textureSample(curl_tex, curl_smp, in.uv + vec2<f32>(params.pixel_size.x, 0.0)).x;
    let tt = textureSample(curl_tex, curl_smp, in.uv + vec2<f32>(0.0, params.pixel_size.y)).x;
    let bb = textureSample(curl_tex, curl_smp, in.uv - vec2<f32>(0.0, params.pixel_size.y)).x;
    let center = textureSample(curl_tex, curl_smp, in.uv).x;
    var force = 0.5 * vec2<f32>(abs(tt) - abs(bb), abs(rr) - abs(ll));
    force /= length(force) + 0.0001;
    force *= params.curl_strength * center;
    force.y *= -1.0;
    var velocity = textureSample(velocity_tex, velocity_smp, in.uv).xy;
    velocity += force * params.dt;
    velocity = clamp(velocity, vec2<f32>(-1000.0), vec2<f32>(1000.0));
    return vec4<f32>(velocity, 0.0, 1.0);
}
"#;

#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
pub struct AddDataParams {
    pub amount: [f32; 4],
    pub point: [f32; 2],
    pub radius: f32,
    /// 0 adds `amount` directly; 1 blends it in as a 1/21-weight moving
    /// average.
    pub blend: u32,
}

/// Inject a value inside a hard-cutoff circle around a normalized point.
pub const ADD_DATA: &str = r#"
struct AddDataParams {
    amount: vec4<f32>,
    point: vec2<f32>,
    radius: f32,
    blend: u32,
};

@group(0) @binding(0) var<uniform> params: AddDataParams;
@group(0) @binding(1) var data_tex: texture_2d<f32>;
@group(0) @binding(2) var data_smp: sampler;

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    let base = textureSample(data_tex, data_smp, in.uv);
    let dist = distance(in.uv, params.point);
    if (dist >= params.radius) {
        return base;
    }
    if (params.blend == 1u) {
        return (base * 20.0 + params.amount) / 21.0;
    }
    return base + params.amount;
}
"#;

/// Straight copy of the input surface.
pub const COPY: &str = r#"
@group(0) @binding(0) var data_tex: texture_2d<f32>;
@group(0) @binding(1) var data_smp: sampler;

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    return textureSample(data_tex, data_smp, in.uv);
}
"#;

#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
pub struct ClearParams {
    pub value: [f32; 4],
    pub constant: [f32; 4],
}

/// Componentwise `value * data + constant`. With `constant = 0` this
/// scales a field in place; used to seed the pressure relaxation with a
/// damped fraction of the previous frame's solution.
pub const CLEAR: &str = r#"
struct ClearParams {
    value: vec4<f32>,
    constant: vec4<f32>,
};

@group(0) @binding(0) var<uniform> params: ClearParams;
@group(0) @binding(1) var data_tex: texture_2d<f32>;
@group(0) @binding(2) var data_smp: sampler;

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    return params.value * textureSample(data_tex, data_smp, in.uv) + params.constant;
}
"#;

#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
pub struct FilterParams {
    pub pixel_size: [f32; 2],
    pub _pad: [f32; 2],
    /// Row-major 3x3 kernel packed as three vec4s; `kernel[2][1]` holds
    /// the normalization weight.
    pub kernel: [[f32; 4]; 3],
}

/// 3x3 convolution with a caller-supplied kernel and normalization weight.
pub const FILTER3X3: &str = r#"
struct FilterParams {
    pixel_size: vec2<f32>,
    _pad: vec2<f32>,
    k0: vec4<f32>,
    k1: vec4<f32>,
    k2: vec4<f32>,
};

@group(0) @binding(0) var<uniform> params: FilterParams;
@group(0) @binding(1) var data_tex: texture_2d<f32>;
@group(0) @binding(2) var data_smp: sampler;

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    let px = params.pixel_size;
    let tl = textureSample(data_tex, data_smp, in.uv + vec2<f32>(-px.x, px.y)) * params.k0.x;
    let t = textureSample(data_tex, data_smp, in.uv + vec2<f32>(0.0, px.y)) * params.k0.y;
    let tr = textureSample(data_tex, data_smp, in.uv + vec2<f32>(px.x, px.y)) * params.k0.z;
    let l = textureSample(data_tex, data_smp, in.uv + vec2<f32>(-px.x, 0.0)) * params.k0.w;
    let center = textureSample(data_tex, data_smp, in.uv) * params.k1.x;
    let r = textureSample(data_tex, data_smp, in.uv + vec2<f32>(px.x, 0.0)) * params.k1.y;
    let bl = textureSample(data_tex, data_smp, in.uv + vec2<f32>(-px.x, -px.y)) * params.k1.z;
    let b = textureSample(data_tex, data_smp, in.uv + vec2<f32>(0.0, -px.y)) * params.k1.w;
    let br = textureSample(data_tex, data_smp, in.uv + vec2<f32>(px.x, -px.y)) * params.k2.x;
    let weight = params.k2.y;
    return (tl + t + tr + l + center + r + bl + b + br) / weight;
}
"#;

/// Brightness-weighted copy feeding the bloom chain.
pub const BLOOM_EXTRACT: &str = r#"
@group(0) @binding(0) var data_tex: texture_2d<f32>;
@group(0) @binding(1) var data_smp: sampler;

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    let pixel = textureSample(data_tex, data_smp, in.uv).xyz;
    let direction = pixel / (length(pixel) + 0.0001);
    let brightness = dot(direction, vec3<f32>(0.2126, 0.7152, 0.0722));
    return vec4<f32>(pixel * (1.0 + brightness), 1.0);
}
"#;

#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
pub struct CompositeParams {
    pub intensity: f32,
    pub _pad: [f32; 3],
}

/// Additive bloom composite followed by exposure tone mapping and gamma
/// correction.
pub const BLOOM_COMPOSITE: &str = r#"
struct CompositeParams {
    intensity: f32,
    _pad0: f32,
    _pad1: f32,
    _pad2: f32,
};

@group(0) @binding(0) var<uniform> params: CompositeParams;
@group(0) @binding(1) var data_tex: texture_2d<f32>;
@group(0) @binding(2) var data_smp: sampler;
@group(0) @binding(3) var bloom_tex: texture_2d<f32>;
@group(0) @binding(4) var bloom_smp: sampler;

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    let gamma = 2.2;
    var pixel = textureSample(data_tex, data_smp, in.uv).rgb;
    let bloom = textureSample(bloom_tex, bloom_smp, in.uv).rgb;
    pixel += bloom * params.intensity;
    var result = vec3<f32>(1.0) - exp(-pixel);
    result = pow(result, vec3<f32>(1.0 / gamma));
    return vec4<f32>(result, 1.0);
}
"#;

/// Final pass onto the visible surface. The brightest channel doubles as
/// alpha so additive color reads correctly over a dark background.
pub const DISPLAY: &str = r#"
@group(0) @binding(0) var data_tex: texture_2d<f32>;
@group(0) @binding(1) var data_smp: sampler;

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    let pixel = textureSample(data_tex, data_smp, in.uv);
    let alpha = max(pixel.r, max(pixel.g, pixel.b));
    return vec4<f32>(pixel.rgb, alpha);
}
"#;

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_KERNELS: &[(&str, &str)] = &[
        ("advect", ADVECT),
        ("divergence", DIVERGENCE),
        ("pressure", PRESSURE),
        ("gradient_subtract", GRADIENT_SUBTRACT),
        ("curl", CURL),
        ("vorticity", VORTICITY),
        ("add_data", ADD_DATA),
        ("copy", COPY),
        ("clear", CLEAR),
        ("filter3x3", FILTER3X3),
        ("bloom_extract", BLOOM_EXTRACT),
        ("bloom_composite", BLOOM_COMPOSITE),
        ("display", DISPLAY),
    ];

    #[test]
    fn test_all_kernels_are_valid_wgsl() {
        for (name, fragment) in ALL_KERNELS {
            let source = module(fragment);
            let parsed = naga::front::wgsl::parse_str(&source)
                .unwrap_or_else(|e| panic!("kernel {} failed to parse: {}", name, e));
            naga::valid::Validator::new(
                naga::valid::ValidationFlags::all(),
                naga::valid::Capabilities::default(),
            )
            .validate(&parsed)
            .unwrap_or_else(|e| panic!("kernel {} failed validation: {:?}", name, e));
        }
    }

    #[test]
    fn test_kernels_declare_both_entry_points() {
        for (name, fragment) in ALL_KERNELS {
            let source = module(fragment);
            assert!(source.contains("fn vs_main"), "{} missing vertex entry", name);
            assert!(source.contains("fn fs_main"), "{} missing fragment entry", name);
        }
    }

    #[test]
    fn test_param_structs_match_wgsl_sizes() {
        use std::mem::size_of;
        assert_eq!(size_of::<AdvectParams>(), 16);
        assert_eq!(size_of::<PixelParams>(), 16);
        assert_eq!(size_of::<VorticityParams>(), 16);
        assert_eq!(size_of::<AddDataParams>(), 32);
        assert_eq!(size_of::<ClearParams>(), 32);
        assert_eq!(size_of::<FilterParams>(), 64);
        assert_eq!(size_of::<CompositeParams>(), 16);
    }
}
