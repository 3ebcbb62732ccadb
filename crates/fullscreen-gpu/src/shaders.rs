/// Shared prelude for every full-screen material and the blit.
///
/// The vertex shader generates one oversized triangle from vertex indices
/// (no vertex buffer needed) covering clip space, and applies
/// `params.scale_bias` to the UVs. Fragment shaders sample `blit_texture`,
/// which is the color copy when the pass fetches the color buffer and a
/// 1×1 black texture otherwise.
pub const FULLSCREEN_PRELUDE_WGSL: &str = r#"
struct BlitParams {
    scale_bias: vec4<f32>,
    resolution: vec2<f32>,
    time:       f32,
    _pad:       f32,
};

@group(0) @binding(0) var<uniform> params:       BlitParams;
@group(0) @binding(1) var          blit_texture: texture_2d<f32>;
@group(0) @binding(2) var          blit_sampler: sampler;

struct VertexOut {
    @builtin(position) pos: vec4<f32>,
    @location(0)       uv:  vec2<f32>,
};

@vertex
fn vs_fullscreen(@builtin(vertex_index) vi: u32) -> VertexOut {
    // (0,0), (2,0), (0,2) -> clip (-1,-1), (3,-1), (-1,3)
    let p = vec2<f32>(f32((vi << 1u) & 2u), f32(vi & 2u));
    var out: VertexOut;
    out.pos = vec4<f32>(p * 2.0 - 1.0, 0.0, 1.0);
    let uv = vec2<f32>(p.x, 1.0 - p.y);
    out.uv = uv * params.scale_bias.xy + params.scale_bias.zw;
    return out;
}
"#;

/// Straight copy of `blit_texture`.
pub const BLIT_FRAGMENT_WGSL: &str = r#"
@fragment
fn fs_blit(in: VertexOut) -> @location(0) vec4<f32> {
    return textureSampleLevel(blit_texture, blit_sampler, in.uv, 0.0);
}
"#;

pub const VERTEX_ENTRY: &str = "vs_fullscreen";
pub const BLIT_ENTRY: &str = "fs_blit";

/// Prelude followed by a material's fragment stages.
pub fn with_prelude(fragment_wgsl: &str) -> String {
    let mut source = String::with_capacity(FULLSCREEN_PRELUDE_WGSL.len() + fragment_wgsl.len());
    source.push_str(FULLSCREEN_PRELUDE_WGSL);
    source.push_str(fragment_wgsl);
    source
}
