use fullscreen_core::ColorFormat;
use wgpu::TextureFormat;

pub fn to_wgpu(format: ColorFormat) -> TextureFormat {
    match format {
        ColorFormat::Rgba8Unorm => TextureFormat::Rgba8Unorm,
        ColorFormat::Rgba8UnormSrgb => TextureFormat::Rgba8UnormSrgb,
        ColorFormat::Bgra8Unorm => TextureFormat::Bgra8Unorm,
        ColorFormat::Bgra8UnormSrgb => TextureFormat::Bgra8UnormSrgb,
        ColorFormat::Rgb10a2Unorm => TextureFormat::Rgb10a2Unorm,
        ColorFormat::Rgba16Float => TextureFormat::Rgba16Float,
        ColorFormat::Rgba32Float => TextureFormat::Rgba32Float,
    }
}

/// `None` for formats a full-screen color target can't use (depth, compressed, ...).
pub fn from_wgpu(format: TextureFormat) -> Option<ColorFormat> {
    Some(match format {
        TextureFormat::Rgba8Unorm => ColorFormat::Rgba8Unorm,
        TextureFormat::Rgba8UnormSrgb => ColorFormat::Rgba8UnormSrgb,
        TextureFormat::Bgra8Unorm => ColorFormat::Bgra8Unorm,
        TextureFormat::Bgra8UnormSrgb => ColorFormat::Bgra8UnormSrgb,
        TextureFormat::Rgb10a2Unorm => ColorFormat::Rgb10a2Unorm,
        TextureFormat::Rgba16Float => ColorFormat::Rgba16Float,
        TextureFormat::Rgba32Float => ColorFormat::Rgba32Float,
        _ => return None,
    })
}
