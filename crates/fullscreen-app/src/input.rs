use fullscreen_core::{FeatureSettings, ViewKind};

// ---------------------------------------------------------------------------
// Key — windowing-library-independent key representation
// ---------------------------------------------------------------------------

/// A keyboard key, independent of any windowing library.
///
/// `main.rs` maps `winit::keyboard::PhysicalKey` → `Key`; everything else
/// in the input pipeline works purely with this enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Left,
    Right,
    F,
    M,
    V,
    R,
    Q,
    Escape,
}

// ---------------------------------------------------------------------------
// InputAction — what the app does in response to input
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputAction {
    NextPass,
    PrevPass,
    ToggleFetch,
    CycleMaterial,
    CycleView,
    ReloadSettings,
    Quit,
}

pub fn on_key(key: Key) -> InputAction {
    match key {
        Key::Right => InputAction::NextPass,
        Key::Left => InputAction::PrevPass,
        Key::F => InputAction::ToggleFetch,
        Key::M => InputAction::CycleMaterial,
        Key::V => InputAction::CycleView,
        Key::R => InputAction::ReloadSettings,
        Key::Q | Key::Escape => InputAction::Quit,
    }
}

// ---------------------------------------------------------------------------
// Settings edits (pure, testable)
// ---------------------------------------------------------------------------

/// Order the demo steps through views in. Includes the kinds the feature
/// refuses to render into, to show the skip.
pub const VIEW_CYCLE: [ViewKind; 5] = [
    ViewKind::Game,
    ViewKind::SceneView,
    ViewKind::Preview,
    ViewKind::Reflection,
    ViewKind::OffscreenDepth,
];

pub fn next_view(view: ViewKind) -> ViewKind {
    let at = VIEW_CYCLE.iter().position(|&v| v == view).unwrap_or(0);
    VIEW_CYCLE[(at + 1) % VIEW_CYCLE.len()]
}

/// Step the material key through `keys`, then through "no material", then
/// back to the first key.
pub fn next_material(current: Option<&str>, keys: &[&str]) -> Option<String> {
    let next = match current.and_then(|c| keys.iter().position(|&k| k == c)) {
        Some(at) => keys.get(at + 1),
        None if current.is_none() => keys.first(),
        None => None,
    };
    next.map(|k| (*k).to_owned())
}

/// Apply a settings-editing action. Pass indices are deliberately not
/// clamped: stepping past the material's passes shows the validation
/// warning. Returns `false` for actions that don't edit settings.
pub fn edit_settings(
    settings: &mut FeatureSettings,
    action: InputAction,
    material_keys: &[&str],
) -> bool {
    match action {
        InputAction::NextPass => settings.pass_index = settings.pass_index.saturating_add(1),
        InputAction::PrevPass => settings.pass_index = settings.pass_index.saturating_sub(1),
        InputAction::ToggleFetch => settings.fetch_color_buffer = !settings.fetch_color_buffer,
        InputAction::CycleMaterial => {
            settings.material = next_material(settings.material.as_deref(), material_keys);
            settings.pass_index = 0;
        }
        _ => return false,
    }
    true
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
