pub mod animation;
pub mod composite;
pub mod encode;

pub use animation::{
    expand_sequence, parse_scale, process_still, render_frames, AnimationError, CropRect,
    LoopStyle, RenderOptions, RenderedFrames, PREVIEW_WIDTH, SCALE_IDENTITY_TOLERANCE,
};
pub use composite::{compose_rgb, recipe, CompositeError, Recipe, RECIPES};
pub use encode::{crf_for_quality, encode, EncodeError, Format};
