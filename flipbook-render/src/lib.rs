pub mod artifact;
pub mod assets;
pub mod canvas;
pub mod compose;

pub use artifact::{
    certificate_filename, encode_png, pledge_card_filename, render_certificate, render_pledge_card,
    to_data_uri, today, ArtifactSink, PledgeCard, SavedArtifact,
};
pub use assets::{load_avatar, page_asset_name, ImageBookProvider, PageLibrary, DEFAULT_CACHE_PAGES};
pub use canvas::{Canvas, FontSet, TextStyle};
pub use compose::{apply_zoom, compose_spread, flip_frame, into_render_image, to_rgba_image};
