//! Visualization resolution: which visualizations a document can show, and
//! turning one of them into a rendered response body.

pub mod registry;
pub mod resolve;
pub mod transforms;

pub use registry::available_for;
pub use resolve::{Rendered, ResolveError, VisualizationRequest, resolve};
