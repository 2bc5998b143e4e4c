//! Code emission: the per-service `fns.go` companion files, the deploys
//! aggregator, and the Go-source writing utilities they share.

mod deploys_file;
mod documents;
mod service_file;
mod writer;

pub use deploys_file::DeploysFile;
pub use documents::map_type;
pub use service_file::ServiceFile;
pub use writer::{go_duration_literal, go_quote, render_type, write_source, GoWriter};
