//! Side-effecting adapters: shell processes, approval I/O, config and
//! snapshot files, prompt rendering, and the model seam.

pub mod approval;
pub mod config;
pub mod model;
pub mod process;
pub mod prompt;
pub mod session_store;
pub mod shell;
