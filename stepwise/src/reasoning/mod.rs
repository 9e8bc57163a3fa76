//! Reasoning engines: the bounded think-act-observe loop and the fixed
//! chain-of-thought template.

pub mod cot;
pub mod react;
pub mod registry;
