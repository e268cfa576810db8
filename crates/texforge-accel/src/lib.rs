#![doc = include_str!("../README.md")]

pub mod abi;
pub mod backend;
pub mod symbols;

pub use backend::ExternalBackend;
pub use symbols::{AcceleratorSymbols, DynamicModule, SymbolSource, SymbolTable};
